//! Cooperative cancellation.
//!
//! A [`TokenSource`] hands out [`Token`]s. Code that may block for a long
//! time polls its token at well-defined checkpoints and bails out with
//! [`CancelledError`] once cancellation has been requested.
//!
//! Every token carries a [`WaitHandle`]. Anything that wants to sleep until
//! *either* its own condition holds *or* the token is cancelled waits on that
//! handle: [`TokenSource::cancel`] notifies all of its waiters.
//!
//! # Example
//!
//! ```ignore
//! let source = TokenSource::new();
//! let stream = subscribe_param(&client, "dev/prop#field", StreamConfig {
//!     token: Some(source.token()),
//!     ..Default::default()
//! })?;
//!
//! // Elsewhere:
//! source.cancel();
//! // `stream.pop_or_wait(None)` now fails with `StreamError::Cancelled`.
//! ```

mod token;
mod wait;

pub use token::{CancelledError, Token, TokenSource};
pub use wait::{WaitGuard, WaitHandle};
