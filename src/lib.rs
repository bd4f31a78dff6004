//! # cernml-utils
//!
//! Convenience utilities for accelerator-control clients.
//!
//! ## Core Concepts
//!
//! - **Streams**: synchronized queues on top of callback-driven parameter
//!   subscriptions, with blocking and non-blocking reads
//! - **Cancellation**: cooperative tokens that interrupt blocking reads
//! - **Replay**: an offline subscription client that plays back scripts
//! - **Scaler**: exact, monotonic rescaling between a box and [-1, +1]
//!
//! ## Example
//!
//! ```ignore
//! use cernml_utils::{subscribe_param, ReplayClient, Scripted, StreamConfig};
//!
//! let client = ReplayClient::new(vec![Scripted::Value(1.5), Scripted::Value(2.5)]);
//! let stream = subscribe_param(&client, "dev/prop#field", StreamConfig {
//!     maxlen: None,
//!     ..Default::default()
//! })?;
//!
//! let active = stream.monitor();
//! while let Some((value, header)) = active.pop_or_wait(Some(Duration::from_millis(100)))? {
//!     println!("{} (first: {})", value, header.is_first_update);
//! }
//! ```

pub mod cancellation;
pub mod error;
pub mod replay;
pub mod scaler;
pub mod streams;
pub mod types;

// Re-exports
pub use cancellation::{CancelledError, Token, TokenSource, WaitHandle};
pub use error::{Result, StreamError};
pub use replay::{ReplayClient, ReplayHandle, Scripted};
pub use scaler::{scale_from_box, unscale_into_box, BoxSpace, ScaleError, Scaler};
pub use streams::{
    monitoring, subscribe_group, subscribe_param, subscribe_stream, subscriptions, Item, Locked,
    Monitoring, ParamGroupStream, ParamStream, StreamConfig, Subscribed, SubscribeOptions,
    SubscriptionClient, SubscriptionHandle, Subscriptions,
};
pub use types::*;
