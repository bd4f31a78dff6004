//! Synchronized parameter streams.
//!
//! A subscription client delivers values by invoking callbacks on threads it
//! owns. A stream turns those callbacks into a queue that other threads can
//! poll or block on:
//! - `pop_or_wait()` waits for the next value, a cancellation, or a timeout
//! - `pop_if_ready()` never blocks
//! - `wait_for_next()` discards stale values first
//! - `locked()` runs check-then-act sequences without racing the producer
//!
//! Queues are bounded by default and keep only the most recent values.
//!
//! # Example
//!
//! ```ignore
//! let source = TokenSource::new();
//! let config = StreamConfig {
//!     token: Some(source.token()),
//!     maxlen: None,
//!     ..Default::default()
//! };
//! let stream = subscribe_param(&client, "dev/prop#field", config)?;
//!
//! let active = stream.monitor();
//! loop {
//!     match active.pop_or_wait(Some(Duration::from_secs(1))) {
//!         Ok(Some((value, header))) => println!("{:?} at {:?}", value, header.acq_stamp),
//!         Ok(None) => println!("nothing within a second"),
//!         Err(StreamError::Cancelled(_)) => break,
//!         Err(e) => return Err(e),
//!     }
//! }
//! ```

mod client;
mod engine;
mod queue;
mod scoped;
mod stream;
mod subscribe;

pub use client::{
    ExceptionCallback, SubscribeOptions, SubscriptionClient, SubscriptionHandle, ValueCallback,
};
pub use engine::{Locked, StreamCore};
pub use queue::{Event, EventQueue};
pub use scoped::{monitoring, subscriptions, Monitoring, Subscriptions};
pub use stream::{Item, ParamGroupStream, ParamStream};
pub use subscribe::{subscribe_group, subscribe_param, subscribe_stream, StreamConfig, Subscribed};
