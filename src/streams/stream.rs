//! Single-parameter and parameter-group streams.
//!
//! Both wrap a [`StreamCore`]; they only differ in the shape of the items
//! they produce and in how a raw delivery is turned into such an item.

use super::client::{ExceptionCallback, SubscriptionClient, SubscriptionHandle, ValueCallback};
use super::engine::{Locked, Shared, StreamCore};
use super::queue::Event;
use super::scoped::{monitoring, Monitoring};
use super::subscribe::StreamConfig;
use crate::cancellation::Token;
use crate::error::Result;
use crate::types::{FaultSource, Header, MalformedDelivery, ParamNames, SubscriptionFault};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A value together with its header.
pub type Item<V> = (V, Header);

fn malformed(names: &ParamNames, values: usize, headers: usize) -> SubscriptionFault {
    let error = MalformedDelivery {
        expected: names.len(),
        values,
        headers,
    };
    warn!(%names, %error, "dropping malformed delivery");
    SubscriptionFault::new(names.clone(), error.to_string(), Arc::new(error))
}

fn single_item<V>(names: &ParamNames, values: Vec<V>, headers: Vec<Header>) -> Event<Item<V>> {
    if values.len() != 1 || headers.len() != 1 {
        return Err(malformed(names, values.len(), headers.len()));
    }
    match values.into_iter().zip(headers).next() {
        Some(item) => Ok(item),
        None => Err(malformed(names, 0, 0)),
    }
}

fn group_item<V>(names: &ParamNames, values: Vec<V>, headers: Vec<Header>) -> Event<Vec<Item<V>>> {
    if values.len() != names.len() || headers.len() != names.len() {
        return Err(malformed(names, values.len(), headers.len()));
    }
    Ok(values.into_iter().zip(headers).collect())
}

/// Subscribe on `client` with callbacks that feed a fresh shared queue.
fn subscribe_core<C, T, F>(
    client: &C,
    names: ParamNames,
    config: &StreamConfig,
    shape: F,
) -> Result<StreamCore<T>>
where
    C: SubscriptionClient + ?Sized,
    T: Clone + Send + 'static,
    F: Fn(&ParamNames, Vec<C::Value>, Vec<Header>) -> Event<T> + Send + Sync + 'static,
{
    config.validate()?;
    let shared = Arc::new(Shared::new(config.maxlen, config.token.clone()));

    let on_value: ValueCallback<C::Value> = {
        let shared = Arc::clone(&shared);
        Arc::new(move |names: &ParamNames, values: Vec<C::Value>, headers: Vec<Header>| {
            shared.push(shape(names, values, headers))
        })
    };
    let on_exception: ExceptionCallback = {
        let shared = Arc::clone(&shared);
        Arc::new(move |names: &ParamNames, description: &str, source: FaultSource| {
            shared.push_fault(names, description, source)
        })
    };

    let handle = client.subscribe_param(&names, on_value, on_exception, &config.subscribe_options())?;
    Ok(StreamCore::new(names, shared, handle))
}

/// Delegates the shared stream API to `self.core`.
macro_rules! stream_api {
    ($item:ty) => {
        /// True if this stream is receiving values.
        pub fn is_monitoring(&self) -> bool {
            self.core.is_monitoring()
        }

        /// Start receiving values.
        pub fn start_monitoring(&self) {
            self.core.start_monitoring()
        }

        /// Stop receiving values. Queued items stay available.
        pub fn stop_monitoring(&self) {
            self.core.stop_monitoring()
        }

        /// Monitor for as long as the returned guard lives.
        pub fn monitor(&self) -> Monitoring<'_, Self> {
            monitoring(self)
        }

        /// Maximum queue length, `None` if unbounded.
        pub fn maxlen(&self) -> Option<usize> {
            self.core.maxlen()
        }

        pub fn token(&self) -> Option<Token> {
            self.core.token()
        }

        /// Replace the cancellation token.
        ///
        /// Fails with [`StreamError::TokenChangeWhileMonitoring`](crate::StreamError::TokenChangeWhileMonitoring)
        /// while the stream is monitoring.
        pub fn set_token(&self, token: Option<Token>) -> Result<()> {
            self.core.set_token(token)
        }

        /// True if an item is queued.
        pub fn is_ready(&self) -> bool {
            self.core.is_ready()
        }

        pub fn len(&self) -> usize {
            self.core.len()
        }

        pub fn is_empty(&self) -> bool {
            self.core.is_empty()
        }

        /// Empty the queue.
        pub fn clear(&self) {
            self.core.clear()
        }

        /// Run `f` with the stream locked; see [`StreamCore::locked`].
        pub fn locked<R>(&self, f: impl FnOnce(&mut Locked<'_, $item>) -> R) -> R {
            self.core.locked(f)
        }

        /// The oldest queued item.
        ///
        /// Fails with `Empty` if nothing is queued and re-raises the fault
        /// if that is what the oldest slot holds.
        pub fn oldest(&self) -> Result<$item> {
            self.core.oldest()
        }

        /// The most recent queued item. Fails like [`oldest`](Self::oldest).
        pub fn newest(&self) -> Result<$item> {
            self.core.newest()
        }

        /// Return the oldest queued item, or wait for the next one.
        ///
        /// With `timeout`, gives up and returns `Ok(None)` once it elapses.
        /// Fails with `Cancelled` if the token is cancelled (even if items
        /// are queued), with `Fault` if the popped slot holds a fault, and
        /// with `WouldDeadlock` if no timeout is given, nothing is queued and
        /// the stream is not monitoring.
        pub fn pop_or_wait(&self, timeout: Option<Duration>) -> Result<Option<$item>> {
            self.core.pop_or_wait(timeout)
        }

        /// Return the oldest queued item, or `None` right away. Ignores the
        /// token.
        pub fn pop_if_ready(&self) -> Result<Option<$item>> {
            self.core.pop_if_ready()
        }

        /// Discard the queue and wait for a genuinely new item, without
        /// releasing the lock in between.
        pub fn wait_for_next(&self, timeout: Option<Duration>) -> Result<Option<$item>> {
            self.core.wait_for_next(timeout)
        }
    };
}

/// A synchronized handle to a one-parameter subscription.
///
/// Created through [`subscribe_param`](super::subscribe_param) or
/// [`subscribe_stream`](super::subscribe_stream).
pub struct ParamStream<V> {
    core: StreamCore<Item<V>>,
}

impl<V: Clone + Send + Sync + 'static> ParamStream<V> {
    pub(crate) fn subscribe<C>(client: &C, name: String, config: &StreamConfig) -> Result<Self>
    where
        C: SubscriptionClient<Value = V> + ?Sized,
    {
        let core = subscribe_core(client, ParamNames::Single(name), config, single_item)?;
        Ok(Self { core })
    }

    /// The name of the underlying parameter.
    pub fn parameter_name(&self) -> &str {
        match self.core.names() {
            ParamNames::Single(name) => name,
            ParamNames::Group(names) => names.first().map(String::as_str).unwrap_or(""),
        }
    }

    stream_api!(Item<V>);
}

impl<V> fmt::Display for ParamStream<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParamStream({:?})", self.core.names().to_string())
    }
}

impl<V> fmt::Debug for ParamStream<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ParamStream").field(&self.core).finish()
    }
}

/// A synchronized handle to a parameter-group subscription.
///
/// Every item holds one `(value, header)` pair per parameter, in the order
/// the names were given.
pub struct ParamGroupStream<V> {
    core: StreamCore<Vec<Item<V>>>,
}

impl<V: Clone + Send + Sync + 'static> ParamGroupStream<V> {
    pub(crate) fn subscribe<C>(client: &C, names: Vec<String>, config: &StreamConfig) -> Result<Self>
    where
        C: SubscriptionClient<Value = V> + ?Sized,
    {
        let core = subscribe_core(client, ParamNames::Group(names), config, group_item)?;
        Ok(Self { core })
    }

    /// The names of all underlying parameters.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.core.names().names()
    }

    stream_api!(Vec<Item<V>>);
}

impl<V> fmt::Display for ParamGroupStream<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParamGroupStream of {} parameters", self.core.names().len())
    }
}

impl<V> fmt::Debug for ParamGroupStream<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ParamGroupStream").field(&self.core).finish()
    }
}

impl<V: Clone + Send + Sync + 'static> SubscriptionHandle for ParamStream<V> {
    fn start_monitoring(&self) {
        self.core.start_monitoring()
    }

    fn stop_monitoring(&self) {
        self.core.stop_monitoring()
    }

    fn is_monitoring(&self) -> bool {
        self.core.is_monitoring()
    }
}

impl<V: Clone + Send + Sync + 'static> SubscriptionHandle for ParamGroupStream<V> {
    fn start_monitoring(&self) {
        self.core.start_monitoring()
    }

    fn stop_monitoring(&self) {
        self.core.stop_monitoring()
    }

    fn is_monitoring(&self) -> bool {
        self.core.is_monitoring()
    }
}
