//! The subscription client a stream sits on top of.

use crate::error::Result;
use crate::types::{DataFilter, FaultSource, Header, ParamNames};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Called by the client for every update, possibly from a foreign thread.
///
/// Receives one value and one header per subscribed parameter.
pub type ValueCallback<V> = Arc<dyn Fn(&ParamNames, Vec<V>, Vec<Header>) + Send + Sync>;

/// Called by the client when an update could not be delivered.
pub type ExceptionCallback = Arc<dyn Fn(&ParamNames, &str, FaultSource) + Send + Sync>;

/// Options passed through to [`SubscriptionClient::subscribe_param`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeOptions {
    /// Streams always request headers.
    pub get_header: bool,

    /// Deliver raw client objects instead of converted values.
    pub no_conversion: bool,

    /// Replaces the client's default timing selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing_selector_override: Option<String>,

    /// Replaces the client's default data filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_filter_override: Option<DataFilter>,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            get_header: true,
            no_conversion: false,
            timing_selector_override: None,
            data_filter_override: None,
        }
    }
}

/// A pub/sub client that can subscribe to device parameters.
pub trait SubscriptionClient {
    /// The payload type this client delivers.
    type Value: Clone + Send + Sync + 'static;

    /// Establish an inert subscription. Delivery begins once the returned
    /// handle starts monitoring.
    fn subscribe_param(
        &self,
        names: &ParamNames,
        on_value: ValueCallback<Self::Value>,
        on_exception: ExceptionCallback,
        options: &SubscribeOptions,
    ) -> Result<Box<dyn SubscriptionHandle>>;

    /// Start monitoring every handle created by this client.
    fn start_subscriptions(&self);

    /// Stop monitoring every handle created by this client.
    fn stop_subscriptions(&self);
}

/// Controls delivery of one subscription.
///
/// Starting a handle that is already monitoring is a contract violation of
/// the client, not something callers may rely on.
pub trait SubscriptionHandle: Send + Sync {
    fn start_monitoring(&self);

    /// Halt delivery. Once this returns, no callback is in flight.
    fn stop_monitoring(&self);

    fn is_monitoring(&self) -> bool;
}

impl<H: SubscriptionHandle + ?Sized> SubscriptionHandle for Box<H> {
    fn start_monitoring(&self) {
        (**self).start_monitoring()
    }

    fn stop_monitoring(&self) {
        (**self).stop_monitoring()
    }

    fn is_monitoring(&self) -> bool {
        (**self).is_monitoring()
    }
}
