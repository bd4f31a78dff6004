//! Creating streams.

use super::client::{SubscribeOptions, SubscriptionClient};
use super::stream::{ParamGroupStream, ParamStream};
use crate::cancellation::Token;
use crate::error::{Result, StreamError};
use crate::types::{DataFilter, ParamNames};

/// Stream configuration.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Token to watch while waiting. Cancelling it interrupts
    /// `pop_or_wait()` and `wait_for_next()`.
    pub token: Option<Token>,

    /// Maximum queue length; older items are dropped to make room.
    /// `None` means unbounded, so the queue grows unless drained.
    /// Default: 1 (keep only the most recent item)
    pub maxlen: Option<usize>,

    /// Ask the client for converted values rather than raw objects.
    /// Default: true
    pub convert_values: bool,

    /// Timing selector to use instead of the client's default.
    pub selector: Option<String>,

    /// Data filter to use instead of the client's default.
    pub data_filter: Option<DataFilter>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            token: None,
            maxlen: Some(1),
            convert_values: true,
            selector: None,
            data_filter: None,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.maxlen == Some(0) {
            return Err(StreamError::InvalidConfig(
                "maxlen must be at least 1 (use None for an unbounded queue)".to_string(),
            ));
        }
        Ok(())
    }

    /// Translate into the options passed to the client.
    pub fn subscribe_options(&self) -> SubscribeOptions {
        SubscribeOptions {
            get_header: true,
            no_conversion: !self.convert_values,
            timing_selector_override: self.selector.clone(),
            data_filter_override: self.data_filter.clone(),
        }
    }
}

/// Either kind of stream, as returned by [`subscribe_stream`].
#[derive(Debug)]
pub enum Subscribed<V> {
    Param(ParamStream<V>),
    Group(ParamGroupStream<V>),
}

impl<V> Subscribed<V> {
    pub fn into_param(self) -> Option<ParamStream<V>> {
        match self {
            Subscribed::Param(stream) => Some(stream),
            Subscribed::Group(_) => None,
        }
    }

    pub fn into_group(self) -> Option<ParamGroupStream<V>> {
        match self {
            Subscribed::Param(_) => None,
            Subscribed::Group(stream) => Some(stream),
        }
    }
}

/// Subscribe to one parameter or a parameter group and wrap the subscription
/// in a stream.
///
/// A single name yields a [`ParamStream`], a list of names a
/// [`ParamGroupStream`]. The subscription starts inert; start monitoring on
/// the stream to receive values.
///
/// Streams only synchronize threads. No timestamps are inspected; check the
/// [`Header`](crate::Header) if timing matters.
///
/// ```ignore
/// let stream = subscribe_stream(&client, "dev/prop#field", StreamConfig::default())?
///     .into_param()
///     .unwrap();
/// let active = stream.monitor();
/// let values: Vec<_> = (0..10)
///     .map(|_| active.pop_or_wait(None))
///     .collect::<Result<_>>()?;
/// ```
pub fn subscribe_stream<C>(
    client: &C,
    names: impl Into<ParamNames>,
    config: StreamConfig,
) -> Result<Subscribed<C::Value>>
where
    C: SubscriptionClient + ?Sized,
{
    match names.into() {
        ParamNames::Single(name) => ParamStream::subscribe(client, name, &config).map(Subscribed::Param),
        ParamNames::Group(names) => {
            ParamGroupStream::subscribe(client, names, &config).map(Subscribed::Group)
        }
    }
}

/// Subscribe to a single parameter.
pub fn subscribe_param<C>(
    client: &C,
    name: impl Into<String>,
    config: StreamConfig,
) -> Result<ParamStream<C::Value>>
where
    C: SubscriptionClient + ?Sized,
{
    ParamStream::subscribe(client, name.into(), &config)
}

/// Subscribe to a parameter group.
pub fn subscribe_group<C, I>(client: &C, names: I, config: StreamConfig) -> Result<ParamGroupStream<C::Value>>
where
    C: SubscriptionClient + ?Sized,
    I: IntoIterator,
    I::Item: Into<String>,
{
    let names = names.into_iter().map(Into::into).collect();
    ParamGroupStream::subscribe(client, names, &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.maxlen, Some(1));
        assert!(config.convert_values);
        assert!(config.token.is_none());
        assert!(config.validate().is_ok());
        assert_eq!(config.subscribe_options(), SubscribeOptions::default());
    }

    #[test]
    fn test_zero_maxlen_rejected() {
        let config = StreamConfig {
            maxlen: Some(0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(StreamError::InvalidConfig(_))));
    }

    #[test]
    fn test_options_translation() {
        let mut filter = DataFilter::new();
        filter.insert("averaging".to_string(), json!(4));
        let config = StreamConfig {
            convert_values: false,
            selector: Some("LHC.USER.ALL".to_string()),
            data_filter: Some(filter.clone()),
            ..Default::default()
        };

        let options = config.subscribe_options();
        assert!(options.get_header);
        assert!(options.no_conversion);
        assert_eq!(options.timing_selector_override.as_deref(), Some("LHC.USER.ALL"));
        assert_eq!(options.data_filter_override, Some(filter));

        let wire = serde_json::to_value(&options).unwrap();
        assert_eq!(wire["getHeader"], json!(true));
        assert_eq!(wire["noConversion"], json!(true));
        assert_eq!(wire["timingSelectorOverride"], json!("LHC.USER.ALL"));
        assert_eq!(wire["dataFilterOverride"]["averaging"], json!(4));
    }
}
