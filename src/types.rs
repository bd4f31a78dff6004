//! Core types shared by streams and subscription clients.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Nanoseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time. Clocks set before the epoch yield `Timestamp(0)`.
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);
        Timestamp(nanos)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Metadata delivered alongside every value.
///
/// Serializes under the keys the subscription client uses natively
/// (`acqStamp`, `cycleStamp`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// When the value was acquired.
    pub acq_stamp: Timestamp,
    /// Start of the cycle the value belongs to.
    pub cycle_stamp: Timestamp,
    /// When the setting that produced the value was sent.
    pub set_stamp: Timestamp,
    /// Timing selector, empty if the subscription is not multiplexed.
    pub selector: String,
    pub is_first_update: bool,
    pub is_immediate_update: bool,
}

impl Header {
    /// A header with all stamps set to `stamp` and both update flags cleared.
    pub fn at(stamp: Timestamp, selector: impl Into<String>) -> Self {
        Self {
            acq_stamp: stamp,
            cycle_stamp: stamp,
            set_stamp: stamp,
            selector: selector.into(),
            is_first_update: false,
            is_immediate_update: false,
        }
    }
}

/// Name of one parameter, or the names of a parameter group.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamNames {
    Single(String),
    Group(Vec<String>),
}

impl ParamNames {
    /// Number of values each delivery carries.
    pub fn len(&self) -> usize {
        match self {
            ParamNames::Single(_) => 1,
            ParamNames::Group(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_group(&self) -> bool {
        matches!(self, ParamNames::Group(_))
    }

    /// All names, in delivery order.
    pub fn names(&self) -> Vec<&str> {
        match self {
            ParamNames::Single(name) => vec![name.as_str()],
            ParamNames::Group(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for ParamNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamNames::Single(name) => write!(f, "{}", name),
            ParamNames::Group(names) => write!(f, "[{}]", names.join(", ")),
        }
    }
}

impl From<&str> for ParamNames {
    fn from(name: &str) -> Self {
        ParamNames::Single(name.to_string())
    }
}

impl From<String> for ParamNames {
    fn from(name: String) -> Self {
        ParamNames::Single(name)
    }
}

impl From<Vec<String>> for ParamNames {
    fn from(names: Vec<String>) -> Self {
        ParamNames::Group(names)
    }
}

impl From<Vec<&str>> for ParamNames {
    fn from(names: Vec<&str>) -> Self {
        ParamNames::Group(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for ParamNames {
    fn from(names: &[&str]) -> Self {
        ParamNames::Group(names.iter().map(|n| n.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ParamNames {
    fn from(names: [&str; N]) -> Self {
        ParamNames::Group(names.iter().map(|n| n.to_string()).collect())
    }
}

/// Server-side data filter, forwarded to the client untouched.
pub type DataFilter = BTreeMap<String, serde_json::Value>;

/// An error raised by the subscription client, shared between the queue slot
/// that holds it and every consumer that peeks at it.
pub type FaultSource = Arc<dyn Error + Send + Sync + 'static>;

/// A fault reported through the subscription's exception callback.
///
/// The original error is preserved and can be recovered with
/// [`SubscriptionFault::downcast_ref`].
#[derive(Clone, Debug, Error)]
#[error("subscription to {names} failed: {description}")]
pub struct SubscriptionFault {
    names: ParamNames,
    description: String,
    #[source]
    source: FaultSource,
}

impl SubscriptionFault {
    pub fn new(names: ParamNames, description: impl Into<String>, source: FaultSource) -> Self {
        Self {
            names,
            description: description.into(),
            source,
        }
    }

    pub fn names(&self) -> &ParamNames {
        &self.names
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The error as raised by the client.
    pub fn inner(&self) -> &FaultSource {
        &self.source
    }

    /// Recover the concrete error type raised by the client.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref::<E>()
    }
}

/// A delivery whose shape did not match the subscription.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("malformed delivery: expected {expected} value(s), got {values} value(s) and {headers} header(s)")]
pub struct MalformedDelivery {
    pub expected: usize,
    pub values: usize,
    pub headers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_uses_client_keys() {
        let header: Header = serde_json::from_value(json!({
            "acqStamp": 10,
            "cycleStamp": 5,
            "setStamp": 1,
            "selector": "SPS.USER.ALL",
            "isFirstUpdate": true,
            "isImmediateUpdate": false,
        }))
        .unwrap();

        assert_eq!(header.acq_stamp, Timestamp(10));
        assert_eq!(header.cycle_stamp, Timestamp(5));
        assert_eq!(header.set_stamp, Timestamp(1));
        assert_eq!(header.selector, "SPS.USER.ALL");
        assert!(header.is_first_update);
        assert!(!header.is_immediate_update);

        let back = serde_json::to_value(&header).unwrap();
        assert_eq!(back["acqStamp"], json!(10));
        assert_eq!(back["isImmediateUpdate"], json!(false));
    }

    #[test]
    fn test_param_names_shapes() {
        let single = ParamNames::from("dev/prop#field");
        assert_eq!(single.len(), 1);
        assert!(!single.is_group());
        assert_eq!(single.to_string(), "dev/prop#field");

        let group = ParamNames::from(["a", "b"]);
        assert_eq!(group.len(), 2);
        assert!(group.is_group());
        assert_eq!(group.names(), vec!["a", "b"]);
        assert_eq!(group.to_string(), "[a, b]");

        // A group of one is still a group.
        assert!(ParamNames::from(vec!["only"]).is_group());
    }

    #[derive(Debug, Error)]
    #[error("device offline")]
    struct DeviceOffline;

    #[test]
    fn test_fault_preserves_source_type() {
        let fault = SubscriptionFault::new("dev".into(), "no answer", Arc::new(DeviceOffline));

        assert!(fault.downcast_ref::<DeviceOffline>().is_some());
        assert!(fault.downcast_ref::<MalformedDelivery>().is_none());
        assert_eq!(fault.description(), "no answer");
        assert_eq!(fault.to_string(), "subscription to dev failed: no answer");
        let source = std::error::Error::source(&fault).unwrap();
        assert_eq!(source.to_string(), "device offline");
    }
}
