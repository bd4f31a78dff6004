//! Error types for parameter streams.

use crate::cancellation::CancelledError;
use crate::types::SubscriptionFault;
use thiserror::Error;

/// Main error type for stream operations.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The queue is empty, the stream is not monitoring and no timeout was
    /// given. Waiting would never return.
    #[error("would deadlock: stream is not monitoring and its queue is empty")]
    WouldDeadlock,

    #[error("cannot change cancellation token while monitoring")]
    TokenChangeWhileMonitoring,

    #[error("queue is empty")]
    Empty,

    #[error("Invalid stream configuration: {0}")]
    InvalidConfig(String),

    #[error("Subscription failed: {0}")]
    Subscribe(String),

    #[error(transparent)]
    Cancelled(#[from] CancelledError),

    /// A fault reported by the subscription client, re-raised as delivered.
    #[error(transparent)]
    Fault(#[from] SubscriptionFault),
}

impl StreamError {
    /// True if this error stems from a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamError::Cancelled(_))
    }

    /// The subscription fault carried by this error, if any.
    pub fn as_fault(&self) -> Option<&SubscriptionFault> {
        match self {
            StreamError::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
