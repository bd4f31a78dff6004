//! Cancellation tokens and their sources.

use super::wait::WaitHandle;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Raised at a checkpoint after cancellation has been requested.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct CancelledError;

struct TokenState {
    cancelled: AtomicBool,
    wait_handle: Arc<WaitHandle>,
}

/// Read side of a cancellation request. Cheap to clone; all clones observe
/// the same state.
#[derive(Clone)]
pub struct Token {
    state: Arc<TokenState>,
}

impl Token {
    /// A token that can never be cancelled (it has no source).
    pub fn new() -> Self {
        Self::with_state(false)
    }

    /// A token that is already cancelled.
    pub fn cancelled() -> Self {
        Self::with_state(true)
    }

    fn with_state(cancelled: bool) -> Self {
        Self {
            state: Arc::new(TokenState {
                cancelled: AtomicBool::new(cancelled),
                wait_handle: Arc::new(WaitHandle::new()),
            }),
        }
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Checkpoint: fail if cancellation has been requested.
    pub fn raise_if_cancellation_requested(&self) -> Result<(), CancelledError> {
        if self.is_cancellation_requested() {
            Err(CancelledError)
        } else {
            Ok(())
        }
    }

    /// The handle that [`TokenSource::cancel`] notifies.
    pub fn wait_handle(&self) -> &Arc<WaitHandle> {
        &self.state.wait_handle
    }

    /// True if both tokens observe the same cancellation state.
    pub fn ptr_eq(&self, other: &Token) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("cancelled", &self.is_cancellation_requested())
            .finish()
    }
}

/// Write side of a cancellation request.
#[derive(Debug, Default)]
pub struct TokenSource {
    token: Token,
}

impl TokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Token {
        self.token.clone()
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.token.is_cancellation_requested()
    }

    /// Request cancellation and wake everyone waiting on the token's handle.
    ///
    /// Idempotent. Must not be called while the current thread holds the
    /// token's wait handle.
    pub fn cancel(&self) {
        let handle = self.token.wait_handle();
        let _guard = handle.lock();
        if !self.token.state.cancelled.swap(true, Ordering::SeqCst) {
            debug!("cancellation requested");
        }
        handle.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_fresh_token_is_not_cancelled() {
        let token = Token::new();
        assert!(!token.is_cancellation_requested());
        assert!(token.raise_if_cancellation_requested().is_ok());
    }

    #[test]
    fn test_cancelled_token_raises() {
        let token = Token::cancelled();
        assert_eq!(token.raise_if_cancellation_requested(), Err(CancelledError));
    }

    #[test]
    fn test_cancel_is_sticky_and_shared() {
        let source = TokenSource::new();
        let token = source.token();
        assert!(token.ptr_eq(&source.token()));

        source.cancel();
        source.cancel();

        assert!(token.is_cancellation_requested());
        assert!(source.is_cancellation_requested());
        assert!(token.raise_if_cancellation_requested().is_err());
        assert!(token.raise_if_cancellation_requested().is_err());
    }

    #[test]
    fn test_cancel_wakes_waiter() {
        let source = TokenSource::new();
        let token = source.token();

        let waiter = thread::spawn(move || {
            let handle = Arc::clone(token.wait_handle());
            let mut guard = handle.lock();
            let deadline = Instant::now() + Duration::from_secs(5);
            while !token.is_cancellation_requested() {
                if handle.wait_until(&mut guard, deadline) {
                    return false;
                }
            }
            true
        });

        thread::sleep(Duration::from_millis(20));
        source.cancel();
        assert!(waiter.join().unwrap());
    }
}
