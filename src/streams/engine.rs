//! Synchronization shared by both stream variants.
//!
//! The delivery callback and every consumer meet on one [`WaitHandle`]. If
//! the stream has a cancellation token, that handle *is* the token's handle,
//! so a sleeping consumer wakes up for new data and for cancellation alike.
//! The queue sits behind its own mutex for interior mutability, but it is
//! only ever touched while the wait handle is held.

use super::client::SubscriptionHandle;
use super::queue::{Event, EventQueue};
use crate::cancellation::{Token, WaitGuard, WaitHandle};
use crate::error::{Result, StreamError};
use crate::types::{FaultSource, ParamNames, SubscriptionFault};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Token plus the wait handle derived from it. Replaced as a unit.
#[derive(Clone)]
struct Binding {
    token: Option<Token>,
    gate: Arc<WaitHandle>,
}

impl Binding {
    fn new(token: Option<Token>) -> Self {
        let gate = match &token {
            Some(token) => Arc::clone(token.wait_handle()),
            None => Arc::new(WaitHandle::new()),
        };
        Self { token, gate }
    }
}

/// The part of a stream that the delivery callbacks hold on to.
pub(crate) struct Shared<T> {
    binding: RwLock<Binding>,
    queue: Mutex<EventQueue<T>>,
}

impl<T> Shared<T> {
    pub(crate) fn new(maxlen: Option<usize>, token: Option<Token>) -> Self {
        Self {
            binding: RwLock::new(Binding::new(token)),
            queue: Mutex::new(EventQueue::new(maxlen)),
        }
    }

    /// Enqueue an event and wake every waiter.
    pub(crate) fn push(&self, event: Event<T>) {
        let binding = self.binding.read();
        let _guard = binding.gate.lock();
        let is_fault = event.is_err();
        let mut queue = self.queue.lock();
        if queue.push(event).is_some() {
            trace!(maxlen = ?queue.maxlen(), "queue full, dropped oldest event");
        }
        trace!(len = queue.len(), is_fault, "event enqueued");
        drop(queue);
        // Waiters on the token alone share this handle, so waking a single
        // thread could wake the wrong one.
        binding.gate.notify_all();
    }

    /// Enqueue a fault reported by the client.
    pub(crate) fn push_fault(&self, names: &ParamNames, description: &str, source: FaultSource) {
        warn!(%names, description, "subscription reported a fault");
        self.push(Err(SubscriptionFault::new(
            names.clone(),
            description,
            source,
        )));
    }
}

/// Queue, wait handle and subscription handle of one stream.
///
/// `T` is the item shape: `(V, Header)` for single parameters,
/// `Vec<(V, Header)>` for groups.
pub struct StreamCore<T> {
    names: ParamNames,
    shared: Arc<Shared<T>>,
    handle: Box<dyn SubscriptionHandle>,
}

impl<T> StreamCore<T> {
    pub(crate) fn new(
        names: ParamNames,
        shared: Arc<Shared<T>>,
        handle: Box<dyn SubscriptionHandle>,
    ) -> Self {
        Self {
            names,
            shared,
            handle,
        }
    }

    pub fn names(&self) -> &ParamNames {
        &self.names
    }

    pub fn is_monitoring(&self) -> bool {
        self.handle.is_monitoring()
    }

    pub fn start_monitoring(&self) {
        debug!(names = %self.names, "start monitoring");
        self.handle.start_monitoring();
    }

    pub fn stop_monitoring(&self) {
        debug!(names = %self.names, "stop monitoring");
        self.handle.stop_monitoring();
    }

    pub fn maxlen(&self) -> Option<usize> {
        self.shared.queue.lock().maxlen()
    }

    pub fn token(&self) -> Option<Token> {
        self.shared.binding.read().token.clone()
    }

    /// Replace the cancellation token, and with it the wait handle.
    ///
    /// Refused while monitoring: a consumer could otherwise sleep on the old
    /// handle while deliveries notify the new one.
    pub fn set_token(&self, token: Option<Token>) -> Result<()> {
        if self.is_monitoring() {
            return Err(StreamError::TokenChangeWhileMonitoring);
        }
        debug!(names = %self.names, has_token = token.is_some(), "rebinding cancellation token");
        *self.shared.binding.write() = Binding::new(token);
        Ok(())
    }
}

impl<T: Clone> StreamCore<T> {
    /// Run `f` while holding the stream's lock.
    ///
    /// No delivery can enqueue anything until `f` returns, except while `f`
    /// blocks in [`Locked::pop_or_wait`] or [`Locked::wait_for_next`], which
    /// release the lock while sleeping. Keep `f` short; a delivery thread
    /// stuck on the lock loses data once the client buffers overflow.
    ///
    /// The lock is not reentrant. Inside `f`, go through the [`Locked`]
    /// argument only: calling any method on the stream itself (`is_ready`,
    /// `clear`, `locked`, ...) deadlocks the calling thread. Likewise, do not
    /// stop monitoring or cancel the stream's token from inside `f`.
    pub fn locked<R>(&self, f: impl FnOnce(&mut Locked<'_, T>) -> R) -> R {
        let binding = self.shared.binding.read().clone();
        let guard = binding.gate.lock();
        let mut locked = Locked {
            queue: &self.shared.queue,
            handle: self.handle.as_ref(),
            token: binding.token.as_ref(),
            gate: &binding.gate,
            guard,
        };
        f(&mut locked)
    }

    pub fn is_ready(&self) -> bool {
        self.locked(|s| s.is_ready())
    }

    pub fn len(&self) -> usize {
        self.locked(|s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        !self.is_ready()
    }

    pub fn clear(&self) {
        self.locked(|s| s.clear())
    }

    pub fn oldest(&self) -> Result<T> {
        self.locked(|s| s.oldest())
    }

    pub fn newest(&self) -> Result<T> {
        self.locked(|s| s.newest())
    }

    pub fn pop_if_ready(&self) -> Result<Option<T>> {
        self.locked(|s| s.pop_if_ready())
    }

    pub fn pop_or_wait(&self, timeout: Option<Duration>) -> Result<Option<T>> {
        // Fail before touching the gate.
        if timeout.is_none() && !self.is_monitoring() && self.shared.queue.lock().is_empty() {
            return Err(StreamError::WouldDeadlock);
        }
        self.locked(|s| s.pop_or_wait(timeout))
    }

    pub fn wait_for_next(&self, timeout: Option<Duration>) -> Result<Option<T>> {
        self.locked(|s| s.wait_for_next(timeout))
    }
}

impl<T> Drop for StreamCore<T> {
    fn drop(&mut self) {
        if self.handle.is_monitoring() {
            debug!(names = %self.names, "stream dropped while monitoring");
            self.handle.stop_monitoring();
        }
    }
}

impl<T> fmt::Debug for StreamCore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCore")
            .field("names", &self.names)
            .field("token", &self.shared.binding.read().token)
            .field("maxlen", &self.shared.queue.lock().maxlen())
            .finish()
    }
}

/// A stream whose lock is held by the current thread.
///
/// Obtained through `locked()` on a stream. Lets callers check the queue and
/// act on it without a delivery sneaking in between.
pub struct Locked<'a, T> {
    queue: &'a Mutex<EventQueue<T>>,
    handle: &'a dyn SubscriptionHandle,
    token: Option<&'a Token>,
    gate: &'a WaitHandle,
    guard: WaitGuard<'a>,
}

impl<'a, T: Clone> Locked<'a, T> {
    pub fn is_ready(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.is_ready()
    }

    pub fn clear(&mut self) {
        self.queue.lock().clear();
    }

    /// The oldest item, without removing it.
    pub fn oldest(&self) -> Result<T> {
        let queue = self.queue.lock();
        let event = queue.oldest().ok_or(StreamError::Empty)?;
        Ok(event.clone()?)
    }

    /// The most recent item, without removing it.
    pub fn newest(&self) -> Result<T> {
        let queue = self.queue.lock();
        let event = queue.newest().ok_or(StreamError::Empty)?;
        Ok(event.clone()?)
    }

    /// Remove and return the oldest item, or `None` if there is none. Never
    /// checks for cancellation.
    pub fn pop_if_ready(&mut self) -> Result<Option<T>> {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            return Ok(None);
        }
        let event = queue.pop_oldest()?;
        Ok(Some(event?))
    }

    /// Remove and return the oldest item, waiting for one if necessary.
    ///
    /// Returns `None` only if `timeout` elapses first. Checks the token on
    /// entry and after every wakeup, so a pending cancellation wins over
    /// queued data.
    pub fn pop_or_wait(&mut self, timeout: Option<Duration>) -> Result<Option<T>> {
        if timeout.is_none() && self.is_empty() && !self.handle.is_monitoring() {
            return Err(StreamError::WouldDeadlock);
        }
        self.check_cancelled()?;
        // A timeout too large to represent waits without a deadline.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        while self.is_empty() {
            // Woken by new data, by cancellation, or by the deadline.
            let timed_out = match deadline {
                Some(deadline) => self.gate.wait_until(&mut self.guard, deadline),
                None => {
                    self.gate.wait(&mut self.guard);
                    false
                }
            };
            self.check_cancelled()?;
            if timed_out && self.is_empty() {
                return Ok(None);
            }
        }
        self.pop_if_ready()
    }

    /// Discard everything queued and wait for a fresh item.
    ///
    /// The queue is empty afterwards in any case.
    pub fn wait_for_next(&mut self, timeout: Option<Duration>) -> Result<Option<T>> {
        self.clear();
        self.pop_or_wait(timeout)
    }

    fn check_cancelled(&self) -> Result<()> {
        if let Some(token) = self.token {
            token.raise_if_cancellation_requested()?;
        }
        Ok(())
    }
}
