//! The wait primitive shared between tokens and streams.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::time::Instant;

/// Proof that the caller holds a [`WaitHandle`]'s lock.
pub type WaitGuard<'a> = MutexGuard<'a, ()>;

/// A mutex paired with a condition variable.
///
/// The mutex protects no data of its own. Users keep their state behind
/// other locks and only mutate it while holding this one, so that no wakeup
/// is lost between checking a predicate and going to sleep.
#[derive(Default)]
pub struct WaitHandle {
    lock: Mutex<()>,
    condvar: Condvar,
}

impl WaitHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> WaitGuard<'_> {
        self.lock.lock()
    }

    /// Release the lock, sleep until notified, reacquire.
    pub fn wait(&self, guard: &mut WaitGuard<'_>) {
        self.condvar.wait(guard);
    }

    /// Like [`wait`](Self::wait), but give up at `deadline`.
    ///
    /// Returns true if the deadline passed without a notification.
    pub fn wait_until(&self, guard: &mut WaitGuard<'_>, deadline: Instant) -> bool {
        self.condvar.wait_until(guard, deadline).timed_out()
    }

    /// Wake every waiter. Each must re-check its own predicate.
    pub fn notify_all(&self) -> usize {
        self.condvar.notify_all()
    }
}

impl fmt::Debug for WaitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitHandle")
            .field("locked", &self.lock.is_locked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_until_times_out() {
        let handle = WaitHandle::new();
        let mut guard = handle.lock();
        let start = Instant::now();
        assert!(handle.wait_until(&mut guard, start + Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_notify_all_wakes_every_waiter() {
        let handle = Arc::new(WaitHandle::new());
        let flag = Arc::new(AtomicBool::new(false));

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let handle = Arc::clone(&handle);
                let flag = Arc::clone(&flag);
                thread::spawn(move || {
                    let mut guard = handle.lock();
                    while !flag.load(Ordering::SeqCst) {
                        handle.wait(&mut guard);
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        {
            let _guard = handle.lock();
            flag.store(true, Ordering::SeqCst);
            handle.notify_all();
        }

        for waiter in waiters {
            waiter.join().unwrap();
        }
    }
}
