//! An offline subscription client that replays scripted values.
//!
//! Every handle created by a [`ReplayClient`] owns a delivery thread while it
//! is monitoring. The thread waits one time step, delivers the next scripted
//! value, and repeats until the script runs out, a fault has been delivered,
//! or monitoring stops. Restarting monitoring restarts the script.
//!
//! # Example
//!
//! ```ignore
//! let client = ReplayClient::new(vec![Scripted::Value(1.0), Scripted::Value(2.0)]);
//! let stream = subscribe_param(&client, "dev/prop#field", StreamConfig::default())?;
//! let active = stream.monitor();
//! let (first, header) = active.pop_or_wait(None)?.unwrap();
//! assert!(header.is_first_update);
//! ```

use crate::error::{Result, StreamError};
use crate::streams::{
    ExceptionCallback, SubscribeOptions, SubscriptionClient, SubscriptionHandle, ValueCallback,
};
use crate::types::{FaultSource, Header, ParamNames, Timestamp};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Pause before each scripted delivery.
pub const DEFAULT_TIME_STEP: Duration = Duration::from_millis(10);

/// One entry of a replay script.
#[derive(Clone, Debug)]
pub enum Scripted<V> {
    Value(V),
    /// Reported through the exception callback. Ends the replay.
    Fault(FaultSource),
}

impl<V> Scripted<V> {
    pub fn fault<E: Error + Send + Sync + 'static>(error: E) -> Self {
        Scripted::Fault(Arc::new(error))
    }
}

/// A script compiled for one subscription.
#[derive(Clone, Debug)]
enum Step<V> {
    Values(Vec<V>),
    Fault(FaultSource),
}

enum Script<V> {
    /// Every parameter replays the same values.
    Shared(Vec<Scripted<V>>),
    PerParameter(HashMap<String, Vec<Scripted<V>>>),
}

/// A [`SubscriptionClient`] that replays scripts instead of talking to
/// devices.
///
/// The client only tracks its handles weakly. Once the stream owning a
/// handle is dropped, the handle disappears from [`handles`](Self::handles)
/// and is no longer started by `start_subscriptions`.
pub struct ReplayClient<V> {
    script: Script<V>,
    time_step: Duration,
    handles: Mutex<Vec<Weak<HandleInner<V>>>>,
}

impl<V: Clone + Send + Sync + 'static> ReplayClient<V> {
    /// Replay `script` on every subscribed parameter.
    pub fn new(script: Vec<Scripted<V>>) -> Self {
        Self::with_script(Script::Shared(script))
    }

    /// Replay a separate script per parameter name. Subscribing to a name
    /// without a script fails.
    pub fn per_parameter<K, I>(scripts: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Vec<Scripted<V>>)>,
    {
        let scripts = scripts.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::with_script(Script::PerParameter(scripts))
    }

    fn with_script(script: Script<V>) -> Self {
        Self {
            script,
            time_step: DEFAULT_TIME_STEP,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn with_time_step(mut self, time_step: Duration) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn time_step(&self) -> Duration {
        self.time_step
    }

    /// All live handles, oldest first. Forgets handles that were dropped.
    pub fn handles(&self) -> Vec<ReplayHandle<V>> {
        let mut handles = self.handles.lock();
        handles.retain(|inner| inner.strong_count() > 0);
        handles
            .iter()
            .filter_map(Weak::upgrade)
            .map(|inner| ReplayHandle { inner })
            .collect()
    }

    pub fn last_handle(&self) -> Option<ReplayHandle<V>> {
        self.handles().pop()
    }

    fn script_for(&self, name: &str) -> Result<&[Scripted<V>]> {
        match &self.script {
            Script::Shared(script) => Ok(script),
            Script::PerParameter(scripts) => scripts
                .get(name)
                .map(Vec::as_slice)
                .ok_or_else(|| StreamError::Subscribe(format!("no script for parameter {}", name))),
        }
    }

    fn compile(&self, names: &ParamNames) -> Result<Vec<Step<V>>> {
        let scripts = names
            .names()
            .into_iter()
            .map(|name| self.script_for(name))
            .collect::<Result<Vec<_>>>()?;
        // Groups advance in lockstep and stop with the shortest script.
        let len = scripts.iter().map(|s| s.len()).min().unwrap_or(0);

        let steps = (0..len)
            .map(|i| {
                let mut values = Vec::with_capacity(scripts.len());
                for script in &scripts {
                    match &script[i] {
                        Scripted::Value(value) => values.push(value.clone()),
                        Scripted::Fault(error) => return Step::Fault(Arc::clone(error)),
                    }
                }
                Step::Values(values)
            })
            .collect();
        Ok(steps)
    }
}

impl<V: Clone + Send + Sync + 'static> SubscriptionClient for ReplayClient<V> {
    type Value = V;

    fn subscribe_param(
        &self,
        names: &ParamNames,
        on_value: ValueCallback<V>,
        on_exception: ExceptionCallback,
        options: &SubscribeOptions,
    ) -> Result<Box<dyn SubscriptionHandle>> {
        let steps = self.compile(names)?;
        debug!(%names, steps = steps.len(), "subscribed");
        let handle = ReplayHandle {
            inner: Arc::new(HandleInner {
                names: names.clone(),
                options: options.clone(),
                steps,
                time_step: self.time_step,
                on_value,
                on_exception,
                worker: Mutex::new(None),
            }),
        };
        self.handles.lock().push(Arc::downgrade(&handle.inner));
        Ok(Box::new(handle))
    }

    fn start_subscriptions(&self) {
        for handle in self.handles() {
            if !handle.is_monitoring() {
                handle.start_monitoring();
            }
        }
    }

    fn stop_subscriptions(&self) {
        for handle in self.handles() {
            if handle.is_monitoring() {
                handle.stop_monitoring();
            }
        }
    }
}

impl<V> fmt::Debug for ReplayClient<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayClient")
            .field("time_step", &self.time_step)
            .field(
                "handles",
                &self.handles.lock().iter().filter(|h| h.strong_count() > 0).count(),
            )
            .finish()
    }
}

struct Worker {
    stop: Sender<()>,
    /// Disconnects when the thread exits.
    done: Receiver<()>,
    thread: JoinHandle<()>,
}

struct HandleInner<V> {
    names: ParamNames,
    options: SubscribeOptions,
    steps: Vec<Step<V>>,
    time_step: Duration,
    on_value: ValueCallback<V>,
    on_exception: ExceptionCallback,
    worker: Mutex<Option<Worker>>,
}

impl<V: Clone> HandleInner<V> {
    fn headers(&self, first: bool) -> Vec<Header> {
        let stamp = Timestamp::now();
        let selector = self.options.timing_selector_override.clone().unwrap_or_default();
        (0..self.names.len())
            .map(|_| Header {
                is_first_update: first,
                ..Header::at(stamp, selector.clone())
            })
            .collect()
    }

    fn replay(&self, stop: &Receiver<()>) {
        debug!(names = %self.names, steps = self.steps.len(), "replay started");
        for (index, step) in self.steps.iter().enumerate() {
            match stop.recv_timeout(self.time_step) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    debug!(names = %self.names, index, "replay stopped");
                    return;
                }
            }
            match step {
                Step::Values(values) => {
                    trace!(names = %self.names, index, "delivering");
                    (self.on_value)(&self.names, values.clone(), self.headers(index == 0));
                }
                Step::Fault(error) => {
                    (self.on_exception)(&self.names, &error.to_string(), Arc::clone(error));
                    debug!(names = %self.names, index, "replay ended by fault");
                    return;
                }
            }
        }
        debug!(names = %self.names, "replay finished");
    }
}

/// Handle returned by [`ReplayClient`]. Clones control the same
/// subscription.
pub struct ReplayHandle<V> {
    inner: Arc<HandleInner<V>>,
}

impl<V> Clone for ReplayHandle<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> ReplayHandle<V> {
    pub fn names(&self) -> &ParamNames {
        &self.inner.names
    }

    /// The options this handle was subscribed with.
    pub fn options(&self) -> &SubscribeOptions {
        &self.inner.options
    }

    /// Block until the delivery thread has run out of script. Returns at
    /// once if not monitoring. Monitoring stays on.
    pub fn wait_delivered(&self) {
        let done = self.inner.worker.lock().as_ref().map(|w| w.done.clone());
        if let Some(done) = done {
            // Only ever disconnects.
            let _ = done.recv();
        }
    }

    /// Deliver `entry` right now, on the calling thread, to every parameter
    /// of the subscription. Ignored (returns false) unless monitoring.
    ///
    /// Must not be called while holding the stream's lock.
    pub fn emit(&self, entry: Scripted<V>) -> bool {
        match entry {
            Scripted::Value(value) => {
                let values = vec![value; self.inner.names.len()];
                self.emit_group(values)
            }
            Scripted::Fault(error) => {
                if !self.is_monitoring() {
                    return false;
                }
                (self.inner.on_exception)(&self.inner.names, &error.to_string(), error);
                true
            }
        }
    }

    /// Deliver one value per parameter right now. Ignored (returns false)
    /// unless monitoring.
    pub fn emit_group(&self, values: Vec<V>) -> bool {
        if !self.is_monitoring() {
            return false;
        }
        let headers = self.inner.headers(false);
        (self.inner.on_value)(&self.inner.names, values, headers);
        true
    }
}

impl<V: Clone + Send + Sync + 'static> SubscriptionHandle for ReplayHandle<V> {
    fn start_monitoring(&self) {
        let mut worker = self.inner.worker.lock();
        if worker.is_some() {
            warn!(names = %self.inner.names, "already monitoring");
            return;
        }

        let (stop_tx, stop_rx) = bounded(1);
        let (done_tx, done_rx) = bounded::<()>(0);
        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name(format!("replay {}", self.inner.names))
            .spawn(move || {
                let _done = done_tx;
                inner.replay(&stop_rx);
            });

        match spawned {
            Ok(thread) => {
                *worker = Some(Worker {
                    stop: stop_tx,
                    done: done_rx,
                    thread,
                })
            }
            Err(e) => warn!(names = %self.inner.names, error = %e, "failed to spawn replay thread"),
        }
    }

    fn stop_monitoring(&self) {
        // Release the worker lock before joining; the delivery thread may be
        // blocked on a consumer that is asking `is_monitoring()`.
        let worker = self.inner.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.stop.send(());
            if worker.thread.join().is_err() {
                warn!(names = %self.inner.names, "replay thread panicked");
            }
        }
    }

    fn is_monitoring(&self) -> bool {
        self.inner.worker.lock().is_some()
    }
}

impl<V> fmt::Debug for ReplayHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayHandle")
            .field("names", &self.inner.names)
            .field("steps", &self.inner.steps.len())
            .field("monitoring", &self.inner.worker.lock().is_some())
            .finish()
    }
}
