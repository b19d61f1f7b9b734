//! KeepAliveTimer - Restartable periodic callback that pads idle streams.
//!
//! The timer runs as one background task looping over `sleep`, with a watch
//! channel as its cancellation flag. Stopping flips the flag: a callback that
//! is already running finishes, but the loop schedules nothing after it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Callback invoked once per elapsed interval.
pub type KeepAliveCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Observable timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Not running and nothing in flight.
    Idle,
    /// Scheduling callbacks.
    Running,
    /// Stop requested while a callback is still finishing.
    Stopping,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeepAliveError {
    #[error("Keep-alive timer is already running")]
    AlreadyRunning,

    #[error("Keep-alive timer was never started")]
    NotStarted,
}

#[derive(Default)]
struct TimerInner {
    schedule: Option<(Duration, KeepAliveCallback)>,
    cancel: Option<watch::Sender<bool>>,
    draining: Vec<JoinHandle<()>>,
}

/// Periodic keep-alive timer.
///
/// Must be started from within a Tokio runtime.
#[derive(Default)]
pub struct KeepAliveTimer {
    inner: Mutex<TimerInner>,
}

impl KeepAliveTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TimerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts firing `callback` every `interval`.
    pub fn start(&self, interval: Duration, callback: KeepAliveCallback) -> Result<(), KeepAliveError> {
        let mut inner = self.lock();
        if inner.cancel.is_some() {
            return Err(KeepAliveError::AlreadyRunning);
        }
        Self::spawn_loop(&mut inner, interval, callback);
        Ok(())
    }

    /// Requests cancellation and forgets the schedule. Idle timers ignore it.
    pub fn stop(&self) {
        let mut inner = self.lock();
        inner.schedule = None;
        Self::cancel(&mut inner);
    }

    /// Restarts the interval from now, keeping the same callback.
    pub fn reset(&self) -> Result<(), KeepAliveError> {
        let mut inner = self.lock();
        let (interval, callback) = inner.schedule.clone().ok_or(KeepAliveError::NotStarted)?;
        Self::cancel(&mut inner);
        Self::spawn_loop(&mut inner, interval, callback);
        Ok(())
    }

    pub fn state(&self) -> TimerState {
        let mut inner = self.lock();
        inner.draining.retain(|handle| !handle.is_finished());

        if inner.cancel.is_some() {
            TimerState::Running
        } else if inner.draining.is_empty() {
            TimerState::Idle
        } else {
            TimerState::Stopping
        }
    }

    fn cancel(inner: &mut TimerInner) {
        if let Some(cancel) = inner.cancel.take() {
            let _ = cancel.send(true);
        }
        inner.draining.retain(|handle| !handle.is_finished());
    }

    fn spawn_loop(inner: &mut TimerInner, interval: Duration, callback: KeepAliveCallback) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(interval, Arc::clone(&callback), cancel_rx));

        inner.schedule = Some((interval, callback));
        inner.cancel = Some(cancel_tx);
        inner.draining.push(handle);
    }
}

async fn run_loop(interval: Duration, callback: KeepAliveCallback, mut cancel: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            biased;

            // A dropped sender counts as cancellation too.
            _ = cancel.changed() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        if *cancel.borrow() {
            break;
        }

        callback().await;
    }
}
