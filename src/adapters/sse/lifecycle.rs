//! StreamLifecycle - Runs one connection from open to close.
//!
//! The producer and the disconnect detector race; the first to finish ends
//! the stream. Whatever the cause, the keep-alive timer is stopped and the
//! registered close callback runs exactly once.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, Stream};
use tokio::sync::mpsc;

use crate::domain::foundation::ConnectionId;
use crate::domain::stream::Frame;

use super::keep_alive::{KeepAliveCallback, KeepAliveTimer};
use super::writer::{FrameSink, StreamWriter};

/// Callback run once when the stream ends.
pub type CloseCallback = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("A close callback is already registered for this stream")]
    CloseAlreadyRegistered,
}

/// Per-stream tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    pub keep_alive: Duration,
    pub retry_ms: Option<u64>,
    pub buffer_size: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(15),
            retry_ms: None,
            buffer_size: 64,
        }
    }
}

/// How a stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    ProducerFinished,
    ProducerFailed(String),
    ClientDisconnected,
}

/// Receiving end of a stream's frames, consumed by the HTTP body.
pub struct FrameReceiver {
    rx: mpsc::Receiver<String>,
}

impl FrameReceiver {
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> impl Stream<Item = String> + Send + 'static {
        futures::stream::unfold(self.rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        })
    }
}

/// Stops the timer, closes the writer and fires the close callback.
///
/// Dropping an unfired guard still releases everything, spawning the
/// callback onto the current runtime.
struct CloseGuard {
    connection_id: ConnectionId,
    writer: Arc<StreamWriter>,
    callback: Option<CloseCallback>,
}

impl CloseGuard {
    fn release(&self) {
        self.writer.keep_alive().stop();
        self.writer.close();
    }

    async fn fire(mut self) {
        self.release();
        if let Some(callback) = self.callback.take() {
            callback().await;
        }
    }
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        let Some(callback) = self.callback.take() else {
            return;
        };
        self.release();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(callback());
            }
            Err(_) => {
                tracing::error!(
                    connection_id = %self.connection_id,
                    "Stream dropped outside a runtime; close callback lost"
                );
            }
        }
    }
}

/// Controller for one long-lived stream.
pub struct StreamLifecycle {
    connection_id: ConnectionId,
    writer: Arc<StreamWriter>,
    settings: StreamSettings,
    on_close: Option<CloseCallback>,
    detect_disconnect: bool,
}

impl StreamLifecycle {
    /// Creates a lifecycle and the receiver its frames are delivered to.
    ///
    /// Dropping the receiver is how a client disconnect is detected.
    pub fn channel(settings: StreamSettings) -> (Self, FrameReceiver) {
        let (tx, rx) = mpsc::channel(settings.buffer_size.max(1));
        let writer = StreamWriter::new(FrameSink::new(tx), Arc::new(KeepAliveTimer::new()));

        let lifecycle = Self {
            connection_id: ConnectionId::new(),
            writer: Arc::new(writer),
            settings,
            on_close: None,
            detect_disconnect: true,
        };
        (lifecycle, FrameReceiver { rx })
    }

    /// Runs without proactive disconnect detection.
    ///
    /// The stream is then reclaimed only when the producer finishes or a
    /// write fails.
    pub fn without_disconnect_detection(mut self) -> Self {
        self.detect_disconnect = false;
        self
    }

    pub fn detects_disconnect(&self) -> bool {
        self.detect_disconnect
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn writer(&self) -> Arc<StreamWriter> {
        Arc::clone(&self.writer)
    }

    /// Registers the close callback. Only one may be registered.
    pub fn on_close<F, Fut>(&mut self, callback: F) -> Result<(), LifecycleError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.on_close.is_some() {
            return Err(LifecycleError::CloseAlreadyRegistered);
        }
        self.on_close = Some(Box::new(move || callback().boxed()));
        Ok(())
    }

    /// Runs `producer` until it finishes, fails, or the client goes away.
    pub async fn run<P, Fut, E>(mut self, producer: P) -> StreamOutcome
    where
        P: FnOnce(Arc<StreamWriter>) -> Fut + Send,
        Fut: Future<Output = Result<(), E>> + Send,
        E: Display,
    {
        let connection_id = self.connection_id;
        let detect_disconnect = self.detect_disconnect;
        let settings = self.settings.clone();
        let writer = Arc::clone(&self.writer);
        let guard = CloseGuard {
            connection_id,
            writer: Arc::clone(&writer),
            callback: self.on_close.take(),
        };

        if !detect_disconnect {
            tracing::warn!(
                connection_id = %connection_id,
                "Disconnect detection unavailable; stream reclaimed only on producer exit or failed write"
            );
        }

        if let Some(retry_ms) = settings.retry_ms {
            if writer.write(&Frame::comment("").with_retry(retry_ms)).await.is_err() {
                guard.fire().await;
                tracing::debug!(connection_id = %connection_id, "Client gone before first frame");
                return StreamOutcome::ClientDisconnected;
            }
        }

        if let Err(e) = writer
            .keep_alive()
            .start(settings.keep_alive, padding_callback(writer.sink()))
        {
            tracing::warn!(connection_id = %connection_id, error = %e, "Keep-alive not started");
        }

        let producer = AssertUnwindSafe(producer(Arc::clone(&writer))).catch_unwind();

        let outcome = if detect_disconnect {
            let probe = writer.sink().sender();
            tokio::select! {
                result = producer => producer_outcome(result),
                _ = client_gone(probe) => StreamOutcome::ClientDisconnected,
            }
        } else {
            producer_outcome(producer.await)
        };

        guard.fire().await;

        match &outcome {
            StreamOutcome::ProducerFailed(reason) => {
                tracing::warn!(connection_id = %connection_id, reason = %reason, "Stream producer failed");
            }
            _ => {
                tracing::debug!(connection_id = %connection_id, outcome = ?outcome, "Stream closed");
            }
        }
        outcome
    }
}

fn padding_callback(sink: FrameSink) -> KeepAliveCallback {
    Arc::new(move || {
        let sink = sink.clone();
        async move {
            if sink.blank().await.is_err() {
                tracing::trace!("Keep-alive padding dropped on closed stream");
            }
        }
        .boxed()
    })
}

async fn client_gone(probe: Option<mpsc::Sender<String>>) {
    if let Some(tx) = probe {
        tx.closed().await;
    }
}

fn producer_outcome<E: Display>(
    result: Result<Result<(), E>, Box<dyn std::any::Any + Send>>,
) -> StreamOutcome {
    match result {
        Ok(Ok(())) => StreamOutcome::ProducerFinished,
        Ok(Err(e)) => StreamOutcome::ProducerFailed(e.to_string()),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "producer panicked".to_string());
            StreamOutcome::ProducerFailed(reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sse::keep_alive::TimerState;
    use crate::adapters::sse::writer::StreamError;
    use crate::domain::stream::KEEP_ALIVE_PADDING;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted_close(lifecycle: &mut StreamLifecycle) -> Arc<AtomicUsize> {
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        lifecycle
            .on_close(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        closes
    }

    // ════════════════════════════════════════════════════════════════════════
    // Termination paths
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn producer_completion_closes_exactly_once() {
        let (mut lifecycle, mut frames) = StreamLifecycle::channel(StreamSettings::default());
        let closes = counted_close(&mut lifecycle);
        let writer = lifecycle.writer();

        let outcome = lifecycle
            .run(|w| async move { w.write(&Frame::data("bye")).await })
            .await;

        assert_eq!(outcome, StreamOutcome::ProducerFinished);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(frames.recv().await.unwrap(), "data: bye\n\n");
        assert!(frames.recv().await.is_none());
        assert_ne!(writer.keep_alive().state(), TimerState::Running);
    }

    #[tokio::test]
    async fn client_disconnect_closes_exactly_once() {
        let (mut lifecycle, frames) = StreamLifecycle::channel(StreamSettings::default());
        let closes = counted_close(&mut lifecycle);

        let task = tokio::spawn(lifecycle.run(|_w| async move {
            futures::future::pending::<Result<(), StreamError>>().await
        }));
        drop(frames);

        let outcome = task.await.unwrap();
        assert_eq!(outcome, StreamOutcome::ClientDisconnected);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn producer_error_closes_exactly_once() {
        let (mut lifecycle, _frames) = StreamLifecycle::channel(StreamSettings::default());
        let closes = counted_close(&mut lifecycle);

        let outcome = lifecycle
            .run(|_w| async move { Err::<(), _>("unknown channel lobby") })
            .await;

        assert_eq!(
            outcome,
            StreamOutcome::ProducerFailed("unknown channel lobby".to_string())
        );
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn producer_panic_closes_exactly_once() {
        let (mut lifecycle, _frames) = StreamLifecycle::channel(StreamSettings::default());
        let closes = counted_close(&mut lifecycle);

        let outcome = lifecycle.run(|_w| async move { explode() }).await;

        assert_eq!(outcome, StreamOutcome::ProducerFailed("boom".to_string()));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    fn explode() -> Result<(), StreamError> {
        panic!("boom")
    }

    #[tokio::test]
    async fn dropped_run_still_fires_close() {
        let (mut lifecycle, _frames) = StreamLifecycle::channel(StreamSettings::default());
        let closes = counted_close(&mut lifecycle);

        let task = tokio::spawn(lifecycle.run(|_w| async move {
            futures::future::pending::<Result<(), StreamError>>().await
        }));
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.abort();
        let _ = task.await;

        // The callback is spawned from the guard's Drop
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Registration and degraded mode
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn second_close_registration_is_rejected() {
        let (mut lifecycle, _frames) = StreamLifecycle::channel(StreamSettings::default());
        lifecycle.on_close(|| async {}).unwrap();

        assert_eq!(
            lifecycle.on_close(|| async {}).unwrap_err(),
            LifecycleError::CloseAlreadyRegistered
        );
    }

    #[tokio::test]
    async fn without_detection_stream_ends_on_failed_write() {
        let (lifecycle, frames) = StreamLifecycle::channel(StreamSettings::default());
        let mut lifecycle = lifecycle.without_disconnect_detection();
        assert!(!lifecycle.detects_disconnect());
        let closes = counted_close(&mut lifecycle);
        drop(frames);

        let outcome = lifecycle
            .run(|w| async move {
                loop {
                    if let Err(e) = w.write(&Frame::data("tick")).await {
                        return Err::<(), StreamError>(e);
                    }
                    tokio::task::yield_now().await;
                }
            })
            .await;

        assert_eq!(outcome, StreamOutcome::ProducerFailed("Stream is closed".to_string()));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Framing
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn retry_hint_is_sent_first() {
        let settings = StreamSettings {
            retry_ms: Some(3000),
            ..StreamSettings::default()
        };
        let (lifecycle, mut frames) = StreamLifecycle::channel(settings);

        lifecycle
            .run(|w| async move { w.write(&Frame::data("hello")).await })
            .await;

        assert_eq!(frames.recv().await.unwrap(), "retry: 3000\n:\n\n");
        assert_eq!(frames.recv().await.unwrap(), "data: hello\n\n");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_stream_is_padded() {
        let settings = StreamSettings {
            keep_alive: Duration::from_secs(15),
            ..StreamSettings::default()
        };
        let (lifecycle, mut frames) = StreamLifecycle::channel(settings);

        let task = tokio::spawn(lifecycle.run(|_w| async move {
            tokio::time::sleep(Duration::from_secs(20)).await;
            Ok::<(), StreamError>(())
        }));

        assert_eq!(frames.recv().await.unwrap(), KEEP_ALIVE_PADDING);
        assert_eq!(task.await.unwrap(), StreamOutcome::ProducerFinished);
    }

    #[tokio::test]
    async fn writes_fail_after_stream_ends() {
        let (lifecycle, _frames) = StreamLifecycle::channel(StreamSettings::default());
        let writer = lifecycle.writer();

        lifecycle.run(|_w| async move { Ok::<(), StreamError>(()) }).await;

        assert_eq!(
            writer.write(&Frame::data("late")).await.unwrap_err(),
            StreamError::Closed
        );
    }

    #[tokio::test]
    async fn frame_receiver_stream_yields_frames_then_ends() {
        use futures::StreamExt;

        let (lifecycle, frames) = StreamLifecycle::channel(StreamSettings::default());
        lifecycle
            .run(|w| async move {
                w.write(&Frame::data("a")).await?;
                w.write(&Frame::data("b")).await
            })
            .await;

        let collected: Vec<String> = frames.into_stream().collect().await;
        assert_eq!(collected, vec!["data: a\n\n", "data: b\n\n"]);
    }
}
