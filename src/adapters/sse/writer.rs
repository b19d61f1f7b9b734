//! StreamWriter - Frames protocol output onto one outbound connection.
//!
//! Encoded frames go through a bounded channel to the HTTP body, so a frame
//! is always delivered whole and writers never interleave.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::domain::stream::{Frame, KEEP_ALIVE_PADDING};

use super::keep_alive::{KeepAliveError, KeepAliveTimer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("Stream is closed")]
    Closed,

    #[error("Refusing to emit a frame with no data, event or comment")]
    EmptyFrame,
}

/// Shared handle on the outbound channel.
///
/// Closing drops the only long-lived sender, which ends the HTTP body once
/// queued frames are flushed.
#[derive(Clone)]
pub struct FrameSink {
    tx: Arc<Mutex<Option<mpsc::Sender<String>>>>,
}

impl FrameSink {
    pub(crate) fn new(tx: mpsc::Sender<String>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    pub(crate) fn sender(&self) -> Option<mpsc::Sender<String>> {
        self.tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn send(&self, text: String) -> Result<(), StreamError> {
        let tx = self.sender().ok_or(StreamError::Closed)?;
        tx.send(text).await.map_err(|_| {
            self.close();
            StreamError::Closed
        })
    }

    /// Emits keep-alive padding only.
    pub async fn blank(&self) -> Result<(), StreamError> {
        self.send(KEEP_ALIVE_PADDING.to_string()).await
    }

    pub fn close(&self) {
        self.tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender().map_or(true, |tx| tx.is_closed())
    }
}

/// Writer for one stream. Every successful `write` resets the keep-alive.
pub struct StreamWriter {
    sink: FrameSink,
    keep_alive: Arc<KeepAliveTimer>,
}

impl StreamWriter {
    pub fn new(sink: FrameSink, keep_alive: Arc<KeepAliveTimer>) -> Self {
        Self { sink, keep_alive }
    }

    /// Encodes and emits one frame.
    pub async fn write(&self, frame: &Frame) -> Result<(), StreamError> {
        if self.sink.is_closed() {
            return Err(StreamError::Closed);
        }
        let text = frame.encode().ok_or(StreamError::EmptyFrame)?;
        self.sink.send(text).await?;

        match self.keep_alive.reset() {
            Ok(()) | Err(KeepAliveError::NotStarted) => {}
            Err(e) => tracing::debug!(error = %e, "Keep-alive reset skipped"),
        }
        Ok(())
    }

    /// Emits padding without touching the keep-alive schedule.
    pub async fn blank(&self) -> Result<(), StreamError> {
        self.sink.blank().await
    }

    pub fn close(&self) {
        self.sink.close();
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }

    pub fn sink(&self) -> FrameSink {
        self.sink.clone()
    }

    pub fn keep_alive(&self) -> &Arc<KeepAliveTimer> {
        &self.keep_alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sse::keep_alive::TimerState;
    use futures::FutureExt;
    use std::time::Duration;

    fn writer(buffer: usize) -> (StreamWriter, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer);
        let writer = StreamWriter::new(FrameSink::new(tx), Arc::new(KeepAliveTimer::new()));
        (writer, rx)
    }

    #[tokio::test]
    async fn write_emits_encoded_frame() {
        let (writer, mut rx) = writer(4);

        writer.write(&Frame::named("user_attendance", "{}")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), "event: user_attendance\ndata: {}\n\n");
    }

    #[tokio::test]
    async fn write_rejects_empty_frame() {
        let (writer, _rx) = writer(4);
        assert_eq!(
            writer.write(&Frame::default()).await.unwrap_err(),
            StreamError::EmptyFrame
        );
    }

    #[tokio::test]
    async fn write_after_close_fails() {
        let (writer, _rx) = writer(4);
        writer.close();

        assert_eq!(
            writer.write(&Frame::data("x")).await.unwrap_err(),
            StreamError::Closed
        );
        assert_eq!(writer.blank().await.unwrap_err(), StreamError::Closed);
    }

    #[tokio::test]
    async fn write_fails_once_receiver_is_gone() {
        let (writer, rx) = writer(4);
        drop(rx);

        assert_eq!(
            writer.write(&Frame::data("x")).await.unwrap_err(),
            StreamError::Closed
        );
        assert!(writer.is_closed());
    }

    #[tokio::test]
    async fn blank_emits_padding_only() {
        let (writer, mut rx) = writer(4);
        writer.blank().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), KEEP_ALIVE_PADDING);
    }

    #[tokio::test]
    async fn close_ends_the_receiving_side() {
        let (writer, mut rx) = writer(4);
        writer.write(&Frame::data("last")).await.unwrap();
        writer.close();

        assert_eq!(rx.recv().await.unwrap(), "data: last\n\n");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn write_resets_running_keep_alive() {
        let (writer, mut rx) = writer(8);
        let sink = writer.sink();
        writer
            .keep_alive()
            .start(
                Duration::from_secs(15),
                Arc::new(move || {
                    let sink = sink.clone();
                    async move {
                        let _ = sink.blank().await;
                    }
                    .boxed()
                }),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        writer.write(&Frame::data("real")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(rx.recv().await.unwrap(), "data: real\n\n");
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(rx.recv().await.unwrap(), KEEP_ALIVE_PADDING);
        assert_eq!(writer.keep_alive().state(), TimerState::Running);
    }
}
