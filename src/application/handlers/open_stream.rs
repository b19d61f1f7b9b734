//! OpenStreamHandler - Opens a user's event stream.
//!
//! A request resuming from the stop id is refused before anything is
//! subscribed. Otherwise the stream is attached to the router and its
//! lifecycle runs on its own task.

use std::sync::Arc;

use crate::adapters::sse::{FrameReceiver, StreamLifecycle, StreamOutcome, StreamSettings};
use crate::domain::foundation::{ConnectionId, UserId};
use crate::domain::stream::ResumptionToken;

use super::channel_router::{ChannelRouter, RouteError};

/// Command to open a stream.
#[derive(Debug, Clone)]
pub struct OpenStreamCommand {
    pub user: UserId,
    pub last_event_id: Option<ResumptionToken>,
}

impl OpenStreamCommand {
    pub fn new(user: UserId, last_event_id: Option<&str>) -> Self {
        Self {
            user,
            last_event_id: last_event_id.map(ResumptionToken::new),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenStreamError {
    /// The client resumed with the stop id and must not reconnect.
    #[error("Reconnection refused: stream was terminated by the server")]
    ReconnectRefused,

    #[error("Stream could not be attached: {0}")]
    Attach(#[from] RouteError),
}

/// An opened stream.
pub struct OpenedStream {
    pub connection_id: ConnectionId,
    pub frames: FrameReceiver,
    pub task: tokio::task::JoinHandle<StreamOutcome>,
}

/// Handler for `openStream`.
pub struct OpenStreamHandler {
    router: Arc<ChannelRouter>,
    settings: StreamSettings,
}

impl OpenStreamHandler {
    pub fn new(router: Arc<ChannelRouter>, settings: StreamSettings) -> Self {
        Self { router, settings }
    }

    pub async fn handle(&self, cmd: OpenStreamCommand) -> Result<OpenedStream, OpenStreamError> {
        // 1. Refuse resumption from the stop id
        if cmd.last_event_id.as_ref().is_some_and(ResumptionToken::is_stop) {
            tracing::debug!(user = %cmd.user, "Stream reopen with stop id refused");
            return Err(OpenStreamError::ReconnectRefused);
        }

        // 2. Subscribe and register cleanup
        let (mut lifecycle, frames) = StreamLifecycle::channel(self.settings.clone());
        let connection_id = lifecycle.connection_id();
        let producer = self.router.attach(cmd.user.clone(), &mut lifecycle).await?;

        // 3. Run the stream
        let task = tokio::spawn(lifecycle.run(move |writer| producer.produce(writer)));

        tracing::debug!(
            user = %cmd.user,
            connection_id = %connection_id,
            resumed_from = ?cmd.last_event_id.as_ref().map(ResumptionToken::as_str),
            "Stream opened"
        );

        Ok(OpenedStream {
            connection_id,
            frames,
            task,
        })
    }
}
