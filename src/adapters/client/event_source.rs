//! HTTP event-stream consumer.
//!
//! Opens `GET {base}/receive/{user}`, decodes the body with [`FrameParser`]
//! and reconnects after the stream ends, echoing the last seen id in the
//! `Last-Event-ID` header. It stops for good once the last id is the stop
//! token or the server answers `204 No Content`.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{Client, StatusCode};

use crate::domain::foundation::UserId;
use crate::domain::stream::{
    is_stop_signal, FrameParser, ServerEvent, LAST_EVENT_ID_HEADER,
};
use crate::ports::{EventSource, EventStream, TransportError};

/// Delay before reconnecting when the server never sent a `retry` hint.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

type ByteStream = BoxStream<'static, Result<Vec<u8>, reqwest::Error>>;

/// Event source speaking the chat server's stream endpoint.
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    client: Client,
    base_url: String,
    retry_delay: Duration,
}

impl HttpEventSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Sets the reconnection delay used until the server sends a hint.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Builds the stream endpoint URL for `user`.
    pub fn stream_url(&self, user: &UserId) -> String {
        format!("{}/receive/{}", self.base_url, user)
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn connect(
        &self,
        user: &UserId,
        last_event_id: Option<&str>,
    ) -> Result<Box<dyn EventStream>, TransportError> {
        let mut stream = HttpEventStream {
            client: self.client.clone(),
            url: self.stream_url(user),
            default_retry: self.retry_delay,
            parser: FrameParser::new(),
            resume_from: last_event_id.map(str::to_string),
            body: None,
            pending: VecDeque::new(),
            finished: false,
        };

        if is_stop_signal(last_event_id) {
            tracing::debug!(user = %user, "Not connecting: resuming from the stop id");
            stream.finished = true;
            return Ok(Box::new(stream));
        }

        match open(&stream.client, &stream.url, last_event_id).await? {
            Some(body) => stream.body = Some(body),
            None => stream.finished = true,
        }
        tracing::debug!(user = %user, url = %stream.url, "Event stream connected");

        Ok(Box::new(stream))
    }
}

/// One logical event stream spanning any number of reconnects.
pub struct HttpEventStream {
    client: Client,
    url: String,
    default_retry: Duration,
    parser: FrameParser,
    resume_from: Option<String>,
    body: Option<ByteStream>,
    pending: VecDeque<ServerEvent>,
    finished: bool,
}

impl HttpEventStream {
    fn last_event_id(&self) -> Option<&str> {
        self.parser
            .last_event_id()
            .or(self.resume_from.as_deref())
    }

    fn retry_delay(&self) -> Duration {
        self.parser
            .retry()
            .map(Duration::from_millis)
            .unwrap_or(self.default_retry)
    }

    async fn reconnect(&mut self) -> Result<(), TransportError> {
        tokio::time::sleep(self.retry_delay()).await;

        let last_event_id = self.last_event_id().map(str::to_string);
        match open(&self.client, &self.url, last_event_id.as_deref()).await? {
            Some(body) => {
                tracing::debug!(url = %self.url, last_event_id = ?last_event_id, "Event stream reconnected");
                self.body = Some(body);
            }
            None => {
                tracing::info!(url = %self.url, "Server refused reconnection");
                self.finished = true;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventStream for HttpEventStream {
    async fn next_event(&mut self) -> Option<Result<ServerEvent, TransportError>> {
        loop {
            if self.finished {
                return None;
            }
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }

            let Some(body) = self.body.as_mut() else {
                if is_stop_signal(self.last_event_id()) {
                    tracing::debug!(url = %self.url, "Stop id seen; not reconnecting");
                    self.finished = true;
                    return None;
                }
                if let Err(e) = self.reconnect().await {
                    return Some(Err(e));
                }
                continue;
            };

            match body.next().await {
                Some(Ok(chunk)) => {
                    let events = self.parser.feed(&chunk);
                    self.pending.extend(events);
                }
                Some(Err(e)) => {
                    self.body = None;
                    return Some(Err(TransportError::Interrupted(e.to_string())));
                }
                None => {
                    tracing::debug!(url = %self.url, "Event stream ended by server");
                    self.body = None;
                }
            }
        }
    }

    fn close(&mut self) {
        self.finished = true;
        self.body = None;
        self.pending.clear();
    }
}

/// Issues the stream request. `Ok(None)` means the server refused with 204.
async fn open(
    client: &Client,
    url: &str,
    last_event_id: Option<&str>,
) -> Result<Option<ByteStream>, TransportError> {
    let mut request = client.get(url).header("Accept", "text/event-stream");
    if let Some(id) = last_event_id {
        request = request.header(LAST_EVENT_ID_HEADER, id);
    }

    let response = request
        .send()
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    match response.status() {
        StatusCode::NO_CONTENT => Ok(None),
        status if status.is_success() => Ok(Some(
            response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                .boxed(),
        )),
        status => Err(TransportError::Status(status.as_u16())),
    }
}
