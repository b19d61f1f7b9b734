//! Event stream configuration

use serde::Deserialize;
use std::time::Duration;

use crate::adapters::sse::StreamSettings;

use super::error::ValidationError;

/// Event stream configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Seconds of silence before a stream is padded
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Reconnection hint sent to clients, in milliseconds
    pub retry_ms: Option<u64>,

    /// Outbound frame queue depth per connection
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl StreamConfig {
    /// Settings applied to every stream opened by the server
    pub fn settings(&self) -> StreamSettings {
        StreamSettings {
            keep_alive: Duration::from_secs(self.keep_alive_secs),
            retry_ms: self.retry_ms,
            buffer_size: self.buffer_size,
        }
    }

    /// Validate stream configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.keep_alive_secs == 0 || self.keep_alive_secs > 300 {
            return Err(ValidationError::InvalidKeepAlive);
        }
        if self.buffer_size == 0 {
            return Err(ValidationError::InvalidBufferSize);
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keep_alive_secs: default_keep_alive(),
            retry_ms: None,
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_keep_alive() -> u64 {
    15
}

fn default_buffer_size() -> usize {
    64
}
