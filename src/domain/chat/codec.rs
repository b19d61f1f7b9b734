//! Encoding between the broker and the stream.
//!
//! Broker payloads are YAML documents; frames carry JSON.

use serde::Serialize;
use thiserror::Error;

use super::{ChatPayload, PresenceEvent};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Broker payload could not be decoded: {0}")]
    Broker(#[from] serde_yaml::Error),

    #[error("Frame payload could not be encoded: {0}")]
    Wire(#[from] serde_json::Error),
}

/// Encodes a value for publication on the broker.
pub fn encode_broker<T: Serialize>(value: &T) -> Result<String, CodecError> {
    Ok(serde_yaml::to_string(value)?)
}

/// Decodes a chat payload received on a private channel.
pub fn decode_chat(raw: &str) -> Result<ChatPayload, CodecError> {
    Ok(serde_yaml::from_str(raw)?)
}

/// Decodes a presence event received on the presence channel.
pub fn decode_presence(raw: &str) -> Result<PresenceEvent, CodecError> {
    Ok(serde_yaml::from_str(raw)?)
}

/// Encodes a value as frame data.
pub fn encode_wire<T: Serialize>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}
