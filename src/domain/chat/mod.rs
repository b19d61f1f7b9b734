//! Chat domain - messages, presence events and broker channels.

mod channel;
pub mod codec;
mod message;
mod presence;

pub use channel::{Channel, ChannelError, PRESENCE_CHANNEL, PRIVATE_CHANNEL_PREFIX};
pub use codec::CodecError;
pub use message::{validate_text, ChatMessage, ChatPayload, MAX_MESSAGE_LENGTH};
pub use presence::{PresenceAction, PresenceEvent};
