//! Application handlers.
//!
//! Server-side services behind the boundary operations:
//! - `PresenceRegistry` - login/disconnect membership plus announcements
//! - `ChannelRouter` - broker traffic to frames for one stream
//! - `SendMessageHandler` - `send`
//! - `OpenStreamHandler` - `openStream`

pub mod channel_router;
pub mod open_stream;
pub mod presence_registry;
pub mod send_message;

pub use channel_router::{route, ChannelRouter, RouteError, Routed, StreamCleanup, StreamProducer};
pub use open_stream::{OpenStreamCommand, OpenStreamError, OpenStreamHandler, OpenedStream};
pub use presence_registry::{PresenceError, PresenceRegistry};
pub use send_message::{SendMessageCommand, SendMessageError, SendMessageHandler};
