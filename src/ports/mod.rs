//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the core and the outside world. Adapters implement these ports.
//!
//! ## Server Ports
//!
//! - `MessageBroker` - Publish/subscribe substrate carrying chat and presence
//! - `BrokerSubscription` - One live multi-channel subscription
//! - `PresenceStore` - Shared set of online users
//!
//! ## Client Ports
//!
//! - `EventSource` / `EventStream` - Event stream transport
//! - `ChatApi` - Login and send calls

mod broker;
mod chat_api;
mod event_source;
mod presence_store;

pub use broker::{BrokerError, BrokerMessage, BrokerSubscription, MessageBroker};
pub use chat_api::ChatApi;
pub use event_source::{EventSource, EventStream, TransportError};
pub use presence_store::{PresenceStore, PresenceStoreError};
