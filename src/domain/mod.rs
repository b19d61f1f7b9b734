//! Domain layer - protocol vocabulary and pure state.
//!
//! - `foundation` - identifiers, errors, the reducer contract
//! - `chat` - chat messages, presence events, broker channels and codec
//! - `stream` - frames, client-side frame decoding, resumption tokens
//! - `client` - message box and online set reducers

pub mod chat;
pub mod client;
pub mod foundation;
pub mod stream;
