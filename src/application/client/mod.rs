//! Client-side application services.
//!
//! - `EventDispatcher` - One subscription per identity, typed event routing
//! - `ChatClient` - Session tying the dispatcher to the local reducers

mod dispatcher;
mod session;

pub use dispatcher::{DispatchError, Dispatched, EventDispatcher, StreamHandlers};
pub use session::{ChatClient, ClientError};
