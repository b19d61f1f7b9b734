//! Server-sent events engine.
//!
//! - `KeepAliveTimer` - Pads idle streams with comment frames
//! - `StreamWriter` - Emits whole frames onto one connection
//! - `StreamLifecycle` - Races producer against disconnect, closes once

mod keep_alive;
mod lifecycle;
mod writer;

pub use keep_alive::{KeepAliveCallback, KeepAliveError, KeepAliveTimer, TimerState};
pub use lifecycle::{
    CloseCallback, FrameReceiver, LifecycleError, StreamLifecycle, StreamOutcome, StreamSettings,
};
pub use writer::{FrameSink, StreamError, StreamWriter};
