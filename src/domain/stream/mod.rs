//! Streaming protocol - frames, client-side decoding and resumption.

mod frame;
mod parser;
mod resume;

pub use frame::{Frame, KEEP_ALIVE_PADDING, MESSAGE_EVENT, USER_ATTENDANCE_EVENT};
pub use parser::{FrameParser, ServerEvent};
pub use resume::{is_stop_signal, ResumptionToken, LAST_EVENT_ID_HEADER, STOP_RECONNECT_ID};
