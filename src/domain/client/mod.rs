//! Client-local state containers.
//!
//! Both are pure reducers: the next state depends only on the current state
//! and one action, so a recorded action log replays deterministically.

mod message_box;
mod online_set;

pub use message_box::{MessageBox, MessageBoxAction, StoredMessage};
pub use online_set::{OnlineAction, OnlineSet};
