//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, error types and the reducer contract
//! that form the vocabulary of the live chat domain.

mod errors;
mod ids;
mod reducer;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{ConnectionId, UserId};
pub use reducer::{Reducer, Transition, TransitionError};
