//! Reducer trait for client-local state containers.
//!
//! A reducer maps (current state, one action) to the next state. Transitions
//! never observe time or any ambient context, so replaying the same action
//! log from the same initial state always yields the same result.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while turning an encoded action into a typed transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The action names a transition the state machine does not implement.
    #[error("Action type {name} is not implemented by {machine}")]
    Unrecognized { machine: &'static str, name: String },

    /// The action has no `type` tag or its fields do not match the transition.
    #[error("Malformed {machine} action: {reason}")]
    Malformed { machine: &'static str, reason: String },
}

/// An action accepted by a [`Reducer`], encoded as `{"type": "<name>", ...}`.
pub trait Transition: DeserializeOwned {
    /// Name of the state machine, used in error messages.
    const MACHINE: &'static str;

    /// Every transition name this action type understands.
    const NAMES: &'static [&'static str];

    /// Decodes an encoded action, rejecting unknown transition names loudly.
    fn decode(value: Value) -> Result<Self, TransitionError> {
        let name = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| TransitionError::Malformed {
                machine: Self::MACHINE,
                reason: "missing `type` tag".to_string(),
            })?
            .to_string();

        if !Self::NAMES.contains(&name.as_str()) {
            return Err(TransitionError::Unrecognized {
                machine: Self::MACHINE,
                name,
            });
        }

        serde_json::from_value(value).map_err(|e| TransitionError::Malformed {
            machine: Self::MACHINE,
            reason: e.to_string(),
        })
    }
}

/// Pure state container driven by typed actions.
///
/// # Example
///
/// ```ignore
/// let state = OnlineSet::default()
///     .reduce(OnlineAction::Add { user: alice })
///     .reduce(OnlineAction::Remove { user: bob });
/// ```
pub trait Reducer: Sized {
    /// The transitions this state accepts.
    type Action: Transition;

    /// Applies one action, producing the next state. Total: never fails.
    fn reduce(self, action: Self::Action) -> Self;

    /// Applies actions in order.
    fn reduce_all<I>(self, actions: I) -> Self
    where
        I: IntoIterator<Item = Self::Action>,
    {
        actions.into_iter().fold(self, Self::reduce)
    }

    /// Decodes and applies an encoded action.
    fn reduce_encoded(self, action: Value) -> Result<Self, TransitionError> {
        let action = Self::Action::decode(action)?;
        Ok(self.reduce(action))
    }
}
