//! PresenceStore port - Broker-side membership set of connected users.

use async_trait::async_trait;

use crate::domain::foundation::UserId;

/// Errors that can occur in presence store operations.
#[derive(Debug, thiserror::Error)]
pub enum PresenceStoreError {
    #[error("Presence store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt membership entry: {0}")]
    Corrupt(String),
}

/// Port for the shared set of online users.
///
/// Only mutated through `PresenceRegistry`, which pairs every mutation with
/// its presence event.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Adds a member. Returns false if it was already present.
    async fn add_member(&self, user: &UserId) -> Result<bool, PresenceStoreError>;

    /// Removes a member. Returns false if it was not present.
    async fn remove_member(&self, user: &UserId) -> Result<bool, PresenceStoreError>;

    /// Current membership snapshot.
    async fn members(&self) -> Result<Vec<UserId>, PresenceStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn PresenceStore) {}

    #[test]
    fn error_messages_name_the_cause() {
        let err = PresenceStoreError::Unavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "Presence store unavailable: connection refused");
    }
}
