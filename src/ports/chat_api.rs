//! ChatApi port - Request/response calls a client makes besides the stream.

use async_trait::async_trait;

use crate::domain::chat::ChatMessage;
use crate::domain::foundation::UserId;

use super::TransportError;

/// Client view of the `login` and `send` boundary operations.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Announces `user` and returns everyone currently online.
    async fn login(&self, user: &UserId) -> Result<Vec<UserId>, TransportError>;

    /// Delivers a message to its receiver's private channel.
    async fn send(&self, message: &ChatMessage) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn ChatApi) {}
}
