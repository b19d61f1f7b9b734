//! HTTP implementation of the client's `login` and `send` calls.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::domain::chat::ChatMessage;
use crate::domain::foundation::UserId;
use crate::ports::{ChatApi, TransportError};

/// Form-post client for the chat server.
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: Client,
    base_url: String,
}

impl HttpChatApi {
    /// Creates a client whose requests time out after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<reqwest::Response, TransportError> {
        let response = self
            .client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(path, status = status.as_u16(), "Chat request rejected");
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn login(&self, user: &UserId) -> Result<Vec<UserId>, TransportError> {
        let response = self.post_form("login", &[("user", user.as_str())]).await?;

        let online: Vec<String> = response
            .json()
            .await
            .map_err(|e| TransportError::Interrupted(e.to_string()))?;

        online
            .into_iter()
            .map(|id| UserId::new(id).map_err(|e| TransportError::Interrupted(e.to_string())))
            .collect()
    }

    async fn send(&self, message: &ChatMessage) -> Result<(), TransportError> {
        self.post_form(
            "send",
            &[
                ("sender", message.sender.as_str()),
                ("receiver", message.receiver.as_str()),
                ("text", message.text.as_str()),
            ],
        )
        .await?;
        Ok(())
    }
}
