//! Request and response bodies for chat endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::DomainError;

/// Form body of `POST /login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub user: String,
}

/// Form body of `POST /send`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendForm {
    pub sender: String,
    pub receiver: String,
    pub text: String,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<DomainError> for ErrorResponse {
    fn from(err: DomainError) -> Self {
        let details = if err.details.is_empty() {
            None
        } else {
            serde_json::to_value(&err.details).ok()
        };

        Self {
            code: err.code.to_string(),
            message: err.message,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ErrorCode, ValidationError};

    #[test]
    fn validation_response_uses_stable_code() {
        let error = ErrorResponse::from(DomainError::from(ValidationError::empty_field("text")));
        assert_eq!(error.code, "VALIDATION_FAILED");
        assert!(error.message.contains("text"));
        assert_eq!(error.details.unwrap()["field"], "text");
    }

    #[test]
    fn details_are_omitted_when_absent() {
        let json = serde_json::to_value(ErrorResponse::from(DomainError::new(
            ErrorCode::BrokerError,
            "connection reset",
        ))).unwrap();
        assert_eq!(json["code"], "BROKER_ERROR");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn send_form_deserializes_named_fields() {
        let form: SendForm = serde_json::from_value(serde_json::json!({
            "sender": "alice",
            "receiver": "bob",
            "text": "hi"
        }))
        .unwrap();
        assert_eq!(form.receiver, "bob");
    }
}
