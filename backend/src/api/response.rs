//! Common response envelope.

use serde::{Deserialize, Serialize};

/// Wrapper shared by mutating endpoints: `{success, message, data}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Human-readable outcome message.
    pub message: String,
    /// Payload, omitted on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Successful response with a payload.
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: "Success".to_owned(),
            data: Some(data),
        }
    }

    /// Successful response with a custom message and payload.
    #[must_use]
    pub fn success_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Failure response carrying only a message.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}
