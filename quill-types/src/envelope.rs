//! The `{ code, data, message }` envelope every backend endpoint returns.

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// The `code` value the backend uses for success.
pub const SUCCESS_CODE: i64 = 200;

/// Standard JSON response wrapper used by the blog backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Application status code. [`SUCCESS_CODE`] means success.
    pub code: i64,
    /// Payload, present on success.
    pub data: Option<T>,
    /// Human-readable status text.
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Whether the backend reported success.
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Unwrap the payload, turning a failing code or a missing `data`
    /// into [`ChatError::Api`].
    pub fn into_result(self) -> Result<T, ChatError> {
        let code = self.code;
        if !self.is_success() {
            return Err(ChatError::Api {
                code,
                message: self.message.unwrap_or_else(|| "request failed".into()),
            });
        }
        self.data.ok_or_else(|| ChatError::Api {
            code,
            message: "response carried no data".into(),
        })
    }
}
