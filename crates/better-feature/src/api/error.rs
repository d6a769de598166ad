// API errors: what endpoints and request hooks fail with, and the JSON body
// they render to.

use serde::Serialize;
use serde_json::Value;

use better_feature_core::error::FeatureError;

/// HTTP status, machine-readable code and message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{status}] {message} ({code})")]
pub struct ApiError {
    pub status: u16,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { status, code: code.into(), message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, "BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, "INTERNAL_SERVER_ERROR", message)
    }

    /// Swap the generic code for a plugin error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn to_response(&self) -> ApiErrorResponse {
        ApiErrorResponse {
            message: self.message.clone(),
            code: Some(self.code.clone()),
            status: Some(self.status),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.to_response()).unwrap_or(Value::Null)
    }
}

impl From<FeatureError> for ApiError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::Validation(message) => Self::bad_request(message),
            other => {
                tracing::error!(error = %other, "endpoint failed");
                Self::internal(other.to_string())
            }
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}
