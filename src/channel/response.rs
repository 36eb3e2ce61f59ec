use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ChannelError;

/// The single response produced for every method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    /// Call succeeded, with or without a payload
    Success { value: Option<Value> },

    /// Call failed with a machine-readable code
    Error {
        code: String,
        message: String,
        details: Option<Value>,
    },

    /// Method is not handled by this channel (not an error)
    NotImplemented,
}

impl MethodResponse {
    pub fn success(value: impl Into<Value>) -> Self {
        MethodResponse::Success {
            value: Some(value.into()),
        }
    }

    /// Success without a payload
    pub fn empty() -> Self {
        MethodResponse::Success { value: None }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MethodResponse::Success { .. })
    }

    /// Error code, if this is an error response
    pub fn error_code(&self) -> Option<&str> {
        match self {
            MethodResponse::Error { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<ChannelError> for MethodResponse {
    fn from(err: ChannelError) -> Self {
        MethodResponse::Error {
            code: err.code().to_string(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}
