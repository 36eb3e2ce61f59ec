use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;

/// Failures reported back across the channel
///
/// Every variant maps to a stable code the caller can match on.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("{0:#}")]
    Record(anyhow::Error),

    #[error("a recording is already in progress: {}", .0.display())]
    RecordingInProgress(PathBuf),

    #[error("no recording in progress")]
    NotRecording,

    #[error("{0:#}")]
    Stop(anyhow::Error),

    #[error("{0:#}")]
    Playback(anyhow::Error),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("malformed method call: {0}")]
    MalformedCall(String),
}

impl ChannelError {
    pub fn code(&self) -> &'static str {
        match self {
            ChannelError::Record(_) => "RECORD_ERROR",
            ChannelError::RecordingInProgress(_) => "RECORDING_IN_PROGRESS",
            ChannelError::NotRecording => "NOT_RECORDING",
            ChannelError::Stop(_) => "STOP_ERROR",
            ChannelError::Playback(_) => "PLAYBACK_ERROR",
            ChannelError::FileNotFound(_) => "FILE_NOT_FOUND",
            ChannelError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            ChannelError::MalformedCall(_) => "MALFORMED_CALL",
        }
    }

    /// Structured details for the error response
    pub fn details(&self) -> Option<Value> {
        match self {
            ChannelError::RecordingInProgress(path) => {
                Some(json!({ "activePath": path.display().to_string() }))
            }
            ChannelError::FileNotFound(path) => {
                Some(json!({ "filePath": path.display().to_string() }))
            }
            ChannelError::InvalidArgument { name, .. } => Some(json!({ "argument": name })),
            _ => None,
        }
    }

    pub fn invalid_argument(name: &str, reason: impl Into<String>) -> Self {
        ChannelError::InvalidArgument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
