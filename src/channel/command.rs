use serde_json::Value;
use std::path::PathBuf;

use super::call::MethodCall;
use super::error::ChannelError;

pub const START_RECORDING: &str = "startRecording";
pub const STOP_RECORDING: &str = "stopRecording";
pub const PLAY_AUDIO: &str = "playAudio";

/// Argument name for `playAudio`
pub const FILE_PATH_ARG: &str = "filePath";

/// A decoded, validated method call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartRecording,
    StopRecording,
    PlayAudio { file_path: PathBuf },
    /// Any method this channel does not handle
    Unknown(String),
}

impl Command {
    /// Decode a call, validating the arguments each command consumes
    pub fn from_call(call: &MethodCall) -> Result<Self, ChannelError> {
        match call.method.as_str() {
            START_RECORDING => Ok(Command::StartRecording),
            STOP_RECORDING => Ok(Command::StopRecording),
            PLAY_AUDIO => {
                let file_path = match call.argument(FILE_PATH_ARG) {
                    None | Some(Value::Null) => {
                        return Err(ChannelError::invalid_argument(FILE_PATH_ARG, "missing"));
                    }
                    Some(Value::String(s)) if s.trim().is_empty() => {
                        return Err(ChannelError::invalid_argument(FILE_PATH_ARG, "empty"));
                    }
                    Some(Value::String(s)) => PathBuf::from(s),
                    Some(other) => {
                        return Err(ChannelError::invalid_argument(
                            FILE_PATH_ARG,
                            format!("expected a string, got {}", json_type(other)),
                        ));
                    }
                };
                Ok(Command::PlayAudio { file_path })
            }
            other => Ok(Command::Unknown(other.to_string())),
        }
    }

    /// Method name this command was decoded from
    pub fn method(&self) -> &str {
        match self {
            Command::StartRecording => START_RECORDING,
            Command::StopRecording => STOP_RECORDING,
            Command::PlayAudio { .. } => PLAY_AUDIO,
            Command::Unknown(name) => name,
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
