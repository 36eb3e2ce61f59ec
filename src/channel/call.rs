use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::error::ChannelError;

/// A method invocation delivered by the host transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Method name, e.g. "startRecording"
    pub method: String,

    /// Flat argument mapping; absent or null means no arguments
    #[serde(default, deserialize_with = "null_as_empty")]
    pub arguments: Map<String, Value>,
}

impl MethodCall {
    /// Call without arguments
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: Map::new(),
        }
    }

    /// Builder-style argument
    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Decode a JSON request payload as delivered by a transport
    pub fn from_json(payload: &[u8]) -> Result<Self, ChannelError> {
        serde_json::from_slice(payload).map_err(|e| ChannelError::MalformedCall(e.to_string()))
    }

    /// Raw argument lookup
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}
