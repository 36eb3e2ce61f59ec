use crate::channel::VoiceChannel;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub channel: Arc<VoiceChannel>,
}

impl AppState {
    pub fn new(channel: Arc<VoiceChannel>) -> Self {
        Self { channel }
    }
}
