//! Recording and playback session tracking
//!
//! This module provides the session values the dispatcher owns:
//! - `RecordingSession`: destination path + recorder handle
//! - `PlaybackSession`: source path + player handle
//! - `SessionState`: the two slots and their transitions

mod active;
mod state;

pub use active::{PlaybackSession, RecordingSession};
pub use state::SessionState;
