use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::audio::{ActivePlayback, ActiveRecording, RecordingSummary};

/// An active capture: destination file plus the recorder handle that owns the device
pub struct RecordingSession {
    path: PathBuf,
    handle: Box<dyn ActiveRecording>,
}

impl RecordingSession {
    pub fn new(handle: Box<dyn ActiveRecording>) -> Self {
        Self {
            path: handle.output_path().to_path_buf(),
            handle,
        }
    }

    /// Destination file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Finalize the file and release the recorder
    pub async fn finish(self) -> Result<RecordingSummary> {
        self.handle.stop().await
    }
}

/// An active playback: source file plus the player handle
pub struct PlaybackSession {
    path: PathBuf,
    handle: Box<dyn ActivePlayback>,
}

impl PlaybackSession {
    pub fn new(handle: Box<dyn ActivePlayback>) -> Self {
        Self {
            path: handle.source_path().to_path_buf(),
            handle,
        }
    }

    /// Source file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once the player has played every sample
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop playback and release the player
    pub async fn finish(self) -> Result<()> {
        self.handle.stop().await
    }
}
