use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

/// Container format a recorder writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum AudioContainer {
    /// AAC-LC elementary stream with ADTS framing
    #[default]
    #[serde(rename = "aac")]
    AacAdts,
    /// 16-bit PCM WAV
    #[serde(rename = "wav")]
    Wav,
}

impl AudioContainer {
    /// File extension used for recordings in this container
    pub fn extension(&self) -> &'static str {
        match self {
            AudioContainer::AacAdts => "aac",
            AudioContainer::Wav => "wav",
        }
    }
}

/// Summary returned when a recording is finalized
#[derive(Debug, Clone)]
pub struct RecordingSummary {
    /// Number of samples written (all channels)
    pub samples_written: u64,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// When capture started
    pub started_at: DateTime<Utc>,
}

impl RecordingSummary {
    /// Recorded duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples_written as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Audio capture backend
///
/// Implementations:
/// - `CpalRecorder`: default input device, AAC/ADTS or 16-bit PCM WAV
/// - test fakes that never touch a device
#[async_trait::async_trait]
pub trait RecorderBackend: Send + Sync {
    /// Container the backend writes, used to name destination files
    fn container(&self) -> AudioContainer;

    /// Begin capturing into `output`
    ///
    /// Returns once capture is running. The returned handle owns the
    /// device until it is stopped or dropped.
    async fn start(&self, output: &Path) -> Result<Box<dyn ActiveRecording>>;
}

/// Handle for a capture in progress
#[async_trait::async_trait]
pub trait ActiveRecording: Send {
    /// File the capture is written to
    fn output_path(&self) -> &Path;

    /// Finalize the file and release the device
    async fn stop(self: Box<Self>) -> Result<RecordingSummary>;
}

/// Audio playback backend
#[async_trait::async_trait]
pub trait PlayerBackend: Send + Sync {
    /// Begin playing `path`
    ///
    /// Returns once playback is running; playback continues in the background.
    async fn play(&self, path: &Path) -> Result<Box<dyn ActivePlayback>>;
}

/// Handle for a playback in progress
#[async_trait::async_trait]
pub trait ActivePlayback: Send {
    /// File being played
    fn source_path(&self) -> &Path;

    /// True once every sample has been played
    fn is_finished(&self) -> bool;

    /// Stop playback and release the device
    async fn stop(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_extensions() {
        assert_eq!(AudioContainer::AacAdts.extension(), "aac");
        assert_eq!(AudioContainer::Wav.extension(), "wav");
    }

    #[test]
    fn test_summary_duration() {
        let summary = RecordingSummary {
            samples_written: 88200,
            sample_rate: 44100,
            channels: 2,
            started_at: Utc::now(),
        };
        assert_eq!(summary.duration_seconds(), 1.0);

        let empty = RecordingSummary {
            sample_rate: 0,
            ..summary
        };
        assert_eq!(empty.duration_seconds(), 0.0);
    }
}
