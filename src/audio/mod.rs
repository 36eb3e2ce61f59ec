pub mod adts;
pub mod backend;
pub mod capture;
pub mod device;
pub mod file;
pub mod playback;

pub use backend::{
    ActivePlayback, ActiveRecording, AudioContainer, PlayerBackend, RecorderBackend,
    RecordingSummary,
};
pub use adts::AdtsSink;
pub use capture::{CaptureConfig, CpalRecorder, WavSink};
pub use file::AudioFile;
pub use playback::CpalPlayer;
