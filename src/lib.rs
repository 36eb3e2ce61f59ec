pub mod audio;
pub mod channel;
pub mod config;
pub mod http;
pub mod nats;
pub mod session;
pub mod supervisor;

pub use audio::{
    ActivePlayback, ActiveRecording, AudioContainer, AudioFile, CaptureConfig, CpalPlayer,
    CpalRecorder, PlayerBackend, RecorderBackend, RecordingSummary,
};
pub use channel::{
    ChannelError, Clock, Command, MethodCall, MethodResponse, SystemClock, VoiceChannel,
    CHANNEL_NAME,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use nats::ChannelServer;
pub use session::{PlaybackSession, RecordingSession, SessionState};
pub use supervisor::supervise;
