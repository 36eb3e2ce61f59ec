//! The voice method channel
//!
//! A host transport delivers a `MethodCall`; `VoiceChannel::handle` decodes it
//! into a `Command`, drives the recorder/player backends and returns exactly
//! one `MethodResponse`:
//! - `startRecording` -> destination path
//! - `stopRecording` -> no payload
//! - `playAudio { filePath }` -> no payload
//! - anything else -> not implemented

mod call;
mod clock;
mod command;
mod dispatcher;
mod error;
mod response;

pub use call::MethodCall;
pub use clock::{Clock, SystemClock};
pub use command::{Command, FILE_PATH_ARG, PLAY_AUDIO, START_RECORDING, STOP_RECORDING};
pub use dispatcher::{VoiceChannel, RECORDING_PREFIX};
pub use error::ChannelError;
pub use response::MethodResponse;

/// Logical endpoint name the channel is registered under
pub const CHANNEL_NAME: &str = "ai.assistant/voice";
