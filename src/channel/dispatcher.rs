use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, info_span, warn, Instrument};

use super::call::MethodCall;
use super::clock::{Clock, SystemClock};
use super::command::Command;
use super::error::ChannelError;
use super::response::MethodResponse;
use crate::audio::{PlayerBackend, RecorderBackend};
use crate::session::{PlaybackSession, RecordingSession, SessionState};

/// Recording filename prefix
pub const RECORDING_PREFIX: &str = "recording_";

/// Voice command dispatcher
///
/// Maps each incoming call to one audio action and produces exactly one
/// response. Commands are serialized on a single session lock, so at most one
/// recorder and one player handle are ever held.
pub struct VoiceChannel {
    recorder: Arc<dyn RecorderBackend>,
    player: Arc<dyn PlayerBackend>,
    clock: Arc<dyn Clock>,
    recordings_dir: PathBuf,
    state: Mutex<SessionState>,
}

impl VoiceChannel {
    /// Create a dispatcher writing recordings into `recordings_dir`
    pub fn new(
        recorder: Arc<dyn RecorderBackend>,
        player: Arc<dyn PlayerBackend>,
        recordings_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            recorder,
            player,
            clock: Arc::new(SystemClock),
            recordings_dir: recordings_dir.into(),
            state: Mutex::new(SessionState::new()),
        }
    }

    /// Replace the clock used to name recordings
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Whether a recording session is active
    pub async fn is_recording(&self) -> bool {
        self.state.lock().await.is_recording()
    }

    /// Whether a playback is still running
    pub async fn is_playing(&self) -> bool {
        let mut state = self.state.lock().await;
        Self::release_finished_playback(&mut state).await;
        state.playback_path().is_some()
    }

    async fn release_finished_playback(state: &mut SessionState) {
        if let Some(session) = state.take_finished_playback() {
            info!("Playback finished: {}", session.path().display());
            if let Err(e) = session.finish().await {
                warn!("Failed to release finished playback: {:#}", e);
            }
        }
    }

    /// Handle one method call
    pub async fn handle(&self, call: MethodCall) -> MethodResponse {
        let call_id = uuid::Uuid::new_v4();
        let span = info_span!("method_call", method = %call.method, %call_id);

        async move {
            let command = match Command::from_call(&call) {
                Ok(command) => command,
                Err(e) => {
                    warn!("Rejected call: {}", e);
                    return e.into();
                }
            };

            let response = self.execute(command).await;
            match &response {
                MethodResponse::Error { code, message, .. } => {
                    warn!("Call failed: {} ({})", code, message)
                }
                MethodResponse::NotImplemented => info!("Method not implemented"),
                MethodResponse::Success { .. } => info!("Call succeeded"),
            }
            response
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, command: Command) -> MethodResponse {
        Self::release_finished_playback(&mut *self.state.lock().await).await;

        let result = match command {
            Command::StartRecording => self
                .start_recording()
                .await
                .map(|path| MethodResponse::success(path.display().to_string())),
            Command::StopRecording => self.stop_recording().await.map(|_| MethodResponse::empty()),
            Command::PlayAudio { file_path } => self
                .play_audio(&file_path)
                .await
                .map(|_| MethodResponse::empty()),
            Command::Unknown(_) => Ok(MethodResponse::NotImplemented),
        };

        result.unwrap_or_else(MethodResponse::from)
    }

    /// Destination for a recording started at `millis`
    pub fn recording_path(&self, millis: i64) -> PathBuf {
        self.recordings_dir.join(format!(
            "{}{}.{}",
            RECORDING_PREFIX,
            millis,
            self.recorder.container().extension()
        ))
    }

    async fn start_recording(&self) -> Result<PathBuf, ChannelError> {
        let mut state = self.state.lock().await;

        if let Some(active) = state.recording_path() {
            return Err(ChannelError::RecordingInProgress(active.to_path_buf()));
        }

        std::fs::create_dir_all(&self.recordings_dir)
            .with_context(|| {
                format!(
                    "Failed to create recordings directory: {}",
                    self.recordings_dir.display()
                )
            })
            .map_err(ChannelError::Record)?;

        let path = self.recording_path(self.clock.now_millis());
        if path.exists() {
            return Err(ChannelError::Record(anyhow::anyhow!(
                "Recording destination already exists: {}",
                path.display()
            )));
        }

        let handle = match self.recorder.start(&path).await {
            Ok(handle) => handle,
            Err(e) => {
                discard_partial(&path);
                return Err(ChannelError::Record(e.context("Failed to start recorder")));
            }
        };

        info!("Recording to {}", path.display());

        if let Err(session) = state.begin_recording(RecordingSession::new(handle)) {
            warn!("Recorder slot taken while locked, releasing {}", path.display());
            if let Err(e) = session.finish().await {
                warn!("Failed to release rejected recording: {:#}", e);
            }
            return Err(ChannelError::RecordingInProgress(path));
        }

        Ok(path)
    }

    async fn stop_recording(&self) -> Result<(), ChannelError> {
        // Held until the file is finalized so no other command overlaps the stop
        let mut state = self.state.lock().await;
        let session = state.take_recording().ok_or(ChannelError::NotRecording)?;

        let path = session.path().to_path_buf();
        let summary = session
            .finish()
            .await
            .with_context(|| format!("Failed to finalize recording {}", path.display()))
            .map_err(ChannelError::Stop)?;

        info!(
            "Recording saved: {} ({:.1}s)",
            path.display(),
            summary.duration_seconds()
        );

        Ok(())
    }

    async fn play_audio(&self, file_path: &Path) -> Result<(), ChannelError> {
        if !file_path.is_file() {
            return Err(ChannelError::FileNotFound(file_path.to_path_buf()));
        }

        let mut state = self.state.lock().await;

        if state
            .recording_path()
            .is_some_and(|recording| same_file(recording, file_path))
        {
            return Err(ChannelError::Playback(anyhow::anyhow!(
                "{} is still being recorded",
                file_path.display()
            )));
        }

        if let Some(previous) = state.take_playback() {
            if previous.is_finished() {
                info!("Previous playback finished: {}", previous.path().display());
            } else {
                info!("Stopping previous playback: {}", previous.path().display());
            }
            if let Err(e) = previous.finish().await {
                warn!("Failed to stop previous playback: {:#}", e);
            }
        }

        let handle = self
            .player
            .play(file_path)
            .await
            .with_context(|| format!("Failed to play {}", file_path.display()))
            .map_err(ChannelError::Playback)?;

        state.replace_playback(PlaybackSession::new(handle));

        Ok(())
    }

    /// Release every session (recording is finalized)
    pub async fn shutdown(&self) {
        let (recording, playback) = self.state.lock().await.drain();

        if let Some(session) = recording {
            let path = session.path().to_path_buf();
            match session.finish().await {
                Ok(_) => info!("Finalized recording on shutdown: {}", path.display()),
                Err(e) => warn!("Failed to finalize recording on shutdown: {:#}", e),
            }
        }

        if let Some(session) = playback {
            if !session.is_finished() {
                info!("Stopping playback on shutdown: {}", session.path().display());
            }
            if let Err(e) = session.finish().await {
                warn!("Failed to stop playback on shutdown: {:#}", e);
            }
        }
    }
}

/// Whether two paths name the same file, resolving `.`, `..` and symlinks
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Remove whatever a failed recorder start left at `path`
fn discard_partial(path: &Path) {
    if path.exists() {
        match std::fs::remove_file(path) {
            Ok(()) => info!("Removed partial recording {}", path.display()),
            Err(e) => warn!("Failed to remove partial recording {}: {}", path.display(), e),
        }
    }
}
