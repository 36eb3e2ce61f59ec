use std::path::Path;

use super::active::{PlaybackSession, RecordingSession};

/// Session slots owned by the dispatcher
///
/// Holds at most one recording and at most one playback. All transitions go
/// through these methods; callers serialize access with a single mutex.
#[derive(Default)]
pub struct SessionState {
    recording: Option<RecordingSession>,
    playback: Option<PlaybackSession>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Destination of the active recording, if any
    pub fn recording_path(&self) -> Option<&Path> {
        self.recording.as_ref().map(|s| s.path())
    }

    /// Source of the tracked playback, if any
    pub fn playback_path(&self) -> Option<&Path> {
        self.playback.as_ref().map(|s| s.path())
    }

    /// Idle -> Recording
    ///
    /// Hands the session back untouched if a recording is already active.
    pub fn begin_recording(&mut self, session: RecordingSession) -> Result<(), RecordingSession> {
        if self.recording.is_some() {
            return Err(session);
        }
        self.recording = Some(session);
        Ok(())
    }

    /// Recording -> Idle
    pub fn take_recording(&mut self) -> Option<RecordingSession> {
        self.recording.take()
    }

    /// Track a new playback, returning the one it displaces
    pub fn replace_playback(&mut self, session: PlaybackSession) -> Option<PlaybackSession> {
        self.playback.replace(session)
    }

    pub fn take_playback(&mut self) -> Option<PlaybackSession> {
        self.playback.take()
    }

    /// Take the tracked playback only if it has played to the end
    pub fn take_finished_playback(&mut self) -> Option<PlaybackSession> {
        if self.playback.as_ref().is_some_and(|s| s.is_finished()) {
            return self.playback.take();
        }
        None
    }

    /// Empty both slots (teardown)
    pub fn drain(&mut self) -> (Option<RecordingSession>, Option<PlaybackSession>) {
        (self.recording.take(), self.playback.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ActivePlayback, ActiveRecording, RecordingSummary};
    use anyhow::Result;
    use chrono::Utc;
    use std::path::PathBuf;

    struct StubRecording(PathBuf);

    #[async_trait::async_trait]
    impl ActiveRecording for StubRecording {
        fn output_path(&self) -> &Path {
            &self.0
        }

        async fn stop(self: Box<Self>) -> Result<RecordingSummary> {
            Ok(RecordingSummary {
                samples_written: 0,
                sample_rate: 16000,
                channels: 1,
                started_at: Utc::now(),
            })
        }
    }

    struct StubPlayback(PathBuf, bool);

    #[async_trait::async_trait]
    impl ActivePlayback for StubPlayback {
        fn source_path(&self) -> &Path {
            &self.0
        }

        fn is_finished(&self) -> bool {
            self.1
        }

        async fn stop(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    fn recording(path: &str) -> RecordingSession {
        RecordingSession::new(Box::new(StubRecording(PathBuf::from(path))))
    }

    fn playback(path: &str) -> PlaybackSession {
        PlaybackSession::new(Box::new(StubPlayback(PathBuf::from(path), false)))
    }

    fn finished_playback(path: &str) -> PlaybackSession {
        PlaybackSession::new(Box::new(StubPlayback(PathBuf::from(path), true)))
    }

    #[test]
    fn test_second_recording_is_handed_back() {
        let mut state = SessionState::new();
        assert!(state.begin_recording(recording("/tmp/a.aac")).is_ok());

        let rejected = state
            .begin_recording(recording("/tmp/b.aac"))
            .expect_err("second recording must be rejected");
        assert_eq!(rejected.path(), Path::new("/tmp/b.aac"));
        assert_eq!(state.recording_path(), Some(Path::new("/tmp/a.aac")));
    }

    #[test]
    fn test_take_recording_returns_to_idle() {
        let mut state = SessionState::new();
        state.begin_recording(recording("/tmp/a.aac")).ok();

        assert!(state.take_recording().is_some());
        assert!(!state.is_recording());
        assert!(state.take_recording().is_none());
    }

    #[test]
    fn test_replace_playback_returns_previous() {
        let mut state = SessionState::new();
        assert!(state.replace_playback(playback("/tmp/one.aac")).is_none());

        let previous = state.replace_playback(playback("/tmp/two.aac"));
        assert_eq!(previous.map(|p| p.path().to_path_buf()), Some(PathBuf::from("/tmp/one.aac")));
        assert_eq!(state.playback_path(), Some(Path::new("/tmp/two.aac")));
    }

    #[test]
    fn test_drain_empties_both_slots() {
        let mut state = SessionState::new();
        state.begin_recording(recording("/tmp/a.aac")).ok();
        state.replace_playback(playback("/tmp/b.aac"));

        let (rec, play) = state.drain();
        assert!(rec.is_some());
        assert!(play.is_some());
        assert!(!state.is_recording());
        assert!(state.playback_path().is_none());
    }

    #[test]
    fn test_only_finished_playback_is_taken() {
        let mut state = SessionState::new();
        state.replace_playback(playback("/tmp/long.aac"));
        assert!(state.take_finished_playback().is_none());
        assert_eq!(state.playback_path(), Some(Path::new("/tmp/long.aac")));

        state.replace_playback(finished_playback("/tmp/short.aac"));
        let taken = state.take_finished_playback().map(|p| p.path().to_path_buf());
        assert_eq!(taken, Some(PathBuf::from("/tmp/short.aac")));
        assert!(state.playback_path().is_none());
    }
}
