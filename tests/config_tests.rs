// Configuration loading: defaults, file overrides, recordings directory

use anyhow::Result;
use std::path::PathBuf;
use tempfile::TempDir;
use voice_channel::audio::AudioContainer;
use voice_channel::config::{Config, NatsConfig};
use voice_channel::CHANNEL_NAME;

#[test]
fn test_defaults_without_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let missing = temp_dir.path().join("absent");

    let cfg = Config::load(missing.to_str().unwrap())?;

    assert_eq!(cfg.channel.name, CHANNEL_NAME);
    assert_eq!(cfg.audio.sample_rate(), Some(44100));
    assert_eq!(cfg.audio.channels(), Some(1));
    assert_eq!(cfg.audio.container, AudioContainer::AacAdts);
    assert!(!cfg.nats.enabled);
    assert!(cfg.http.enabled);
    assert_eq!(cfg.http.address(), "127.0.0.1:3030");

    Ok(())
}

#[test]
fn test_file_overrides_defaults() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("voice.toml");
    std::fs::write(
        &path,
        r#"
[channel]
name = "demo/voice"

[audio]
recordings_path = "/var/tmp/voice"
sample_rate = 0
channels = 2
container = "wav"

[http]
port = 8080
"#,
    )?;

    let cfg = Config::load(path.to_str().unwrap())?;

    assert_eq!(cfg.channel.name, "demo/voice");
    assert_eq!(cfg.audio.sample_rate(), None, "0 keeps the device default");
    assert_eq!(cfg.audio.channels(), Some(2));
    assert_eq!(cfg.audio.container, AudioContainer::Wav);
    assert_eq!(cfg.audio.recordings_dir()?, PathBuf::from("/var/tmp/voice"));
    assert_eq!(cfg.http.address(), "127.0.0.1:8080");

    Ok(())
}

#[test]
fn test_default_recordings_dir_is_cache() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let cfg = Config::load(temp_dir.path().join("absent").to_str().unwrap())?;

    // Platforms without a home directory have no cache dir
    if let Ok(dir) = cfg.audio.recordings_dir() {
        assert!(dir.ends_with("recordings"));
    }

    Ok(())
}

#[test]
fn test_nats_subject_for_channel() {
    assert_eq!(NatsConfig::subject_for("ai.assistant/voice"), "ai.assistant.voice");
}
