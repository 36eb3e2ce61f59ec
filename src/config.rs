use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::audio::AudioContainer;
use crate::channel::CHANNEL_NAME;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub channel: ChannelConfig,
    pub audio: AudioConfig,
    pub nats: NatsConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    /// Empty means the platform cache directory
    pub recordings_path: String,
    /// Recording file format
    pub container: AudioContainer,
    /// 0 keeps the device default
    pub sample_rate: u32,
    /// 0 keeps the device default
    pub channels: u16,
}

#[derive(Debug, Deserialize)]
pub struct NatsConfig {
    pub enabled: bool,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Config {
    /// Load `path` (optional, any format the config crate knows) over the
    /// built-in defaults, then `VOICE_CHANNEL__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("channel.name", CHANNEL_NAME)?
            .set_default("audio.recordings_path", "")?
            .set_default("audio.container", "aac")?
            .set_default("audio.sample_rate", 44100)?
            .set_default("audio.channels", 1)?
            .set_default("nats.enabled", false)?
            .set_default("nats.url", "nats://localhost:4222")?
            .set_default("http.enabled", true)?
            .set_default("http.bind", "127.0.0.1")?
            .set_default("http.port", 3030)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("VOICE_CHANNEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        Ok(settings.try_deserialize()?)
    }
}

impl AudioConfig {
    /// Directory recordings are written to
    ///
    /// Expands `~` and environment variables in the configured path; falls back
    /// to `<cache dir>/recordings`.
    pub fn recordings_dir(&self) -> Result<PathBuf> {
        let configured = self.recordings_path.trim();
        if !configured.is_empty() {
            let expanded = shellexpand::full(configured)
                .with_context(|| format!("Invalid recordings path: {}", configured))?;
            return Ok(PathBuf::from(expanded.as_ref()));
        }

        let dirs = directories::ProjectDirs::from("ai", "assistant", "voice-channel")
            .context("Could not determine a cache directory for recordings")?;
        Ok(dirs.cache_dir().join("recordings"))
    }

    pub fn sample_rate(&self) -> Option<u32> {
        (self.sample_rate > 0).then_some(self.sample_rate)
    }

    pub fn channels(&self) -> Option<u16> {
        (self.channels > 0).then_some(self.channels)
    }
}

impl HttpConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl NatsConfig {
    /// NATS subject for a channel name (`/` is not a token separator there)
    pub fn subject_for(channel_name: &str) -> String {
        channel_name.replace('/', ".")
    }
}
