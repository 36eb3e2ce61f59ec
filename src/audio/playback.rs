// File playback backend: symphonia decode + cpal output
//
// Like capture, the output stream lives on its own thread. The thread exits
// when every sample has been played or when the handle asks it to stop.
// Files whose format the device does not offer are remixed and resampled to
// the device default.

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

use super::backend::{ActivePlayback, PlayerBackend};
use super::device::{negotiate, remix, resample};
use super::file::AudioFile;

/// How often the playback thread checks for completion
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Player backed by the default output device
#[derive(Debug, Default)]
pub struct CpalPlayer;

impl CpalPlayer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl PlayerBackend for CpalPlayer {
    async fn play(&self, path: &Path) -> Result<Box<dyn ActivePlayback>> {
        let path = path.to_path_buf();

        let playback = tokio::task::spawn_blocking(move || CpalPlayback::spawn(path))
            .await
            .context("Playback setup task panicked")??;

        Ok(Box::new(playback))
    }
}

struct CpalPlayback {
    source: PathBuf,
    finished: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalPlayback {
    fn spawn(source: PathBuf) -> Result<Self> {
        let audio = AudioFile::open(&source)?;
        if audio.samples.is_empty() {
            bail!("{} contains no audio", source.display());
        }

        let finished = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        let thread_finished = Arc::clone(&finished);
        let thread = thread::Builder::new()
            .name("voice-playback".to_string())
            .spawn(move || run_playback(audio, thread_finished, ready_tx, stop_rx))
            .context("Failed to spawn playback thread")?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Playback started: {}", source.display());
                Ok(Self {
                    source,
                    finished,
                    stop_tx: Some(stop_tx),
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                bail!("Playback thread exited before the stream started")
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| anyhow!("Playback thread panicked")),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl ActivePlayback for CpalPlayback {
    fn source_path(&self) -> &Path {
        &self.source
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    async fn stop(self: Box<Self>) -> Result<()> {
        let mut playback = self;
        tokio::task::spawn_blocking(move || playback.finish())
            .await
            .context("Playback shutdown task panicked")?
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(e) = self.finish() {
                warn!("Failed to stop playback on drop: {:#}", e);
            }
        }
    }
}

fn run_playback(
    audio: AudioFile,
    finished: Arc<AtomicBool>,
    ready_tx: Sender<Result<()>>,
    stop_rx: Receiver<()>,
) {
    let stream = match open_output(audio, Arc::clone(&finished)) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let _ = ready_tx.send(Ok(()));

    loop {
        match stop_rx.recv_timeout(POLL_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if finished.load(Ordering::SeqCst) {
                    break;
                }
            }
        }
    }

    drop(stream);
}

fn open_output(audio: AudioFile, finished: Arc<AtomicBool>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No output device available"))?;

    info!(
        "Using audio output device: {}",
        device.name().unwrap_or_else(|_| "unknown".to_string())
    );

    let default = device
        .default_output_config()
        .context("Failed to query output device configuration")?;
    let ranges = device
        .supported_output_configs()
        .context("Failed to query supported output configurations")?;
    let supported = negotiate(ranges, default, Some(audio.sample_rate), Some(audio.channels));

    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let samples = convert(audio, &config)?;

    let stream = match sample_format {
        SampleFormat::F32 => build_output::<f32>(&device, &config, samples, finished),
        SampleFormat::I16 => build_output::<i16>(&device, &config, samples, finished),
        SampleFormat::U16 => build_output::<u16>(&device, &config, samples, finished),
        SampleFormat::I32 => build_output::<i32>(&device, &config, samples, finished),
        other => bail!("Unsupported output sample format: {:?}", other),
    }?;

    stream.play().context("Failed to start output stream")?;

    Ok(stream)
}

/// Bring decoded samples to the stream's channel count and rate
fn convert(audio: AudioFile, config: &StreamConfig) -> Result<Vec<f32>> {
    let channels = config.channels;
    let rate = config.sample_rate.0;
    if audio.channels == channels && audio.sample_rate == rate {
        return Ok(audio.samples);
    }

    info!(
        "Converting {} from {}Hz/{}ch to {}Hz/{}ch",
        audio.path,
        audio.sample_rate,
        audio.channels,
        rate,
        channels
    );

    let mixed = remix(&audio.samples, audio.channels, channels);
    resample(&mixed, channels, audio.sample_rate, rate)
        .with_context(|| format!("Cannot play {} at {}Hz", audio.path, rate))
}

fn build_output<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    samples: Vec<f32>,
    finished: Arc<AtomicBool>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let mut position = 0usize;

    device
        .build_output_stream(
            config,
            move |out: &mut [T], _: &cpal::OutputCallbackInfo| {
                for slot in out.iter_mut() {
                    let sample = match samples.get(position) {
                        Some(&sample) => {
                            position += 1;
                            sample
                        }
                        None => 0.0,
                    };
                    *slot = T::from_sample(sample);
                }
                if position >= samples.len() {
                    finished.store(true, Ordering::SeqCst);
                }
            },
            |err| error!("Audio output stream error: {}", err),
            None,
        )
        .with_context(|| {
            format!(
                "Failed to build output stream ({}Hz, {} channels)",
                config.sample_rate.0, config.channels
            )
        })
}
