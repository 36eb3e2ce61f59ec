// Microphone capture backend using cpal
//
// The cpal stream is not `Send`, so each capture owns a dedicated thread that
// builds the stream and forwards samples from the device callback through a
// crossbeam channel to the file encoder (AAC/ADTS by default, or 16-bit PCM
// WAV). The handle returned to the dispatcher only holds the stop signal and
// the thread's join handle.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

use super::adts::AdtsSink;
use super::backend::{ActiveRecording, AudioContainer, RecorderBackend, RecordingSummary};
use super::device::negotiate;

/// Requested capture format; `None` keeps the device default
#[derive(Debug, Clone, Default)]
pub struct CaptureConfig {
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub container: AudioContainer,
}

/// Recorder backed by the default input device
pub struct CpalRecorder {
    config: CaptureConfig,
}

impl CpalRecorder {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl RecorderBackend for CpalRecorder {
    fn container(&self) -> AudioContainer {
        self.config.container
    }

    async fn start(&self, output: &Path) -> Result<Box<dyn ActiveRecording>> {
        let output = output.to_path_buf();
        let config = self.config.clone();

        // Device negotiation blocks, keep it off the runtime threads
        let capture = tokio::task::spawn_blocking(move || CpalCapture::spawn(output, config))
            .await
            .context("Capture setup task panicked")??;

        Ok(Box::new(capture))
    }
}

/// A running capture
struct CpalCapture {
    output: PathBuf,
    started_at: DateTime<Utc>,
    sample_rate: u32,
    channels: u16,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<Result<u64>>>,
}

impl CpalCapture {
    fn spawn(output: PathBuf, config: CaptureConfig) -> Result<Self> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(u32, u16)>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        let thread_output = output.clone();
        let thread = thread::Builder::new()
            .name("voice-capture".to_string())
            .spawn(move || run_capture(thread_output, config, ready_tx, stop_rx))
            .context("Failed to spawn capture thread")?;

        match ready_rx.recv() {
            Ok(Ok((sample_rate, channels))) => {
                info!(
                    "Capture started: {} ({}Hz, {} channels)",
                    output.display(),
                    sample_rate,
                    channels
                );
                Ok(Self {
                    output,
                    started_at: Utc::now(),
                    sample_rate,
                    channels,
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
                bail!("Capture thread exited before the stream started")
            }
        }
    }

    /// Signal the capture thread and wait for the file to be finalized
    fn finish(&mut self) -> Result<u64> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| anyhow!("Capture thread panicked"))?,
            None => Ok(0),
        }
    }
}

#[async_trait::async_trait]
impl ActiveRecording for CpalCapture {
    fn output_path(&self) -> &Path {
        &self.output
    }

    async fn stop(self: Box<Self>) -> Result<RecordingSummary> {
        let mut capture = self;
        let started_at = capture.started_at;
        let sample_rate = capture.sample_rate;
        let channels = capture.channels;

        let samples_written = tokio::task::spawn_blocking(move || capture.finish())
            .await
            .context("Capture shutdown task panicked")??;

        Ok(RecordingSummary {
            samples_written,
            sample_rate,
            channels,
            started_at,
        })
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        if self.thread.is_some() {
            warn!("Capture dropped while running, finalizing {}", self.output.display());
            if let Err(e) = self.finish() {
                warn!("Failed to finalize capture on drop: {:#}", e);
            }
        }
    }
}

fn run_capture(
    output: PathBuf,
    config: CaptureConfig,
    ready_tx: Sender<Result<(u32, u16)>>,
    stop_rx: Receiver<()>,
) -> Result<u64> {
    let (stream, samples_rx, format) = match open_input(&config) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return Ok(0);
        }
    };

    // Created only once the device is delivering audio
    let mut sink = match CaptureSink::create(config.container, &output, format.0, format.1) {
        Ok(sink) => sink,
        Err(e) => {
            drop(stream);
            discard(&output);
            let _ = ready_tx.send(Err(e));
            return Ok(0);
        }
    };

    let _ = ready_tx.send(Ok(format));

    loop {
        crossbeam_channel::select! {
            recv(samples_rx) -> chunk => match chunk {
                Ok(chunk) => sink.write(&chunk)?,
                Err(_) => break,
            },
            // Explicit stop or the handle went away
            recv(stop_rx) -> _ => break,
        }
    }

    // Dropping the stream ends the callbacks and disconnects the sender
    drop(stream);
    for chunk in samples_rx.try_iter() {
        sink.write(&chunk)?;
    }

    sink.finalize()
}

/// Remove a destination a failed start may have left behind
fn discard(output: &Path) {
    if output.exists() {
        if let Err(e) = std::fs::remove_file(output) {
            warn!("Failed to remove {}: {}", output.display(), e);
        }
    }
}

fn open_input(config: &CaptureConfig) -> Result<(cpal::Stream, Receiver<Vec<f32>>, (u32, u16))> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    info!(
        "Using audio input device: {}",
        device.name().unwrap_or_else(|_| "unknown".to_string())
    );

    let default = device
        .default_input_config()
        .context("Failed to query input device configuration")?;
    let ranges = device
        .supported_input_configs()
        .context("Failed to query supported input configurations")?;
    let supported = negotiate(ranges, default, config.sample_rate, config.channels);

    let sample_format = supported.sample_format();
    let stream_config: StreamConfig = supported.into();

    let (tx, rx) = crossbeam_channel::unbounded::<Vec<f32>>();
    let stream = match sample_format {
        SampleFormat::F32 => build_input::<f32>(&device, &stream_config, tx),
        SampleFormat::I16 => build_input::<i16>(&device, &stream_config, tx),
        SampleFormat::U16 => build_input::<u16>(&device, &stream_config, tx),
        SampleFormat::I32 => build_input::<i32>(&device, &stream_config, tx),
        other => bail!("Unsupported input sample format: {:?}", other),
    }?;

    stream.play().context("Failed to start input stream")?;

    Ok((
        stream,
        rx,
        (stream_config.sample_rate.0, stream_config.channels),
    ))
}

fn build_input<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    tx: Sender<Vec<f32>>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(data.iter().map(|&s| f32::from_sample(s)).collect());
            },
            |err| error!("Audio input stream error: {}", err),
            None,
        )
        .with_context(|| {
            format!(
                "Failed to build input stream ({}Hz, {} channels)",
                config.sample_rate.0, config.channels
            )
        })
}

/// Encoder for the configured container
enum CaptureSink {
    Adts(AdtsSink),
    Wav(WavSink),
}

impl CaptureSink {
    fn create(container: AudioContainer, path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        Ok(match container {
            AudioContainer::AacAdts => CaptureSink::Adts(AdtsSink::create(path, sample_rate, channels)?),
            AudioContainer::Wav => CaptureSink::Wav(WavSink::create(path, sample_rate, channels)?),
        })
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        match self {
            CaptureSink::Adts(sink) => sink.write(samples),
            CaptureSink::Wav(sink) => sink.write(samples),
        }
    }

    fn finalize(self) -> Result<u64> {
        match self {
            CaptureSink::Adts(sink) => sink.finalize(),
            CaptureSink::Wav(sink) => sink.finalize(),
        }
    }
}

/// 16-bit PCM WAV writer fed with f32 samples
pub struct WavSink {
    writer: hound::WavWriter<BufWriter<File>>,
    samples_written: u64,
}

impl WavSink {
    pub fn create(path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        Ok(Self {
            writer,
            samples_written: 0,
        })
    }

    /// Append interleaved samples, clamping to [-1.0, 1.0]
    pub fn write(&mut self, samples: &[f32]) -> Result<()> {
        for &sample in samples {
            let amplitude = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            self.writer
                .write_sample(amplitude)
                .context("Failed to write sample to WAV")?;
        }
        self.samples_written += samples.len() as u64;
        Ok(())
    }

    /// Finalize the header; returns the number of samples written
    pub fn finalize(self) -> Result<u64> {
        self.writer
            .finalize()
            .context("Failed to finalize WAV file")?;
        Ok(self.samples_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_sink_clamps_and_counts() -> Result<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let path = temp_dir.path().join("sink.wav");

        let mut sink = WavSink::create(&path, 16000, 1)?;
        sink.write(&[0.0, 0.5, 2.0, -2.0])?;
        assert_eq!(sink.finalize()?, 4);

        let reader = hound::WavReader::open(&path)?;
        assert_eq!(reader.spec().sample_rate, 16000);
        let samples: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;
        assert_eq!(samples[0], 0);
        assert_eq!(samples[2], i16::MAX);
        assert_eq!(samples[3], -i16::MAX);

        Ok(())
    }

    #[test]
    fn test_wav_sink_rejects_missing_directory() {
        let result = WavSink::create(Path::new("/nonexistent/dir/out.wav"), 16000, 1);
        assert!(result.is_err(), "Creating a WAV in a missing directory should fail");
    }

    #[test]
    fn test_failed_sink_leaves_no_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("recording_1000.aac");

        let result = CaptureSink::create(AudioContainer::AacAdts, &path, 44100, 0);
        assert!(result.is_err());
        discard(&path);
        assert!(!path.exists(), "Rejected format must not leave a file behind");
    }

    #[test]
    fn test_discard_removes_partial_file() -> Result<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let path = temp_dir.path().join("recording_1000.wav");
        WavSink::create(&path, 16000, 1)?;
        assert!(path.exists());

        discard(&path);
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_recorder_start_without_device() {
        // May fail on CI without audio devices; must never panic or leave a file
        let temp_dir = tempfile::TempDir::new().unwrap();
        let output = temp_dir.path().join("recording_1000.aac");
        let recorder = CpalRecorder::new(CaptureConfig::default());
        match recorder.start(&output).await {
            Ok(recording) => {
                let _ = recording.stop().await;
            }
            Err(_) => assert!(!output.exists()),
        }
    }
}
