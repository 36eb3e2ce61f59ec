// AAC-LC encoder writing an ADTS elementary stream
//
// Captured audio arrives as interleaved f32. It is converted to i16, fed to
// the fdk-aac encoder one frame at a time and each encoded ADTS frame is
// appended to the file. Inputs with more than two channels are downmixed to
// mono since the encoder is configured for mono or stereo only.

use anyhow::{anyhow, bail, Context, Result};
use fdk_aac::enc::{AudioObjectType, BitRate, ChannelMode, Encoder, EncoderParams, Transport};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::device::remix;

/// PCM frames per AAC-LC access unit
const FRAME_LEN: usize = 1024;

/// Silent frames fed on finalize to drain the encoder's lookahead
const FLUSH_FRAMES: usize = 3;

/// Upper bound for one encoded frame (6144 bits per channel)
const MAX_FRAME_BYTES: usize = 768 * 2;

pub struct AdtsSink {
    path: PathBuf,
    encoder: Encoder,
    writer: BufWriter<File>,
    input_channels: u16,
    encoded_channels: u16,
    pending: Vec<i16>,
    output: Vec<u8>,
    samples_written: u64,
}

impl AdtsSink {
    /// Set up the encoder, then create `path`
    ///
    /// Nothing is written to disk if the encoder rejects the format.
    pub fn create(path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        if channels == 0 {
            bail!("Cannot encode audio with zero channels");
        }

        let (encoded_channels, mode) = if channels == 2 {
            (2, ChannelMode::Stereo)
        } else {
            (1, ChannelMode::Mono)
        };

        let encoder = Encoder::new(EncoderParams {
            bit_rate: BitRate::VbrMedium,
            sample_rate,
            transport: Transport::Adts,
            channels: mode,
            audio_object_type: AudioObjectType::Mpeg4LowComplexity,
        })
        .map_err(|e| {
            anyhow!(
                "AAC encoder rejected {}Hz, {} channels: {:?}",
                sample_rate,
                encoded_channels,
                e
            )
        })?;

        let file = File::create(path)
            .with_context(|| format!("Failed to create AAC file: {:?}", path))?;

        debug!(
            "AAC encoder ready: {}Hz, {} input channels -> {} encoded",
            sample_rate, channels, encoded_channels
        );

        Ok(Self {
            path: path.to_path_buf(),
            encoder,
            writer: BufWriter::new(file),
            input_channels: channels,
            encoded_channels,
            pending: Vec::with_capacity(FRAME_LEN * encoded_channels as usize * 2),
            output: vec![0; MAX_FRAME_BYTES],
            samples_written: 0,
        })
    }

    /// Append interleaved samples, clamping to [-1.0, 1.0]
    pub fn write(&mut self, samples: &[f32]) -> Result<()> {
        let mixed = remix(samples, self.input_channels, self.encoded_channels);
        self.pending.extend(
            mixed
                .iter()
                .map(|&sample| (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
        );
        self.samples_written += samples.len() as u64;
        self.encode_pending()
    }

    fn frame_samples(&self) -> usize {
        FRAME_LEN * self.encoded_channels as usize
    }

    fn encode_pending(&mut self) -> Result<()> {
        let frame = self.frame_samples();
        while self.pending.len() >= frame {
            let info = self
                .encoder
                .encode(&self.pending[..frame], &mut self.output)
                .map_err(|e| anyhow!("AAC encoding failed: {:?}", e))?;

            self.writer
                .write_all(&self.output[..info.output_size])
                .with_context(|| format!("Failed to write AAC frame to {:?}", self.path))?;

            if info.input_consumed == 0 {
                bail!("AAC encoder made no progress");
            }
            self.pending.drain(..info.input_consumed.min(self.pending.len()));
        }
        Ok(())
    }

    /// Encode what is buffered and flush the file; returns the number of
    /// input samples written
    pub fn finalize(mut self) -> Result<u64> {
        let frame = self.frame_samples();
        let padded = self.pending.len().div_ceil(frame) * frame + FLUSH_FRAMES * frame;
        self.pending.resize(padded, 0);
        self.encode_pending()?;

        self.writer
            .flush()
            .with_context(|| format!("Failed to flush AAC file {:?}", self.path))?;
        Ok(self.samples_written)
    }
}
