// Stream format negotiation and sample conversion
//
// Devices only open streams in formats they advertise. Capture and playback
// ask for a specific rate and channel count, take it when one of the
// advertised ranges contains it and fall back to the device default
// otherwise. Playback then converts the decoded file to whatever format was
// granted.

use anyhow::{Context, Result};
use cpal::{SampleFormat, SampleRate, SupportedStreamConfig, SupportedStreamConfigRange};
use rubato::{FftFixedIn, Resampler};
use tracing::{debug, warn};

/// Frames per resampler input block
const RESAMPLE_CHUNK: usize = 1024;

/// Sample formats the capture and playback callbacks are built for
pub fn is_supported_format(format: SampleFormat) -> bool {
    matches!(
        format,
        SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16 | SampleFormat::I32
    )
}

fn format_rank(format: SampleFormat) -> u8 {
    match format {
        SampleFormat::F32 => 3,
        SampleFormat::I32 => 2,
        SampleFormat::I16 => 1,
        _ => 0,
    }
}

/// Pick a stream config for the requested rate and channel count
///
/// `None` keeps the default's value. When no advertised range holds the
/// request, the device default is returned unchanged.
pub fn negotiate(
    ranges: impl IntoIterator<Item = SupportedStreamConfigRange>,
    default: SupportedStreamConfig,
    sample_rate: Option<u32>,
    channels: Option<u16>,
) -> SupportedStreamConfig {
    let rate = sample_rate.unwrap_or(default.sample_rate().0);
    let channels = channels.unwrap_or(default.channels());

    if rate == default.sample_rate().0
        && channels == default.channels()
        && is_supported_format(default.sample_format())
    {
        return default;
    }

    let selected = ranges
        .into_iter()
        .filter(|range| range.channels() == channels && is_supported_format(range.sample_format()))
        .filter_map(|range| range.try_with_sample_rate(SampleRate(rate)))
        .max_by_key(|config| format_rank(config.sample_format()));

    match selected {
        Some(config) => {
            debug!(
                "Negotiated {}Hz, {} channels, {:?}",
                rate,
                channels,
                config.sample_format()
            );
            config
        }
        None => {
            warn!(
                "Device does not offer {}Hz with {} channels, using its default {}Hz with {} channels",
                rate,
                channels,
                default.sample_rate().0,
                default.channels()
            );
            default
        }
    }
}

/// Change the channel count of interleaved samples
///
/// Downmixing to mono averages each frame; upmixing from mono copies the
/// sample into every channel. Other layouts map channel `i` to `i % from`.
pub fn remix(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    let (from, to) = (from as usize, to as usize);
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let frames = samples.chunks_exact(from);
    if to == 1 {
        return frames
            .map(|frame| frame.iter().sum::<f32>() / from as f32)
            .collect();
    }

    let mut out = Vec::with_capacity(samples.len() / from * to);
    for frame in frames {
        for channel in 0..to {
            out.push(frame[channel % from]);
        }
    }
    out
}

/// Resample interleaved samples from `from_rate` to `to_rate`
pub fn resample(samples: &[f32], channels: u16, from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    let channels = channels as usize;
    if from_rate == to_rate || samples.is_empty() || channels == 0 {
        return Ok(samples.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        RESAMPLE_CHUNK,
        2,
        channels,
    )
    .with_context(|| format!("Failed to create resampler {}Hz -> {}Hz", from_rate, to_rate))?;

    let frames = samples.len() / channels;
    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|channel| samples.iter().skip(channel).step_by(channels).copied().collect())
        .collect();

    let expected = (frames as u64 * to_rate as u64 / from_rate as u64) as usize;
    let mut resampled: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + RESAMPLE_CHUNK); channels];

    // One trailing block of silence pushes the filter delay out
    let mut position = 0;
    while position < frames + RESAMPLE_CHUNK {
        let needed = resampler.input_frames_next();
        let end = (position + needed).min(frames);
        let block: Vec<Vec<f32>> = planar
            .iter()
            .map(|channel| {
                let mut block = channel.get(position..end).unwrap_or_default().to_vec();
                block.resize(needed, 0.0);
                block
            })
            .collect();

        let output = resampler.process(&block, None).context("Resampling failed")?;
        for (dst, src) in resampled.iter_mut().zip(output) {
            dst.extend(src);
        }
        position += needed;
    }

    let length = resampled
        .iter()
        .map(Vec::len)
        .min()
        .unwrap_or(0)
        .min(expected);

    let mut interleaved = Vec::with_capacity(length * channels);
    for frame in 0..length {
        for channel in &resampled {
            interleaved.push(channel[frame]);
        }
    }
    Ok(interleaved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::SupportedBufferSize;

    fn range(channels: u16, min: u32, max: u32, format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    fn default_config() -> SupportedStreamConfig {
        SupportedStreamConfig::new(
            2,
            SampleRate(48000),
            SupportedBufferSize::Unknown,
            SampleFormat::F32,
        )
    }

    #[test]
    fn test_negotiate_uses_matching_range() {
        let ranges = vec![
            range(2, 8000, 96000, SampleFormat::F32),
            range(1, 8000, 48000, SampleFormat::I16),
            range(1, 8000, 48000, SampleFormat::F32),
        ];

        let config = negotiate(ranges, default_config(), Some(44100), Some(1));
        assert_eq!(config.sample_rate().0, 44100);
        assert_eq!(config.channels(), 1);
        assert_eq!(config.sample_format(), SampleFormat::F32);
    }

    #[test]
    fn test_negotiate_falls_back_to_default() {
        // Shared-mode style device: only its mix format is offered
        let ranges = vec![range(2, 48000, 48000, SampleFormat::F32)];

        let config = negotiate(ranges, default_config(), Some(44100), Some(1));
        assert_eq!(config.sample_rate().0, 48000);
        assert_eq!(config.channels(), 2);
    }

    #[test]
    fn test_negotiate_skips_unusable_formats() {
        let ranges = vec![range(1, 8000, 48000, SampleFormat::U8)];

        let config = negotiate(ranges, default_config(), Some(16000), Some(1));
        assert_eq!(config.channels(), 2, "U8-only range must not be selected");
    }

    #[test]
    fn test_negotiate_without_request_keeps_default() {
        let config = negotiate(Vec::new(), default_config(), None, None);
        assert_eq!(config.sample_rate().0, 48000);
        assert_eq!(config.channels(), 2);
    }

    #[test]
    fn test_remix_mono_and_stereo() {
        assert_eq!(remix(&[0.25, 0.75, -1.0, 1.0], 2, 1), vec![0.5, 0.0]);
        assert_eq!(remix(&[0.5, -0.5], 1, 2), vec![0.5, 0.5, -0.5, -0.5]);
        assert_eq!(remix(&[0.1, 0.2], 2, 2), vec![0.1, 0.2]);
    }

    #[test]
    fn test_resample_scales_length() -> Result<()> {
        let input: Vec<f32> = (0..44100)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 44100.0).sin() * 0.5)
            .collect();

        let output = resample(&input, 1, 44100, 48000)?;
        assert_eq!(output.len(), 48000);
        assert!(output.iter().all(|s| s.is_finite()));

        let stereo = resample(&remix(&input, 1, 2), 2, 44100, 22050)?;
        assert_eq!(stereo.len(), 22050 * 2);

        Ok(())
    }

    #[test]
    fn test_resample_same_rate_is_identity() -> Result<()> {
        let input = vec![0.1, -0.1, 0.2];
        assert_eq!(resample(&input, 1, 16000, 16000)?, input);
        Ok(())
    }
}
