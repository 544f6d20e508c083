//! WAV file I/O.
//!
//! Output files are 16-bit PCM mono, written with the hound crate.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::Result;

/// Number of channels in every written file.
pub const CHANNELS: u16 = 1;

/// Bit depth of every written file.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Converts a sample in `[-1.0, 1.0]` to 16-bit PCM, rounding to nearest.
pub fn quantize(sample: f32) -> i16 {
    (sample * i16::MAX as f32).round() as i16
}

/// Writes mono samples to a 16-bit PCM WAV file.
///
/// Samples must already be clipped to `[-1.0, 1.0]`.
pub fn write_wav_pcm16(samples: &[f32], path: &Path, sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: CHANNELS,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(quantize(sample))?;
    }
    writer.finalize()?;

    Ok(())
}

/// Reads a 16-bit PCM WAV file, returning its samples and spec.
pub fn read_wav_pcm16(path: &Path) -> Result<(Vec<i16>, WavSpec)> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = reader
        .into_samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((samples, spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn quantize_rounds_and_spans_full_range() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(1.0), 32767);
        assert_eq!(quantize(-1.0), -32767);
        // 0.5 * 32767 = 16383.5 rounds away from zero
        assert_eq!(quantize(0.5), 16384);
        assert_eq!(quantize(-0.5), -16384);
    }

    #[test]
    fn write_wav_creates_mono_pcm16() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.wav");

        let samples = vec![0.0f32, 0.25, -0.25, 1.0, -1.0];
        write_wav_pcm16(&samples, &path, 16_000).unwrap();

        let (decoded, spec) = read_wav_pcm16(&path).unwrap();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, SampleFormat::Int);
        assert_eq!(decoded, vec![0, 8192, -8192, 32767, -32767]);
    }

    #[test]
    fn write_wav_fails_for_missing_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("clip.wav");
        assert!(write_wav_pcm16(&[0.0], &path, 16_000).is_err());
    }
}
