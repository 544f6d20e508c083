//! Sample-rate conversion for model output.

use rubato::{FftFixedIn, Resampler};

use crate::error::{ComposerError, Result};

const CHUNK: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Resamples mono audio from `from_rate` to `to_rate`.
///
/// The output holds `ceil(len * to_rate / from_rate)` samples, aligned with the
/// input (the resampler's filter delay is removed).
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK, SUB_CHUNKS, 1)
            .map_err(|e| {
                ComposerError::model_inference_failed(format!("Failed to create resampler: {}", e))
            })?;

    let delay = resampler.output_delay();
    let expected = (samples.len() as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize;
    let mut out = Vec::with_capacity(expected + delay + CHUNK);

    let mut block = vec![Vec::with_capacity(CHUNK)];
    let mut pos = 0;
    while out.len() < expected + delay {
        let needed = resampler.input_frames_next();
        let end = (pos + needed).min(samples.len());

        // Past the end of the input the resampler is flushed with silence.
        block[0].clear();
        block[0].extend_from_slice(&samples[pos..end]);
        block[0].resize(needed, 0.0);
        pos = end;

        let frames = resampler.process(&block, None).map_err(|e| {
            ComposerError::model_inference_failed(format!("Resampling failed: {}", e))
        })?;
        out.extend_from_slice(&frames[0]);
    }

    out.drain(..delay);
    out.truncate(expected);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn same_rate_is_identity() {
        let input = vec![0.1f32, 0.2, 0.3];
        assert_eq!(resample(&input, 16_000, 16_000).unwrap(), input);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(resample(&[], 32_000, 16_000).unwrap().is_empty());
    }

    #[test]
    fn downsample_halves_length() {
        let input = sine(440.0, 32_000, 32_000);
        let out = resample(&input, 32_000, 16_000).unwrap();
        assert_eq!(out.len(), 16_000);

        let peak = out.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.3 && peak < 0.7, "unexpected peak {}", peak);
    }

    #[test]
    fn odd_lengths_round_up() {
        let input = sine(220.0, 32_000, 3_001);
        let out = resample(&input, 32_000, 16_000).unwrap();
        assert_eq!(out.len(), 1_501);
    }
}
