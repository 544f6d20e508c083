//! Waveform post-processing.
//!
//! Turns raw model output into a mono, clipped waveform of an exact length.

use crate::types::{NormalizedWaveform, RawWaveform};

/// Normalizes raw model output to exactly `target_duration_seconds * sample_rate`
/// mono samples in `[-1.0, 1.0]`.
///
/// Channels are averaged to mono, samples are clamped (NaN becomes silence),
/// then the result is truncated or right-padded with zeros. Truncation keeps
/// the leading samples untouched; there is no fade.
///
/// # Panics
///
/// Panics if the waveform has no channels, if its sample count is not a
/// multiple of the channel count, or if it is not at `sample_rate`. These are
/// adapter bugs, not runtime conditions.
pub fn normalize(
    raw: RawWaveform,
    target_duration_seconds: u32,
    sample_rate: u32,
) -> NormalizedWaveform {
    assert!(raw.channels > 0, "waveform must have at least one channel");
    assert_eq!(
        raw.samples.len() % raw.channels as usize,
        0,
        "sample count {} is not a multiple of {} channels",
        raw.samples.len(),
        raw.channels
    );
    assert_eq!(
        raw.sample_rate, sample_rate,
        "waveform must be resampled to the output rate before normalizing"
    );

    let mut samples = collapse_to_mono(raw.samples, raw.channels);
    clip_in_place(&mut samples);
    enforce_length(&mut samples, target_samples(target_duration_seconds, sample_rate));

    NormalizedWaveform::from_clean_samples(samples, sample_rate)
}

/// Number of samples a clip of `duration_seconds` holds at `sample_rate`.
pub fn target_samples(duration_seconds: u32, sample_rate: u32) -> usize {
    duration_seconds as usize * sample_rate as usize
}

/// Averages interleaved frames down to one channel.
fn collapse_to_mono(samples: Vec<f32>, channels: u16) -> Vec<f32> {
    if channels == 1 {
        return samples;
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn clip_in_place(samples: &mut [f32]) {
    for sample in samples.iter_mut() {
        *sample = if sample.is_nan() {
            0.0
        } else {
            sample.clamp(-1.0, 1.0)
        };
    }
}

fn enforce_length(samples: &mut Vec<f32>, desired: usize) {
    if samples.len() > desired {
        samples.truncate(desired);
    } else if samples.len() < desired {
        samples.resize(desired, 0.0);
    }
}
