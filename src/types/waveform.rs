//! Waveform value types passed between pipeline stages.

/// Model output before post-processing.
///
/// Multi-channel audio is stored interleaved: `[L, R, L, R, ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWaveform {
    /// Interleaved float samples.
    pub samples: Vec<f32>,
    /// Channel count (1 or 2).
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl RawWaveform {
    /// Creates a raw waveform.
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    /// Creates a single-channel raw waveform.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples, 1, sample_rate)
    }
}

/// Mono waveform with an exact sample count and every sample in `[-1.0, 1.0]`.
///
/// Only produced by [`crate::audio::normalize`] and [`NormalizedWaveform::silence`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWaveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl NormalizedWaveform {
    pub(crate) fn from_clean_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// All-zero waveform of exactly `duration_seconds * sample_rate` samples.
    pub fn silence(duration_seconds: u32, sample_rate: u32) -> Self {
        let len = duration_seconds as usize * sample_rate as usize;
        Self::from_clean_samples(vec![0.0; len], sample_rate)
    }

    /// The mono samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if the waveform holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl From<NormalizedWaveform> for RawWaveform {
    fn from(waveform: NormalizedWaveform) -> Self {
        RawWaveform::mono(waveform.samples, waveform.sample_rate)
    }
}
