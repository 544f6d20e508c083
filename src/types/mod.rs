//! Core value types for the composer.
//!
//! - [`GenerationRequest`] and [`Style`]: what the caller asks for
//! - [`RawWaveform`] and [`NormalizedWaveform`]: audio between pipeline stages
//! - [`AudioArtifact`], [`GenerationOutcome`], [`CompositionRecord`]: what comes back

mod artifact;
mod request;
mod waveform;

pub use artifact::{AudioArtifact, AudioFormat, CompositionRecord, GenerationOutcome, OutputBase};
pub use request::{GenerationRequest, Style};
pub use waveform::{NormalizedWaveform, RawWaveform};
