//! composer: style-conditioned instrumental clip generation.
//!
//! A request (style, optional hint, duration) becomes a prompt, the prompt
//! goes through MusicGen on ONNX Runtime, and the output is normalized to an
//! exact mono length and stored as WAV or MP3 under a media root. When any
//! of that fails, a silent WAV of the requested duration is stored instead,
//! so the caller always gets a playable file.
//!
//! # Modules
//!
//! - [`generation`]: the [`Composer`] orchestrator, prompts, file naming
//! - [`models`]: the [`ModelBackend`] seam and the MusicGen implementation
//! - [`audio`]: post-processing, resampling, WAV and MP3 output
//! - [`types`]: requests, waveforms, artifacts, records
//! - [`config`]: runtime configuration ([`ComposerConfig`], [`Device`])
//! - [`error`]: error types and codes ([`ComposerError`], [`ErrorCode`])
//!
//! # Example
//!
//! ```rust,ignore
//! use composer::{ComposerConfig, Composer, GenerationRequest, Style};
//!
//! let config = ComposerConfig::from_env();
//! let composer = Composer::from_config(&config);
//!
//! let request = GenerationRequest::new(Style::Jazz, Some("late night".into()), 12)?;
//! let outcome = composer.generate(&request)?;
//! println!("stored {}", outcome.relative_path());
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod models;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use config::{ComposerConfig, Device};
pub use error::{ComposerError, ErrorCode, Result};
pub use generation::Composer;
pub use models::{ModelBackend, MusicGenBackend};
pub use types::{
    AudioArtifact, AudioFormat, CompositionRecord, GenerationOutcome, GenerationRequest,
    NormalizedWaveform, RawWaveform, Style,
};
