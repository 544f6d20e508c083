//! Model Backend Adapter.
//!
//! [`ModelBackend`] is the seam between the orchestrator and the generative
//! model. [`MusicGenBackend`] implements it on top of the MusicGen ONNX
//! export, loading the sessions on first use through a [`LazyHandle`].

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use tracing::{debug, info};

use crate::audio::resample;
use crate::config::{ComposerConfig, Device};
use crate::error::{ComposerError, Result};
use crate::types::RawWaveform;

use super::device::Accelerator;
use super::downloader::ensure_models;
use super::loader::{load_models, MusicGenModels};

/// Decoder steps per second of target audio.
pub const TOKENS_PER_SECOND: usize = 50;

/// Text-to-audio model as seen by the orchestrator.
pub trait ModelBackend: Send + Sync {
    /// Generates a waveform for `prompt`, roughly `duration_seconds` long.
    ///
    /// Output length is approximate; the post-processor enforces it.
    /// Sampling is stochastic, so identical calls may differ.
    fn infer(&self, prompt: &str, duration_seconds: u32, guidance_scale: f32)
        -> Result<RawWaveform>;
}

/// Decoder step budget for a target duration.
pub fn token_budget(duration_seconds: u32) -> usize {
    duration_seconds as usize * TOKENS_PER_SECOND
}

/// A value built on first access and shared afterwards.
///
/// Concurrent first callers block while one of them runs the initializer.
/// A successful result is kept for the lifetime of the handle; a failed one
/// is not, so the next caller runs the initializer again.
pub struct LazyHandle<T> {
    value: OnceLock<T>,
    init: Mutex<()>,
}

impl<T> Default for LazyHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LazyHandle<T> {
    /// Creates an empty handle.
    pub const fn new() -> Self {
        Self {
            value: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// The value, if it has been initialized.
    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    /// Returns the value, running `init` if no caller has succeeded yet.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        // The guard protects no data.
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        let value = init()?;
        Ok(self.value.get_or_init(|| value))
    }
}

/// MusicGen running on ONNX Runtime.
///
/// Sessions are loaded on the first [`ModelBackend::infer`] call. Runs are
/// serialized because a session needs exclusive access while it executes.
pub struct MusicGenBackend {
    model_dir: PathBuf,
    device: Device,
    threads: Option<u32>,
    auto_download: bool,
    sample_rate: u32,
    models: LazyHandle<Mutex<MusicGenModels>>,
}

impl MusicGenBackend {
    /// Creates a backend for the export in `model_dir`, producing audio at
    /// `sample_rate`.
    pub fn new(model_dir: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self {
            model_dir: model_dir.into(),
            device: Device::Auto,
            threads: None,
            auto_download: false,
            sample_rate,
            models: LazyHandle::new(),
        }
    }

    /// Creates a backend from the runtime configuration.
    pub fn from_config(config: &ComposerConfig) -> Self {
        Self::new(config.effective_model_path(), config.sample_rate)
            .with_device(config.device)
            .with_threads(config.threads)
            .with_auto_download(config.auto_download)
    }

    /// Sets the preferred device.
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Sets the ONNX Runtime intra-op thread count.
    pub fn with_threads(mut self, threads: Option<u32>) -> Self {
        self.threads = threads;
        self
    }

    /// Downloads missing model files before loading.
    pub fn with_auto_download(mut self, auto_download: bool) -> Self {
        self.auto_download = auto_download;
        self
    }

    /// Directory the model is loaded from.
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// True once the sessions have been loaded.
    pub fn is_loaded(&self) -> bool {
        self.models.get().is_some()
    }

    fn models(&self) -> Result<&Mutex<MusicGenModels>> {
        self.models.get_or_try_init(|| self.load().map(Mutex::new))
    }

    fn load(&self) -> Result<MusicGenModels> {
        if self.auto_download {
            ensure_models(&self.model_dir)?;
        }

        let accelerator = Accelerator::select(self.device);
        load_models(&self.model_dir, accelerator, self.threads)
    }
}

impl ModelBackend for MusicGenBackend {
    fn infer(
        &self,
        prompt: &str,
        duration_seconds: u32,
        guidance_scale: f32,
    ) -> Result<RawWaveform> {
        let max_tokens = token_budget(duration_seconds);

        let (samples, native_rate) = {
            let mut guard = self.models()?.lock().map_err(|_| {
                ComposerError::model_inference_failed("model state poisoned by an earlier panic")
            })?;
            let models = &mut *guard;

            info!(tokens = max_tokens, guidance = guidance_scale, "generating");
            let encoded = models.text_encoder.encode(prompt)?;
            debug!(prompt_tokens = encoded.token_count, "prompt encoded");

            let frames = models
                .decoder
                .generate_tokens(encoded, max_tokens, guidance_scale)?;
            let samples = models.audio_codec.decode(&frames)?;
            (samples, models.config.sample_rate)
        };

        if samples.is_empty() {
            return Err(ComposerError::model_inference_failed(
                "model produced no audio",
            ));
        }

        let samples = resample(&samples, native_rate, self.sample_rate)?;
        Ok(RawWaveform::mono(samples, self.sample_rate))
    }
}
