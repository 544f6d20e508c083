//! Model loader for MusicGen ONNX models.
//!
//! Handles loading all required model components and configuration.

use std::path::Path;

use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::Session;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ComposerError, Result};

use super::audio_codec::MusicGenAudioCodec;
use super::decoder::MusicGenDecoder;
use super::device::Accelerator;
use super::text_encoder::MusicGenTextEncoder;

/// Decoder parameters needed at inference time.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Number of decoder transformer layers (one KV cache entry each).
    pub num_hidden_layers: usize,
    /// Token used to pad delayed codebooks.
    pub pad_token_id: i64,
    /// Native output rate of the EnCodec decoder in Hz.
    pub sample_rate: u32,
}

impl Default for ModelConfig {
    /// musicgen-small.
    fn default() -> Self {
        Self {
            num_hidden_layers: 24,
            pad_token_id: 2048,
            sample_rate: 32_000,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    decoder: DecoderSection,
    #[serde(default)]
    audio_encoder: Option<AudioEncoderSection>,
}

#[derive(Deserialize)]
struct DecoderSection {
    #[serde(default)]
    num_hidden_layers: Option<usize>,
    #[serde(default)]
    pad_token_id: Option<i64>,
}

#[derive(Deserialize)]
struct AudioEncoderSection {
    #[serde(default)]
    sampling_rate: Option<u32>,
}

impl ModelConfig {
    /// Parses the HuggingFace `config.json` of a MusicGen export.
    ///
    /// Missing fields fall back to the musicgen-small values.
    pub fn from_json(content: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(content).map_err(|e| {
            ComposerError::model_load_failed(format!("Failed to parse config.json: {}", e))
        })?;

        let defaults = Self::default();
        Ok(Self {
            num_hidden_layers: file
                .decoder
                .num_hidden_layers
                .unwrap_or(defaults.num_hidden_layers),
            pad_token_id: file.decoder.pad_token_id.unwrap_or(defaults.pad_token_id),
            sample_rate: file
                .audio_encoder
                .and_then(|a| a.sampling_rate)
                .unwrap_or(defaults.sample_rate),
        })
    }

    /// Loads `config.json` from the model directory, or the defaults if absent.
    pub fn load_or_default(model_dir: &Path) -> Result<Self> {
        let config_path = model_dir.join("config.json");
        if !config_path.exists() {
            debug!("config.json not found, using musicgen-small defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            ComposerError::model_load_failed(format!("Failed to read config.json: {}", e))
        })?;
        Self::from_json(&content)
    }
}

/// Session settings shared by every ONNX model of the ensemble.
#[derive(Default)]
pub struct SessionOptions<'a> {
    /// Execution providers to register, in priority order.
    pub providers: &'a [ExecutionProviderDispatch],
    /// Intra-op thread count. None lets ONNX Runtime decide.
    pub threads: Option<u32>,
}

/// Builds an ONNX Runtime session for one model file.
pub fn load_session(path: &Path, options: &SessionOptions<'_>) -> Result<Session> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut builder = Session::builder()
        .map_err(|e| ComposerError::model_load_failed(format!("Failed to create session: {}", e)))?;

    if !options.providers.is_empty() {
        builder = builder
            .with_execution_providers(options.providers)
            .map_err(|e| {
                ComposerError::model_load_failed(format!(
                    "Failed to set execution providers: {}",
                    e
                ))
            })?;
    }

    if let Some(threads) = options.threads {
        builder = builder.with_intra_threads(threads as usize).map_err(|e| {
            ComposerError::model_load_failed(format!("Failed to set thread count: {}", e))
        })?;
    }

    builder.commit_from_file(path).map_err(|e| {
        ComposerError::model_load_failed(format!("Failed to load {}: {}", file_name, e))
    })
}

/// Complete set of loaded MusicGen models.
pub struct MusicGenModels {
    /// Text encoder for converting prompts to embeddings.
    pub text_encoder: MusicGenTextEncoder,
    /// Decoder for autoregressive token generation.
    pub decoder: MusicGenDecoder,
    /// Audio codec for converting tokens to audio samples.
    pub audio_codec: MusicGenAudioCodec,
    /// Model configuration.
    pub config: ModelConfig,
    /// Accelerator the sessions were built for.
    pub accelerator: Accelerator,
}

impl std::fmt::Debug for MusicGenModels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicGenModels")
            .field("config", &self.config)
            .field("device", &self.accelerator.device)
            .finish_non_exhaustive()
    }
}

/// Required model files for MusicGen.
pub const REQUIRED_MODEL_FILES: &[&str] = &[
    "tokenizer.json",
    "text_encoder.onnx",
    "decoder_model.onnx",
    "decoder_with_past_model.onnx",
    "encodec_decode.onnx",
];

/// Files that are fetched when present upstream but are not required.
pub const OPTIONAL_MODEL_FILES: &[&str] = &["config.json"];

/// Checks if all required model files exist in the directory.
///
/// Returns Ok(()) if all files exist, or an error listing missing files.
pub fn check_models(model_dir: &Path) -> Result<()> {
    let missing = missing_model_files(model_dir);

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ComposerError::model_not_found(format!(
            "Missing model files in {}: {}",
            model_dir.display(),
            missing.join(", ")
        )))
    }
}

/// Lists the required files absent from `model_dir`.
pub fn missing_model_files(model_dir: &Path) -> Vec<&'static str> {
    REQUIRED_MODEL_FILES
        .iter()
        .copied()
        .filter(|file| !model_dir.join(file).exists())
        .collect()
}

/// Loads all MusicGen model sessions from a directory.
///
/// The directory should contain:
/// - `tokenizer.json` - HuggingFace tokenizer
/// - `text_encoder.onnx` - T5 text encoder
/// - `decoder_model.onnx` - First pass decoder
/// - `decoder_with_past_model.onnx` - Decoder with KV cache
/// - `encodec_decode.onnx` - EnCodec audio decoder
///
/// Optionally `config.json` (defaults are used if not present).
pub fn load_models(
    model_dir: &Path,
    accelerator: Accelerator,
    threads: Option<u32>,
) -> Result<MusicGenModels> {
    check_models(model_dir)?;

    let config = ModelConfig::load_or_default(model_dir)?;
    let options = SessionOptions {
        providers: &accelerator.providers,
        threads,
    };

    info!(dir = %model_dir.display(), device = %accelerator.device, "loading text encoder");
    let text_encoder = MusicGenTextEncoder::load(model_dir, &options)?;

    info!("loading decoder models");
    let decoder = MusicGenDecoder::load(model_dir, config.clone(), &options)?;

    info!("loading audio codec");
    let audio_codec = MusicGenAudioCodec::load(model_dir, &options)?;

    info!(layers = config.num_hidden_layers, "all models loaded");

    Ok(MusicGenModels {
        text_encoder,
        decoder,
        audio_codec,
        config,
        accelerator,
    })
}

/// HuggingFace model URLs for musicgen-small-fp16.
pub const MODEL_URLS: &[(&str, &str)] = &[
    (
        "config.json",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small/config.json",
    ),
    (
        "tokenizer.json",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small/tokenizer.json",
    ),
    (
        "text_encoder.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/text_encoder.onnx",
    ),
    (
        "decoder_model.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/decoder_model.onnx",
    ),
    (
        "decoder_with_past_model.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/decoder_with_past_model.onnx",
    ),
    (
        "encodec_decode.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/encodec_decode.onnx",
    ),
];

/// Download URL for a model file, if one is known.
pub fn model_url(file: &str) -> Option<&'static str> {
    MODEL_URLS
        .iter()
        .find(|(name, _)| *name == file)
        .map(|(_, url)| *url)
}
