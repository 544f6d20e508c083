//! Model Backend Adapter and the MusicGen ONNX components behind it.
//!
//! - [`ModelBackend`](backend::ModelBackend): the seam the orchestrator calls
//! - [`MusicGenBackend`](backend::MusicGenBackend): lazily loaded MusicGen
//! - [`Accelerator`](device::Accelerator): execution provider selection
//! - [`MusicGenTextEncoder`](text_encoder::MusicGenTextEncoder): prompt encoding
//! - [`MusicGenDecoder`](decoder::MusicGenDecoder): autoregressive token generation
//! - [`MusicGenAudioCodec`](audio_codec::MusicGenAudioCodec): tokens to audio
//! - [`DelayPatternMaskIds`](delay_pattern::DelayPatternMaskIds): 4-codebook delay pattern
//! - [`Logits`](logits::Logits): guidance and top-k sampling

pub mod audio_codec;
pub mod backend;
pub mod decoder;
pub mod delay_pattern;
pub mod device;
pub mod downloader;
pub mod loader;
pub mod logits;
pub mod text_encoder;

// Re-export commonly used types
pub use audio_codec::MusicGenAudioCodec;
pub use backend::{token_budget, LazyHandle, ModelBackend, MusicGenBackend, TOKENS_PER_SECOND};
pub use decoder::MusicGenDecoder;
pub use delay_pattern::{DelayPatternMaskIds, CODEBOOKS};
pub use device::Accelerator;
pub use downloader::ensure_models;
pub use loader::{
    check_models, load_models, ModelConfig, MusicGenModels, MODEL_URLS, REQUIRED_MODEL_FILES,
};
pub use logits::{Logits, DEFAULT_TOP_K};
pub use text_encoder::{EncodedPrompt, MusicGenTextEncoder};
