//! Prompt tokenization and T5 text encoding.

use std::path::Path;

use ort::session::Session;
use ort::value::{DynValue, Tensor};
use tokenizers::Tokenizer;

use crate::error::{ComposerError, Result};

use super::loader::{load_session, SessionOptions};

/// Encoded prompt handed to the decoder.
pub struct EncodedPrompt {
    /// `last_hidden_state` of the T5 encoder, shape `[1, tokens, d_model]`.
    pub hidden_states: DynValue,
    /// All-ones mask, shape `[1, tokens]`.
    pub attention_mask: DynValue,
    /// Number of prompt tokens.
    pub token_count: usize,
}

/// MusicGen text encoder combining tokenizer and T5 encoder.
pub struct MusicGenTextEncoder {
    tokenizer: Tokenizer,
    session: Session,
}

impl MusicGenTextEncoder {
    /// Loads `tokenizer.json` and `text_encoder.onnx` from the model directory.
    pub fn load(model_dir: &Path, options: &SessionOptions<'_>) -> Result<Self> {
        let mut tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json")).map_err(|e| {
            ComposerError::model_load_failed(format!("Failed to load tokenizer: {}", e))
        })?;

        tokenizer
            .with_padding(None)
            .with_truncation(None)
            .map_err(|e| {
                ComposerError::model_load_failed(format!("Failed to configure tokenizer: {}", e))
            })?;

        let session = load_session(&model_dir.join("text_encoder.onnx"), options)?;

        Ok(Self { tokenizer, session })
    }

    /// Tokenizes the prompt and runs the encoder.
    pub fn encode(&mut self, prompt: &str) -> Result<EncodedPrompt> {
        let tokens = prompt_token_ids(&self.tokenizer, prompt)?;
        let token_count = tokens.len();

        let input_ids = Tensor::from_array(([1, token_count], tokens)).map_err(|e| {
            ComposerError::model_inference_failed(format!("Failed to create input tensor: {}", e))
        })?;
        let input_mask = ones_mask(token_count)?;

        let mut output = self
            .session
            .run(ort::inputs![input_ids, input_mask])
            .map_err(|e| {
                ComposerError::model_inference_failed(format!(
                    "Text encoder inference failed: {}",
                    e
                ))
            })?;

        let hidden_states = output.remove("last_hidden_state").ok_or_else(|| {
            ComposerError::model_inference_failed("last_hidden_state not found in output")
        })?;

        Ok(EncodedPrompt {
            hidden_states,
            attention_mask: ones_mask(token_count)?.into_dyn(),
            token_count,
        })
    }
}

fn prompt_token_ids(tokenizer: &Tokenizer, prompt: &str) -> Result<Vec<i64>> {
    let encoding = tokenizer.encode(prompt, true).map_err(|e| {
        ComposerError::model_inference_failed(format!("Tokenization failed: {}", e))
    })?;

    let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
    if ids.is_empty() {
        return Err(ComposerError::model_inference_failed(
            "Prompt produced no tokens",
        ));
    }
    Ok(ids)
}

fn ones_mask(len: usize) -> Result<Tensor<i64>> {
    Tensor::from_array(([1, len], vec![1i64; len])).map_err(|e| {
        ComposerError::model_inference_failed(format!("Failed to create attention mask: {}", e))
    })
}
