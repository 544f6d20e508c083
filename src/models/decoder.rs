//! MusicGen decoder wrapper with KV cache support.
//!
//! The export is split in two graphs: `decoder_model.onnx` runs the first
//! step and produces the cache, `decoder_with_past_model.onnx` runs every
//! following step against it.

use std::borrow::Cow;
use std::path::Path;

use half::f16;
use ort::session::{Session, SessionInputValue, SessionOutputs};
use ort::tensor::PrimitiveTensorElementType;
use ort::value::{DynValue, Tensor};
use tracing::debug;

use crate::error::{ComposerError, Result};

use super::delay_pattern::{DelayPatternMaskIds, CODEBOOKS};
use super::loader::{load_session, ModelConfig, SessionOptions};
use super::logits::{Logits, DEFAULT_TOP_K};
use super::text_encoder::EncodedPrompt;

/// One de-delayed frame: a token per codebook.
pub type Frame = [i64; CODEBOOKS];

/// Conditional and unconditional rows for every codebook.
const GUIDED_BATCH: usize = CODEBOOKS * 2;

/// MusicGen decoder using split architecture with KV cache.
pub struct MusicGenDecoder {
    decoder_model: Session,
    decoder_with_past: Session,
    config: ModelConfig,
}

impl MusicGenDecoder {
    /// Loads `decoder_model.onnx` and `decoder_with_past_model.onnx`.
    pub fn load(model_dir: &Path, config: ModelConfig, options: &SessionOptions<'_>) -> Result<Self> {
        let decoder_model = load_session(&model_dir.join("decoder_model.onnx"), options)?;
        let decoder_with_past =
            load_session(&model_dir.join("decoder_with_past_model.onnx"), options)?;

        Ok(Self {
            decoder_model,
            decoder_with_past,
            config,
        })
    }

    /// Generates `max_len` frames of codebook tokens for the encoded prompt.
    ///
    /// The delay pattern drops `CODEBOOKS - 1` frames at the start, so that
    /// many extra steps are run to compensate.
    pub fn generate_tokens(
        &mut self,
        prompt: EncodedPrompt,
        max_len: usize,
        guidance_scale: f32,
    ) -> Result<Vec<Frame>> {
        let steps = max_len + CODEBOOKS - 1;
        let pad_token_id = self.config.pad_token_id;

        // Unconditional half of the batch sees an all-zero prompt.
        let hidden_states = duplicate_with_zeros(&prompt.hidden_states)?;
        let attention_mask = duplicate_with_zeros(&prompt.attention_mask)?;

        let input_ids = token_batch([pad_token_id; CODEBOOKS])?;
        let first_inputs: Vec<(Cow<str>, SessionInputValue)> = vec![
            (
                Cow::from("encoder_attention_mask"),
                SessionInputValue::from(attention_mask.view()),
            ),
            (
                Cow::from("encoder_hidden_states"),
                SessionInputValue::from(hidden_states.view()),
            ),
            (Cow::from("input_ids"), SessionInputValue::from(input_ids.view())),
        ];

        let mut outputs = self.decoder_model.run(first_inputs).map_err(|e| {
            ComposerError::model_inference_failed(format!("Initial decoder inference failed: {}", e))
        })?;

        let mut ids = DelayPatternMaskIds::<CODEBOOKS>::new();
        ids.push(sample_step(&mut outputs, guidance_scale)?);

        let mut cache = KvCache::from_first_pass(&mut outputs, self.config.num_hidden_layers)?;
        drop(outputs);

        debug!(steps, layers = self.config.num_hidden_layers, "decoding");

        let mut frames = Vec::with_capacity(max_len);
        for _ in 0..steps {
            let input_ids = token_batch(ids.last_delayed_masked(pad_token_id))?;

            let mut inputs: Vec<(Cow<str>, SessionInputValue)> = vec![
                (Cow::from("input_ids"), SessionInputValue::from(input_ids.view())),
                (
                    Cow::from("encoder_attention_mask"),
                    SessionInputValue::from(attention_mask.view()),
                ),
            ];
            for (name, value) in &cache.entries {
                inputs.push((Cow::from(name.as_str()), SessionInputValue::from(value.view())));
            }

            let mut outputs = self.decoder_with_past.run(inputs).map_err(|e| {
                ComposerError::model_inference_failed(format!(
                    "Decoder with past inference failed: {}",
                    e
                ))
            })?;

            ids.push(sample_step(&mut outputs, guidance_scale)?);
            if let Some(frame) = ids.last_de_delayed() {
                frames.push(frame);
            }

            cache.update(&mut outputs)?;
        }

        frames.truncate(max_len);
        Ok(frames)
    }
}

/// Past key/values fed back into `decoder_with_past_model.onnx`.
///
/// Four entries per layer in the order decoder key, decoder value, encoder
/// key, encoder value. Only the decoder entries change between steps.
struct KvCache {
    entries: Vec<(String, DynValue)>,
}

impl KvCache {
    fn from_first_pass(outputs: &mut SessionOutputs, layers: usize) -> Result<Self> {
        let mut entries = Vec::with_capacity(layers * 4);
        for j in 0..layers {
            for part in ["decoder.key", "decoder.value", "encoder.key", "encoder.value"] {
                let value = take_output(outputs, &format!("present.{j}.{part}"))?;
                entries.push((format!("past_key_values.{j}.{part}"), value));
            }
        }
        Ok(Self { entries })
    }

    fn update(&mut self, outputs: &mut SessionOutputs) -> Result<()> {
        for j in 0..self.entries.len() / 4 {
            self.entries[j * 4].1 = take_output(outputs, &format!("present.{j}.decoder.key"))?;
            self.entries[j * 4 + 1].1 = take_output(outputs, &format!("present.{j}.decoder.value"))?;
        }
        Ok(())
    }
}

fn take_output(outputs: &mut SessionOutputs, name: &str) -> Result<DynValue> {
    outputs
        .remove(name)
        .ok_or_else(|| ComposerError::model_inference_failed(format!("{} not found in output", name)))
}

/// Applies guidance to the step's logits and samples one token per codebook.
fn sample_step(outputs: &mut SessionOutputs, guidance_scale: f32) -> Result<Frame> {
    let logits = Logits::from_3d_dyn_value(&take_output(outputs, "logits")?)?;
    guided_frame(logits, guidance_scale)
}

/// Samples a frame from `[GUIDED_BATCH, vocab]` logits.
///
/// Any other batch size means the export does not match `CODEBOOKS`.
fn guided_frame(logits: Logits, guidance_scale: f32) -> Result<Frame> {
    let (batch, _) = logits.dim();
    if batch != GUIDED_BATCH {
        return Err(ComposerError::model_inference_failed(format!(
            "Expected {} logit rows ({} codebooks with guidance), got {}",
            GUIDED_BATCH, CODEBOOKS, batch
        )));
    }

    let mut frame = [0i64; CODEBOOKS];
    let sampled = logits.apply_free_guidance(guidance_scale).sample_top_k(DEFAULT_TOP_K);
    for (slot, (id, _)) in frame.iter_mut().zip(sampled) {
        *slot = id;
    }
    Ok(frame)
}

/// Input ids for one step: the same tokens for both halves of the batch.
fn token_batch(tokens: Frame) -> Result<Tensor<i64>> {
    let batch: Vec<i64> = tokens.iter().chain(tokens.iter()).copied().collect();
    Tensor::from_array(([GUIDED_BATCH, 1usize], batch)).map_err(|e| {
        ComposerError::model_inference_failed(format!("Failed to create input_ids: {}", e))
    })
}

/// Doubles the first dimension of a tensor, filling the new half with zeros.
///
/// Hidden states are f16 or f32 depending on the export; masks are i64.
fn duplicate_with_zeros(tensor: &DynValue) -> Result<DynValue> {
    if let Ok(value) = duplicate_typed::<f16>(tensor) {
        return Ok(value);
    }
    if let Ok(value) = duplicate_typed::<f32>(tensor) {
        return Ok(value);
    }
    duplicate_typed::<i64>(tensor)
}

fn duplicate_typed<T>(tensor: &DynValue) -> Result<DynValue>
where
    T: PrimitiveTensorElementType + Clone + Default + std::fmt::Debug + 'static,
{
    let (shape, data) = tensor.try_extract_tensor::<T>().map_err(|e| {
        ComposerError::model_inference_failed(format!("Failed to extract tensor: {}", e))
    })?;

    let mut new_shape: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
    if let Some(first) = new_shape.first_mut() {
        *first *= 2;
    }

    let mut combined = Vec::with_capacity(data.len() * 2);
    combined.extend_from_slice(data);
    combined.resize(data.len() * 2, T::default());

    let value = Tensor::from_array((new_shape, combined)).map_err(|e| {
        ComposerError::model_inference_failed(format!("Failed to create duplicated tensor: {}", e))
    })?;
    Ok(value.into_dyn())
}
