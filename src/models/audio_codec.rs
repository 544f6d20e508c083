//! EnCodec decoder: codebook frames to 32 kHz mono samples.

use std::path::Path;

use half::f16;
use ort::session::Session;
use ort::value::{DynValue, Tensor};

use crate::error::{ComposerError, Result};

use super::decoder::Frame;
use super::delay_pattern::CODEBOOKS;
use super::loader::{load_session, SessionOptions};

/// MusicGen audio codec (EnCodec decoder).
pub struct MusicGenAudioCodec {
    session: Session,
}

impl MusicGenAudioCodec {
    /// Loads `encodec_decode.onnx` from the model directory.
    pub fn load(model_dir: &Path, options: &SessionOptions<'_>) -> Result<Self> {
        let session = load_session(&model_dir.join("encodec_decode.onnx"), options)?;
        Ok(Self { session })
    }

    /// Decodes frames into audio samples at the model's native rate.
    pub fn decode(&mut self, frames: &[Frame]) -> Result<Vec<f32>> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }

        let seq_len = frames.len();
        let codes = Tensor::from_array(([1usize, 1, CODEBOOKS, seq_len], codebook_major(frames)))
            .map_err(|e| {
                ComposerError::model_inference_failed(format!(
                    "Failed to create token tensor: {}",
                    e
                ))
            })?;

        let mut outputs = self.session.run(ort::inputs![codes]).map_err(|e| {
            ComposerError::model_inference_failed(format!("Audio codec inference failed: {}", e))
        })?;

        let audio_values: DynValue = outputs.remove("audio_values").ok_or_else(|| {
            ComposerError::model_inference_failed("audio_values not found in output")
        })?;

        if let Ok((_, data)) = audio_values.try_extract_tensor::<f32>() {
            return Ok(data.to_vec());
        }
        if let Ok((_, data)) = audio_values.try_extract_tensor::<f16>() {
            return Ok(data.iter().map(|e| f32::from(*e)).collect());
        }

        Err(ComposerError::model_inference_failed(
            "Audio values must be either f16 or f32",
        ))
    }
}

/// Transposes `[seq_len][CODEBOOKS]` frames into `[CODEBOOKS][seq_len]`.
fn codebook_major(frames: &[Frame]) -> Vec<i64> {
    let seq_len = frames.len();
    let mut out = vec![0i64; seq_len * CODEBOOKS];
    for (t, frame) in frames.iter().enumerate() {
        for (c, &token) in frame.iter().enumerate() {
            out[c * seq_len + t] = token;
        }
    }
    out
}
