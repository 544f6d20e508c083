//! Logits processing for MusicGen decoder output.
//!
//! Classifier-free guidance followed by top-k sampling.

use std::fmt::{Debug, Formatter};

use half::f16;
use ndarray::{s, Array, Array2, Axis, Ix3, IxDyn};
use ort::tensor::ArrayExtensions;
use ort::value::DynValue;
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::{thread_rng, Rng};

use crate::error::{ComposerError, Result};

/// Number of candidates kept when sampling each token.
pub const DEFAULT_TOP_K: usize = 250;

/// Decoder logits for one step, shape `[batch, vocab]`.
pub struct Logits(Array2<f32>);

impl Debug for Logits {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Logits({:?})", self.0.dim())
    }
}

impl Logits {
    /// Wraps a `[batch, vocab]` array.
    pub fn new(values: Array2<f32>) -> Self {
        Self(values)
    }

    /// `(batch, vocab)` dimensions.
    pub fn dim(&self) -> (usize, usize) {
        self.0.dim()
    }

    /// Reads `[batch, 1, vocab]` logits (f32 or f16) and drops the
    /// sequence axis.
    pub fn from_3d_dyn_value(value: &DynValue) -> Result<Self> {
        let (shape, data): (Vec<usize>, Vec<f32>) =
            if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
                (shape.iter().map(|&x| x as usize).collect(), data.to_vec())
            } else if let Ok((shape, data)) = value.try_extract_tensor::<f16>() {
                (
                    shape.iter().map(|&x| x as usize).collect(),
                    data.iter().map(|e| f32::from(*e)).collect(),
                )
            } else {
                return Err(ComposerError::model_inference_failed(
                    "Logits must be f32 or f16",
                ));
            };

        let arr = Array::from_shape_vec(IxDyn(&shape), data)
            .map_err(|e| {
                ComposerError::model_inference_failed(format!("Failed to create array: {}", e))
            })?
            .into_dimensionality::<Ix3>()
            .map_err(|e| {
                ComposerError::model_inference_failed(format!("Expected 3D logits: {}", e))
            })?;

        if arr.dim().1 != 1 {
            return Err(ComposerError::model_inference_failed(format!(
                "Expected one decoder position, got {}",
                arr.dim().1
            )));
        }

        Ok(Self(arr.remove_axis(Axis(1))))
    }

    /// Applies classifier-free guidance.
    ///
    /// Conditional rows fill the first half of the batch, unconditional rows
    /// the second: `guided = uncond + (cond - uncond) * scale`.
    ///
    /// # Panics
    ///
    /// Panics if the batch size is odd.
    pub fn apply_free_guidance(self, guidance_scale: f32) -> Self {
        assert!(
            self.0.dim().0 % 2 == 0,
            "guided logits need an even batch, got {}",
            self.0.dim().0
        );

        let half = self.0.dim().0 / 2;
        let cond = self.0.slice(s![0..half, ..]);
        let uncond = self.0.slice(s![half.., ..]);

        Self((cond.into_owned() - uncond) * guidance_scale + uncond)
    }

    /// Top-k sampling with the thread-local RNG.
    ///
    /// Returns `(token_id, log_probability)` for each row.
    pub fn sample_top_k(&self, k: usize) -> Vec<(i64, f32)> {
        self.sample_top_k_with(k, &mut thread_rng())
    }

    /// Top-k sampling with a caller-supplied RNG.
    pub fn sample_top_k_with<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> Vec<(i64, f32)> {
        let probs = self.0.softmax(Axis(1));

        probs
            .axis_iter(Axis(0))
            .map(|row| {
                let mut candidates: Vec<(i64, f32)> = row
                    .iter()
                    .enumerate()
                    .map(|(i, &p)| (i as i64, p))
                    .collect();

                // NaN ranks last.
                candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
                candidates.truncate(k.clamp(1, candidates.len().max(1)));

                match WeightedIndex::new(candidates.iter().map(|c| c.1)) {
                    Ok(dist) => {
                        let (id, p) = candidates[dist.sample(rng)];
                        (id, p.ln())
                    }
                    // Degenerate rows (all zero or non-finite) take the argmax.
                    Err(_) => candidates
                        .first()
                        .map(|&(id, p)| (id, p.ln()))
                        .unwrap_or((0, f32::NEG_INFINITY)),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn logits(rows: usize, cols: usize, values: Vec<f32>) -> Logits {
        Logits::new(Array::from_shape_vec((rows, cols), values).unwrap())
    }

    #[test]
    fn free_guidance_halves_batch() {
        let guided = logits(2, 3, vec![10., -1., 3., -1., 1., 11.]).apply_free_guidance(3.0);
        assert_eq!(guided.dim(), (1, 3));
        // uncond + (cond - uncond) * 3
        assert_eq!(guided.0.row(0).to_vec(), vec![32.0, -5.0, -13.0]);
    }

    #[test]
    fn unit_guidance_keeps_conditional_logits() {
        let guided = logits(2, 2, vec![0.25, 0.75, 9.0, -9.0]).apply_free_guidance(1.0);
        assert_eq!(guided.0.row(0).to_vec(), vec![0.25, 0.75]);
    }

    #[test]
    #[should_panic(expected = "even batch")]
    fn odd_batch_panics() {
        logits(3, 1, vec![0.0, 0.0, 0.0]).apply_free_guidance(3.0);
    }

    #[test]
    fn top_one_is_argmax() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples = logits(2, 4, vec![0.1, 5.0, 0.2, 0.3, 9.0, 0.0, 0.0, 0.0])
            .sample_top_k_with(1, &mut rng);
        assert_eq!(samples.iter().map(|s| s.0).collect::<Vec<_>>(), vec![1, 0]);
    }

    #[test]
    fn sampled_tokens_stay_in_top_k() {
        let mut rng = StdRng::seed_from_u64(42);
        let l = logits(1, 5, vec![10.0, 9.0, -50.0, -50.0, -50.0]);
        for _ in 0..100 {
            let (id, log_p) = l.sample_top_k_with(2, &mut rng)[0];
            assert!(id == 0 || id == 1);
            assert!(log_p <= 0.0);
        }
    }

    #[test]
    fn k_larger_than_vocab_is_clamped() {
        let samples = logits(1, 3, vec![0.1, 0.2, 0.7]).sample_top_k(DEFAULT_TOP_K);
        assert_eq!(samples.len(), 1);
        assert!((0..3).contains(&samples[0].0));
    }
}
