//! Next-token selection.
//!
//! ```text
//! Logits [vocab_size]
//!     │
//!     ├── temperature == 0 ──▶ argmax
//!     │
//!     ▼ Temperature scaling
//! Logits / temperature
//!     │
//!     ▼ Top-k filtering (optional)
//!     │
//!     ▼ Softmax
//!     │
//!     ▼ Top-p filtering (optional)
//!     │
//!     ▼ Renormalize + Sample
//! Selected token
//! ```

use candle_core::{DType, Tensor, D};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::SamplingConfig;
use crate::error::{Error, Result};

/// Token sampler for one generation call.
///
/// Owns its RNG; a sampler is created per call and dropped afterwards.
#[derive(Debug, Clone)]
pub struct TokenSampler {
    /// Temperature for scaling logits.
    temperature: f32,
    /// Top-k value (0 = disabled).
    top_k: usize,
    /// Top-p value (1.0 = disabled).
    top_p: f32,
    rng: StdRng,
}

impl TokenSampler {
    /// Creates a sampler, seeding from `config.seed` or OS entropy.
    pub fn new(config: &SamplingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            rng,
        }
    }

    /// True if this sampler always picks the argmax.
    pub fn is_greedy(&self) -> bool {
        self.temperature == 0.0
    }

    /// Pick the next token from 1-D logits.
    pub fn sample(&mut self, logits: &Tensor) -> Result<u32> {
        let logits = logits.to_dtype(DType::F32)?;
        if logits.rank() != 1 {
            return Err(Error::InvariantViolation(format!(
                "expected 1D logits, got {}D",
                logits.rank()
            )));
        }

        if self.is_greedy() {
            return Ok(logits.argmax(D::Minus1)?.to_scalar::<u32>()?);
        }

        // Shift by the max before scaling so tiny temperatures cannot overflow
        let values: Vec<f32> = logits.to_vec1()?;
        let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut candidates: Vec<(u32, f32)> = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i as u32, (v - max) / self.temperature))
            .collect();
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        if self.top_k > 0 && self.top_k < candidates.len() {
            candidates.truncate(self.top_k);
        }

        // Softmax over the survivors; they are sorted so index 0 holds the max
        let top = candidates[0].1;
        let mut probs: Vec<f32> = candidates.iter().map(|(_, v)| (v - top).exp()).collect();
        let sum: f32 = probs.iter().sum();
        probs.iter_mut().for_each(|p| *p /= sum);

        if self.top_p > 0.0 && self.top_p < 1.0 {
            let mut cumulative = 0.0f32;
            let mut cutoff = probs.len();
            for (i, prob) in probs.iter().enumerate() {
                cumulative += prob;
                if cumulative > self.top_p {
                    cutoff = i + 1;
                    break;
                }
            }
            probs.truncate(cutoff);
            candidates.truncate(cutoff);
        }

        let dist = WeightedIndex::new(&probs).map_err(|e| {
            Error::InvariantViolation(format!("failed to build distribution: {e}"))
        })?;
        Ok(candidates[dist.sample(&mut self.rng)].0)
    }
}
