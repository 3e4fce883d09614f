//! Top-N prediction rankings.
//!
//! Softmax is monotonic, so [`rank_top_n`] orders ids by raw logit once and
//! reports the log-softmax of each, computed in f64 so tail entries whose
//! probability underflows still rank and score distinctly.

use std::collections::HashMap;

use candle_core::{DType, Tensor, D};

use crate::error::{Error, Result};

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Vocabulary id.
    pub token_id: u32,
    /// Decoded, cleaned token text.
    pub text: String,
    /// Natural log of the softmax probability (always <= 0).
    pub log_prob: f64,
}

/// Ordered top-N predictions, most probable first.
///
/// Holds exactly one entry per requested rank. Different ids can decode to
/// the same text; lookups by text then see the later (lower-ranked) entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionRanking {
    predictions: Vec<Prediction>,
}

impl PredictionRanking {
    pub fn new(predictions: Vec<Prediction>) -> Self {
        Self { predictions }
    }

    /// Number of ranked entries, collisions included.
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Entries in rank order.
    pub fn iter(&self) -> std::slice::Iter<'_, Prediction> {
        self.predictions.iter()
    }

    /// Highest-ranked entry.
    pub fn top(&self) -> Option<&Prediction> {
        self.predictions.first()
    }

    /// Log-probability recorded for `text`; last write wins on collisions.
    pub fn get(&self, text: &str) -> Option<f64> {
        self.predictions
            .iter()
            .rev()
            .find(|prediction| prediction.text == text)
            .map(|prediction| prediction.log_prob)
    }

    /// Number of distinct decoded texts.
    pub fn unique_len(&self) -> usize {
        self.to_map().len()
    }

    /// Text → log-probability map with last-write-wins semantics.
    pub fn to_map(&self) -> HashMap<String, f64> {
        self.predictions
            .iter()
            .map(|prediction| (prediction.text.clone(), prediction.log_prob))
            .collect()
    }

    /// Texts in rank order.
    pub fn texts(&self) -> Vec<&str> {
        self.predictions.iter().map(|p| p.text.as_str()).collect()
    }
}

impl IntoIterator for PredictionRanking {
    type Item = Prediction;
    type IntoIter = std::vec::IntoIter<Prediction>;

    fn into_iter(self) -> Self::IntoIter {
        self.predictions.into_iter()
    }
}

impl<'a> IntoIterator for &'a PredictionRanking {
    type Item = &'a Prediction;
    type IntoIter = std::slice::Iter<'a, Prediction>;

    fn into_iter(self) -> Self::IntoIter {
        self.predictions.iter()
    }
}

/// Rejects a zero-sized request.
pub fn validate_n_probs(n_probs: usize) -> Result<()> {
    if n_probs == 0 {
        return Err(Error::InvalidArgument(
            "n_probs must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

/// The `n_probs` most probable ids in a 1-D logits vector, each paired with
/// `ln(softmax(logits)[id])`.
///
/// Requests larger than the vocabulary return the whole vocabulary.
/// Ties keep the lower id first.
pub fn rank_top_n(logits: &Tensor, n_probs: usize) -> Result<Vec<(u32, f64)>> {
    validate_n_probs(n_probs)?;
    let logits = logits.to_dtype(DType::F64)?;
    let log_probs: Vec<f64> = candle_nn::ops::log_softmax(&logits, D::Minus1)?.to_vec1()?;
    let raw: Vec<f64> = logits.to_vec1()?;

    let mut ids: Vec<usize> = (0..raw.len()).collect();
    ids.sort_by(|&a, &b| raw[b].partial_cmp(&raw[a]).unwrap_or(std::cmp::Ordering::Equal));

    Ok(ids
        .into_iter()
        .take(n_probs)
        .map(|id| (id as u32, log_probs[id]))
        .collect())
}
