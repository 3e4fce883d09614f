//! Sampling adapters.
//!
//! Every adapter implements [`LmSampler`], so callers ask for top-N
//! next-token probabilities or multi-token generation the same way
//! whether the model fills a masked position or extends a prefix.
//!
//! ## Generation Loop
//!
//! ```text
//! Generating ──▶ budget spent? ── yes ──▶ Stopped(MaxTokens)
//!    ▲                │ no
//!    │                ▼
//!    │          forward + sample, append token
//!    │                │
//!    │                ▼
//!    │          last token in stop set? ── yes ──▶ Stopped(StopToken)
//!    │                │ no
//!    │                ▼
//!    │          last token is EOS? ── yes ──▶ Stopped(EndOfSequence)
//!    │                │ no
//!    └────────────────┘
//! ```

pub mod causal;
pub mod masked;
pub mod ranking;
pub mod sampler;

use tracing::debug;

use crate::config::SamplingConfig;
use crate::core::generation::{FinishReason, GenerationState};
use crate::core::stopping::{StopSet, StopToken, StoppingCriteriaList, StoppingCriterion};
use crate::error::Result;

pub use causal::CausalLmSampler;
pub use masked::MaskedLmSampler;
pub use ranking::{Prediction, PredictionRanking};
pub use sampler::TokenSampler;

/// Result of a multi-step generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutput {
    /// Decoded text of the generated tokens, stop sentinel excluded.
    pub text: String,
    /// Generated token IDs, stop sentinel excluded.
    pub token_ids: Vec<u32>,
    /// Why generation halted.
    pub finish_reason: FinishReason,
}

/// Capability set shared by all model adapters.
///
/// Calls are synchronous and keep no state between invocations; an
/// adapter is reusable after any per-call error.
pub trait LmSampler {
    /// The `n_probs` most probable tokens at the model's prediction point,
    /// each with its natural-log probability.
    ///
    /// # Errors
    ///
    /// `n_probs == 0` is an invalid argument. Values above the vocabulary
    /// size return the whole vocabulary.
    fn send_prompt(&self, prompt: &str, n_probs: usize) -> Result<PredictionRanking>;

    /// Generates up to `n_tokens` tokens after `prompt` with full control
    /// over decoding.
    fn generate(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
        n_tokens: usize,
        stop_tokens: &[StopToken],
    ) -> Result<GenerationOutput>;

    /// Extends `prompt` by up to `n_tokens` tokens and returns only the new
    /// text. `temperature == 0` decodes greedily.
    fn sample_several(
        &self,
        prompt: &str,
        temperature: f32,
        n_tokens: usize,
        stop_tokens: &[StopToken],
    ) -> Result<String> {
        let sampling = SamplingConfig::greedy().temperature(temperature);
        Ok(self.generate(prompt, &sampling, n_tokens, stop_tokens)?.text)
    }
}

/// Appends one token per step to a fresh [`GenerationState`] until the
/// budget is spent, the stop set matches the last token, or EOS appears.
///
/// `next_token` runs one forward pass and picks a token for the current
/// state. Errors from it abort the loop unchanged.
pub(crate) fn run_generation<F>(
    prompt_token_ids: Vec<u32>,
    max_new_tokens: usize,
    stop_set: &StopSet,
    eos_token_id: Option<u32>,
    mut next_token: F,
) -> Result<GenerationState>
where
    F: FnMut(&GenerationState) -> Result<u32>,
{
    let criteria = StoppingCriteriaList::for_stop_set(stop_set);
    let mut state = GenerationState::new(prompt_token_ids);

    while state.is_generating() {
        if state.num_generated() >= max_new_tokens {
            state.finish(FinishReason::MaxTokens);
            break;
        }

        let token = next_token(&state)?;
        state.append_token(token)?;
        debug!(step = state.num_generated(), token, "generated token");

        if criteria.should_stop(state.generated_token_ids()) {
            state.finish(FinishReason::StopToken);
        } else if eos_token_id == Some(token) {
            state.finish(FinishReason::EndOfSequence);
        }
    }

    Ok(state)
}

/// Strips the single separator a tokenizer puts before a continuation.
pub(crate) fn strip_separator(text: String) -> String {
    match text.strip_prefix(' ') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted(tokens: Vec<u32>) -> impl FnMut(&GenerationState) -> Result<u32> {
        move |state| Ok(tokens[state.num_generated() % tokens.len()])
    }

    #[test]
    fn test_budget_is_hard_ceiling() {
        let state = run_generation(vec![1], 4, &StopSet::empty(), None, scripted(vec![5])).unwrap();
        assert_eq!(state.generated_token_ids(), &[5, 5, 5, 5]);
        assert_eq!(state.finish_reason(), Some(FinishReason::MaxTokens));
    }

    #[test]
    fn test_zero_budget_generates_nothing() {
        let mut calls = 0;
        let state = run_generation(vec![1], 0, &StopSet::empty(), None, |_| {
            calls += 1;
            Ok(0)
        })
        .unwrap();
        assert_eq!(calls, 0);
        assert_eq!(state.num_generated(), 0);
    }

    #[test]
    fn test_stop_token_halts_immediately() {
        let stop_set = StopSet::from_ids([9]);
        let state =
            run_generation(vec![1], 10, &stop_set, None, scripted(vec![4, 6, 9, 8])).unwrap();

        assert_eq!(state.generated_token_ids(), &[4, 6, 9]);
        assert_eq!(state.finish_reason(), Some(FinishReason::StopToken));
        assert_eq!(state.visible_token_ids(&stop_set), &[4, 6]);
    }

    #[test]
    fn test_eos_halts_generation() {
        let state = run_generation(
            vec![1],
            10,
            &StopSet::empty(),
            Some(0),
            scripted(vec![3, 0, 7]),
        )
        .unwrap();
        assert_eq!(state.generated_token_ids(), &[3, 0]);
        assert_eq!(state.finish_reason(), Some(FinishReason::EndOfSequence));
    }

    #[test]
    fn test_forward_error_aborts() {
        let result = run_generation(vec![1], 5, &StopSet::empty(), None, |state| {
            if state.num_generated() == 2 {
                Err(crate::Error::ModelLoad("boom".to_string()))
            } else {
                Ok(1)
            }
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_strip_separator_removes_one_space() {
        assert_eq!(strip_separator("  Paris".to_string()), " Paris");
        assert_eq!(strip_separator("Paris".to_string()), "Paris");
    }
}
