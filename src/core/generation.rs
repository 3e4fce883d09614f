//! Per-call generation state.
//!
//! A [`GenerationState`] is owned by exactly one in-flight generation call.
//! It tracks the prompt tokens, the tokens produced so far, and the
//! `Generating -> Stopped(reason)` transition.

use crate::core::stopping::StopSet;
use crate::error::{Error, Result};

/// Status of a generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStatus {
    /// Still producing tokens.
    Generating,
    /// Halted; no more tokens may be appended.
    Stopped(FinishReason),
}

impl GenerationStatus {
    /// Get the status name as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generating => "Generating",
            Self::Stopped(_) => "Stopped",
        }
    }
}

/// Reason generation halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The most recent token belongs to the stop set.
    StopToken,
    /// The model emitted its end-of-sequence token.
    EndOfSequence,
    /// The new-token budget was exhausted.
    MaxTokens,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopToken => "stop_token",
            Self::EndOfSequence => "end_of_sequence",
            Self::MaxTokens => "max_tokens",
        }
    }
}

/// Growing token sequence of one generation call.
///
/// # Example
///
/// ```
/// use lm_sampler::core::{FinishReason, GenerationState};
///
/// let mut state = GenerationState::new(vec![1, 2, 3]);
/// state.append_token(4).unwrap();
/// assert_eq!(state.generated_token_ids(), &[4]);
///
/// state.finish(FinishReason::MaxTokens);
/// assert!(state.append_token(5).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct GenerationState {
    /// Prompt token IDs.
    prompt_token_ids: Vec<u32>,
    /// Generated token IDs.
    generated_token_ids: Vec<u32>,
    /// Current status.
    status: GenerationStatus,
}

impl GenerationState {
    /// Starts a generation from the encoded prompt.
    pub fn new(prompt_token_ids: Vec<u32>) -> Self {
        Self {
            prompt_token_ids,
            generated_token_ids: Vec::new(),
            status: GenerationStatus::Generating,
        }
    }

    /// Get the prompt token IDs.
    pub fn prompt_token_ids(&self) -> &[u32] {
        &self.prompt_token_ids
    }

    /// Get the generated token IDs.
    pub fn generated_token_ids(&self) -> &[u32] {
        &self.generated_token_ids
    }

    /// Get all token IDs (prompt + generated).
    pub fn all_token_ids(&self) -> Vec<u32> {
        let mut tokens = self.prompt_token_ids.clone();
        tokens.extend(&self.generated_token_ids);
        tokens
    }

    /// Number of tokens generated so far.
    pub fn num_generated(&self) -> usize {
        self.generated_token_ids.len()
    }

    /// The most recently generated token.
    pub fn last_generated(&self) -> Option<u32> {
        self.generated_token_ids.last().copied()
    }

    /// Get the current status.
    pub fn status(&self) -> GenerationStatus {
        self.status
    }

    /// True while tokens may still be appended.
    pub fn is_generating(&self) -> bool {
        matches!(self.status, GenerationStatus::Generating)
    }

    /// Get the finish reason (if stopped).
    pub fn finish_reason(&self) -> Option<FinishReason> {
        match self.status {
            GenerationStatus::Stopped(reason) => Some(reason),
            GenerationStatus::Generating => None,
        }
    }

    /// Append a generated token.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation once the state has stopped.
    pub fn append_token(&mut self, token_id: u32) -> Result<()> {
        match self.status {
            GenerationStatus::Generating => {
                self.generated_token_ids.push(token_id);
                Ok(())
            }
            GenerationStatus::Stopped(_) => Err(Error::InvariantViolation(format!(
                "cannot append token {token_id}: generation is {}",
                self.status.as_str()
            ))),
        }
    }

    /// Mark the generation as stopped. The first reason wins.
    pub fn finish(&mut self, reason: FinishReason) {
        if self.is_generating() {
            self.status = GenerationStatus::Stopped(reason);
        }
    }

    /// Generated tokens with a trailing stop sentinel removed.
    ///
    /// Only the final token is inspected; stop ids earlier in the output
    /// are content, not sentinels.
    pub fn visible_token_ids(&self, stop_set: &StopSet) -> &[u32] {
        match self.generated_token_ids.split_last() {
            Some((last, rest)) if stop_set.contains(*last) => rest,
            _ => &self.generated_token_ids,
        }
    }
}
