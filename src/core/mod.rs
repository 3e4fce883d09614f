//! Core generation bookkeeping.
//!
//! This module contains:
//! - GenerationState for one in-flight generation call
//! - Stop tokens, stop sets and the stopping criteria built from them

pub mod generation;
pub mod stopping;

pub use generation::{FinishReason, GenerationState, GenerationStatus};
pub use stopping::{
    StopSet, StopToken, StopTokenCriterion, StoppingCriteriaList, StoppingCriterion,
};
