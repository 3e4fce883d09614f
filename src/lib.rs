//! lm-sampler: one sampling interface over masked and causal language models.
//!
//! This crate provides:
//! - [`LmSampler`], implemented by a BERT masked-LM adapter and a GPT-Neo
//!   causal-LM adapter, for top-N next-token rankings and multi-token
//!   generation with stop tokens
//! - A per-call generation state machine with trailing stop-token removal
//! - [`TokenCostEstimator`] for pricing prompt batches per engine tier

pub mod config;
pub mod core;
pub mod cost;
pub mod engine;
pub mod error;
pub mod model;
pub mod tokenizer;

pub use config::{DeviceRequest, LoadConfig, SamplingConfig, WeightDType};
pub use core::{FinishReason, StopSet, StopToken};
pub use cost::{CostEstimate, EngineTier, TokenCostEstimator, PRICE_TABLE};
pub use engine::{
    CausalLmSampler, GenerationOutput, LmSampler, MaskedLmSampler, Prediction, PredictionRanking,
};
pub use error::{Error, Result};
pub use model::{CausalLanguageModel, CausalLmVariant, MaskedLanguageModel, MaskedLmVariant};
pub use tokenizer::{HfTokenizer, MaskToken, Tokenizer};
