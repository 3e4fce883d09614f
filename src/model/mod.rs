//! Model collaborators.
//!
//! This module contains:
//! - The forward-pass traits adapters are written against
//! - The allow-lists of supported checkpoints
//! - Hub download and SafeTensors loading
//! - BERT (masked-LM) and GPT-Neo (causal-LM) built from shared layers

pub mod attention;
pub mod bert;
pub mod gpt_neo;
pub mod loader;
pub mod mlp;
pub mod norm;
pub mod registry;

use candle_core::{Device, Tensor};

use crate::error::Result;

pub use bert::{BertConfig, BertForMaskedLm};
pub use gpt_neo::{GptNeoConfig, GptNeoForCausalLm};
pub use loader::{download_model, load_config, load_safetensors, ModelFiles};
pub use registry::{CausalLmVariant, MaskedLmVariant};

/// A model that predicts a distribution at every input position.
pub trait MaskedLanguageModel {
    /// Logits for every position.
    ///
    /// * `input_ids` - Token IDs [1, seq_len]
    ///
    /// Returns logits [1, seq_len, vocab_size].
    fn forward(&self, input_ids: &Tensor) -> Result<Tensor>;

    /// Device the weights live on.
    fn device(&self) -> &Device;
}

/// A model that predicts the token following a prefix.
pub trait CausalLanguageModel {
    /// Logits for the position after the last input token.
    ///
    /// * `input_ids` - Token IDs [1, seq_len]
    ///
    /// Returns logits [1, vocab_size].
    fn forward(&self, input_ids: &Tensor) -> Result<Tensor>;

    /// Device the weights live on.
    fn device(&self) -> &Device;
}
