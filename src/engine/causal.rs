//! Causal-LM adapter.

use candle_core::{Device, Tensor};
use tracing::{debug, info};

use super::ranking::{rank_top_n, validate_n_probs, Prediction, PredictionRanking};
use super::sampler::TokenSampler;
use super::{run_generation, strip_separator, GenerationOutput, LmSampler};
use crate::config::{LoadConfig, SamplingConfig};
use crate::core::generation::FinishReason;
use crate::core::stopping::{StopSet, StopToken};
use crate::error::{Error, Result};
use crate::model::{
    download_model, load_config, load_safetensors, CausalLanguageModel, CausalLmVariant,
    GptNeoConfig, GptNeoForCausalLm,
};
use crate::tokenizer::{HfTokenizer, Tokenizer};

/// Sampler over an autoregressive language model.
pub struct CausalLmSampler<M = GptNeoForCausalLm, T = HfTokenizer> {
    model: M,
    tokenizer: T,
    device: Device,
    model_name: String,
}

impl CausalLmSampler {
    /// Downloads and loads one of the supported GPT-Neo checkpoints.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedModel`] if `model_name` is not in
    /// [`CausalLmVariant::ALL`]; load errors otherwise.
    pub fn from_pretrained(model_name: &str, config: &LoadConfig) -> Result<Self> {
        let variant = CausalLmVariant::from_model_name(model_name)?;
        info!(model = %variant, "loading causal-LM");

        let device = config.device.resolve()?;
        let files = download_model(
            variant.model_id(),
            &config.revision,
            Some(variant.fallback_tokenizer_repo()),
        )?;
        let model_config: GptNeoConfig = load_config(&files.config)?;
        let vb = load_safetensors(&files.weights, config.dtype.into(), &device)?;
        let model = GptNeoForCausalLm::new(&model_config, vb)?;
        let tokenizer = HfTokenizer::from_file(&files.tokenizer)?;

        Ok(Self::new(variant.model_id(), model, tokenizer))
    }
}

impl<M: CausalLanguageModel, T: Tokenizer> CausalLmSampler<M, T> {
    /// Wraps an already loaded model and tokenizer.
    pub fn new(model_name: impl Into<String>, model: M, tokenizer: T) -> Self {
        let model_name = model_name.into();
        let device = model.device().clone();
        info!(model = %model_name, device = ?device, "loaded causal-LM");

        Self {
            model,
            tokenizer,
            device,
            model_name,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    fn encode_prompt(&self, prompt: &str) -> Result<Vec<u32>> {
        let ids = self.tokenizer.encode(prompt, true)?;
        if ids.is_empty() {
            return Err(Error::InvalidArgument(
                "prompt encodes to no tokens".to_string(),
            ));
        }
        Ok(ids)
    }

    /// Logits [vocab_size] for the token after `ids`.
    fn next_logits(&self, ids: &[u32]) -> Result<Tensor> {
        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let logits = self.model.forward(&input_ids)?;
        Ok(logits.squeeze(0)?)
    }

    /// Decoded token text limited to 7-bit characters.
    ///
    /// Byte-level BPE tokens can hold half of a multi-byte character; those
    /// decode to replacement characters and are dropped here.
    fn ascii_text(&self, token_id: u32) -> Result<String> {
        let text = self.tokenizer.decode(&[token_id], false)?;
        let ascii: String = text.chars().filter(char::is_ascii).collect();
        Ok(ascii.trim().to_string())
    }
}

impl<M: CausalLanguageModel, T: Tokenizer> LmSampler for CausalLmSampler<M, T> {
    fn send_prompt(&self, prompt: &str, n_probs: usize) -> Result<PredictionRanking> {
        validate_n_probs(n_probs)?;
        let ids = self.encode_prompt(prompt)?;
        debug!(num_tokens = ids.len(), n_probs, "ranking next token");

        let logits = self.next_logits(&ids)?;
        let predictions = rank_top_n(&logits, n_probs)?
            .into_iter()
            .map(|(token_id, log_prob)| {
                Ok(Prediction {
                    token_id,
                    text: self.ascii_text(token_id)?,
                    log_prob,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PredictionRanking::new(predictions))
    }

    fn generate(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
        n_tokens: usize,
        stop_tokens: &[StopToken],
    ) -> Result<GenerationOutput> {
        sampling.validate()?;
        let stop_set = StopSet::resolve(stop_tokens, &self.tokenizer)?;
        let prompt_ids = self.encode_prompt(prompt)?;
        let eos_token_id = self.tokenizer.eos_token_id();

        let mut sampler = TokenSampler::new(sampling);
        let state = run_generation(prompt_ids, n_tokens, &stop_set, eos_token_id, |state| {
            let logits = self.next_logits(&state.all_token_ids())?;
            sampler.sample(&logits)
        })?;

        let finish_reason = state
            .finish_reason()
            .ok_or_else(|| Error::InvariantViolation("generation did not stop".to_string()))?;
        let mut token_ids = state.visible_token_ids(&stop_set).to_vec();
        if finish_reason == FinishReason::EndOfSequence {
            token_ids.pop();
        }
        let text = strip_separator(self.tokenizer.decode(&token_ids, true)?);
        debug!(
            num_generated = token_ids.len(),
            reason = finish_reason.as_str(),
            "generation finished"
        );

        Ok(GenerationOutput {
            text,
            token_ids,
            finish_reason,
        })
    }
}
