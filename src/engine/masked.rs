//! Masked-LM adapter.
//!
//! Predicts the distribution at a single masked position. Prompts without
//! a mask marker get `" <mask>."` appended so the model fills one missing
//! token in a closed sentence.

use candle_core::{Device, IndexOp, Tensor};
use tracing::{debug, info};

use super::ranking::{rank_top_n, validate_n_probs, Prediction, PredictionRanking};
use super::sampler::TokenSampler;
use super::{run_generation, strip_separator, GenerationOutput, LmSampler};
use crate::config::{LoadConfig, SamplingConfig};
use crate::core::stopping::{StopSet, StopToken};
use crate::error::{Error, Result};
use crate::model::{
    download_model, load_config, load_safetensors, BertConfig, BertForMaskedLm,
    MaskedLanguageModel, MaskedLmVariant,
};
use crate::tokenizer::{HfTokenizer, MaskToken, Tokenizer};

/// Sampler over a masked language model.
///
/// Multi-step generation fills the mask repeatedly: each chosen token is
/// inserted before the mask marker, which moves one position right.
pub struct MaskedLmSampler<M = BertForMaskedLm, T = HfTokenizer> {
    model: M,
    tokenizer: T,
    mask_token: MaskToken,
    device: Device,
    model_name: String,
}

impl MaskedLmSampler {
    /// Downloads and loads one of the supported BERT checkpoints.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedModel`] if `model_name` is not in
    /// [`MaskedLmVariant::ALL`]; load errors otherwise.
    pub fn from_pretrained(model_name: &str, config: &LoadConfig) -> Result<Self> {
        let variant = MaskedLmVariant::from_model_name(model_name)?;
        info!(model = %variant, "loading masked-LM");

        let device = config.device.resolve()?;
        let files = download_model(variant.model_id(), &config.revision, None)?;
        let model_config: BertConfig = load_config(&files.config)?;
        let vb = load_safetensors(&files.weights, config.dtype.into(), &device)?;
        let model = BertForMaskedLm::new(&model_config, vb)?;
        let tokenizer = HfTokenizer::from_file(&files.tokenizer)?;

        Self::new(variant.model_id(), model, tokenizer)
    }
}

impl<M: MaskedLanguageModel, T: Tokenizer> MaskedLmSampler<M, T> {
    /// Wraps an already loaded model and tokenizer.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the tokenizer has no mask token.
    pub fn new(model_name: impl Into<String>, model: M, tokenizer: T) -> Result<Self> {
        let model_name = model_name.into();
        let mask_token = tokenizer.mask_token().ok_or_else(|| {
            Error::Configuration(format!("tokenizer for {model_name} has no mask token"))
        })?;
        let device = model.device().clone();
        info!(model = %model_name, device = ?device, "loaded masked-LM");

        Ok(Self {
            model,
            tokenizer,
            mask_token,
            device,
            model_name,
        })
    }

    /// Name the adapter was constructed with.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Device the adapter is bound to.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The mask marker and its id.
    pub fn mask_token(&self) -> &MaskToken {
        &self.mask_token
    }

    /// The prompt actually sent to the model.
    pub fn masked_prompt(&self, prompt: &str) -> String {
        if prompt.contains(&self.mask_token.text) {
            prompt.to_string()
        } else {
            format!("{prompt} {}.", self.mask_token.text)
        }
    }

    /// Encodes the masked prompt and locates the first mask position.
    fn encode_masked(&self, prompt: &str) -> Result<(Vec<u32>, usize)> {
        let ids = self.tokenizer.encode(&self.masked_prompt(prompt), true)?;
        let position = ids
            .iter()
            .position(|&id| id == self.mask_token.id)
            .ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "mask token {} missing from encoded prompt",
                    self.mask_token.text
                ))
            })?;
        Ok((ids, position))
    }

    /// Logits [vocab_size] at `position`.
    fn logits_at(&self, ids: &[u32], position: usize) -> Result<Tensor> {
        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let logits = self.model.forward(&input_ids)?;
        Ok(logits.i((0, position))?)
    }
}

impl<M: MaskedLanguageModel, T: Tokenizer> LmSampler for MaskedLmSampler<M, T> {
    fn send_prompt(&self, prompt: &str, n_probs: usize) -> Result<PredictionRanking> {
        validate_n_probs(n_probs)?;
        let (ids, position) = self.encode_masked(prompt)?;
        debug!(num_tokens = ids.len(), position, n_probs, "ranking mask position");

        let logits = self.logits_at(&ids, position)?;
        let predictions = rank_top_n(&logits, n_probs)?
            .into_iter()
            .map(|(token_id, log_prob)| {
                let text = self.tokenizer.decode(&[token_id], false)?.trim().to_string();
                Ok(Prediction {
                    token_id,
                    text,
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
        let (ids, position) = self.encode_masked(prompt)?;
        // suffix starts with the mask marker
        let (prefix, suffix) = ids.split_at(position);

        let mut sampler = TokenSampler::new(sampling);
        let state = run_generation(prefix.to_vec(), n_tokens, &stop_set, None, |state| {
            let mut input = state.all_token_ids();
            let mask_position = input.len();
            input.extend_from_slice(suffix);
            let logits = self.logits_at(&input, mask_position)?;
            sampler.sample(&logits)
        })?;

        let finish_reason = state
            .finish_reason()
            .ok_or_else(|| Error::InvariantViolation("generation did not stop".to_string()))?;
        let token_ids = state.visible_token_ids(&stop_set).to_vec();
        let text = strip_separator(self.tokenizer.decode(&token_ids, true)?);

        Ok(GenerationOutput {
            text,
            token_ids,
            finish_reason,
        })
    }
}
