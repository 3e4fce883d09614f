//! Closed allow-lists of supported checkpoints per adapter family.

use std::fmt;

use crate::error::{Error, Result};

/// Masked-LM checkpoints accepted by [`MaskedLmSampler`](crate::MaskedLmSampler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskedLmVariant {
    BertBaseUncased,
    BertBaseCased,
}

impl MaskedLmVariant {
    pub const ALL: [Self; 2] = [Self::BertBaseUncased, Self::BertBaseCased];

    /// HuggingFace Hub repository id.
    pub fn model_id(&self) -> &'static str {
        match self {
            Self::BertBaseUncased => "bert-base-uncased",
            Self::BertBaseCased => "bert-base-cased",
        }
    }

    /// Looks up a model name in the allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedModel`] for any other name.
    pub fn from_model_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|variant| variant.model_id() == name)
            .ok_or_else(|| unsupported(name, Self::ALL.iter().map(Self::model_id)))
    }
}

impl fmt::Display for MaskedLmVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_id())
    }
}

/// Causal-LM checkpoints accepted by [`CausalLmSampler`](crate::CausalLmSampler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CausalLmVariant {
    GptNeo125M,
    GptNeo1_3B,
    GptNeo2_7B,
}

impl CausalLmVariant {
    pub const ALL: [Self; 3] = [Self::GptNeo2_7B, Self::GptNeo1_3B, Self::GptNeo125M];

    /// HuggingFace Hub repository id.
    pub fn model_id(&self) -> &'static str {
        match self {
            Self::GptNeo125M => "EleutherAI/gpt-neo-125M",
            Self::GptNeo1_3B => "EleutherAI/gpt-neo-1.3B",
            Self::GptNeo2_7B => "EleutherAI/gpt-neo-2.7B",
        }
    }

    /// Repository to take `tokenizer.json` from when the checkpoint
    /// ships only the slow-tokenizer files. GPT-Neo reuses GPT-2's BPE.
    pub fn fallback_tokenizer_repo(&self) -> &'static str {
        "gpt2"
    }

    /// Looks up a model name in the allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedModel`] for any other name.
    pub fn from_model_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|variant| variant.model_id() == name)
            .ok_or_else(|| unsupported(name, Self::ALL.iter().map(Self::model_id)))
    }
}

impl fmt::Display for CausalLmVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_id())
    }
}

fn unsupported<'a>(name: &str, supported: impl Iterator<Item = &'a str>) -> Error {
    Error::UnsupportedModel {
        model: name.to_string(),
        supported: supported.collect::<Vec<_>>().join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_variants_resolve_exactly() {
        for variant in MaskedLmVariant::ALL {
            assert_eq!(MaskedLmVariant::from_model_name(variant.model_id()).unwrap(), variant);
        }
        assert_eq!(MaskedLmVariant::BertBaseCased.to_string(), "bert-base-cased");
    }

    #[test]
    fn test_substring_match_is_not_enough() {
        let err = MaskedLmVariant::from_model_name("my-bert-base-uncased-finetune").unwrap_err();
        assert!(err.is_configuration());

        let err = CausalLmVariant::from_model_name("EleutherAI/gpt-neo-125M-extra").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_error_lists_supported_models() {
        let err = CausalLmVariant::from_model_name("gpt2").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("gpt2"));
        assert!(message.contains("EleutherAI/gpt-neo-125M"));
        assert!(message.contains("EleutherAI/gpt-neo-2.7B"));
    }
}
