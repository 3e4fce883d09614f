//! Tokenizer collaborator.
//!
//! Adapters and the cost estimator only talk to the [`Tokenizer`] trait.
//! [`HfTokenizer`] implements it on top of the `tokenizers` crate and a
//! `tokenizer.json` fetched from the HuggingFace Hub.

use std::path::Path;

use hf_hub::{api::sync::Api, Repo, RepoType};

use crate::error::{Error, Result};

/// Marker text and id of a masked-LM's mask token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskToken {
    /// Textual marker as it appears in prompts (e.g. `[MASK]`).
    pub text: String,
    /// Vocabulary id of the marker.
    pub id: u32,
}

/// Trait for tokenizers that convert between text and token IDs.
///
/// Id assignment must be stable and deterministic.
pub trait Tokenizer {
    /// Encode text to token IDs.
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>>;

    /// Decode token IDs to text.
    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String>;

    /// Number of entries in the vocabulary, special tokens included.
    fn vocab_size(&self) -> usize;

    /// The mask marker, for masked-LM vocabularies.
    fn mask_token(&self) -> Option<MaskToken> {
        None
    }

    /// End-of-sequence id, if the vocabulary has one.
    fn eos_token_id(&self) -> Option<u32> {
        None
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>> {
        (**self).encode(text, add_special_tokens)
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        (**self).decode(ids, skip_special_tokens)
    }

    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn mask_token(&self) -> Option<MaskToken> {
        (**self).mask_token()
    }

    fn eos_token_id(&self) -> Option<u32> {
        (**self).eos_token_id()
    }
}

const MASK_MARKERS: [&str; 2] = ["[MASK]", "<mask>"];
const EOS_MARKERS: [&str; 2] = ["<|endoftext|>", "</s>"];

/// Wrapper around the `tokenizers` crate.
pub struct HfTokenizer {
    tokenizer: tokenizers::Tokenizer,
    mask_token: Option<MaskToken>,
    eos_token_id: Option<u32>,
}

impl HfTokenizer {
    /// Wraps an already constructed tokenizer, detecting its special tokens.
    pub fn new(tokenizer: tokenizers::Tokenizer) -> Self {
        let mask_token = MASK_MARKERS.iter().find_map(|marker| {
            tokenizer.token_to_id(marker).map(|id| MaskToken {
                text: (*marker).to_string(),
                id,
            })
        });
        let eos_token_id = EOS_MARKERS
            .iter()
            .find_map(|marker| tokenizer.token_to_id(marker));

        Self {
            tokenizer,
            mask_token,
            eos_token_id,
        }
    }

    /// Loads a tokenizer from a `tokenizer.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            Error::Tokenization(format!("failed to load {}: {e}", path.display()))
        })?;
        Ok(Self::new(tokenizer))
    }

    /// Downloads `tokenizer.json` from a Hub repository and loads it.
    pub fn from_pretrained(repo_id: &str, revision: &str) -> Result<Self> {
        let api =
            Api::new().map_err(|e| Error::ModelLoad(format!("Failed to create HF API: {e}")))?;
        let repo = api.repo(Repo::with_revision(
            repo_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));
        let path = repo.get("tokenizer.json").map_err(|e| {
            Error::ModelLoad(format!("Failed to download tokenizer.json for {repo_id}: {e}"))
        })?;
        Self::from_file(path)
    }

    /// Returns the wrapped tokenizer.
    pub fn inner(&self) -> &tokenizers::Tokenizer {
        &self.tokenizer
    }
}

impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, add_special_tokens)
            .map_err(|e| Error::Tokenization(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        self.tokenizer
            .decode(ids, skip_special_tokens)
            .map_err(|e| Error::Tokenization(e.to_string()))
    }

    fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    fn mask_token(&self) -> Option<MaskToken> {
        self.mask_token.clone()
    }

    fn eos_token_id(&self) -> Option<u32> {
        self.eos_token_id
    }
}
