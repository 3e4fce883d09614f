//! Mock tokenizer and models shared by the adapter integration tests.

#![allow(dead_code)]

use candle_core::{Device, Tensor};
use lm_sampler::{
    CausalLanguageModel, Error, MaskToken, MaskedLanguageModel, Result, Tokenizer,
};

pub const CLS: u32 = 0;
pub const SEP: u32 = 1;
pub const MASK: u32 = 2;
pub const EOS: u32 = 3;
pub const UNK: u32 = 4;

/// Word-level vocabulary. Ids below `NUM_SPECIAL` are special tokens.
pub const VOCAB: [&str; 22] = [
    "[CLS]",
    "[SEP]",
    "[MASK]",
    "<|endoftext|>",
    "[UNK]",
    ".",
    "paris",
    "is",
    "the",
    "capital",
    "of",
    "france",
    "  ",
    "\t",
    "café",
    "stop",
    "hello",
    "world",
    "a",
    "b",
    "c",
    "\u{fffd} the",
];

const NUM_SPECIAL: u32 = 5;

pub fn id(word: &str) -> u32 {
    VOCAB
        .iter()
        .position(|token| *token == word)
        .map(|i| i as u32)
        .unwrap_or(UNK)
}

/// Splits on whitespace and peels a trailing period off each word.
///
/// Decoding prefixes every token with a space, like a byte-level BPE.
pub struct WordTokenizer {
    bert_style: bool,
    with_mask: bool,
}

impl WordTokenizer {
    /// `[CLS] ... [SEP]` framing and a `[MASK]` marker.
    pub fn masked() -> Self {
        Self {
            bert_style: true,
            with_mask: true,
        }
    }

    /// No framing, no mask, `<|endoftext|>` as EOS.
    pub fn causal() -> Self {
        Self {
            bert_style: false,
            with_mask: false,
        }
    }

    pub fn without_mask() -> Self {
        Self {
            bert_style: true,
            with_mask: false,
        }
    }
}

impl Tokenizer for WordTokenizer {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>> {
        let mut ids = Vec::new();
        if self.bert_style && add_special_tokens {
            ids.push(CLS);
        }
        for word in text.split_whitespace() {
            match word.strip_suffix('.') {
                Some(stem) if !stem.is_empty() => {
                    ids.push(id(stem));
                    ids.push(id("."));
                }
                _ => ids.push(id(word)),
            }
        }
        if self.bert_style && add_special_tokens {
            ids.push(SEP);
        }
        Ok(ids)
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        let mut text = String::new();
        for &token_id in ids {
            let token = VOCAB
                .get(token_id as usize)
                .ok_or_else(|| Error::Tokenization(format!("unknown id {token_id}")))?;
            if skip_special_tokens && token_id < NUM_SPECIAL {
                continue;
            }
            text.push(' ');
            text.push_str(token);
        }
        Ok(text)
    }

    fn vocab_size(&self) -> usize {
        VOCAB.len()
    }

    fn mask_token(&self) -> Option<MaskToken> {
        self.with_mask.then(|| MaskToken {
            text: "[MASK]".to_string(),
            id: MASK,
        })
    }

    fn eos_token_id(&self) -> Option<u32> {
        (!self.bert_style).then_some(EOS)
    }
}

/// Model whose logits follow a fixed script.
///
/// Every id gets a base score that decreases with the id, so without a
/// script the ranking is id order. Step `n` (position `offset + n`)
/// boosts `script[n]`; past the end of the script the last entry repeats.
pub struct ScriptedLm {
    offset: usize,
    script: Vec<u32>,
    device: Device,
}

impl ScriptedLm {
    pub fn new(offset: usize, script: Vec<u32>) -> Self {
        Self {
            offset,
            script,
            device: Device::Cpu,
        }
    }

    pub fn unscripted() -> Self {
        Self::new(0, Vec::new())
    }

    fn scores(&self, position: usize) -> Vec<f32> {
        let mut scores: Vec<f32> = (0..VOCAB.len()).map(|i| -0.1 * i as f32).collect();
        if let Some(last) = self.script.last() {
            let step = position.saturating_sub(self.offset);
            let token = self.script.get(step).unwrap_or(last);
            scores[*token as usize] = 10.0;
        }
        scores
    }
}

impl MaskedLanguageModel for ScriptedLm {
    fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let seq_len = input_ids.dim(1)?;
        let logits: Vec<f32> = (0..seq_len).flat_map(|p| self.scores(p)).collect();
        Ok(Tensor::from_vec(logits, (1, seq_len, VOCAB.len()), &self.device)?)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

impl CausalLanguageModel for ScriptedLm {
    fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let seq_len = input_ids.dim(1)?;
        Ok(Tensor::from_vec(self.scores(seq_len), (1, VOCAB.len()), &self.device)?)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}
