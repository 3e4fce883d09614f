//! GPT-Neo causal language model.
//!
//! Pre-norm decoder blocks alternate between global causal attention and
//! local (windowed) causal attention, following `attention_types` in the
//! checkpoint config. Attention scores are not scaled by `1/sqrt(d)`.
//!
//! ```text
//! Input Token IDs
//!       │
//!       ▼
//! ┌───────────────┐
//! │  wte + wpe    │
//! └───────────────┘
//!       │
//!       ▼
//! ┌───────────────┐
//! │   GptNeoBlock │ × num_layers   (global / local alternating)
//! └───────────────┘
//!       │
//!       ▼
//! ┌───────────────┐
//! │     ln_f      │
//! └───────────────┘
//!       │
//!       ▼
//! ┌───────────────┐
//! │   LM Head     │  tied to wte
//! └───────────────┘
//!       │
//!       ▼
//! Logits for the last position [batch, vocab_size]
//! ```

use candle_core::{DType, Device, Module, Result, Tensor};
use candle_nn::{embedding, linear, linear_no_bias, Embedding, Linear, VarBuilder};
use serde::Deserialize;

use super::attention::{AttentionPattern, MultiHeadAttention};
use super::mlp::{Activation, FeedForward};
use super::norm::LayerNorm;
use super::CausalLanguageModel;

/// Attention flavour of one GPT-Neo layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionKind {
    Global,
    Local,
}

/// GPT-Neo configuration from HuggingFace config.json.
#[derive(Debug, Clone, Deserialize)]
pub struct GptNeoConfig {
    /// Vocabulary size.
    pub vocab_size: usize,
    /// Hidden dimension.
    pub hidden_size: usize,
    /// Number of decoder layers.
    pub num_layers: usize,
    /// Number of attention heads.
    pub num_heads: usize,
    /// Feed-forward dimension (defaults to 4 * hidden_size).
    #[serde(default)]
    pub intermediate_size: Option<usize>,
    /// Maximum sequence length.
    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,
    /// Window of local attention layers.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Run-length encoded layer pattern, e.g. `[[["global", "local"], 6]]`.
    pub attention_types: Vec<(Vec<AttentionKind>, usize)>,
    /// Feed-forward activation.
    #[serde(default = "default_activation")]
    pub activation_function: Activation,
    /// LayerNorm epsilon.
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
}

fn default_max_position_embeddings() -> usize {
    2048
}

fn default_window_size() -> usize {
    256
}

fn default_activation() -> Activation {
    Activation::GeluNew
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

impl GptNeoConfig {
    /// Dimension per attention head.
    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_heads
    }

    /// Feed-forward dimension.
    pub fn intermediate_size(&self) -> usize {
        self.intermediate_size.unwrap_or(4 * self.hidden_size)
    }

    /// Expands `attention_types` into one entry per layer.
    pub fn layer_attention(&self) -> Vec<AttentionKind> {
        self.attention_types
            .iter()
            .flat_map(|(pattern, repeat)| {
                std::iter::repeat(pattern.iter().copied())
                    .take(*repeat)
                    .flatten()
            })
            .collect()
    }

    fn pattern(&self, kind: AttentionKind) -> AttentionPattern {
        match kind {
            AttentionKind::Global => AttentionPattern::Causal,
            AttentionKind::Local => AttentionPattern::Local {
                window: self.window_size,
            },
        }
    }
}

/// One pre-norm decoder block.
#[derive(Debug, Clone)]
struct GptNeoBlock {
    ln_1: LayerNorm,
    attention: MultiHeadAttention,
    ln_2: LayerNorm,
    mlp: FeedForward,
}

impl GptNeoBlock {
    fn new(config: &GptNeoConfig, kind: AttentionKind, vb: VarBuilder) -> Result<Self> {
        let hidden = config.hidden_size;
        let attn_vb = vb.pp("attn.attention");
        let attention = MultiHeadAttention::new(
            linear_no_bias(hidden, hidden, attn_vb.pp("q_proj"))?,
            linear_no_bias(hidden, hidden, attn_vb.pp("k_proj"))?,
            linear_no_bias(hidden, hidden, attn_vb.pp("v_proj"))?,
            linear(hidden, hidden, attn_vb.pp("out_proj"))?,
            config.num_heads,
            config.head_dim(),
            1.0,
            config.pattern(kind),
        );

        Ok(Self {
            ln_1: LayerNorm::load(hidden, config.layer_norm_epsilon, vb.pp("ln_1"))?,
            attention,
            ln_2: LayerNorm::load(hidden, config.layer_norm_epsilon, vb.pp("ln_2"))?,
            mlp: FeedForward::load(
                hidden,
                config.intermediate_size(),
                config.activation_function,
                vb.pp("mlp.c_fc"),
                vb.pp("mlp.c_proj"),
            )?,
        })
    }

    fn forward(&self, hidden_states: &Tensor) -> Result<Tensor> {
        let attended = self.attention.forward(&self.ln_1.forward(hidden_states)?)?;
        let hidden_states = (attended + hidden_states)?;
        let transformed = self.mlp.forward(&self.ln_2.forward(&hidden_states)?)?;
        transformed + hidden_states
    }
}

/// GPT-Neo with its tied language-model head.
#[derive(Debug, Clone)]
pub struct GptNeoForCausalLm {
    wte: Embedding,
    wpe: Embedding,
    blocks: Vec<GptNeoBlock>,
    ln_f: LayerNorm,
    lm_head: Linear,
    device: Device,
    dtype: DType,
}

impl GptNeoForCausalLm {
    /// Creates the model from a VarBuilder rooted at the checkpoint top level
    /// (`transformer.*` keys).
    pub fn new(config: &GptNeoConfig, vb: VarBuilder) -> Result<Self> {
        let layer_attention = config.layer_attention();
        if layer_attention.len() != config.num_layers {
            candle_core::bail!(
                "attention_types describe {} layers, config has {}",
                layer_attention.len(),
                config.num_layers
            );
        }

        let vb_t = vb.pp("transformer");
        let wte = embedding(config.vocab_size, config.hidden_size, vb_t.pp("wte"))?;
        let wpe = embedding(
            config.max_position_embeddings,
            config.hidden_size,
            vb_t.pp("wpe"),
        )?;

        let mut blocks = Vec::with_capacity(config.num_layers);
        for (i, kind) in layer_attention.into_iter().enumerate() {
            blocks.push(GptNeoBlock::new(config, kind, vb_t.pp(format!("h.{i}")))?);
        }

        let ln_f = LayerNorm::load(config.hidden_size, config.layer_norm_epsilon, vb_t.pp("ln_f"))?;
        // Weight tying: lm_head shares the token embedding matrix
        let lm_head = Linear::new(wte.embeddings().clone(), None);

        Ok(Self {
            wte,
            wpe,
            blocks,
            ln_f,
            lm_head,
            device: vb.device().clone(),
            dtype: vb.dtype(),
        })
    }

    /// Number of decoder blocks.
    pub fn num_layers(&self) -> usize {
        self.blocks.len()
    }

    /// Attention pattern per block.
    pub fn attention_patterns(&self) -> Vec<AttentionPattern> {
        self.blocks.iter().map(|block| block.attention.pattern()).collect()
    }

    /// Returns the data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `input_ids` - Token IDs [batch, seq_len]
    ///
    /// # Returns
    ///
    /// Logits for the last position [batch, vocab_size]
    pub fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let (_, seq_len) = input_ids.dims2()?;
        let position_ids = Tensor::arange(0u32, seq_len as u32, input_ids.device())?.unsqueeze(0)?;

        let mut hidden_states = self
            .wte
            .forward(input_ids)?
            .broadcast_add(&self.wpe.forward(&position_ids)?)?;
        for block in &self.blocks {
            hidden_states = block.forward(&hidden_states)?;
        }
        let hidden_states = self.ln_f.forward(&hidden_states)?;

        let last_hidden = hidden_states.narrow(1, seq_len - 1, 1)?.squeeze(1)?;
        self.lm_head.forward(&last_hidden)
    }
}

impl CausalLanguageModel for GptNeoForCausalLm {
    fn forward(&self, input_ids: &Tensor) -> crate::Result<Tensor> {
        Ok(GptNeoForCausalLm::forward(self, input_ids)?)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}
