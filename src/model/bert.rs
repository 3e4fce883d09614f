//! BERT masked language model.
//!
//! ```text
//! Input Token IDs
//!       │
//!       ▼
//! ┌──────────────────────────────┐
//! │ word + position + token_type │  → LayerNorm
//! └──────────────────────────────┘
//!       │
//!       ▼
//! ┌───────────────┐
//! │  BertLayer    │ × num_hidden_layers   (post-norm encoder)
//! └───────────────┘
//!       │
//!       ▼
//! ┌───────────────┐
//! │   MLM head    │  dense → act → LayerNorm → tied decoder
//! └───────────────┘
//!       │
//!       ▼
//! Logits [batch, seq_len, vocab_size]
//! ```

use candle_core::{DType, Device, Module, Result, Tensor};
use candle_nn::{embedding, linear, Embedding, Linear, VarBuilder};
use serde::Deserialize;

use super::attention::{AttentionPattern, MultiHeadAttention};
use super::mlp::{Activation, FeedForward};
use super::norm::LayerNorm;
use super::MaskedLanguageModel;

/// BERT configuration from HuggingFace config.json.
#[derive(Debug, Clone, Deserialize)]
pub struct BertConfig {
    /// Vocabulary size.
    pub vocab_size: usize,
    /// Hidden dimension.
    pub hidden_size: usize,
    /// Number of encoder layers.
    pub num_hidden_layers: usize,
    /// Number of attention heads.
    pub num_attention_heads: usize,
    /// Feed-forward dimension.
    pub intermediate_size: usize,
    /// Feed-forward activation.
    #[serde(default)]
    pub hidden_act: Activation,
    /// Maximum sequence length.
    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,
    /// Number of segment types.
    #[serde(default = "default_type_vocab_size")]
    pub type_vocab_size: usize,
    /// LayerNorm epsilon.
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
}

fn default_max_position_embeddings() -> usize {
    512
}

fn default_type_vocab_size() -> usize {
    2
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

impl BertConfig {
    /// Dimension per attention head.
    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }
}

#[derive(Debug, Clone)]
struct BertEmbeddings {
    word_embeddings: Embedding,
    position_embeddings: Embedding,
    token_type_embeddings: Embedding,
    layer_norm: LayerNorm,
}

impl BertEmbeddings {
    fn new(config: &BertConfig, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            word_embeddings: embedding(
                config.vocab_size,
                config.hidden_size,
                vb.pp("word_embeddings"),
            )?,
            position_embeddings: embedding(
                config.max_position_embeddings,
                config.hidden_size,
                vb.pp("position_embeddings"),
            )?,
            token_type_embeddings: embedding(
                config.type_vocab_size,
                config.hidden_size,
                vb.pp("token_type_embeddings"),
            )?,
            layer_norm: LayerNorm::load(
                config.hidden_size,
                config.layer_norm_eps,
                vb.pp("LayerNorm"),
            )?,
        })
    }

    fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let (_, seq_len) = input_ids.dims2()?;
        let device = input_ids.device();
        let position_ids = Tensor::arange(0u32, seq_len as u32, device)?.unsqueeze(0)?;
        // Single segment: every token has type 0
        let token_type_ids = input_ids.zeros_like()?;

        let embeddings = self
            .word_embeddings
            .forward(input_ids)?
            .broadcast_add(&self.position_embeddings.forward(&position_ids)?)?
            .add(&self.token_type_embeddings.forward(&token_type_ids)?)?;
        self.layer_norm.forward(&embeddings)
    }
}

/// One post-norm encoder layer.
#[derive(Debug, Clone)]
struct BertLayer {
    attention: MultiHeadAttention,
    attention_norm: LayerNorm,
    mlp: FeedForward,
    output_norm: LayerNorm,
}

impl BertLayer {
    fn new(config: &BertConfig, vb: VarBuilder) -> Result<Self> {
        let hidden = config.hidden_size;
        let self_vb = vb.pp("attention.self");
        let attention = MultiHeadAttention::new(
            linear(hidden, hidden, self_vb.pp("query"))?,
            linear(hidden, hidden, self_vb.pp("key"))?,
            linear(hidden, hidden, self_vb.pp("value"))?,
            linear(hidden, hidden, vb.pp("attention.output.dense"))?,
            config.num_attention_heads,
            config.head_dim(),
            1.0 / (config.head_dim() as f64).sqrt(),
            AttentionPattern::Bidirectional,
        );
        let attention_norm = LayerNorm::load(
            hidden,
            config.layer_norm_eps,
            vb.pp("attention.output.LayerNorm"),
        )?;
        let mlp = FeedForward::load(
            hidden,
            config.intermediate_size,
            config.hidden_act,
            vb.pp("intermediate.dense"),
            vb.pp("output.dense"),
        )?;
        let output_norm =
            LayerNorm::load(hidden, config.layer_norm_eps, vb.pp("output.LayerNorm"))?;

        Ok(Self {
            attention,
            attention_norm,
            mlp,
            output_norm,
        })
    }

    fn forward(&self, hidden_states: &Tensor) -> Result<Tensor> {
        let attended = self.attention.forward(hidden_states)?;
        let hidden_states = self.attention_norm.forward(&(attended + hidden_states)?)?;
        let transformed = self.mlp.forward(&hidden_states)?;
        self.output_norm.forward(&(transformed + hidden_states)?)
    }
}

/// BERT encoder with the masked-LM prediction head.
#[derive(Debug, Clone)]
pub struct BertForMaskedLm {
    embeddings: BertEmbeddings,
    layers: Vec<BertLayer>,
    /// Prediction head transform.
    head_dense: Linear,
    head_activation: Activation,
    head_norm: LayerNorm,
    /// Decoder tied to the word embeddings, with its own bias.
    decoder: Linear,
    device: Device,
    dtype: DType,
}

impl BertForMaskedLm {
    /// Creates the model from a VarBuilder rooted at the checkpoint top level
    /// (`bert.*` and `cls.*` keys).
    pub fn new(config: &BertConfig, vb: VarBuilder) -> Result<Self> {
        let bert_vb = vb.pp("bert");
        let embeddings = BertEmbeddings::new(config, bert_vb.pp("embeddings"))?;

        let mut layers = Vec::with_capacity(config.num_hidden_layers);
        for i in 0..config.num_hidden_layers {
            layers.push(BertLayer::new(config, bert_vb.pp(format!("encoder.layer.{i}")))?);
        }

        let head_vb = vb.pp("cls.predictions");
        let head_dense = linear(
            config.hidden_size,
            config.hidden_size,
            head_vb.pp("transform.dense"),
        )?;
        let head_norm = LayerNorm::load(
            config.hidden_size,
            config.layer_norm_eps,
            head_vb.pp("transform.LayerNorm"),
        )?;
        let decoder_bias = head_vb.get(config.vocab_size, "bias")?;
        let decoder = Linear::new(
            embeddings.word_embeddings.embeddings().clone(),
            Some(decoder_bias),
        );

        Ok(Self {
            embeddings,
            layers,
            head_dense,
            head_activation: config.hidden_act,
            head_norm,
            decoder,
            device: vb.device().clone(),
            dtype: vb.dtype(),
        })
    }

    /// Number of encoder layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Returns the data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Logits for every position.
    ///
    /// # Arguments
    ///
    /// * `input_ids` - Token IDs [batch, seq_len]
    ///
    /// # Returns
    ///
    /// Logits [batch, seq_len, vocab_size]
    pub fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let mut hidden_states = self.embeddings.forward(input_ids)?;
        for layer in &self.layers {
            hidden_states = layer.forward(&hidden_states)?;
        }

        let transformed = self
            .head_activation
            .forward(&self.head_dense.forward(&hidden_states)?)?;
        let transformed = self.head_norm.forward(&transformed)?;
        self.decoder.forward(&transformed)
    }
}

impl MaskedLanguageModel for BertForMaskedLm {
    fn forward(&self, input_ids: &Tensor) -> crate::Result<Tensor> {
        Ok(BertForMaskedLm::forward(self, input_ids)?)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}
