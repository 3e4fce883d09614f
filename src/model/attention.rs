//! Multi-head self-attention.
//!
//! One implementation covers both encoder and decoder use:
//! - Bidirectional attention for BERT (every position sees every position)
//! - Causal attention for GPT-Neo global layers
//! - Windowed causal attention for GPT-Neo local layers
//!
//! There is no KV cache; every call attends over the full sequence.

use candle_core::{DType, Device, Module, Result, Tensor, D};
use candle_nn::Linear;

/// Which key positions a query position may attend to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionPattern {
    /// All positions.
    Bidirectional,
    /// Positions at or before the query.
    Causal,
    /// Causal, restricted to the last `window` positions.
    Local { window: usize },
}

impl AttentionPattern {
    /// True if `query` may attend to `key`.
    pub fn allows(&self, query: usize, key: usize) -> bool {
        match self {
            Self::Bidirectional => true,
            Self::Causal => key <= query,
            Self::Local { window } => key <= query && query - key < *window,
        }
    }

    /// Additive mask [1, 1, seq_len, seq_len], or `None` when nothing is masked.
    fn mask(&self, seq_len: usize, device: &Device) -> Result<Option<Tensor>> {
        if *self == Self::Bidirectional {
            return Ok(None);
        }
        let mask: Vec<f32> = (0..seq_len)
            .flat_map(|query| {
                (0..seq_len).map(move |key| {
                    if self.allows(query, key) {
                        0.0f32
                    } else {
                        f32::NEG_INFINITY
                    }
                })
            })
            .collect();
        Tensor::from_vec(mask, (1, 1, seq_len, seq_len), device).map(Some)
    }
}

/// Multi-head self-attention with separate Q/K/V projections.
#[derive(Debug, Clone)]
pub struct MultiHeadAttention {
    /// Query projection [hidden_size] -> [hidden_size].
    q_proj: Linear,
    /// Key projection [hidden_size] -> [hidden_size].
    k_proj: Linear,
    /// Value projection [hidden_size] -> [hidden_size].
    v_proj: Linear,
    /// Output projection [hidden_size] -> [hidden_size].
    out_proj: Linear,
    /// Number of heads.
    num_heads: usize,
    /// Dimension per head.
    head_dim: usize,
    /// Multiplier applied to raw scores.
    scale: f64,
    pattern: AttentionPattern,
}

impl MultiHeadAttention {
    /// Assembles attention from already-loaded projections.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        q_proj: Linear,
        k_proj: Linear,
        v_proj: Linear,
        out_proj: Linear,
        num_heads: usize,
        head_dim: usize,
        scale: f64,
        pattern: AttentionPattern,
    ) -> Self {
        Self {
            q_proj,
            k_proj,
            v_proj,
            out_proj,
            num_heads,
            head_dim,
            scale,
            pattern,
        }
    }

    /// Creates attention with random weights for testing.
    pub fn new_random(
        hidden_size: usize,
        num_heads: usize,
        pattern: AttentionPattern,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        let projection = || -> Result<Linear> {
            let weight = Tensor::randn(0.0f32, 0.02, (hidden_size, hidden_size), device)?
                .to_dtype(dtype)?;
            Ok(Linear::new(weight, None))
        };
        let head_dim = hidden_size / num_heads;
        Ok(Self::new(
            projection()?,
            projection()?,
            projection()?,
            projection()?,
            num_heads,
            head_dim,
            1.0 / (head_dim as f64).sqrt(),
            pattern,
        ))
    }

    /// Returns the attention pattern.
    pub fn pattern(&self) -> AttentionPattern {
        self.pattern
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `hidden_states` - Input tensor [batch, seq_len, hidden_size]
    ///
    /// # Returns
    ///
    /// Output tensor [batch, seq_len, hidden_size]
    pub fn forward(&self, hidden_states: &Tensor) -> Result<Tensor> {
        let (batch_size, seq_len, _) = hidden_states.dims3()?;
        let dtype = hidden_states.dtype();

        // [batch, seq_len, hidden] -> [batch, num_heads, seq_len, head_dim]
        let split_heads = |x: Tensor| -> Result<Tensor> {
            x.reshape((batch_size, seq_len, self.num_heads, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };
        let q = split_heads(self.q_proj.forward(hidden_states)?)?;
        let k = split_heads(self.k_proj.forward(hidden_states)?)?;
        let v = split_heads(self.v_proj.forward(hidden_states)?)?;

        // Scores in f32
        let q = q.to_dtype(DType::F32)?;
        let k = k.to_dtype(DType::F32)?;
        let k_t = k.transpose(D::Minus2, D::Minus1)?.contiguous()?;
        let mut scores = (q.matmul(&k_t)? * self.scale)?;
        if let Some(mask) = self.pattern.mask(seq_len, hidden_states.device())? {
            scores = scores.broadcast_add(&mask)?;
        }
        let weights = candle_nn::ops::softmax_last_dim(&scores)?.to_dtype(dtype)?;

        let attn_output = weights.matmul(&v)?;
        let attn_output = attn_output
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch_size, seq_len, self.num_heads * self.head_dim))?;

        self.out_proj.forward(&attn_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_allows() {
        assert!(AttentionPattern::Bidirectional.allows(0, 5));
        assert!(AttentionPattern::Causal.allows(3, 3));
        assert!(!AttentionPattern::Causal.allows(3, 4));

        let local = AttentionPattern::Local { window: 2 };
        assert!(local.allows(5, 5));
        assert!(local.allows(5, 4));
        assert!(!local.allows(5, 3));
        assert!(!local.allows(5, 6));
    }

    #[test]
    fn test_causal_mask_values() {
        let device = Device::Cpu;
        let mask = AttentionPattern::Causal.mask(3, &device).unwrap().unwrap();
        let values: Vec<f32> = mask.flatten_all().unwrap().to_vec1().unwrap();

        assert_eq!(values[0], 0.0);
        assert_eq!(values[1], f32::NEG_INFINITY);
        assert_eq!(values[3], 0.0);
        assert_eq!(values[8], 0.0);
    }

    #[test]
    fn test_bidirectional_has_no_mask() {
        let mask = AttentionPattern::Bidirectional.mask(4, &Device::Cpu).unwrap();
        assert!(mask.is_none());
    }

    #[test]
    fn test_attention_forward_shape() {
        let device = Device::Cpu;
        for pattern in [
            AttentionPattern::Bidirectional,
            AttentionPattern::Causal,
            AttentionPattern::Local { window: 2 },
        ] {
            let attn = MultiHeadAttention::new_random(16, 4, pattern, DType::F32, &device).unwrap();
            let x = Tensor::randn(0.0f32, 1.0, (1, 5, 16), &device).unwrap();
            let output = attn.forward(&x).unwrap();
            assert_eq!(output.dims(), &[1, 5, 16]);
        }
    }

    #[test]
    fn test_causal_first_position_ignores_future() {
        let device = Device::Cpu;
        let attn =
            MultiHeadAttention::new_random(8, 2, AttentionPattern::Causal, DType::F32, &device)
                .unwrap();
        let x = Tensor::randn(0.0f32, 1.0, (1, 4, 8), &device).unwrap();
        let prefix = x.narrow(1, 0, 1).unwrap();

        let full: Vec<f32> = attn
            .forward(&x)
            .unwrap()
            .narrow(1, 0, 1)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        let alone: Vec<f32> = attn
            .forward(&prefix)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();

        for (a, b) in full.iter().zip(&alone) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
