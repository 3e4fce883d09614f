//! Layer normalization.
//!
//! BERT and GPT-Neo both use classic LayerNorm: center by the mean, scale
//! by the standard deviation, then apply a learned affine transform.
//!
//! Reference: <https://arxiv.org/abs/1607.06450>

use candle_core::{DType, Device, Result, Tensor, D};
use candle_nn::VarBuilder;

/// Layer normalization with learned scale and shift.
///
/// Formula: `output = (x - mean(x)) / sqrt(var(x) + eps) * weight + bias`
#[derive(Debug, Clone)]
pub struct LayerNorm {
    /// Learnable scale [hidden_size].
    weight: Tensor,
    /// Learnable shift [hidden_size].
    bias: Tensor,
    /// Small constant for numerical stability.
    eps: f64,
}

impl LayerNorm {
    /// Creates a new LayerNorm layer.
    pub fn new(weight: Tensor, bias: Tensor, eps: f64) -> Self {
        Self { weight, bias, eps }
    }

    /// Creates a LayerNorm with unit scale and zero shift.
    ///
    /// Useful for testing or initialization before loading weights.
    pub fn new_identity(
        hidden_size: usize,
        eps: f64,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        let weight = Tensor::ones(hidden_size, dtype, device)?;
        let bias = Tensor::zeros(hidden_size, dtype, device)?;
        Ok(Self { weight, bias, eps })
    }

    /// Loads `weight`/`bias`, falling back to the `gamma`/`beta` names
    /// found in older BERT checkpoints.
    pub fn load(hidden_size: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        match (vb.get(hidden_size, "weight"), vb.get(hidden_size, "bias")) {
            (Ok(weight), Ok(bias)) => Ok(Self::new(weight, bias, eps)),
            (Err(err), _) | (_, Err(err)) => {
                match (vb.get(hidden_size, "gamma"), vb.get(hidden_size, "beta")) {
                    (Ok(weight), Ok(bias)) => Ok(Self::new(weight, bias, eps)),
                    _ => Err(err),
                }
            }
        }
    }

    /// Returns the epsilon value.
    pub fn eps(&self) -> f64 {
        self.eps
    }

    /// Applies layer normalization over the last dimension.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape [..., hidden_size]
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let dtype = x.dtype();
        // Statistics in f32 so half-precision weights stay stable
        let x = x.to_dtype(DType::F32)?;
        let mean = x.mean_keepdim(D::Minus1)?;
        let centered = x.broadcast_sub(&mean)?;
        let variance = centered.sqr()?.mean_keepdim(D::Minus1)?;
        let normalized = centered.broadcast_div(&(variance + self.eps)?.sqrt()?)?;

        normalized
            .to_dtype(dtype)?
            .broadcast_mul(&self.weight)?
            .broadcast_add(&self.bias)
    }
}
