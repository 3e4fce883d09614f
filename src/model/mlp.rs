//! Position-wise feed-forward network.
//!
//! BERT and GPT-Neo share the same two-layer shape: expand to the
//! intermediate size, apply GELU, project back to the hidden size.

use candle_core::{DType, Device, Module, Result, Tensor};
use candle_nn::{linear, Linear, VarBuilder};
use serde::Deserialize;

/// GELU variant used by a checkpoint's `hidden_act`/`activation_function`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Exact erf-based GELU (BERT `gelu`).
    #[default]
    Gelu,
    /// Tanh approximation (GPT-Neo `gelu_new`).
    GeluNew,
    Relu,
}

impl Activation {
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        match self {
            Self::Gelu => x.gelu_erf(),
            Self::GeluNew => x.gelu(),
            Self::Relu => x.relu(),
        }
    }
}

/// Two-layer feed-forward block.
///
/// Formula: `output = down(act(up(x)))`
#[derive(Debug, Clone)]
pub struct FeedForward {
    /// Expansion projection [hidden_size] -> [intermediate_size].
    up: Linear,
    /// Contraction projection [intermediate_size] -> [hidden_size].
    down: Linear,
    activation: Activation,
}

impl FeedForward {
    /// Loads both projections with bias from the given weight prefixes.
    pub fn load(
        hidden_size: usize,
        intermediate_size: usize,
        activation: Activation,
        up_vb: VarBuilder,
        down_vb: VarBuilder,
    ) -> Result<Self> {
        let up = linear(hidden_size, intermediate_size, up_vb)?;
        let down = linear(intermediate_size, hidden_size, down_vb)?;
        Ok(Self {
            up,
            down,
            activation,
        })
    }

    /// Creates a FeedForward with random weights for testing.
    pub fn new_random(
        hidden_size: usize,
        intermediate_size: usize,
        activation: Activation,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        let scale = 0.02;
        let up_weight = Tensor::randn(0.0f32, scale, (intermediate_size, hidden_size), device)?
            .to_dtype(dtype)?;
        let down_weight = Tensor::randn(0.0f32, scale, (hidden_size, intermediate_size), device)?
            .to_dtype(dtype)?;
        let up_bias = Tensor::zeros(intermediate_size, dtype, device)?;
        let down_bias = Tensor::zeros(hidden_size, dtype, device)?;

        Ok(Self {
            up: Linear::new(up_weight, Some(up_bias)),
            down: Linear::new(down_weight, Some(down_bias)),
            activation,
        })
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape [..., hidden_size]
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let hidden = self.activation.forward(&self.up.forward(x)?)?;
        self.down.forward(&hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_forward_shape() {
        let device = Device::Cpu;
        let mlp = FeedForward::new_random(8, 32, Activation::Gelu, DType::F32, &device).unwrap();
        let x = Tensor::randn(0.0f32, 1.0, (1, 5, 8), &device).unwrap();

        let output = mlp.forward(&x).unwrap();
        assert_eq!(output.dims(), &[1, 5, 8]);
    }

    #[test]
    fn test_activation_names_deserialize() {
        let gelu: Activation = serde_json::from_str("\"gelu\"").unwrap();
        let gelu_new: Activation = serde_json::from_str("\"gelu_new\"").unwrap();
        assert_eq!(gelu, Activation::Gelu);
        assert_eq!(gelu_new, Activation::GeluNew);
    }

    #[test]
    fn test_gelu_variants_agree_near_zero() {
        let device = Device::Cpu;
        let x = Tensor::new(&[-1.0f32, 0.0, 1.0], &device).unwrap();
        let exact: Vec<f32> = Activation::Gelu.forward(&x).unwrap().to_vec1().unwrap();
        let approx: Vec<f32> = Activation::GeluNew.forward(&x).unwrap().to_vec1().unwrap();

        // gelu(1) ≈ 0.8413
        assert!((exact[2] - 0.8413).abs() < 1e-3);
        for (a, b) in exact.iter().zip(&approx) {
            assert!((a - b).abs() < 1e-2);
        }
    }
}
