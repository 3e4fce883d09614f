//! Error types for lm-sampler.

use thiserror::Error;

/// Result type alias for lm-sampler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for lm-sampler.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested model identifier is not in the adapter's allow-list.
    #[error("model `{model}` is not supported; supported models: {supported}")]
    UnsupportedModel { model: String, supported: String },

    /// Configuration error raised while constructing an adapter.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller passed an argument outside the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An internal invariant did not hold.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    /// Model loading failed.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Tokenization error.
    #[error("tokenization error: {0}")]
    Tokenization(String),

    /// Tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for construction-time configuration failures.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnsupportedModel { .. } | Self::Configuration(_))
    }

    /// True for rejected call arguments.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}
