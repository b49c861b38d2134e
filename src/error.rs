//! Error types for the NextItNet library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, ModelError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum ModelError {
    /// Invalid model or layer configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tensor shape does not match what a layer expects
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// Sequence is shorter than the receptive field of a convolution
    #[error("Sequence too short: {len} positions, convolution needs at least {required}")]
    SequenceTooShort { len: usize, required: usize },

    /// Item id outside of the embedding table
    #[error("Item id {id} out of range for vocabulary of size {vocab_size}")]
    ItemOutOfRange { id: usize, vocab_size: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error("Failed to parse config: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("Failed to serialize config: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl ModelError {
    /// Build a configuration error from any displayable message
    pub fn config(msg: impl Into<String>) -> Self {
        ModelError::InvalidConfig(msg.into())
    }

    /// Build a shape mismatch error
    pub fn shape(expected: impl Into<String>, got: impl Into<String>) -> Self {
        ModelError::ShapeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Whether this error was raised while validating configuration
    pub fn is_config_error(&self) -> bool {
        matches!(self, ModelError::InvalidConfig(_))
    }

    /// Whether this error was raised by a shape check during a forward pass
    pub fn is_shape_error(&self) -> bool {
        matches!(
            self,
            ModelError::ShapeMismatch { .. }
                | ModelError::SequenceTooShort { .. }
                | ModelError::ItemOutOfRange { .. }
        )
    }
}
