//! Configuration management
//!
//! This module handles loading, validating and saving configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ModelError, Result};
use crate::model::BlockVariant;

/// Model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Item embedding width, also the channel width of every residual block
    pub embedding_size: usize,
    /// Number of times the base dilation list is repeated
    pub block_num: usize,
    /// Base dilation list of one block group
    pub dilations: Vec<usize>,
    /// Dilated convolution kernel size
    pub kernel_size: usize,
    /// Largest item id; the embedding table has `vocab_size + 1` rows
    pub vocab_size: usize,
    /// Number of output labels scored at every position
    pub output_dim: usize,
    /// Enable the mixing sub-branch inside `b` blocks
    pub use_mixing: bool,
    /// Item id reserved for padding, in `[0, vocab_size]`
    pub pad_token: usize,
    /// Residual block layout
    pub block_variant: BlockVariant,
    /// Seed for parameter initialization; random when absent
    pub seed: Option<u64>,
    /// L2 weight used by the regularization penalties
    pub reg_weight: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding_size: 64,
            block_num: 5,
            dilations: vec![1, 4],
            kernel_size: 3,
            vocab_size: 1000,
            output_dim: 1000,
            use_mixing: false,
            pad_token: 1000,
            block_variant: BlockVariant::ParallelMix,
            seed: None,
            reg_weight: 1e-5,
        }
    }
}

impl ModelConfig {
    /// Check every construction-time constraint
    pub fn validate(&self) -> Result<()> {
        if self.embedding_size == 0 {
            return Err(ModelError::config("embedding_size must be positive"));
        }
        let min_channels = self.block_variant.min_channels(self.use_mixing);
        if self.embedding_size < min_channels {
            return Err(ModelError::config(format!(
                "embedding_size {} too small for block variant {} (mixing: {}), need at least {}",
                self.embedding_size, self.block_variant, self.use_mixing, min_channels
            )));
        }
        if self.block_num == 0 {
            return Err(ModelError::config("block_num must be positive"));
        }
        if self.dilations.is_empty() {
            return Err(ModelError::config("dilations must not be empty"));
        }
        if self.dilations.iter().any(|&d| d == 0) {
            return Err(ModelError::config(format!(
                "dilations must be positive, got {:?}",
                self.dilations
            )));
        }
        if self.kernel_size < 2 {
            return Err(ModelError::config(format!(
                "kernel_size must be at least 2, got {}",
                self.kernel_size
            )));
        }
        self.stack_lookback()?;
        if self.vocab_size == 0 {
            return Err(ModelError::config("vocab_size must be positive"));
        }
        if self.output_dim == 0 {
            return Err(ModelError::config("output_dim must be positive"));
        }
        if self.pad_token > self.vocab_size {
            return Err(ModelError::config(format!(
                "pad_token {} outside of [0, {}]",
                self.pad_token, self.vocab_size
            )));
        }
        if !self.reg_weight.is_finite() || self.reg_weight < 0.0 {
            return Err(ModelError::config(format!(
                "reg_weight must be finite and non-negative, got {}",
                self.reg_weight
            )));
        }
        Ok(())
    }

    /// Upper bound on how many past positions the residual stack reads
    ///
    /// Each block reads at most `(k - 1) * d` positions in its first stage and
    /// `(k - 1) * 2d` in its second. Fails when the total overflows or
    /// exceeds `isize::MAX`.
    pub fn stack_lookback(&self) -> Result<usize> {
        let span = self.kernel_size.saturating_sub(1);
        let mut total: usize = 0;
        for &d in &self.dilations {
            let block = span
                .checked_mul(d)
                .and_then(|first| span.checked_mul(2)?.checked_mul(d)?.checked_add(first))
                .and_then(|lookback| lookback.checked_mul(self.block_num));
            total = block
                .and_then(|b| total.checked_add(b))
                .filter(|&t| t <= isize::MAX as usize)
                .ok_or_else(|| {
                    ModelError::config(format!(
                        "dilation {} with kernel_size {} overflows the causal padding",
                        d, self.kernel_size
                    ))
                })?;
        }
        Ok(total)
    }

    /// Total number of residual blocks
    pub fn num_blocks(&self) -> usize {
        self.dilations.len() * self.block_num
    }

    /// Bound of the uniform embedding initialization: `sqrt(1 / (output_dim + 1))`
    pub fn embedding_init_bound(&self) -> f64 {
        (1.0 / (self.output_dim as f64 + 1.0)).sqrt()
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.model.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create default configuration file
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        config.save(path)
    }
}
