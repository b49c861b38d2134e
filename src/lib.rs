//! # NextItNet for Sequential Recommendation
//!
//! This crate implements a NextItNet-style network for next-item prediction
//! over user interaction histories: item embeddings pass through a stack of
//! dilated causal convolution residual blocks and are projected to label
//! scores at every sequence position.
//!
//! ## Modules
//!
//! - `layers`: Causal padding, dilated/pointwise convolutions, layer norm, linear, embedding
//! - `model`: Mixing branch, residual block variants, residual stack, full model
//! - `scoring`: Loss functions and ranking over model output
//! - `utils`: Configuration and logging
//!
//! ## Example
//!
//! ```rust
//! use ndarray::array;
//! use nextitnet_rec::{ModelConfig, NextItNet};
//!
//! let config = ModelConfig {
//!     embedding_size: 8,
//!     block_num: 1,
//!     dilations: vec![1, 2],
//!     vocab_size: 100,
//!     pad_token: 100,
//!     output_dim: 5,
//!     seed: Some(7),
//!     ..Default::default()
//! };
//! let model = NextItNet::new(config)?;
//!
//! let item_seq = array![[3, 14, 15, 92, 65, 35], [8, 97, 93, 23, 84, 62]];
//! let logits = model.forward(&item_seq)?;
//! assert_eq!(logits.dim(), (2, 6, 5));
//! # Ok::<(), nextitnet_rec::ModelError>(())
//! ```

pub mod error;
pub mod layers;
pub mod model;
pub mod scoring;
pub mod utils;

// Re-export main types for convenience
pub use error::{ModelError, Result};
pub use layers::{causal_pad, DilatedConv1d, Embedding, LayerNorm, Linear, PointwiseConv1d};
pub use model::{
    BlockVariant, DilationSchedule, MixingBranch, NextItNet, ResidualBlock, ResidualStack,
};
pub use scoring::{BprLoss, CrossEntropyLoss, Objective, Ranker, TopKRanker};
pub use utils::{setup_logging, Config, ModelConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{ModelError, Result};
    pub use crate::model::*;
    pub use crate::scoring::*;
    pub use crate::utils::{Config, ModelConfig};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
