//! Full NextItNet Model Implementation

use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::stack::{DilationSchedule, ResidualStack};
use crate::error::{ModelError, Result};
use crate::layers::{fmt_shape, l2_norm, Embedding, Linear};
use crate::utils::ModelConfig;

/// Sequential recommender: item embedding, dilated residual stack, per-position projection
///
/// ```text
/// item ids [B, T] -> Embedding -> [B, T, C] -> ResidualStack -> [B, T, C] -> Linear -> [B, T, output_dim]
/// ```
///
/// Every position is projected, so position `t` carries the scores for the
/// item following `item_seq[.., t]`.
#[derive(Debug, Clone)]
pub struct NextItNet {
    /// Configuration
    pub config: ModelConfig,
    /// Item embedding table
    pub item_embedding: Embedding,
    /// Stack of residual blocks
    pub residual_blocks: ResidualStack,
    /// Output projection
    pub final_layer: Linear,
}

impl NextItNet {
    /// Create a new model, seeding parameters from `config.seed` when present
    pub fn new(config: ModelConfig) -> Result<Self> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, &mut rng)
    }

    /// Create a new model drawing parameters from `rng`
    pub fn with_rng<R: Rng + ?Sized>(config: ModelConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        let channels = config.embedding_size;
        let item_embedding = Embedding::new(config.vocab_size, channels, config.pad_token, rng)?;

        let schedule = DilationSchedule::repeated(&config.dilations, config.block_num)?;
        let residual_blocks = ResidualStack::new(
            &schedule,
            config.block_variant,
            channels,
            config.kernel_size,
            config.use_mixing,
            rng,
        )?;

        let final_layer = Linear::new(channels, config.output_dim, rng)?;

        let model = Self {
            config,
            item_embedding,
            residual_blocks,
            final_layer,
        };

        info!(
            blocks = model.residual_blocks.len(),
            variant = %model.config.block_variant,
            receptive_field = model.receptive_field(),
            parameters = model.num_parameters(),
            "NextItNet model created"
        );

        Ok(model)
    }

    /// Re-initialize the embedding table and output projection
    ///
    /// Embedding rows are drawn from `U(-b, b)` with `b = sqrt(1 / (output_dim + 1))`
    /// and the padding row is reset to zero. The output projection gets Xavier
    /// normal weights and a constant bias of `0.1`. Convolutions and norms are
    /// untouched. Construction never calls this.
    pub fn init_weights<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        let bound = self.config.embedding_init_bound();
        self.item_embedding.reset_uniform(bound, rng)?;
        self.final_layer.reset_xavier(0.1, rng)?;

        debug!(embedding_bound = bound, "re-initialized embedding and output projection");
        Ok(())
    }

    /// Embed and run the residual stack, returning `[batch, time, embedding_size]`
    pub fn encode(&self, item_seq: &Array2<usize>) -> Result<Array3<f64>> {
        let (batch, time) = item_seq.dim();
        if batch == 0 || time == 0 {
            return Err(ModelError::shape(
                "[batch >= 1, time >= 1]",
                fmt_shape(item_seq.shape()),
            ));
        }

        let item_seq_emb = self.item_embedding.forward(item_seq)?;
        if let Some(width) = self.residual_blocks.channels() {
            if item_seq_emb.dim().2 != width {
                return Err(ModelError::shape(
                    format!("[batch, time, {}]", width),
                    fmt_shape(item_seq_emb.shape()),
                ));
            }
        }

        self.residual_blocks.forward(&item_seq_emb)
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `item_seq` - Item ids of shape `[batch, time]`, each in `[0, vocab_size]`
    ///
    /// # Returns
    /// Logits of shape `[batch, time, output_dim]`
    pub fn forward(&self, item_seq: &Array2<usize>) -> Result<Array3<f64>> {
        let dilate_outputs = self.encode(item_seq)?;
        self.final_layer.forward(&dilate_outputs)
    }

    /// `reg_weight * Σ ‖W‖₂` over the residual stack's weight tensors
    pub fn block_l2_penalty(&self) -> f64 {
        if self.config.reg_weight > 0.0 {
            self.config.reg_weight * self.residual_blocks.weight_norm_sum()
        } else {
            0.0
        }
    }

    /// `reg_weight * (‖E‖₂ + ‖W_out‖₂)` over the embedding table and output projection
    pub fn embedding_l2_penalty(&self) -> f64 {
        self.config.reg_weight
            * (l2_norm(&self.item_embedding.weights) + l2_norm(&self.final_layer.weights))
    }

    /// Get receptive field of the model
    pub fn receptive_field(&self) -> usize {
        self.residual_blocks.receptive_field()
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        self.item_embedding.num_parameters()
            + self.residual_blocks.num_parameters()
            + self.final_layer.num_parameters()
    }

    /// Get model summary as string
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str("NextItNet Model Summary\n");
        s.push_str("=======================\n");
        s.push_str(&format!("Vocabulary size: {}\n", self.config.vocab_size));
        s.push_str(&format!("Pad token: {}\n", self.config.pad_token));
        s.push_str(&format!("Embedding size: {}\n", self.config.embedding_size));
        s.push_str(&format!("Output dim: {}\n", self.config.output_dim));
        s.push_str(&format!("Block variant: {}\n", self.config.block_variant));
        s.push_str(&format!("Mixing branch: {}\n", self.config.use_mixing));
        s.push_str(&format!("Kernel size: {}\n", self.config.kernel_size));
        s.push_str(&format!(
            "Dilations: {:?} x {}\n",
            self.config.dilations, self.config.block_num
        ));
        s.push_str(&format!("Num blocks: {}\n", self.residual_blocks.len()));
        s.push_str(&format!("Receptive field: {}\n", self.receptive_field()));
        s.push_str(&format!("Total parameters: {}\n", self.num_parameters()));
        s
    }
}
