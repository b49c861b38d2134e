//! Mixing sub-branch
//!
//! A bottleneck of two pointwise convolutions that recombines channels at every
//! position without touching the receptive field.

use ndarray::Array3;
use rand::Rng;

use crate::error::{ModelError, Result};
use crate::layers::{l2_norm, Activation, PointwiseConv1d};

/// Pointwise `C -> C/4 -> leaky ReLU -> C` transform
#[derive(Debug, Clone)]
pub struct MixingBranch {
    /// Channel reduction
    pub reduce: PointwiseConv1d,
    /// Channel restoration
    pub restore: PointwiseConv1d,
}

impl MixingBranch {
    /// Reduction factor of the hidden width
    pub const REDUCTION: usize = 4;

    /// Create a mixing branch for `channels` wide inputs
    pub fn new<R: Rng + ?Sized>(channels: usize, rng: &mut R) -> Result<Self> {
        let hidden = Self::hidden_size(channels);
        if hidden == 0 {
            return Err(ModelError::config(format!(
                "mixing branch needs at least {} channels, got {}",
                Self::REDUCTION,
                channels
            )));
        }

        Ok(Self {
            reduce: PointwiseConv1d::new(channels, hidden, rng)?,
            restore: PointwiseConv1d::new(hidden, channels, rng)?,
        })
    }

    /// Hidden width for a given channel count
    pub fn hidden_size(channels: usize) -> usize {
        channels / Self::REDUCTION
    }

    /// Apply the branch to a `[batch, time, channel]` tensor
    pub fn forward(&self, input: &Array3<f64>) -> Result<Array3<f64>> {
        let mut hidden = self.reduce.forward(input)?;
        Activation::LeakyReLU(Activation::LEAKY_SLOPE).apply_inplace(&mut hidden);
        self.restore.forward(&hidden)
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        self.reduce.num_parameters() + self.restore.num_parameters()
    }

    /// L2 norms of the weight tensors (biases excluded)
    pub fn weight_norms(&self) -> Vec<f64> {
        vec![l2_norm(&self.reduce.weights), l2_norm(&self.restore.weights)]
    }
}
