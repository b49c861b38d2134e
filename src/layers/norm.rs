//! Layer normalization over the channel axis

use ndarray::{Array1, Array3, Axis, Zip};

use super::fmt_shape;
use crate::error::{ModelError, Result};

/// Layer normalization
///
/// Normalizes every `[channel]` vector to zero mean and unit variance, then
/// applies a learned per-channel gain and bias.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    /// Scale parameter (gamma)
    pub gamma: Array1<f64>,
    /// Shift parameter (beta)
    pub beta: Array1<f64>,
    /// Small constant for numerical stability
    pub eps: f64,
}

impl LayerNorm {
    /// Epsilon used by every normalization inside the residual blocks
    pub const DEFAULT_EPS: f64 = 1e-8;

    /// Create new layer normalization with unit gain and zero bias
    pub fn new(num_channels: usize) -> Self {
        Self::with_eps(num_channels, Self::DEFAULT_EPS)
    }

    /// Create with a custom epsilon
    pub fn with_eps(num_channels: usize, eps: f64) -> Self {
        Self {
            gamma: Array1::ones(num_channels),
            beta: Array1::zeros(num_channels),
            eps,
        }
    }

    /// Number of normalized channels
    pub fn num_channels(&self) -> usize {
        self.gamma.len()
    }

    /// Apply layer normalization to a `[batch, time, channel]` tensor
    pub fn forward(&self, input: &Array3<f64>) -> Result<Array3<f64>> {
        if input.dim().2 != self.num_channels() {
            return Err(ModelError::shape(
                format!("[batch, time, {}]", self.num_channels()),
                fmt_shape(input.shape()),
            ));
        }

        let mut output = input.clone();
        for mut lane in output.lanes_mut(Axis(2)) {
            let mean = lane.mean().unwrap_or(0.0);
            let var = lane.mapv(|x| (x - mean).powi(2)).mean().unwrap_or(0.0);
            let std = (var + self.eps).sqrt();

            Zip::from(&mut lane)
                .and(&self.gamma)
                .and(&self.beta)
                .for_each(|x, &g, &b| *x = (*x - mean) / std * g + b);
        }

        Ok(output)
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        self.gamma.len() + self.beta.len()
    }
}
