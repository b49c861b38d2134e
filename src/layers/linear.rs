//! Fully connected projection applied at every sequence position

use ndarray::{Array1, Array2, Array3};
use rand::Rng;

use super::{fan_in_uniform, fmt_shape, map_batches, xavier_normal};
use crate::error::{ModelError, Result};

/// Linear layer: `y = x W^T + b` over the last axis
#[derive(Debug, Clone)]
pub struct Linear {
    /// Weight matrix: shape [out_features, in_features]
    pub weights: Array2<f64>,
    /// Bias terms: shape [out_features]
    pub bias: Array1<f64>,
}

impl Linear {
    /// Create a new linear layer with fan-in uniform initialization
    pub fn new<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Result<Self> {
        if in_features == 0 || out_features == 0 {
            return Err(ModelError::config(format!(
                "linear features must be positive, got {} -> {}",
                in_features, out_features
            )));
        }

        Ok(Self {
            weights: fan_in_uniform((out_features, in_features), in_features, rng)?,
            bias: fan_in_uniform(out_features, in_features, rng)?,
        })
    }

    /// Input width
    pub fn in_features(&self) -> usize {
        self.weights.ncols()
    }

    /// Output width
    pub fn out_features(&self) -> usize {
        self.weights.nrows()
    }

    /// Re-draw weights from Xavier normal and set every bias to `bias_value`
    pub fn reset_xavier<R: Rng + ?Sized>(&mut self, bias_value: f64, rng: &mut R) -> Result<()> {
        let (out_features, in_features) = self.weights.dim();
        self.weights = xavier_normal((out_features, in_features), in_features, out_features, rng)?;
        self.bias.fill(bias_value);
        Ok(())
    }

    /// Project a `[batch, time, in_features]` tensor to `[batch, time, out_features]`
    pub fn forward(&self, input: &Array3<f64>) -> Result<Array3<f64>> {
        if input.dim().2 != self.in_features() {
            return Err(ModelError::shape(
                format!("[batch, time, {}]", self.in_features()),
                fmt_shape(input.shape()),
            ));
        }

        let weights_t = self.weights.t();
        Ok(map_batches(input, self.out_features(), |x| {
            x.dot(&weights_t) + &self.bias
        }))
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}
