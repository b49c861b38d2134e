//! Building-block layers
//!
//! All layers operate on `[batch, time, channel]` tensors (`Array3<f64>`):
//! - Causal padding: left-only zero padding along the time axis
//! - Dilated convolution: no implicit padding, output shrinks by `(k-1)*d`
//! - Pointwise convolution: 1x1 channel mixing, independent per position
//! - Layer normalization over the channel axis
//! - Linear projection and item embedding

mod conv;
mod embedding;
mod linear;
mod norm;
mod padding;

pub use conv::{DilatedConv1d, PointwiseConv1d};
pub use embedding::Embedding;
pub use linear::Linear;
pub use norm::LayerNorm;
pub use padding::{causal_pad, causal_padding};

use ndarray::{Array, Array3, ArrayBase, ArrayView2, Data, Dimension, ShapeBuilder};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::{Normal, Uniform};

use crate::error::{ModelError, Result};

/// Activation functions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    /// Rectified Linear Unit: max(0, x)
    ReLU,
    /// Leaky ReLU: max(alpha * x, x)
    LeakyReLU(f64),
}

impl Activation {
    /// Negative slope used by the mixing branch
    pub const LEAKY_SLOPE: f64 = 0.01;

    /// Apply activation function element-wise
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::ReLU => x.max(0.0),
            Activation::LeakyReLU(alpha) => {
                if x > 0.0 { x } else { alpha * x }
            }
        }
    }

    /// Apply activation to a tensor in place
    pub fn apply_inplace(&self, arr: &mut Array3<f64>) {
        arr.mapv_inplace(|x| self.apply(x));
    }
}

/// Format an array shape the way error messages print it
pub(crate) fn fmt_shape(shape: &[usize]) -> String {
    format!("{:?}", shape)
}

/// Run `f` on every `[time, channel]` slice of a batch and stack the results
pub(crate) fn map_batches<F>(input: &Array3<f64>, out_channels: usize, f: F) -> Array3<f64>
where
    F: Fn(ArrayView2<'_, f64>) -> ndarray::Array2<f64>,
{
    let (batch, time, _) = input.dim();
    let mut output = Array3::zeros((batch, time, out_channels));
    for (mut out, x) in output.outer_iter_mut().zip(input.outer_iter()) {
        out.assign(&f(x));
    }
    output
}

/// Euclidean norm of a parameter tensor
pub fn l2_norm<S, D>(weights: &ArrayBase<S, D>) -> f64
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    weights.iter().map(|w| w * w).sum::<f64>().sqrt()
}

/// Uniform initialization in `±1/sqrt(fan_in)`
pub(crate) fn fan_in_uniform<Sh, D, R>(shape: Sh, fan_in: usize, rng: &mut R) -> Result<Array<f64, D>>
where
    Sh: ShapeBuilder<Dim = D>,
    D: Dimension,
    R: Rng + ?Sized,
{
    if fan_in == 0 {
        return Err(ModelError::config("fan_in must be positive"));
    }
    let bound = 1.0 / (fan_in as f64).sqrt();
    Ok(Array::random_using(shape, Uniform::new_inclusive(-bound, bound), rng))
}

/// Xavier/Glorot normal initialization: `N(0, 2 / (fan_in + fan_out))`
pub(crate) fn xavier_normal<Sh, D, R>(
    shape: Sh,
    fan_in: usize,
    fan_out: usize,
    rng: &mut R,
) -> Result<Array<f64, D>>
where
    Sh: ShapeBuilder<Dim = D>,
    D: Dimension,
    R: Rng + ?Sized,
{
    let std = (2.0 / (fan_in + fan_out) as f64).sqrt();
    let normal = Normal::new(0.0, std).map_err(|e| ModelError::config(e.to_string()))?;
    Ok(Array::random_using(shape, normal, rng))
}
