//! Causal Padding
//!
//! Left-pads the time axis so that a convolution applied afterwards with no
//! implicit padding keeps the sequence length and never reads future positions.

use ndarray::{s, Array3};

use crate::error::{ModelError, Result};

/// Largest tensor length, in elements, an `f64` array can address
const MAX_ELEMENTS: usize = isize::MAX as usize / std::mem::size_of::<f64>();

/// Number of zero positions needed in front of the sequence: `(k - 1) * d`
///
/// Fails with a config error when the product overflows or exceeds `isize::MAX`.
pub fn causal_padding(kernel_size: usize, dilation: usize) -> Result<usize> {
    kernel_size
        .saturating_sub(1)
        .checked_mul(dilation)
        .filter(|&padding| padding <= isize::MAX as usize)
        .ok_or_else(|| {
            ModelError::config(format!(
                "causal padding for kernel_size {} and dilation {} overflows",
                kernel_size, dilation
            ))
        })
}

/// Left-zero-pad a `[batch, time, channel]` tensor for a causal convolution
///
/// # Arguments
/// * `input` - Tensor of shape `[batch, time, channel]`
/// * `kernel_size` - Kernel size of the convolution that follows
/// * `dilation` - Dilation of the convolution that follows
///
/// # Returns
/// Tensor of shape `[batch, time + (kernel_size - 1) * dilation, channel]`
/// whose first `(kernel_size - 1) * dilation` positions are zero.
pub fn causal_pad(input: &Array3<f64>, kernel_size: usize, dilation: usize) -> Result<Array3<f64>> {
    if kernel_size == 0 {
        return Err(ModelError::config("kernel_size must be positive"));
    }
    if dilation == 0 {
        return Err(ModelError::config("dilation must be positive"));
    }

    let (batch, time, channels) = input.dim();
    let padding = causal_padding(kernel_size, dilation)?;
    let padded_len = time
        .checked_add(padding)
        .filter(|&len| {
            len.checked_mul(batch)
                .and_then(|n| n.checked_mul(channels))
                .map_or(false, |n| n <= MAX_ELEMENTS)
        })
        .ok_or_else(|| {
            ModelError::config(format!(
                "padding {} positions onto [{}, {}, {}] exceeds the addressable size",
                padding, batch, time, channels
            ))
        })?;

    let mut padded = Array3::zeros((batch, padded_len, channels));
    padded.slice_mut(s![.., padding.., ..]).assign(input);

    Ok(padded)
}
