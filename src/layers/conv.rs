//! Dilated and Pointwise 1D Convolutions
//!
//! Inputs are laid out as `[batch, time, channel]`. The dilated convolution
//! applies no padding of its own; callers left-pad with [`causal_pad`] first.
//!
//! [`causal_pad`]: super::causal_pad

use ndarray::{s, Array1, Array2, Array3, Axis};
use rand::Rng;

use super::{causal_padding, fan_in_uniform, fmt_shape, map_batches};
use crate::error::{ModelError, Result};

/// Dilated 1D Convolution Layer
///
/// Applies:
/// y[t] = b + Σⱼ W[:, :, j] · x[t + j·d]
///
/// over an already-padded input, so the output has
/// `time - (kernel_size - 1) * dilation` positions.
#[derive(Debug, Clone)]
pub struct DilatedConv1d {
    /// Input channels
    pub in_channels: usize,
    /// Output channels
    pub out_channels: usize,
    /// Kernel size
    pub kernel_size: usize,
    /// Dilation rate
    pub dilation: usize,
    /// Weights: shape [out_channels, in_channels, kernel_size]
    pub weights: Array3<f64>,
    /// Bias: shape [out_channels]
    pub bias: Array1<f64>,
}

impl DilatedConv1d {
    /// Create a new dilated convolution layer with random initialization
    ///
    /// # Arguments
    /// - `in_channels` - Number of input channels
    /// - `out_channels` - Number of output channels
    /// - `kernel_size` - Size of the convolution kernel, at least 2
    /// - `dilation` - Dilation rate, at least 1
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        dilation: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if in_channels == 0 || out_channels == 0 {
            return Err(ModelError::config(format!(
                "convolution channels must be positive, got {} -> {}",
                in_channels, out_channels
            )));
        }
        if kernel_size < 2 {
            return Err(ModelError::config(format!(
                "kernel_size must be at least 2 for a causal convolution, got {}",
                kernel_size
            )));
        }
        if dilation == 0 {
            return Err(ModelError::config("dilation must be positive"));
        }
        causal_padding(kernel_size, dilation)?;

        let fan_in = in_channels * kernel_size;
        let weights = fan_in_uniform((out_channels, in_channels, kernel_size), fan_in, rng)?;
        let bias = fan_in_uniform(out_channels, fan_in, rng)?;

        Ok(Self {
            in_channels,
            out_channels,
            kernel_size,
            dilation,
            weights,
            bias,
        })
    }

    /// Create with specific weights (for testing or loading pretrained)
    pub fn with_weights(dilation: usize, weights: Array3<f64>, bias: Array1<f64>) -> Result<Self> {
        let (out_channels, in_channels, kernel_size) = weights.dim();
        if bias.len() != out_channels {
            return Err(ModelError::shape(
                format!("bias of length {}", out_channels),
                format!("length {}", bias.len()),
            ));
        }
        if kernel_size < 2 || dilation == 0 || in_channels == 0 || out_channels == 0 {
            return Err(ModelError::config(format!(
                "invalid convolution weights {} with dilation {}",
                fmt_shape(weights.shape()),
                dilation
            )));
        }
        causal_padding(kernel_size, dilation)?;

        Ok(Self {
            in_channels,
            out_channels,
            kernel_size,
            dilation,
            weights,
            bias,
        })
    }

    /// Left padding this layer needs to preserve sequence length
    pub fn padding(&self) -> usize {
        self.kernel_size.saturating_sub(1).saturating_mul(self.dilation)
    }

    /// Get the effective receptive field size
    pub fn receptive_field(&self) -> usize {
        self.padding().saturating_add(1)
    }

    /// Apply the dilated convolution without implicit padding
    ///
    /// # Arguments
    /// - `input` - Tensor of shape `[batch, time, in_channels]`, usually the
    ///   output of `causal_pad`
    ///
    /// # Returns
    /// - Tensor of shape `[batch, time - (kernel_size - 1) * dilation, out_channels]`
    pub fn forward(&self, input: &Array3<f64>) -> Result<Array3<f64>> {
        let (batch, time, channels) = input.dim();
        if channels != self.in_channels {
            return Err(ModelError::shape(
                format!("[batch, time, {}]", self.in_channels),
                fmt_shape(input.shape()),
            ));
        }
        if time < self.receptive_field() {
            return Err(ModelError::SequenceTooShort {
                len: time,
                required: self.receptive_field(),
            });
        }

        let out_len = time - self.padding();
        let mut output = Array3::zeros((batch, out_len, self.out_channels));

        for (mut out, x) in output.outer_iter_mut().zip(input.outer_iter()) {
            for j in 0..self.kernel_size {
                let offset = j * self.dilation;
                // [out, in] -> [in, out]
                let tap = self.weights.index_axis(Axis(2), j);
                let window = x.slice(s![offset..offset + out_len, ..]);
                out += &window.dot(&tap.t());
            }
            out += &self.bias;
        }

        Ok(output)
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}

/// 1x1 Convolution (Pointwise convolution)
///
/// A learned linear map over channels applied independently at every
/// position, so it never mixes information across time.
#[derive(Debug, Clone)]
pub struct PointwiseConv1d {
    /// Input channels
    pub in_channels: usize,
    /// Output channels
    pub out_channels: usize,
    /// Weights: shape [out_channels, in_channels]
    pub weights: Array2<f64>,
    /// Bias: shape [out_channels]
    pub bias: Array1<f64>,
}

impl PointwiseConv1d {
    /// Create a new 1x1 convolution layer
    pub fn new<R: Rng + ?Sized>(in_channels: usize, out_channels: usize, rng: &mut R) -> Result<Self> {
        if in_channels == 0 || out_channels == 0 {
            return Err(ModelError::config(format!(
                "pointwise channels must be positive, got {} -> {}",
                in_channels, out_channels
            )));
        }

        let weights = fan_in_uniform((out_channels, in_channels), in_channels, rng)?;
        let bias = fan_in_uniform(out_channels, in_channels, rng)?;

        Ok(Self {
            in_channels,
            out_channels,
            weights,
            bias,
        })
    }

    /// Apply the 1x1 convolution
    ///
    /// # Arguments
    /// - `input` - Tensor of shape `[batch, time, in_channels]`
    ///
    /// # Returns
    /// - Tensor of shape `[batch, time, out_channels]`
    pub fn forward(&self, input: &Array3<f64>) -> Result<Array3<f64>> {
        if input.dim().2 != self.in_channels {
            return Err(ModelError::shape(
                format!("[batch, time, {}]", self.in_channels),
                fmt_shape(input.shape()),
            ));
        }

        let weights_t = self.weights.t();
        Ok(map_batches(input, self.out_channels, |x| {
            x.dot(&weights_t) + &self.bias
        }))
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::causal_pad;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_dilated_conv_creation() {
        let conv = DilatedConv1d::new(5, 32, 3, 4, &mut rng()).unwrap();
        assert_eq!(conv.in_channels, 5);
        assert_eq!(conv.out_channels, 32);
        assert_eq!(conv.weights.dim(), (32, 5, 3));
        assert_eq!(conv.num_parameters(), 32 * 5 * 3 + 32);
    }

    #[test]
    fn test_receptive_field() {
        let conv = DilatedConv1d::new(5, 32, 3, 4, &mut rng()).unwrap();
        // RF = (kernel_size - 1) * dilation + 1 = (3-1)*4 + 1 = 9
        assert_eq!(conv.receptive_field(), 9);
    }

    #[test]
    fn test_invalid_kernel_and_dilation() {
        assert!(DilatedConv1d::new(4, 4, 1, 1, &mut rng()).is_err());
        assert!(DilatedConv1d::new(4, 4, 3, 0, &mut rng()).is_err());
        assert!(DilatedConv1d::new(0, 4, 3, 1, &mut rng()).is_err());
    }

    #[test]
    fn test_overflowing_dilation_rejected() {
        let err = DilatedConv1d::new(4, 4, 3, usize::MAX / 2 + 1, &mut rng()).unwrap_err();
        assert!(err.is_config_error());

        let weights = Array3::zeros((2, 2, 3));
        let err = DilatedConv1d::with_weights(1 << 62, weights, Array1::zeros(2)).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_padded_length_preserved() {
        let mut rng = rng();
        for kernel_size in [2, 3, 5] {
            for dilation in [1, 2, 4, 8] {
                for time in [1, 6, 17] {
                    let conv = DilatedConv1d::new(3, 4, kernel_size, dilation, &mut rng).unwrap();
                    let input = Array3::from_elem((2, time, 3), 0.5);
                    let padded = causal_pad(&input, kernel_size, dilation).unwrap();
                    let output = conv.forward(&padded).unwrap();
                    assert_eq!(output.dim(), (2, time, 4));
                }
            }
        }
    }

    #[test]
    fn test_unpadded_short_input_rejected() {
        let conv = DilatedConv1d::new(2, 2, 3, 4, &mut rng()).unwrap();
        let input = Array3::zeros((1, 8, 2));
        let err = conv.forward(&input).unwrap_err();
        assert!(matches!(err, ModelError::SequenceTooShort { len: 8, required: 9 }));
    }

    #[test]
    fn test_channel_mismatch_rejected() {
        let conv = DilatedConv1d::new(2, 2, 3, 1, &mut rng()).unwrap();
        let input = Array3::zeros((1, 8, 3));
        assert!(conv.forward(&input).unwrap_err().is_shape_error());
    }

    #[test]
    fn test_causal() {
        // Simple sum kernel, no bias
        let weights = Array3::ones((1, 1, 3));
        let conv = DilatedConv1d::with_weights(2, weights, Array1::zeros(1)).unwrap();

        // Impulse at t=3
        let mut input = Array3::zeros((1, 7, 1));
        input[[0, 3, 0]] = 1.0;

        let output = conv.forward(&causal_pad(&input, 3, 2).unwrap()).unwrap();

        // Taps read t, t-2, t-4
        for t in 0..3 {
            assert_eq!(output[[0, t, 0]], 0.0);
        }
        assert_eq!(output[[0, 3, 0]], 1.0);
        assert_eq!(output[[0, 4, 0]], 0.0);
        assert_eq!(output[[0, 5, 0]], 1.0);
    }

    #[test]
    fn test_tap_order_matches_padded_offsets() {
        // Tap j reads padded[t + j*d]; with padding 2 and d=1 tap 2 is the current step
        let mut weights = Array3::zeros((1, 1, 3));
        weights[[0, 0, 2]] = 1.0;
        let conv = DilatedConv1d::with_weights(1, weights, Array1::zeros(1)).unwrap();

        let input = Array3::from_shape_vec((1, 4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let output = conv.forward(&causal_pad(&input, 3, 1).unwrap()).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_conv1x1_shape() {
        let conv = PointwiseConv1d::new(32, 8, &mut rng()).unwrap();
        let input = Array3::zeros((2, 100, 32));
        let output = conv.forward(&input).unwrap();
        assert_eq!(output.dim(), (2, 100, 8));
    }

    #[test]
    fn test_conv1x1_is_pointwise() {
        let conv = PointwiseConv1d::new(2, 2, &mut rng()).unwrap();

        let mut input1 = Array3::zeros((1, 3, 2));
        input1[[0, 1, 0]] = 1.0;

        let mut input2 = input1.clone();
        input2[[0, 0, 0]] = 999.0;

        let output1 = conv.forward(&input1).unwrap();
        let output2 = conv.forward(&input2).unwrap();

        assert!((output1[[0, 1, 0]] - output2[[0, 1, 0]]).abs() < 1e-10);
        assert!((output1[[0, 1, 1]] - output2[[0, 1, 1]]).abs() < 1e-10);
    }
}
