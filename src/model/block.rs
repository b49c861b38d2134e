//! Residual Block Implementations
//!
//! Two block families share the same contract: a `[batch, time, channel]`
//! tensor in, a tensor of identical shape out, with the block input added back
//! at the end.
//!
//! Bottleneck (variant a):
//! ```text
//! Input
//!   |
//!   +--> LN -> ReLU -> 1x1 (C -> C/2) -> LN -> ReLU -> pad -> DilatedConv(d)
//!   |      -> LN -> ReLU -> 1x1 (C/2 -> C)
//!   |                                   |
//!   +------------(residual)-------------+--> Output
//! ```
//!
//! Paired dilated convolutions (variant b):
//! ```text
//! Input
//!   |
//!   +--> pad -> DilatedConv(d)  [+/= mix] -> LN -> ReLU
//!   |      -> pad -> DilatedConv(2d) [+/= mix] -> LN -> ReLU
//!   |                                               |
//!   +------------------(residual)-------------------+--> Output
//! ```
//! where `+ mix` adds the mixing branch (parallel) and `= mix` substitutes it
//! for the convolution output (serial).

use ndarray::Array3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::mixing::MixingBranch;
use crate::error::{ModelError, Result};
use crate::layers::{
    causal_pad, fmt_shape, l2_norm, Activation, DilatedConv1d, LayerNorm, PointwiseConv1d,
};

/// Which residual block the stack is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlockVariant {
    /// Bottleneck block with a single half-width dilated convolution
    #[serde(rename = "a")]
    Bottleneck,
    /// Two dilated convolutions, mixing branch added to each stage
    #[default]
    #[serde(rename = "b_parallel")]
    ParallelMix,
    /// Two dilated convolutions, mixing branch replaces both stages
    #[serde(rename = "b_serial")]
    SerialMix,
    /// Two dilated convolutions, mixing branch replaces the final stage
    #[serde(rename = "b_mixed_serial")]
    MixedSerial,
}

impl BlockVariant {
    /// All variants, in declaration order
    pub const ALL: [BlockVariant; 4] = [
        BlockVariant::Bottleneck,
        BlockVariant::ParallelMix,
        BlockVariant::SerialMix,
        BlockVariant::MixedSerial,
    ];

    /// Short name used in configuration files
    pub fn name(&self) -> &'static str {
        match self {
            BlockVariant::Bottleneck => "a",
            BlockVariant::ParallelMix => "b_parallel",
            BlockVariant::SerialMix => "b_serial",
            BlockVariant::MixedSerial => "b_mixed_serial",
        }
    }

    /// Smallest channel width this variant can be built with
    pub fn min_channels(&self, use_mixing: bool) -> usize {
        match self {
            BlockVariant::Bottleneck => 2,
            _ if use_mixing => MixingBranch::REDUCTION,
            _ => 1,
        }
    }
}

impl std::fmt::Display for BlockVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How the mixing branch joins a paired block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixMode {
    /// Added to both convolution stages
    Parallel,
    /// Substituted for both convolution stages
    Serial,
    /// Substituted for the normalized second stage only
    LateSerial,
}

fn check_input(input: &Array3<f64>, channels: usize) -> Result<()> {
    let (batch, time, width) = input.dim();
    if width != channels {
        return Err(ModelError::shape(
            format!("[batch, time, {}]", channels),
            fmt_shape(input.shape()),
        ));
    }
    if batch == 0 {
        return Err(ModelError::shape("non-empty batch", fmt_shape(input.shape())));
    }
    if time == 0 {
        return Err(ModelError::SequenceTooShort { len: 0, required: 1 });
    }
    Ok(())
}

fn norm_relu(norm: &LayerNorm, input: &Array3<f64>) -> Result<Array3<f64>> {
    let mut out = norm.forward(input)?;
    Activation::ReLU.apply_inplace(&mut out);
    Ok(out)
}

/// Residual block (a): bottleneck around one dilated convolution
#[derive(Debug, Clone)]
pub struct BottleneckBlock {
    /// Norm on the block input
    pub ln1: LayerNorm,
    /// 1x1 channel halving
    pub conv1: PointwiseConv1d,
    /// Norm before the dilated convolution
    pub ln2: LayerNorm,
    /// Half-width dilated convolution
    pub conv2: DilatedConv1d,
    /// Norm before channel restoration
    pub ln3: LayerNorm,
    /// 1x1 channel restoration
    pub conv3: PointwiseConv1d,
}

impl BottleneckBlock {
    /// Create a bottleneck block for `channels` wide inputs
    pub fn new<R: Rng + ?Sized>(
        channels: usize,
        kernel_size: usize,
        dilation: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let half = channels / 2;
        if half == 0 {
            return Err(ModelError::config(format!(
                "bottleneck block needs at least 2 channels, got {}",
                channels
            )));
        }

        Ok(Self {
            ln1: LayerNorm::new(channels),
            conv1: PointwiseConv1d::new(channels, half, rng)?,
            ln2: LayerNorm::new(half),
            conv2: DilatedConv1d::new(half, half, kernel_size, dilation, rng)?,
            ln3: LayerNorm::new(half),
            conv3: PointwiseConv1d::new(half, channels, rng)?,
        })
    }

    /// Channel width of the block input and output
    pub fn channels(&self) -> usize {
        self.conv1.in_channels
    }

    /// Forward pass: `[batch, time, C]` -> `[batch, time, C]`
    pub fn forward(&self, input: &Array3<f64>) -> Result<Array3<f64>> {
        check_input(input, self.channels())?;

        let out = self.conv1.forward(&norm_relu(&self.ln1, input)?)?;

        let out2 = norm_relu(&self.ln2, &out)?;
        let out2 = causal_pad(&out2, self.conv2.kernel_size, self.conv2.dilation)?;
        let out2 = self.conv2.forward(&out2)?;

        let out3 = self.conv3.forward(&norm_relu(&self.ln3, &out2)?)?;
        Ok(out3 + input)
    }

    /// Past positions one output position can read
    pub fn lookback(&self) -> usize {
        self.conv2.padding()
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        self.ln1.num_parameters()
            + self.conv1.num_parameters()
            + self.ln2.num_parameters()
            + self.conv2.num_parameters()
            + self.ln3.num_parameters()
            + self.conv3.num_parameters()
    }

    /// L2 norms of every weight tensor, norm gains included
    pub fn weight_norms(&self) -> Vec<f64> {
        vec![
            l2_norm(&self.ln1.gamma),
            l2_norm(&self.conv1.weights),
            l2_norm(&self.ln2.gamma),
            l2_norm(&self.conv2.weights),
            l2_norm(&self.ln3.gamma),
            l2_norm(&self.conv3.weights),
        ]
    }
}

/// Residual block (b): two dilated convolutions, the second at twice the dilation
#[derive(Debug, Clone)]
pub struct PairedDilatedBlock {
    /// First dilated convolution (dilation d)
    pub conv1: DilatedConv1d,
    /// Norm after the first stage
    pub ln1: LayerNorm,
    /// Second dilated convolution (dilation 2d)
    pub conv2: DilatedConv1d,
    /// Norm after the second stage
    pub ln2: LayerNorm,
    /// Mixing branch shared by both stages, present when mixing is enabled
    pub mixing: Option<MixingBranch>,
    /// How the mixing branch joins the convolution path
    pub mode: MixMode,
}

impl PairedDilatedBlock {
    /// Create a paired block for `channels` wide inputs
    pub fn new<R: Rng + ?Sized>(
        channels: usize,
        kernel_size: usize,
        dilation: usize,
        mode: MixMode,
        use_mixing: bool,
        rng: &mut R,
    ) -> Result<Self> {
        let outer_dilation = dilation.checked_mul(2).ok_or_else(|| {
            ModelError::config(format!("second-stage dilation 2 * {} overflows", dilation))
        })?;
        let conv1 = DilatedConv1d::new(channels, channels, kernel_size, dilation, rng)?;
        let conv2 = DilatedConv1d::new(channels, channels, kernel_size, outer_dilation, rng)?;
        let mixing = if use_mixing {
            Some(MixingBranch::new(channels, rng)?)
        } else {
            None
        };

        Ok(Self {
            conv1,
            ln1: LayerNorm::new(channels),
            conv2,
            ln2: LayerNorm::new(channels),
            mixing,
            mode,
        })
    }

    /// Channel width of the block input and output
    pub fn channels(&self) -> usize {
        self.conv1.in_channels
    }

    fn conv_stage(conv: &DilatedConv1d, input: &Array3<f64>) -> Result<Array3<f64>> {
        let padded = causal_pad(input, conv.kernel_size, conv.dilation)?;
        conv.forward(&padded)
    }

    /// Forward pass: `[batch, time, C]` -> `[batch, time, C]`
    pub fn forward(&self, input: &Array3<f64>) -> Result<Array3<f64>> {
        check_input(input, self.channels())?;

        let stage1 = match (&self.mixing, self.mode) {
            (Some(mp), MixMode::Parallel) => Self::conv_stage(&self.conv1, input)? + mp.forward(input)?,
            (Some(mp), MixMode::Serial) => mp.forward(input)?,
            _ => Self::conv_stage(&self.conv1, input)?,
        };
        let out = norm_relu(&self.ln1, &stage1)?;

        let out2 = match (&self.mixing, self.mode) {
            (Some(mp), MixMode::Parallel) => {
                norm_relu(&self.ln2, &(Self::conv_stage(&self.conv2, &out)? + mp.forward(&out)?))?
            }
            (Some(mp), MixMode::Serial) => norm_relu(&self.ln2, &mp.forward(&out)?)?,
            (Some(mp), MixMode::LateSerial) => mp.forward(&out)?,
            (None, _) => norm_relu(&self.ln2, &Self::conv_stage(&self.conv2, &out)?)?,
        };

        Ok(out2 + input)
    }

    /// Past positions one output position can read
    pub fn lookback(&self) -> usize {
        match (&self.mixing, self.mode) {
            (Some(_), MixMode::Serial) => 0,
            (Some(_), MixMode::LateSerial) => self.conv1.padding(),
            _ => self.conv1.padding().saturating_add(self.conv2.padding()),
        }
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        self.conv1.num_parameters()
            + self.ln1.num_parameters()
            + self.conv2.num_parameters()
            + self.ln2.num_parameters()
            + self.mixing.as_ref().map_or(0, MixingBranch::num_parameters)
    }

    /// L2 norms of every weight tensor, norm gains included
    pub fn weight_norms(&self) -> Vec<f64> {
        let mut norms = vec![
            l2_norm(&self.conv1.weights),
            l2_norm(&self.ln1.gamma),
            l2_norm(&self.conv2.weights),
            l2_norm(&self.ln2.gamma),
        ];
        if let Some(mp) = &self.mixing {
            norms.extend(mp.weight_norms());
        }
        norms
    }
}

/// A residual block of any variant
#[derive(Debug, Clone)]
pub enum ResidualBlock {
    /// Variant a
    Bottleneck(BottleneckBlock),
    /// Variants b_parallel, b_serial, b_mixed_serial
    Paired(PairedDilatedBlock),
}

impl ResidualBlock {
    /// Create a block of the given variant
    ///
    /// # Arguments
    /// * `variant` - Block layout
    /// * `channels` - Channel width, equal to the embedding size
    /// * `kernel_size` - Dilated convolution kernel size, at least 2
    /// * `dilation` - Base dilation of this block
    /// * `use_mixing` - Enable the mixing sub-branch (ignored by the bottleneck variant)
    pub fn new<R: Rng + ?Sized>(
        variant: BlockVariant,
        channels: usize,
        kernel_size: usize,
        dilation: usize,
        use_mixing: bool,
        rng: &mut R,
    ) -> Result<Self> {
        let mode = match variant {
            BlockVariant::Bottleneck => {
                return Ok(ResidualBlock::Bottleneck(BottleneckBlock::new(
                    channels,
                    kernel_size,
                    dilation,
                    rng,
                )?))
            }
            BlockVariant::ParallelMix => MixMode::Parallel,
            BlockVariant::SerialMix => MixMode::Serial,
            BlockVariant::MixedSerial => MixMode::LateSerial,
        };

        Ok(ResidualBlock::Paired(PairedDilatedBlock::new(
            channels,
            kernel_size,
            dilation,
            mode,
            use_mixing,
            rng,
        )?))
    }

    /// Forward pass: `[batch, time, C]` -> `[batch, time, C]`
    pub fn forward(&self, input: &Array3<f64>) -> Result<Array3<f64>> {
        match self {
            ResidualBlock::Bottleneck(block) => block.forward(input),
            ResidualBlock::Paired(block) => block.forward(input),
        }
    }

    /// The variant this block was built as
    pub fn variant(&self) -> BlockVariant {
        match self {
            ResidualBlock::Bottleneck(_) => BlockVariant::Bottleneck,
            ResidualBlock::Paired(block) => match block.mode {
                MixMode::Parallel => BlockVariant::ParallelMix,
                MixMode::Serial => BlockVariant::SerialMix,
                MixMode::LateSerial => BlockVariant::MixedSerial,
            },
        }
    }

    /// Channel width of the block input and output
    pub fn channels(&self) -> usize {
        match self {
            ResidualBlock::Bottleneck(block) => block.channels(),
            ResidualBlock::Paired(block) => block.channels(),
        }
    }

    /// Base dilation of the block
    pub fn dilation(&self) -> usize {
        match self {
            ResidualBlock::Bottleneck(block) => block.conv2.dilation,
            ResidualBlock::Paired(block) => block.conv1.dilation,
        }
    }

    /// Past positions one output position can read
    pub fn lookback(&self) -> usize {
        match self {
            ResidualBlock::Bottleneck(block) => block.lookback(),
            ResidualBlock::Paired(block) => block.lookback(),
        }
    }

    /// Receptive field of this block alone
    pub fn receptive_field(&self) -> usize {
        self.lookback().saturating_add(1)
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        match self {
            ResidualBlock::Bottleneck(block) => block.num_parameters(),
            ResidualBlock::Paired(block) => block.num_parameters(),
        }
    }

    /// L2 norms of every weight tensor in the block
    pub fn weight_norms(&self) -> Vec<f64> {
        match self {
            ResidualBlock::Bottleneck(block) => block.weight_norms(),
            ResidualBlock::Paired(block) => block.weight_norms(),
        }
    }
}
