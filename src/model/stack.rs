//! Residual block stack and its dilation schedule

use ndarray::Array3;
use rand::Rng;
use tracing::debug;

use super::block::{BlockVariant, ResidualBlock};
use crate::error::{ModelError, Result};

/// Per-block dilations, e.g. `[1, 2, 4, 8, 1, 2, 4, 8]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DilationSchedule(Vec<usize>);

impl DilationSchedule {
    /// Repeat a base dilation list once per block group
    ///
    /// `repeated(&[1, 4], 3)` gives `[1, 4, 1, 4, 1, 4]`.
    pub fn repeated(base: &[usize], groups: usize) -> Result<Self> {
        if base.is_empty() {
            return Err(ModelError::config("dilation list must not be empty"));
        }
        if groups == 0 {
            return Err(ModelError::config("block_num must be positive"));
        }
        if base.iter().any(|&d| d == 0) {
            return Err(ModelError::config(format!(
                "dilations must be positive, got {:?}",
                base
            )));
        }

        Ok(Self(base.repeat(groups)))
    }

    /// Dilations in block order
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Number of blocks the schedule instantiates
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the schedule is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Sequence of residual blocks applied in schedule order
#[derive(Debug, Clone)]
pub struct ResidualStack {
    /// Blocks, one per schedule entry
    pub blocks: Vec<ResidualBlock>,
}

impl ResidualStack {
    /// Create one block per schedule entry, all sharing kernel size, variant and mixing flag
    pub fn new<R: Rng + ?Sized>(
        schedule: &DilationSchedule,
        variant: BlockVariant,
        channels: usize,
        kernel_size: usize,
        use_mixing: bool,
        rng: &mut R,
    ) -> Result<Self> {
        let blocks = schedule
            .as_slice()
            .iter()
            .map(|&dilation| ResidualBlock::new(variant, channels, kernel_size, dilation, use_mixing, &mut *rng))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            blocks = blocks.len(),
            variant = %variant,
            dilations = ?schedule.as_slice(),
            "built residual stack"
        );

        Ok(Self { blocks })
    }

    /// Thread a `[batch, time, C]` tensor through every block
    pub fn forward(&self, input: &Array3<f64>) -> Result<Array3<f64>> {
        let mut x = input.clone();
        for block in &self.blocks {
            x = block.forward(&x)?;
        }
        Ok(x)
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the stack holds no blocks
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Receptive field of the whole stack
    pub fn receptive_field(&self) -> usize {
        self.blocks
            .iter()
            .map(ResidualBlock::lookback)
            .fold(1, usize::saturating_add)
    }

    /// Channel width the first block expects, `None` for an empty stack
    pub fn channels(&self) -> Option<usize> {
        self.blocks.first().map(ResidualBlock::channels)
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        self.blocks.iter().map(ResidualBlock::num_parameters).sum()
    }

    /// `Σ ‖W‖₂` over every weight tensor in the stack
    pub fn weight_norm_sum(&self) -> f64 {
        self.blocks
            .iter()
            .flat_map(|b| b.weight_norms())
            .sum()
    }
}
