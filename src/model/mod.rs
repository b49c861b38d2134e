//! NextItNet model architecture
//!
//! This module provides:
//! - The mixing sub-branch
//! - Residual blocks in four variants (a, b_parallel, b_serial, b_mixed_serial)
//! - The dilation schedule and residual stack
//! - The full model: embedding, stack and per-position projection

mod block;
mod mixing;
mod network;
mod stack;

pub use block::{BlockVariant, BottleneckBlock, MixMode, PairedDilatedBlock, ResidualBlock};
pub use mixing::MixingBranch;
pub use network::NextItNet;
pub use stack::{DilationSchedule, ResidualStack};
