//! Objectives and ranking over model output
//!
//! These consume the `[batch, time, output_dim]` logits produced by
//! [`NextItNet::forward`](crate::model::NextItNet::forward); the model itself
//! never depends on them.

mod losses;
mod ranking;

pub use losses::{BprLoss, CrossEntropyLoss};
pub use ranking::{last_position, score_labels, TopKRanker};

use ndarray::{Array2, Array3};

use crate::error::Result;

/// Scalar loss from per-position logits and ground-truth labels
pub trait Objective {
    /// Compute the loss for `logits` `[batch, time, output_dim]` against `targets` `[batch, time]`
    fn loss(&self, logits: &Array3<f64>, targets: &Array2<usize>) -> Result<f64>;
}

/// Ranks candidate labels from per-position logits
pub trait Ranker {
    /// Return, for every sequence in the batch, label ids ordered best first
    fn rank(&self, logits: &Array3<f64>) -> Result<Vec<Vec<usize>>>;
}
