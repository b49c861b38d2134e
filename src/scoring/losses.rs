//! Loss functions over per-position logits

use ndarray::{Array1, Array2, Array3, Axis, Zip};

use super::ranking::score_labels;
use super::Objective;
use crate::error::{ModelError, Result};
use crate::layers::fmt_shape;

/// Softmax cross entropy averaged over every non-ignored position
#[derive(Debug, Clone, Default)]
pub struct CrossEntropyLoss {
    /// Target id whose positions are skipped, usually the pad token
    pub ignore_index: Option<usize>,
}

impl CrossEntropyLoss {
    /// Cross entropy skipping positions whose target is `ignore_index`
    pub fn ignoring(ignore_index: usize) -> Self {
        Self {
            ignore_index: Some(ignore_index),
        }
    }
}

/// `log Σ exp(x)` computed around the maximum
fn log_sum_exp(scores: ndarray::ArrayView1<'_, f64>) -> f64 {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    max + scores.iter().map(|s| (s - max).exp()).sum::<f64>().ln()
}

impl Objective for CrossEntropyLoss {
    /// Returns `0.0` when every position is ignored
    fn loss(&self, logits: &Array3<f64>, targets: &Array2<usize>) -> Result<f64> {
        let (batch, time, classes) = logits.dim();
        if targets.dim() != (batch, time) {
            return Err(ModelError::shape(
                format!("targets of shape [{}, {}]", batch, time),
                fmt_shape(targets.shape()),
            ));
        }

        let mut total = 0.0;
        let mut count = 0usize;
        for (row, target_row) in logits.outer_iter().zip(targets.outer_iter()) {
            for (scores, &target) in row.axis_iter(Axis(0)).zip(target_row.iter()) {
                if Some(target) == self.ignore_index {
                    continue;
                }
                if target >= classes {
                    return Err(ModelError::shape(
                        format!("label < {}", classes),
                        format!("label {}", target),
                    ));
                }
                total += log_sum_exp(scores) - scores[target];
                count += 1;
            }
        }

        Ok(if count == 0 { 0.0 } else { total / count as f64 })
    }
}

/// Bayesian personalized ranking loss: `-mean(ln(γ + σ(pos - neg)))`
#[derive(Debug, Clone)]
pub struct BprLoss {
    /// Floor inside the logarithm
    pub gamma: f64,
}

impl Default for BprLoss {
    fn default() -> Self {
        Self { gamma: 1e-10 }
    }
}

impl BprLoss {
    /// Loss from already gathered positive and negative scores
    pub fn loss_from_scores(&self, pos_score: &Array1<f64>, neg_score: &Array1<f64>) -> Result<f64> {
        if pos_score.len() != neg_score.len() {
            return Err(ModelError::shape(
                format!("{} negative scores", pos_score.len()),
                format!("{}", neg_score.len()),
            ));
        }
        if pos_score.is_empty() {
            return Ok(0.0);
        }

        let mut total = 0.0;
        Zip::from(pos_score).and(neg_score).for_each(|&p, &n| {
            let sigmoid = 1.0 / (1.0 + (-(p - n)).exp());
            total -= (self.gamma + sigmoid).ln();
        });
        Ok(total / pos_score.len() as f64)
    }

    /// Loss from per-position logits and positive/negative label ids `[batch, time]`
    pub fn loss(
        &self,
        logits: &Array3<f64>,
        positives: &Array2<usize>,
        negatives: &Array2<usize>,
    ) -> Result<f64> {
        let pos = score_labels(logits, positives)?;
        let neg = score_labels(logits, negatives)?;
        let flat = |a: &Array2<f64>| a.iter().copied().collect::<Array1<f64>>();
        self.loss_from_scores(&flat(&pos), &flat(&neg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_uniform_logits_cross_entropy() {
        let logits = Array3::zeros((2, 3, 5));
        let targets = array![[0, 1, 2], [3, 4, 0]];
        let loss = CrossEntropyLoss::default().loss(&logits, &targets).unwrap();
        assert_relative_eq!(loss, (5.0f64).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_cross_entropy_ignores_pad() {
        let mut logits = Array3::zeros((1, 2, 3));
        logits[[0, 0, 1]] = 10.0;
        // Second position would be very wrong, but it is padding
        logits[[0, 1, 0]] = 50.0;
        let targets = array![[1, 2]];

        let ce = CrossEntropyLoss::ignoring(2);
        let loss = ce.loss(&logits, &targets).unwrap();
        assert!(loss < 1e-3);

        let all_pad = array![[2, 2]];
        assert_eq!(ce.loss(&logits, &all_pad).unwrap(), 0.0);
    }

    #[test]
    fn test_cross_entropy_shape_checks() {
        let logits = Array3::zeros((1, 2, 3));
        assert!(CrossEntropyLoss::default().loss(&logits, &array![[0, 1, 2]]).is_err());
        assert!(CrossEntropyLoss::default().loss(&logits, &array![[0, 3]]).is_err());
    }

    #[test]
    fn test_bpr_from_scores() {
        let bpr = BprLoss::default();
        let equal = bpr.loss_from_scores(&array![1.0, 2.0], &array![1.0, 2.0]).unwrap();
        assert_relative_eq!(equal, (2.0f64).ln(), epsilon = 1e-9);

        let separated = bpr.loss_from_scores(&array![10.0], &array![-10.0]).unwrap();
        assert!(separated < 1e-6);
    }

    #[test]
    fn test_bpr_from_logits() {
        let mut logits = Array3::zeros((1, 2, 4));
        logits[[0, 0, 1]] = 3.0;
        logits[[0, 1, 2]] = 3.0;
        let bpr = BprLoss::default();
        let good = bpr.loss(&logits, &array![[1, 2]], &array![[0, 0]]).unwrap();
        let bad = bpr.loss(&logits, &array![[0, 0]], &array![[1, 2]]).unwrap();
        assert!(good < bad);
    }
}
