//! Ranking and label scoring

use ndarray::{s, Array2, Array3, ArrayView2, Axis};

use super::Ranker;
use crate::error::{ModelError, Result};
use crate::layers::fmt_shape;

/// Scores at the final position of every sequence: `[batch, output_dim]`
pub fn last_position(logits: &Array3<f64>) -> Result<ArrayView2<'_, f64>> {
    let time = logits.dim().1;
    if time == 0 {
        return Err(ModelError::SequenceTooShort { len: 0, required: 1 });
    }
    Ok(logits.slice(s![.., time - 1, ..]))
}

/// Gather the score of `labels[b, t]` at every position: `[batch, time]`
pub fn score_labels(logits: &Array3<f64>, labels: &Array2<usize>) -> Result<Array2<f64>> {
    let (batch, time, classes) = logits.dim();
    if labels.dim() != (batch, time) {
        return Err(ModelError::shape(
            format!("labels of shape [{}, {}]", batch, time),
            fmt_shape(labels.shape()),
        ));
    }
    if let Some(&label) = labels.iter().find(|&&l| l >= classes) {
        return Err(ModelError::shape(
            format!("label < {}", classes),
            format!("label {}", label),
        ));
    }

    Ok(Array2::from_shape_fn((batch, time), |(b, t)| {
        logits[[b, t, labels[[b, t]]]]
    }))
}

/// Ranks labels by their score at the last position, keeping the best `k`
#[derive(Debug, Clone)]
pub struct TopKRanker {
    /// Number of labels kept per sequence
    pub k: usize,
    /// Label ids never returned, such as the pad token
    pub exclude: Vec<usize>,
}

impl TopKRanker {
    /// Keep the best `k` labels
    pub fn new(k: usize) -> Self {
        Self { k, exclude: Vec::new() }
    }

    /// Never return `label`
    pub fn excluding(mut self, label: usize) -> Self {
        self.exclude.push(label);
        self
    }
}

impl Ranker for TopKRanker {
    fn rank(&self, logits: &Array3<f64>) -> Result<Vec<Vec<usize>>> {
        let scores = last_position(logits)?;

        Ok(scores
            .axis_iter(Axis(0))
            .map(|row| {
                let mut labels: Vec<usize> = (0..row.len())
                    .filter(|label| !self.exclude.contains(label))
                    .collect();
                labels.sort_by(|&a, &b| row[b].total_cmp(&row[a]));
                labels.truncate(self.k);
                labels
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn logits() -> Array3<f64> {
        let mut logits = Array3::zeros((2, 3, 4));
        // Earlier positions should not affect the ranking
        logits[[0, 0, 0]] = 100.0;
        logits.slice_mut(s![0, 2, ..]).assign(&array![0.1, 0.9, 0.5, 0.3]);
        logits.slice_mut(s![1, 2, ..]).assign(&array![0.7, 0.2, 0.4, 0.8]);
        logits
    }

    #[test]
    fn test_last_position() {
        let logits = logits();
        let last = last_position(&logits).unwrap();
        assert_eq!(last.dim(), (2, 4));
        assert_eq!(last[[0, 1]], 0.9);
    }

    #[test]
    fn test_top_k() {
        let ranked = TopKRanker::new(2).rank(&logits()).unwrap();
        assert_eq!(ranked, vec![vec![1, 2], vec![3, 0]]);
    }

    #[test]
    fn test_top_k_excluding() {
        let ranked = TopKRanker::new(2).excluding(3).rank(&logits()).unwrap();
        assert_eq!(ranked[1], vec![0, 2]);
    }

    #[test]
    fn test_score_labels() {
        let logits = logits();
        let scores = score_labels(&logits, &array![[0, 0, 1], [0, 0, 3]]).unwrap();
        assert_eq!(scores[[0, 0]], 100.0);
        assert_eq!(scores[[0, 2]], 0.9);
        assert_eq!(scores[[1, 2]], 0.8);
        assert!(score_labels(&logits, &array![[0, 0, 4], [0, 0, 0]]).is_err());
    }
}
