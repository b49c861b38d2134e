//! Item embedding table with a reserved padding row

use ndarray::{Array2, Array3, Axis};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::{StandardNormal, Uniform};

use crate::error::{ModelError, Result};

/// Embedding table mapping item ids `0..=vocab_size` to dense vectors
///
/// The row at `padding_idx` is kept at zero.
#[derive(Debug, Clone)]
pub struct Embedding {
    /// Embedding weights: shape [vocab_size + 1, embedding_size]
    pub weights: Array2<f64>,
    /// Reserved padding id
    pub padding_idx: usize,
}

impl Embedding {
    /// Create a table with standard normal rows and a zero padding row
    ///
    /// # Arguments
    /// * `vocab_size` - Largest valid item id; the table has `vocab_size + 1` rows
    /// * `embedding_size` - Width of every item vector
    /// * `padding_idx` - Id whose vector stays zero, in `0..=vocab_size`
    pub fn new<R: Rng + ?Sized>(
        vocab_size: usize,
        embedding_size: usize,
        padding_idx: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if embedding_size == 0 {
            return Err(ModelError::config("embedding_size must be positive"));
        }
        if padding_idx > vocab_size {
            return Err(ModelError::config(format!(
                "pad_token {} outside of [0, {}]",
                padding_idx, vocab_size
            )));
        }

        let weights = Array2::random_using((vocab_size + 1, embedding_size), StandardNormal, rng);
        let mut embedding = Self { weights, padding_idx };
        embedding.zero_padding_row();
        Ok(embedding)
    }

    /// Largest valid item id
    pub fn vocab_size(&self) -> usize {
        self.weights.nrows() - 1
    }

    /// Width of the item vectors
    pub fn embedding_size(&self) -> usize {
        self.weights.ncols()
    }

    /// Reset the padding row to zero
    pub fn zero_padding_row(&mut self) {
        self.weights.row_mut(self.padding_idx).fill(0.0);
    }

    /// Re-draw all rows from `U(-bound, bound)`, keeping the padding row at zero
    ///
    /// `bound` must be finite and non-negative.
    pub fn reset_uniform<R: Rng + ?Sized>(&mut self, bound: f64, rng: &mut R) -> Result<()> {
        if !bound.is_finite() || bound < 0.0 {
            return Err(ModelError::config(format!(
                "uniform bound must be finite and non-negative, got {}",
                bound
            )));
        }
        self.weights = Array2::random_using(self.weights.raw_dim(), Uniform::new_inclusive(-bound, bound), rng);
        self.zero_padding_row();
        Ok(())
    }

    /// Look up a `[batch, time]` id matrix, returning `[batch, time, embedding_size]`
    pub fn forward(&self, ids: &Array2<usize>) -> Result<Array3<f64>> {
        let (batch, time) = ids.dim();
        let vocab_size = self.vocab_size();
        if let Some(&id) = ids.iter().find(|&&id| id > vocab_size) {
            return Err(ModelError::ItemOutOfRange { id, vocab_size });
        }

        let mut output = Array3::zeros((batch, time, self.embedding_size()));
        for (mut out_row, id_row) in output.outer_iter_mut().zip(ids.outer_iter()) {
            for (mut vector, &id) in out_row.axis_iter_mut(Axis(0)).zip(id_row.iter()) {
                vector.assign(&self.weights.row(id));
            }
        }

        Ok(output)
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        self.weights.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_padding_row_zero() {
        let mut rng = StdRng::seed_from_u64(5);
        let emb = Embedding::new(10, 4, 10, &mut rng).unwrap();
        assert_eq!(emb.weights.dim(), (11, 4));
        assert!(emb.weights.row(10).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_lookup() {
        let mut rng = StdRng::seed_from_u64(5);
        let emb = Embedding::new(10, 4, 0, &mut rng).unwrap();
        let ids = array![[1, 0, 3], [10, 2, 2]];
        let out = emb.forward(&ids).unwrap();

        assert_eq!(out.dim(), (2, 3, 4));
        assert_eq!(out.slice(ndarray::s![0, 0, ..]), emb.weights.row(1));
        assert!(out.slice(ndarray::s![0, 1, ..]).iter().all(|&v| v == 0.0));
        assert_eq!(out.slice(ndarray::s![1, 0, ..]), emb.weights.row(10));
    }

    #[test]
    fn test_out_of_range_id() {
        let mut rng = StdRng::seed_from_u64(5);
        let emb = Embedding::new(10, 4, 10, &mut rng).unwrap();
        let err = emb.forward(&array![[11usize]]).unwrap_err();
        assert!(matches!(err, ModelError::ItemOutOfRange { id: 11, vocab_size: 10 }));
    }

    #[test]
    fn test_invalid_padding_idx() {
        let mut rng = StdRng::seed_from_u64(5);
        assert!(Embedding::new(10, 4, 11, &mut rng).unwrap_err().is_config_error());
    }

    #[test]
    fn test_reset_uniform_keeps_padding() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut emb = Embedding::new(10, 4, 3, &mut rng).unwrap();
        emb.reset_uniform(0.2, &mut rng).unwrap();
        assert!(emb.weights.iter().all(|&v| v.abs() <= 0.2));
        assert!(emb.weights.row(3).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_reset_uniform_rejects_bad_bound() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut emb = Embedding::new(10, 4, 3, &mut rng).unwrap();
        let before = emb.weights.clone();
        for bound in [-0.1, f64::NAN, f64::INFINITY] {
            assert!(emb.reset_uniform(bound, &mut rng).unwrap_err().is_config_error());
        }
        assert_eq!(emb.weights, before);
    }
}
