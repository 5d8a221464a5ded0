//! Exact brute-force index.

use rayon::prelude::*;

use crate::embedder::Embeddings;
use crate::error::{Result, RetrievalError};
use crate::types::Neighbor;

use super::{IndexKind, VectorIndex, check_dim, rank, squared_l2};

/// Exact L2 index that compares the query against every stored vector.
///
/// Vector ids are insertion positions, which the builder aligns with chunk positions.
///
/// # Example
///
/// ```rust
/// use arxivlens_retrieval::index::{FlatIndex, VectorIndex};
/// use ndarray::array;
///
/// let mut index = FlatIndex::new(2);
/// index.add(&array![[0.0, 0.0], [1.0, 1.0]]).unwrap();
/// let hits = index.search(&[0.9, 0.9], 1).unwrap();
/// assert_eq!(hits[0].id, 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Creates an empty index for `dim`-dimensional vectors.
    #[must_use]
    pub const fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    /// Appends every row of `embeddings`, assigning consecutive ids.
    ///
    /// # Errors
    /// Returns [`RetrievalError::DimensionMismatch`] if the rows have the wrong width.
    pub fn add(&mut self, embeddings: &Embeddings) -> Result<()> {
        check_dim(self.dim, embeddings.ncols())?;
        self.data.reserve(embeddings.len());
        for row in embeddings.rows() {
            self.data.extend(row.iter().copied());
        }
        Ok(())
    }

    /// Rebuilds an index from its flat row-major storage.
    pub(crate) fn from_parts(dim: usize, data: Vec<f32>) -> Result<Self> {
        if dim == 0 || data.len() % dim != 0 {
            return Err(RetrievalError::Serialization(format!(
                "flat index storage of {} values does not hold {dim}-dimensional rows",
                data.len()
            )));
        }
        Ok(Self { dim, data })
    }

    /// Flat row-major storage of all vectors.
    pub(crate) fn data(&self) -> &[f32] {
        &self.data
    }
}

impl VectorIndex for FlatIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.data.len().checked_div(self.dim).unwrap_or(0)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        check_dim(self.dim, query.len())?;
        if self.data.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let scored: Vec<Neighbor> = self
            .data
            .par_chunks_exact(self.dim)
            .enumerate()
            .map(|(id, row)| Neighbor::new(id, squared_l2(row, query)))
            .collect();

        Ok(rank(scored, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> FlatIndex {
        let mut index = FlatIndex::new(2);
        index
            .add(&array![[0.0, 0.0], [1.0, 0.0], [0.0, 3.0], [1.0, 0.0]])
            .unwrap();
        index
    }

    #[test]
    fn exact_search_orders_by_distance() {
        let hits = sample().search(&[0.9, 0.0], 4).unwrap();
        let ids: Vec<usize> = hits.iter().map(|n| n.id).collect();

        assert_eq!(ids, vec![1, 3, 0, 2]);
        assert!((hits[0].distance - 0.01).abs() < 1e-6);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn k_larger_than_len_returns_all() {
        let index = sample();
        assert_eq!(index.len(), 4);
        assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 4);
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn dimension_checked() {
        let mut index = FlatIndex::new(3);
        assert!(matches!(
            index.add(&array![[1.0, 2.0]]),
            Err(RetrievalError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(RetrievalError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn empty_index() {
        let index = FlatIndex::new(2);
        assert!(index.is_empty());
        assert!(index.search(&[0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn parts_round_trip() {
        let index = sample();
        let rebuilt = FlatIndex::from_parts(2, index.data().to_vec()).unwrap();
        assert_eq!(rebuilt, index);
        assert!(FlatIndex::from_parts(2, vec![1.0; 3]).is_err());
    }
}
