//! Vector index implementations.
//!
//! Both structures answer the same question, the `k` nearest stored vectors by squared L2
//! distance, and differ only in cost:
//!
//! - [`FlatIndex`] scans every vector and is exact.
//! - [`IvfIndex`] partitions vectors into inverted lists around k-means centroids and scans only
//!   the lists closest to the query.
//!
//! Results are sorted by ascending distance; equal distances are ordered by ascending id so that
//! repeated searches are reproducible.

mod flat;
mod ivf;
mod kmeans;
pub(crate) mod record;

pub use flat::FlatIndex;
pub use ivf::IvfIndex;

use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};
use crate::types::Neighbor;

/// Structure of a built index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Exact brute-force search.
    Flat,
    /// Inverted-file index over k-means clusters.
    Ivf,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Flat => "flat",
            Self::Ivf => "ivf",
        })
    }
}

/// Trait for nearest-neighbor indexes over fixed-dimension vectors.
pub trait VectorIndex: Send + Sync {
    /// Returns the structure of this index.
    fn kind(&self) -> IndexKind;

    /// Returns the vector dimension.
    fn dim(&self) -> usize;

    /// Returns the number of stored vectors.
    fn len(&self) -> usize;

    /// Returns `true` if the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns up to `k` neighbors of `query`, closest first.
    ///
    /// # Errors
    /// Returns [`RetrievalError::DimensionMismatch`] if `query` has the wrong length.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}

/// Either index structure, as produced by the builder and persisted by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyIndex {
    /// Exact index.
    Flat(FlatIndex),
    /// Clustered index.
    Ivf(IvfIndex),
}

impl VectorIndex for AnyIndex {
    fn kind(&self) -> IndexKind {
        match self {
            Self::Flat(index) => index.kind(),
            Self::Ivf(index) => index.kind(),
        }
    }

    fn dim(&self) -> usize {
        match self {
            Self::Flat(index) => index.dim(),
            Self::Ivf(index) => index.dim(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Flat(index) => index.len(),
            Self::Ivf(index) => index.len(),
        }
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        match self {
            Self::Flat(index) => index.search(query, k),
            Self::Ivf(index) => index.search(query, k),
        }
    }
}

impl From<FlatIndex> for AnyIndex {
    fn from(index: FlatIndex) -> Self {
        Self::Flat(index)
    }
}

impl From<IvfIndex> for AnyIndex {
    fn from(index: IvfIndex) -> Self {
        Self::Ivf(index)
    }
}

/// Squared Euclidean distance.
pub(crate) fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

pub(crate) const fn check_dim(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RetrievalError::DimensionMismatch { expected, actual })
    }
}

/// Sorts by (distance, id) and keeps the first `k`.
pub(crate) fn rank(mut neighbors: Vec<Neighbor>, k: usize) -> Vec<Neighbor> {
    neighbors.sort_unstable_by_key(|n| (OrderedFloat(n.distance), n.id));
    neighbors.truncate(k);
    neighbors
}
