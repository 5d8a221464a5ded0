//! Inverted-file index over k-means clusters.

use rayon::prelude::*;
use tracing::debug;

use crate::embedder::Embeddings;
use crate::error::{Result, RetrievalError};
use crate::types::Neighbor;

use super::{IndexKind, VectorIndex, check_dim, kmeans, rank, squared_l2};

/// Vectors assigned to one centroid.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct InvertedList {
    pub(crate) ids: Vec<usize>,
    pub(crate) data: Vec<f32>,
}

/// Clustered L2 index.
///
/// The index must be [trained](Self::train) before vectors are [added](Self::add). A search
/// visits only the `nprobe` lists whose centroids are closest to the query, trading exactness
/// for latency on large corpora.
#[derive(Debug, Clone, PartialEq)]
pub struct IvfIndex {
    dim: usize,
    nlist: usize,
    nprobe: usize,
    centroids: Vec<f32>,
    lists: Vec<InvertedList>,
    ntotal: usize,
}

impl IvfIndex {
    /// Creates an untrained index with `nlist` inverted lists, probing `nprobe` of them per query.
    #[must_use]
    pub fn new(dim: usize, nlist: usize, nprobe: usize) -> Self {
        Self {
            dim,
            nlist: nlist.max(1),
            nprobe: nprobe.max(1),
            centroids: Vec::new(),
            lists: Vec::new(),
            ntotal: 0,
        }
    }

    /// Returns the number of inverted lists.
    #[must_use]
    pub const fn nlist(&self) -> usize {
        self.nlist
    }

    /// Returns the number of lists probed per query.
    #[must_use]
    pub const fn nprobe(&self) -> usize {
        self.nprobe
    }

    /// Changes the number of lists probed per query.
    pub fn set_nprobe(&mut self, nprobe: usize) {
        self.nprobe = nprobe.max(1);
    }

    /// Returns `true` once centroids have been trained.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        !self.centroids.is_empty()
    }

    /// Trains the coarse quantizer on `embeddings`.
    ///
    /// # Errors
    /// Returns [`RetrievalError::Build`] if there are fewer vectors than lists, or
    /// [`RetrievalError::DimensionMismatch`] if the rows have the wrong width.
    pub fn train(&mut self, embeddings: &Embeddings, iterations: usize) -> Result<()> {
        check_dim(self.dim, embeddings.ncols())?;
        if self.dim == 0 {
            return Err(RetrievalError::Build("cannot train a zero-dimensional index".into()));
        }
        let rows = embeddings.nrows();
        if rows < self.nlist {
            return Err(RetrievalError::Build(format!(
                "training {} lists requires at least {} vectors, got {rows}",
                self.nlist, self.nlist
            )));
        }

        let data: Vec<f32> = embeddings.iter().copied().collect();
        self.centroids = kmeans::train(&data, self.dim, self.nlist, iterations.max(1));
        self.lists = vec![InvertedList::default(); self.nlist];
        self.ntotal = 0;
        debug!(nlist = self.nlist, rows, "trained ivf quantizer");
        Ok(())
    }

    /// Assigns every row of `embeddings` to its nearest list, continuing the id sequence.
    ///
    /// # Errors
    /// Returns [`RetrievalError::Build`] if the index is untrained, or
    /// [`RetrievalError::DimensionMismatch`] if the rows have the wrong width.
    pub fn add(&mut self, embeddings: &Embeddings) -> Result<()> {
        if !self.is_trained() {
            return Err(RetrievalError::Build(
                "index must be trained before vectors are added".into(),
            ));
        }
        check_dim(self.dim, embeddings.ncols())?;

        let rows: Vec<Vec<f32>> = embeddings.rows().into_iter().map(|r| r.to_vec()).collect();
        let assignments: Vec<usize> = rows
            .par_iter()
            .map(|row| kmeans::nearest(&self.centroids, self.dim, row))
            .collect();

        for (row, list) in rows.into_iter().zip(assignments) {
            let target = &mut self.lists[list];
            target.ids.push(self.ntotal);
            target.data.extend(row);
            self.ntotal += 1;
        }
        Ok(())
    }

    /// Rebuilds a trained index from persisted parts.
    pub(crate) fn from_parts(
        dim: usize,
        nprobe: usize,
        centroids: Vec<f32>,
        lists: Vec<InvertedList>,
    ) -> Result<Self> {
        let malformed = |reason: &str| {
            RetrievalError::Serialization(format!("malformed ivf index: {reason}"))
        };
        if dim == 0 || centroids.is_empty() || centroids.len() % dim != 0 {
            return Err(malformed("centroid storage does not match dimension"));
        }
        let nlist = centroids.len() / dim;
        if lists.len() != nlist {
            return Err(malformed("list count differs from centroid count"));
        }
        let mut ntotal = 0;
        for list in &lists {
            if list.data.len() != list.ids.len() * dim {
                return Err(malformed("list vectors do not match list ids"));
            }
            ntotal += list.ids.len();
        }
        Ok(Self {
            dim,
            nlist,
            nprobe: nprobe.max(1),
            centroids,
            lists,
            ntotal,
        })
    }

    pub(crate) fn centroids(&self) -> &[f32] {
        &self.centroids
    }

    pub(crate) fn lists(&self) -> &[InvertedList] {
        &self.lists
    }
}

impl VectorIndex for IvfIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Ivf
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.ntotal
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        check_dim(self.dim, query.len())?;
        if self.ntotal == 0 || k == 0 {
            return Ok(Vec::new());
        }

        let coarse: Vec<Neighbor> = self
            .centroids
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(list, centroid)| Neighbor::new(list, squared_l2(centroid, query)))
            .collect();
        let probes = rank(coarse, self.nprobe);

        let candidates: Vec<Neighbor> = probes
            .par_iter()
            .flat_map_iter(|probe| {
                let list = &self.lists[probe.id];
                list.ids
                    .iter()
                    .zip(list.data.chunks_exact(self.dim))
                    .map(|(&id, vector)| Neighbor::new(id, squared_l2(vector, query)))
            })
            .collect();

        Ok(rank(candidates, k))
    }
}
