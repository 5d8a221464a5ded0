//! Index construction from an ordered chunk list.

use arxivlens_core::EmbeddingModel;
use tracing::{debug, info};

use crate::config::RetrievalConfig;
use crate::embedder::{Embedder, Embeddings};
use crate::error::{Result, RetrievalError};
use crate::index::{AnyIndex, FlatIndex, IvfIndex, VectorIndex};

/// Output of a build: the index, the embeddings it was built from and the chunk list whose
/// positions are the index ids.
#[derive(Debug, Clone)]
pub struct BuiltIndex {
    /// Searchable index.
    pub index: AnyIndex,
    /// One embedding row per chunk.
    pub embeddings: Embeddings,
    /// Chunk list, position `i` is id `i` in the index.
    pub chunks: Vec<String>,
}

/// Parameters that decide between the exact and the clustered index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexParams {
    /// Smallest corpus that gets a clustered index.
    pub ivf_min_vectors: usize,
    /// Minimum number of training vectors per list.
    pub ivf_points_per_list: usize,
    /// Upper bound on the number of lists.
    pub ivf_max_lists: usize,
    /// Lists probed per query.
    pub ivf_nprobe: usize,
    /// Lloyd iterations.
    pub kmeans_iterations: usize,
}

impl IndexParams {
    /// Number of inverted lists for a corpus of `n` vectors, or `None` when the exact index
    /// should be used.
    ///
    /// Starts at `4 * sqrt(n)`, capped by `ivf_max_lists` and by the number of lists that can
    /// each be trained with `ivf_points_per_list` vectors. Fewer than two lists is not worth
    /// clustering.
    #[must_use]
    pub fn lists_for(&self, n: usize) -> Option<usize> {
        if n < self.ivf_min_vectors {
            return None;
        }
        let nlist = (4 * n.isqrt())
            .min(self.ivf_max_lists)
            .min(n / self.ivf_points_per_list.max(1));
        (nlist >= 2).then_some(nlist)
    }
}

impl From<&RetrievalConfig> for IndexParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            ivf_min_vectors: config.ivf_min_vectors,
            ivf_points_per_list: config.ivf_points_per_list,
            ivf_max_lists: config.ivf_max_lists,
            ivf_nprobe: config.ivf_nprobe,
            kmeans_iterations: config.kmeans_iterations,
        }
    }
}

/// Encodes chunks and builds the index structure suited to the corpus size.
#[derive(Debug)]
pub struct IndexBuilder<M> {
    embedder: Embedder<M>,
    params: IndexParams,
}

impl<M: EmbeddingModel> IndexBuilder<M> {
    /// Creates a builder.
    #[must_use]
    pub const fn new(embedder: Embedder<M>, params: IndexParams) -> Self {
        Self { embedder, params }
    }

    /// Returns the embedder used for encoding.
    #[must_use]
    pub const fn embedder(&self) -> &Embedder<M> {
        &self.embedder
    }

    /// Encodes `chunks` and builds an index whose ids are chunk positions.
    ///
    /// # Errors
    /// Returns [`RetrievalError::Build`] for an empty chunk list or a failed training step, and
    /// embedding errors from the model.
    pub async fn build(&self, chunks: Vec<String>) -> Result<BuiltIndex> {
        if chunks.is_empty() {
            return Err(RetrievalError::Build(
                "cannot build an index from an empty chunk list".into(),
            ));
        }
        let dim = self.embedder.dim();
        if dim == 0 {
            return Err(RetrievalError::Build(
                "embedding model reports dimension 0".into(),
            ));
        }

        let embeddings = self.embedder.encode(&chunks).await?;
        let n = embeddings.nrows();
        debug!(chunks = n, dim, "encoded chunks");

        let index: AnyIndex = match self.params.lists_for(n) {
            Some(nlist) => {
                let mut ivf = IvfIndex::new(dim, nlist, self.params.ivf_nprobe);
                ivf.train(&embeddings, self.params.kmeans_iterations)?;
                ivf.add(&embeddings)?;
                ivf.into()
            }
            None => {
                let mut flat = FlatIndex::new(dim);
                flat.add(&embeddings)?;
                flat.into()
            }
        };

        if index.len() != chunks.len() {
            return Err(RetrievalError::Build(format!(
                "index holds {} vectors for {} chunks",
                index.len(),
                chunks.len()
            )));
        }
        info!(chunks = n, kind = %index.kind(), "built index");

        Ok(BuiltIndex {
            index,
            embeddings,
            chunks,
        })
    }
}
