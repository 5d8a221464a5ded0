//! Batched text encoding on top of an [`EmbeddingModel`].

use std::sync::Arc;

use arxivlens_core::EmbeddingModel;
use ndarray::{Array1, Array2};
use tracing::debug;

use crate::error::{Result, RetrievalError};

/// Row-major matrix of embeddings, one row per encoded text.
pub type Embeddings = Array2<f32>;

/// Encodes chunk lists and queries with one embedding model.
///
/// Chunks are sent to the model in batches of `batch_size`. Every returned vector is checked
/// against the model's declared dimension, so a misbehaving model surfaces as
/// [`RetrievalError::DimensionMismatch`] instead of a malformed matrix.
pub struct Embedder<M> {
    model: Arc<M>,
    batch_size: usize,
}

impl<M> Clone for Embedder<M> {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            batch_size: self.batch_size,
        }
    }
}

impl<M> std::fmt::Debug for Embedder<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("model", &std::any::type_name::<M>())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl<M: EmbeddingModel> Embedder<M> {
    /// Creates an embedder. A zero batch size is treated as one.
    #[must_use]
    pub fn new(model: Arc<M>, batch_size: usize) -> Self {
        Self {
            model,
            batch_size: batch_size.max(1),
        }
    }

    /// Returns the shared model handle.
    #[must_use]
    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    /// Returns the identifier of the underlying model.
    #[must_use]
    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Returns the embedding dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.model.dim()
    }

    /// Encodes `texts` into an `(N, D)` matrix whose rows follow input order.
    ///
    /// # Errors
    /// Returns [`RetrievalError::Embedding`] if the model fails, or
    /// [`RetrievalError::DimensionMismatch`] if it returns vectors of the wrong size.
    pub async fn encode(&self, texts: &[String]) -> Result<Embeddings> {
        let dim = self.dim();
        let mut data = Vec::with_capacity(texts.len() * dim);

        for (batch_idx, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(batch = batch_idx, size = batch.len(), "encoding batch");
            let vectors = self
                .model
                .embed_batch(batch)
                .await
                .map_err(RetrievalError::Embedding)?;
            if vectors.len() != batch.len() {
                return Err(RetrievalError::Embedding(anyhow::anyhow!(
                    "model returned {} vectors for {} inputs",
                    vectors.len(),
                    batch.len()
                )));
            }
            for vector in vectors {
                check_dim(dim, vector.len())?;
                data.extend(vector);
            }
        }

        Array2::from_shape_vec((texts.len(), dim), data)
            .map_err(|e| RetrievalError::Embedding(anyhow::Error::new(e)))
    }

    /// Encodes a single query into a `(D,)` vector.
    ///
    /// # Errors
    /// Returns [`RetrievalError::InvalidInput`] for an empty or whitespace-only query, before the
    /// model is called.
    pub async fn encode_query(&self, query: &str) -> Result<Array1<f32>> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidInput(
                "query must be a non-empty string".into(),
            ));
        }
        let vector = self
            .model
            .embed(query)
            .await
            .map_err(RetrievalError::Embedding)?;
        check_dim(self.dim(), vector.len())?;
        Ok(Array1::from_vec(vector))
    }
}

const fn check_dim(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RetrievalError::DimensionMismatch { expected, actual })
    }
}
