//! # Embedding Module
//!
//! Embeddings are dense vector representations of text. Two embeddings can only be compared
//! meaningfully when they were produced by the same model version: distances between vectors from
//! different models (or different dimensions) carry no information.
//!
//! This module provides the [`EmbeddingModel`] trait that the retrieval core consumes. Every model
//! reports a stable [`model_id`](EmbeddingModel::model_id) and a fixed [`dim`](EmbeddingModel::dim)
//! so that persisted indexes can record which model built them.
//!
//! ```rust
//! use arxivlens_core::EmbeddingModel;
//!
//! async fn example<T: EmbeddingModel>(model: &T) -> arxivlens_core::Result<()> {
//!     let embedding = model.embed("Attention is all you need").await?;
//!     assert_eq!(embedding.len(), model.dim());
//!
//!     let batch = model
//!         .embed_batch(&["first".to_string(), "second".to_string()])
//!         .await?;
//!     assert_eq!(batch.len(), 2);
//!     Ok(())
//! }
//! ```

use core::future::Future;

/// A type alias for an embedding vector of 32-bit floats.
pub type Embedding = Vec<f32>;

/// Converts text to vector representations.
///
/// # Implementation Requirements
///
/// - Every returned vector must have length equal to [`dim`](EmbeddingModel::dim)
/// - Output must be deterministic for a given [`model_id`](EmbeddingModel::model_id)
/// - [`embed_batch`](EmbeddingModel::embed_batch) must return one vector per input, in input order
///
/// # Example
///
/// ```rust
/// use arxivlens_core::EmbeddingModel;
///
/// struct Constant;
///
/// impl EmbeddingModel for Constant {
///     fn model_id(&self) -> &str {
///         "constant-v1"
///     }
///
///     fn dim(&self) -> usize {
///         3
///     }
///
///     async fn embed(&self, _text: &str) -> arxivlens_core::Result<Vec<f32>> {
///         Ok(vec![1.0, 0.0, 0.0])
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let embedding = Constant.embed("anything").await.unwrap();
/// assert_eq!(embedding.len(), 3);
/// # });
/// ```
pub trait EmbeddingModel: Send + Sync {
    /// Stable identifier of the model version, persisted next to every index built with it.
    fn model_id(&self) -> &str;

    /// Returns the embedding vector dimension.
    fn dim(&self) -> usize;

    /// Converts a single text to an embedding vector.
    fn embed(&self, text: &str) -> impl Future<Output = crate::Result<Embedding>> + Send;

    /// Converts a batch of texts to embedding vectors.
    ///
    /// The default implementation embeds each text in turn. Models that can run real batched
    /// inference should override it.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = crate::Result<Vec<Embedding>>> + Send {
        async move {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }
    }
}
