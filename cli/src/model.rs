//! Embedding backend selection for the CLI.

use std::path::PathBuf;

use anyhow::Result;
use arxivlens_core::EmbeddingModel;
use arxivlens_ort::OrtEmbedding;
use arxivlens_retrieval::{HashingEmbedding, ModelService};

/// Dimension of the offline hashing embedder when no model is configured.
pub const DEFAULT_HASHING_DIM: usize = 384;

/// Where embeddings come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChoice {
    /// ONNX sentence encoder loaded from a directory.
    Onnx(PathBuf),
    /// Deterministic trigram hashing, no model files required.
    Hashing(usize),
}

impl ModelChoice {
    /// Picks the backend from command line options. An explicit model directory wins.
    #[must_use]
    pub fn from_args(model_dir: Option<PathBuf>, hashing_dim: Option<usize>) -> Self {
        match (model_dir, hashing_dim) {
            (Some(dir), _) => Self::Onnx(dir),
            (None, dim) => Self::Hashing(dim.unwrap_or(DEFAULT_HASHING_DIM)),
        }
    }

    /// Wraps the choice in a lazily loading service.
    pub fn into_service(self) -> ModelService<Backend> {
        ModelService::new(move || match &self {
            Self::Onnx(dir) => Ok(Backend::Onnx(OrtEmbedding::from_directory(dir)?)),
            Self::Hashing(dim) => Ok(Backend::Hashing(HashingEmbedding::new(*dim))),
        })
    }
}

/// A loaded embedding backend.
#[derive(Debug)]
pub enum Backend {
    /// ONNX Runtime model.
    Onnx(OrtEmbedding),
    /// Hashing embedder.
    Hashing(HashingEmbedding),
}

impl EmbeddingModel for Backend {
    fn model_id(&self) -> &str {
        match self {
            Self::Onnx(model) => model.model_id(),
            Self::Hashing(model) => model.model_id(),
        }
    }

    fn dim(&self) -> usize {
        match self {
            Self::Onnx(model) => model.dim(),
            Self::Hashing(model) => model.dim(),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self {
            Self::Onnx(model) => model.embed(text).await,
            Self::Hashing(model) => model.embed(text).await,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            Self::Onnx(model) => model.embed_batch(texts).await,
            Self::Hashing(model) => model.embed_batch(texts).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_dir_takes_precedence() {
        assert_eq!(
            ModelChoice::from_args(Some("models/minilm".into()), Some(64)),
            ModelChoice::Onnx("models/minilm".into())
        );
        assert_eq!(
            ModelChoice::from_args(None, None),
            ModelChoice::Hashing(DEFAULT_HASHING_DIM)
        );
    }

    #[tokio::test]
    async fn hashing_backend_loads_lazily() {
        let service = ModelChoice::Hashing(32).into_service();
        assert!(!service.is_ready());

        let model = service.initialize().unwrap();
        assert_eq!(model.dim(), 32);
        assert_eq!(model.model_id(), "hashing-trigram-32");
        assert_eq!(model.embed("attention").await.unwrap().len(), 32);
    }

    #[test]
    fn missing_onnx_model_fails_to_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let service = ModelChoice::Onnx(dir.path().to_path_buf()).into_service();
        assert!(service.initialize().is_err());
        assert!(!service.is_ready());
    }
}
