//! Error types for the retrieval crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in retrieval operations.
///
/// A search that runs but keeps nothing is not an error; see
/// [`SearchOutcome::NoRelevantInformation`](crate::SearchOutcome::NoRelevantInformation).
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The index or the embedding model has not been initialized.
    #[error("not ready: {0}")]
    NotReady(String),

    /// A persisted artifact is missing, so the document has no usable index.
    #[error("no index for document {document}: missing {path}")]
    NotFound {
        /// Document whose artifacts were requested.
        document: String,
        /// First missing artifact.
        path: PathBuf,
    },

    /// The caller passed an unusable argument, such as an empty query.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Index construction failed.
    #[error("index build failed: {0}")]
    Build(String),

    /// Persisted artifacts were built by a different embedding model.
    #[error("index was built with model {persisted} but {configured} is configured")]
    ModelMismatch {
        /// Model id recorded next to the index.
        persisted: String,
        /// Model id of the current embedder.
        configured: String,
    },

    /// Dimension mismatch between an embedding and an index.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension provided.
        actual: usize,
    },

    /// Persisted artifacts disagree with each other.
    #[error("corrupt artifacts for document {document}: {reason}")]
    Corrupt {
        /// Document whose artifacts are inconsistent.
        document: String,
        /// What did not match.
        reason: String,
    },

    /// Embedding operation failed.
    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    /// The embedding model could not be loaded.
    #[error("model initialization failed: {0}")]
    ModelInit(#[source] anyhow::Error),

    /// The answer generator failed.
    #[error("answer generation failed: {0}")]
    Generation(#[source] anyhow::Error),

    /// Text extraction failed or produced nothing usable.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persistence operation failed.
    #[error("persistence error at {path}: {source}")]
    Persistence {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration is invalid or unreadable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RetrievalError {
    /// Returns `true` if this error means the document should be rebuilt from its source.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;
