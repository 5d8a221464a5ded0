//! Error types for the ONNX Runtime embedding crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or running ONNX embedding models.
#[derive(Debug, Error)]
pub enum OrtError {
    /// Failed to load or run the ONNX model.
    #[error("onnx runtime error: {0}")]
    Ort(ort::Error),

    /// Failed to load or configure the tokenizer.
    #[error("failed to load tokenizer from {path}: {message}")]
    Tokenizer {
        /// Path to the tokenizer file.
        path: PathBuf,
        /// Error message from tokenizers crate.
        message: String,
    },

    /// Model path was not specified in the builder.
    #[error("model path not specified")]
    MissingModelPath,

    /// Tokenizer file not found next to the model.
    #[error("tokenizer.json not found in {0}")]
    TokenizerNotFound(PathBuf),

    /// Model file not found in the specified path.
    #[error("model file not found: {0}")]
    ModelNotFound(PathBuf),

    /// The model exposes none of the known hidden state outputs.
    #[error("model has none of the outputs {0:?}")]
    MissingOutput(Vec<String>),

    /// Output tensor has an unsupported rank.
    #[error("unexpected output shape: expected 2 or 3 dimensions, got {0}")]
    InvalidOutputShape(usize),

    /// The model output does not line up with the batch that was fed in.
    #[error("model returned {actual} rows for a batch of {expected}")]
    BatchMismatch {
        /// Number of texts in the batch.
        expected: usize,
        /// Number of rows in the output.
        actual: usize,
    },

    /// Tokenization failed.
    #[error("tokenization failed: {0}")]
    Tokenization(String),

    /// Ndarray shape error.
    #[error("shape error: {0}")]
    Shape(String),
}

impl From<ort::Error> for OrtError {
    fn from(e: ort::Error) -> Self {
        Self::Ort(e)
    }
}

impl OrtError {
    /// Creates a tokenizer error from a path and error message.
    pub fn tokenizer(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Tokenizer {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
