//! Local ONNX Runtime sentence embedding models for arxivlens.
//!
//! This crate provides [`OrtEmbedding`], an implementation of [`arxivlens_core::EmbeddingModel`]
//! that runs ONNX sentence encoders (for example `all-MiniLM-L6-v2` exported with optimum)
//! locally using ONNX Runtime.
//!
//! # Features
//!
//! - **No auto-download**: You provide the model and tokenizer paths
//! - **Batched inference**: [`embed_batch`](arxivlens_core::EmbeddingModel::embed_batch) pads a
//!   whole batch and runs the session once
//! - **Auto-detect dimension**: Embedding dimension is detected from model outputs
//! - **Multiple pooling strategies**: `Mean` (default), `Cls`, `LastToken`
//! - **GPU acceleration**: opt in with the `cuda` or `coreml` features
//!
//! # Example
//!
//! ```rust,no_run
//! use arxivlens_ort::OrtEmbedding;
//! use arxivlens_core::EmbeddingModel;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from model directory (auto-finds model.onnx and tokenizer.json)
//! let embedder = OrtEmbedding::from_directory("./models/all-MiniLM-L6-v2")?;
//! println!("{} produces {} dimensions", embedder.model_id(), embedder.dim());
//!
//! let embedding = embedder.embed("Attention is all you need").await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod pooling;

pub use error::OrtError;
pub use pooling::PoolingStrategy;

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use arxivlens_core::EmbeddingModel;
use ndarray::{ArrayD, Ix2, Ix3};
use ort::session::{Session, SessionInputValue, builder::GraphOptimizationLevel};
use parking_lot::Mutex;
use tokenizers::{Encoding, PaddingParams, Tokenizer, TruncationParams};
use tracing::debug;

/// Output names tried in order when reading hidden states.
const OUTPUT_NAMES: [&str; 4] = [
    "last_hidden_state",
    "token_embeddings",
    "hidden_states",
    "output",
];

/// An embedding model backed by ONNX Runtime.
///
/// # Example
///
/// ```rust,no_run
/// use arxivlens_ort::{OrtEmbedding, PoolingStrategy};
///
/// // Simple: load from directory
/// let embedder = OrtEmbedding::from_directory("./model")?;
///
/// // Custom: use builder
/// let embedder = OrtEmbedding::builder()
///     .model_path("./model/model.onnx")
///     .tokenizer_path("./model/tokenizer.json")
///     .model_id("all-MiniLM-L6-v2")
///     .pooling(PoolingStrategy::Mean)
///     .build()?;
/// # Ok::<(), arxivlens_ort::OrtError>(())
/// ```
pub struct OrtEmbedding {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    model_id: String,
    dimension: usize,
    pooling: PoolingStrategy,
    normalize: bool,
    token_type_ids: bool,
}

impl std::fmt::Debug for OrtEmbedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtEmbedding")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .field("pooling", &self.pooling)
            .field("normalize", &self.normalize)
            .finish_non_exhaustive()
    }
}

impl OrtEmbedding {
    /// Load an embedding model from a directory.
    ///
    /// This method locates `model.onnx` (or files in an `onnx/` subdirectory) and
    /// `tokenizer.json` within the directory. The directory name becomes the model id.
    ///
    /// # Errors
    /// Returns an error if the model or tokenizer cannot be found or loaded.
    pub fn from_directory(path: impl AsRef<Path>) -> Result<Self, OrtError> {
        let dir = path.as_ref();
        let model_path = find_model_file(dir)?;
        let tokenizer_path = find_tokenizer_file(dir)?;

        let mut builder = Self::builder()
            .model_path(model_path)
            .tokenizer_path(tokenizer_path);
        if let Some(name) = dir.file_name() {
            builder = builder.model_id(name.to_string_lossy());
        }
        builder.build()
    }

    /// Create a builder for custom configuration.
    #[must_use]
    pub fn builder() -> OrtEmbeddingBuilder {
        OrtEmbeddingBuilder::default()
    }

    /// Returns the embedding dimension.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the pooling strategy.
    #[must_use]
    pub const fn pooling(&self) -> PoolingStrategy {
        self.pooling
    }

    /// Returns whether L2 normalization is enabled.
    #[must_use]
    pub const fn normalize(&self) -> bool {
        self.normalize
    }

    fn run(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OrtError> {
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| OrtError::Tokenization(e.to_string()))?;

        let batch = encodings.len();
        let seq_len = encodings.first().map_or(0, |e| e.get_ids().len());
        debug!(model = %self.model_id, batch, seq_len, "running embedding batch");

        let input_ids = flatten(&encodings, Encoding::get_ids);
        let attention_mask = flatten(&encodings, Encoding::get_attention_mask);

        let mut feed: Vec<(Cow<'_, str>, SessionInputValue<'_>)> = vec![
            (
                "input_ids".into(),
                ort::value::Tensor::from_array(([batch, seq_len], input_ids))?.into(),
            ),
            (
                "attention_mask".into(),
                ort::value::Tensor::from_array(([batch, seq_len], attention_mask))?.into(),
            ),
        ];
        if self.token_type_ids {
            let type_ids = flatten(&encodings, Encoding::get_type_ids);
            feed.push((
                "token_type_ids".into(),
                ort::value::Tensor::from_array(([batch, seq_len], type_ids))?.into(),
            ));
        }

        let output: ArrayD<f32> = {
            let mut session = self.session.lock();
            let outputs = session.run(feed)?;
            let value = OUTPUT_NAMES
                .iter()
                .find_map(|name| outputs.get(name))
                .ok_or_else(|| {
                    OrtError::MissingOutput(OUTPUT_NAMES.iter().map(|n| (*n).to_owned()).collect())
                })?;
            value.try_extract_array::<f32>()?.to_owned()
        };

        let mut rows = match output.ndim() {
            // Already pooled by the exported graph.
            2 => {
                let pooled = output
                    .into_dimensionality::<Ix2>()
                    .map_err(|e| OrtError::Shape(e.to_string()))?;
                pooled.outer_iter().map(|row| row.to_vec()).collect()
            }
            3 => {
                let hidden = output
                    .into_dimensionality::<Ix3>()
                    .map_err(|e| OrtError::Shape(e.to_string()))?;
                if hidden.shape()[0] != batch {
                    return Err(OrtError::BatchMismatch {
                        expected: batch,
                        actual: hidden.shape()[0],
                    });
                }
                let view = hidden.view();
                encodings
                    .iter()
                    .enumerate()
                    .map(|(row, encoding)| {
                        self.pooling
                            .apply(&view, row, encoding.get_attention_mask())
                    })
                    .collect::<Vec<_>>()
            }
            other => return Err(OrtError::InvalidOutputShape(other)),
        };

        if rows.len() != batch {
            return Err(OrtError::BatchMismatch {
                expected: batch,
                actual: rows.len(),
            });
        }
        if let Some(row) = rows.iter().find(|row| row.len() != self.dimension) {
            return Err(OrtError::Shape(format!(
                "expected {} dimensions, model produced {}",
                self.dimension,
                row.len()
            )));
        }
        if self.normalize {
            rows.iter_mut().for_each(|row| l2_normalize(row));
        }
        Ok(rows)
    }
}

impl EmbeddingModel for OrtEmbedding {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> arxivlens_core::Result<Vec<f32>> {
        let mut rows = self.run(&[text.to_owned()])?;
        rows.pop()
            .ok_or_else(|| OrtError::BatchMismatch { expected: 1, actual: 0 }.into())
    }

    async fn embed_batch(&self, texts: &[String]) -> arxivlens_core::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.run(texts)?)
    }
}

/// Builder for [`OrtEmbedding`].
#[derive(Debug)]
pub struct OrtEmbeddingBuilder {
    model_path: Option<PathBuf>,
    tokenizer_path: Option<PathBuf>,
    model_id: Option<String>,
    pooling: PoolingStrategy,
    normalize: bool,
    max_length: usize,
}

impl Default for OrtEmbeddingBuilder {
    fn default() -> Self {
        Self {
            model_path: None,
            tokenizer_path: None,
            model_id: None,
            pooling: PoolingStrategy::default(),
            normalize: true,
            max_length: 256,
        }
    }
}

impl OrtEmbeddingBuilder {
    /// Set the path to the ONNX model file.
    #[must_use]
    pub fn model_path(mut self, path: impl AsRef<Path>) -> Self {
        self.model_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the path to the tokenizer.json file.
    #[must_use]
    pub fn tokenizer_path(mut self, path: impl AsRef<Path>) -> Self {
        self.tokenizer_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the identifier recorded next to indexes built with this model.
    ///
    /// Default: the model file stem.
    #[must_use]
    pub fn model_id(mut self, id: impl Into<String>) -> Self {
        self.model_id = Some(id.into());
        self
    }

    /// Set the pooling strategy.
    ///
    /// Default: [`PoolingStrategy::Mean`]
    #[must_use]
    pub const fn pooling(mut self, strategy: PoolingStrategy) -> Self {
        self.pooling = strategy;
        self
    }

    /// Enable or disable L2 normalization.
    ///
    /// Default: `true`
    #[must_use]
    pub const fn normalize(mut self, enabled: bool) -> Self {
        self.normalize = enabled;
        self
    }

    /// Set the token limit per text; longer texts are truncated.
    ///
    /// Default: 256
    #[must_use]
    pub const fn max_length(mut self, tokens: usize) -> Self {
        self.max_length = tokens;
        self
    }

    /// Build the [`OrtEmbedding`] instance.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Model path is not specified
    /// - Model file cannot be loaded
    /// - Tokenizer file cannot be loaded
    /// - Model output dimension cannot be determined
    pub fn build(self) -> Result<OrtEmbedding, OrtError> {
        let model_path = self.model_path.ok_or(OrtError::MissingModelPath)?;

        if !model_path.exists() {
            return Err(OrtError::ModelNotFound(model_path));
        }

        let tokenizer_path = match self.tokenizer_path {
            Some(path) => path,
            None => find_tokenizer_file(model_path.parent().unwrap_or(&model_path))?,
        };

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| OrtError::tokenizer(&tokenizer_path, e))?;
        tokenizer.with_padding(Some(PaddingParams::default()));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: self.max_length,
                ..TruncationParams::default()
            }))
            .map_err(|e| OrtError::tokenizer(&tokenizer_path, e))?;

        let session = Session::builder()?
            .with_execution_providers(execution_providers())?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(num_cpus())?
            .commit_from_file(&model_path)?;

        let dimension = detect_embedding_dimension(&session)?;
        let token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");
        let model_id = self
            .model_id
            .unwrap_or_else(|| model_id_from_path(&model_path));

        debug!(model = %model_id, dimension, pooling = ?self.pooling, "loaded onnx embedding model");

        Ok(OrtEmbedding {
            session: Mutex::new(session),
            tokenizer,
            model_id,
            dimension,
            pooling: self.pooling,
            normalize: self.normalize,
            token_type_ids,
        })
    }
}

/// Execution providers enabled at compile time. ONNX Runtime falls back to the CPU.
fn execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[allow(unused_mut)]
    let mut providers = Vec::new();
    #[cfg(feature = "cuda")]
    providers.push(ort::execution_providers::CUDAExecutionProvider::default().build());
    #[cfg(feature = "coreml")]
    providers.push(ort::execution_providers::CoreMLExecutionProvider::default().build());
    providers
}

/// Flattens one per-token field of a padded batch into a row-major buffer.
fn flatten(encodings: &[Encoding], field: fn(&Encoding) -> &[u32]) -> Box<[i64]> {
    encodings
        .iter()
        .flat_map(|encoding| field(encoding).iter().map(|&v| i64::from(v)))
        .collect()
}

/// L2 normalize a vector in place.
fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}

/// Model id derived from a model file path: the parent directory name for generic file names
/// like `model.onnx`, otherwise the file stem.
fn model_id_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !stem.starts_with("model") {
        return stem;
    }
    path.ancestors()
        .skip(1)
        .filter_map(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .find(|name| name != "onnx")
        .unwrap_or(stem)
}

/// Find the ONNX model file in a directory.
fn find_model_file(dir: &Path) -> Result<PathBuf, OrtError> {
    let candidates = [
        dir.join("model.onnx"),
        dir.join("onnx/model.onnx"),
        dir.join("onnx/model_fp32.onnx"),
        dir.join("onnx/model_fp16.onnx"),
        dir.join("onnx/model_quantized.onnx"),
    ];

    if let Some(found) = candidates.iter().find(|c| c.exists()) {
        return Ok(found.clone());
    }

    for search in [dir.to_path_buf(), dir.join("onnx")] {
        if let Ok(entries) = std::fs::read_dir(&search) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "onnx") {
                    return Ok(path);
                }
            }
        }
    }

    Err(OrtError::ModelNotFound(dir.to_path_buf()))
}

/// Find the tokenizer.json file in a directory.
fn find_tokenizer_file(dir: &Path) -> Result<PathBuf, OrtError> {
    let candidates = [dir.join("tokenizer.json"), dir.join("onnx/tokenizer.json")];

    candidates
        .into_iter()
        .find(|c| c.exists())
        .ok_or_else(|| OrtError::TokenizerNotFound(dir.to_path_buf()))
}

/// Detect the embedding dimension from model output metadata.
fn detect_embedding_dimension(session: &Session) -> Result<usize, OrtError> {
    for output in session.outputs() {
        if let ort::value::ValueType::Tensor { shape, .. } = output.dtype() {
            // [batch, seq_len, hidden_dim] or [batch, hidden_dim]
            if shape.len() >= 2 {
                if let Some(&dim) = shape.last() {
                    if dim > 0 {
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        return Ok(dim as usize);
                    }
                }
            }
        }
    }

    Err(OrtError::InvalidOutputShape(0))
}

/// Get number of CPU cores for parallelism.
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_model_path() {
        let result = OrtEmbeddingBuilder::default().build();
        assert!(matches!(result, Err(OrtError::MissingModelPath)));
    }

    #[test]
    fn builder_validates_model_exists() {
        let result = OrtEmbeddingBuilder::default()
            .model_path("/nonexistent/model.onnx")
            .tokenizer_path("/nonexistent/tokenizer.json")
            .build();
        assert!(matches!(result, Err(OrtError::ModelNotFound(_))));
    }

    #[test]
    fn builder_defaults() {
        let builder = OrtEmbedding::builder();
        assert!(builder.normalize);
        assert_eq!(builder.pooling, PoolingStrategy::Mean);
        assert_eq!(builder.max_length, 256);
    }

    #[test]
    fn directory_without_model() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), "{}").unwrap();
        assert!(matches!(
            OrtEmbedding::from_directory(dir.path()),
            Err(OrtError::ModelNotFound(_))
        ));
    }

    #[test]
    fn model_ids() {
        assert_eq!(
            model_id_from_path(Path::new("/models/all-MiniLM-L6-v2/onnx/model.onnx")),
            "all-MiniLM-L6-v2"
        );
        assert_eq!(
            model_id_from_path(Path::new("/models/minilm/model_quantized.onnx")),
            "minilm"
        );
        assert_eq!(
            model_id_from_path(Path::new("/models/bge-small-en.onnx")),
            "bge-small-en"
        );
    }

    #[test]
    fn l2_normalize_works() {
        let mut vec = vec![3.0, 4.0];
        l2_normalize(&mut vec);
        assert!((vec[0] - 0.6).abs() < 1e-6);
        assert!((vec[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_zero_vector() {
        let mut vec = vec![0.0, 0.0];
        l2_normalize(&mut vec);
        assert_eq!(vec, vec![0.0, 0.0]);
    }
}
