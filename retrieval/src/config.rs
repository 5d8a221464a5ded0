//! Configuration for the retrieval pipeline.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, RetrievalError};

/// Configuration for chunking, indexing and search.
///
/// Every field has a default, so a TOML file only needs to name the values it changes:
///
/// ```toml
/// index_dir = "/var/lib/arxivlens"
/// top_k = 8
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Directory holding the persisted artifacts of every document.
    pub index_dir: PathBuf,
    /// Character budget of a chunk. Single sentences longer than this stay whole.
    pub max_chunk_chars: usize,
    /// Number of texts sent to the embedding model per call.
    pub embed_batch_size: usize,
    /// Number of neighbors requested from the index per query.
    pub top_k: usize,
    /// Percentile of the returned distances used as the dynamic cut-off.
    pub confidence_percentile: f32,
    /// Maximum number of terms in an expanded query.
    pub max_expansion_terms: usize,
    /// Smallest corpus that gets a clustered index instead of an exact one.
    pub ivf_min_vectors: usize,
    /// Minimum number of training vectors per inverted list.
    pub ivf_points_per_list: usize,
    /// Upper bound on the number of inverted lists.
    pub ivf_max_lists: usize,
    /// Number of inverted lists scanned per query.
    pub ivf_nprobe: usize,
    /// Lloyd iterations used to train the coarse quantizer.
    pub kmeans_iterations: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("./faiss_indexes"),
            max_chunk_chars: 1000,
            embed_batch_size: 16,
            top_k: 5,
            confidence_percentile: 75.0,
            max_expansion_terms: 10,
            ivf_min_vectors: 2048,
            ivf_points_per_list: 39,
            ivf_max_lists: 4096,
            ivf_nprobe: 8,
            kmeans_iterations: 20,
        }
    }
}

impl RetrievalConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for custom configuration.
    #[must_use]
    pub fn builder() -> RetrievalConfigBuilder {
        RetrievalConfigBuilder::new()
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    /// Returns [`RetrievalError::Config`] if the document is malformed or fails validation.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| RetrievalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or its contents are invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| RetrievalError::Persistence {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    /// Returns [`RetrievalError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_chunk_chars", self.max_chunk_chars),
            ("embed_batch_size", self.embed_batch_size),
            ("top_k", self.top_k),
            ("max_expansion_terms", self.max_expansion_terms),
            ("ivf_points_per_list", self.ivf_points_per_list),
            ("ivf_max_lists", self.ivf_max_lists),
            ("ivf_nprobe", self.ivf_nprobe),
            ("kmeans_iterations", self.kmeans_iterations),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(RetrievalError::Config(format!("{name} must be positive")));
        }
        if !(self.confidence_percentile > 0.0 && self.confidence_percentile <= 100.0) {
            return Err(RetrievalError::Config(format!(
                "confidence_percentile must be in (0, 100], got {}",
                self.confidence_percentile
            )));
        }
        Ok(())
    }
}

/// Builder for retrieval configuration.
#[derive(Debug, Default)]
pub struct RetrievalConfigBuilder {
    config: RetrievalConfig,
}

impl RetrievalConfigBuilder {
    /// Creates a new configuration builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RetrievalConfig::default(),
        }
    }

    /// Sets the artifact directory.
    #[must_use]
    pub fn index_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_dir = path.into();
        self
    }

    /// Sets the chunk character budget.
    #[must_use]
    pub const fn max_chunk_chars(mut self, chars: usize) -> Self {
        self.config.max_chunk_chars = chars;
        self
    }

    /// Sets the embedding batch size.
    #[must_use]
    pub const fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Sets the number of neighbors requested per query.
    #[must_use]
    pub const fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Sets the percentile used as the confidence cut-off.
    #[must_use]
    pub const fn confidence_percentile(mut self, percentile: f32) -> Self {
        self.config.confidence_percentile = percentile;
        self
    }

    /// Sets the term cap of query expansion.
    #[must_use]
    pub const fn max_expansion_terms(mut self, terms: usize) -> Self {
        self.config.max_expansion_terms = terms;
        self
    }

    /// Sets the corpus size from which a clustered index is built.
    #[must_use]
    pub const fn ivf_min_vectors(mut self, vectors: usize) -> Self {
        self.config.ivf_min_vectors = vectors;
        self
    }

    /// Sets the minimum number of training vectors per inverted list.
    #[must_use]
    pub const fn ivf_points_per_list(mut self, points: usize) -> Self {
        self.config.ivf_points_per_list = points;
        self
    }

    /// Sets the upper bound on inverted lists.
    #[must_use]
    pub const fn ivf_max_lists(mut self, lists: usize) -> Self {
        self.config.ivf_max_lists = lists;
        self
    }

    /// Sets the number of inverted lists probed per query.
    #[must_use]
    pub const fn ivf_nprobe(mut self, nprobe: usize) -> Self {
        self.config.ivf_nprobe = nprobe;
        self
    }

    /// Sets the number of k-means iterations.
    #[must_use]
    pub const fn kmeans_iterations(mut self, iterations: usize) -> Self {
        self.config.kmeans_iterations = iterations;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> RetrievalConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = RetrievalConfig::default();
        assert_eq!(config.index_dir, PathBuf::from("./faiss_indexes"));
        assert_eq!(config.max_chunk_chars, 1000);
        assert_eq!(config.embed_batch_size, 16);
        assert_eq!(config.top_k, 5);
        assert!((config.confidence_percentile - 75.0).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_config() {
        let config = RetrievalConfig::builder()
            .index_dir("/custom/indexes")
            .max_chunk_chars(200)
            .top_k(2)
            .ivf_nprobe(4)
            .build();

        assert_eq!(config.index_dir, PathBuf::from("/custom/indexes"));
        assert_eq!(config.max_chunk_chars, 200);
        assert_eq!(config.top_k, 2);
        assert_eq!(config.ivf_nprobe, 4);
        assert_eq!(config.embed_batch_size, 16);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = RetrievalConfig::from_toml_str(
            r#"
            index_dir = "/tmp/idx"
            top_k = 8
            confidence_percentile = 50.0
            "#,
        )
        .unwrap();

        assert_eq!(config.index_dir, PathBuf::from("/tmp/idx"));
        assert_eq!(config.top_k, 8);
        assert!((config.confidence_percentile - 50.0).abs() < f32::EPSILON);
        assert_eq!(config.max_chunk_chars, 1000);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            RetrievalConfig::from_toml_str("embed_batch_size = 0"),
            Err(RetrievalError::Config(_))
        ));
        assert!(matches!(
            RetrievalConfig::from_toml_str("confidence_percentile = 120.0"),
            Err(RetrievalError::Config(_))
        ));
        assert!(matches!(
            RetrievalConfig::from_toml_str("unknown_key = 1"),
            Err(RetrievalError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_persistence_error() {
        let err = RetrievalConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, RetrievalError::Persistence { .. }));
    }
}
