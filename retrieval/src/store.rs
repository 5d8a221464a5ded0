//! On-disk persistence of built indexes.
//!
//! Every document owns three files in the index directory, all named after its [`DocumentId`]:
//!
//! | File | Content |
//! |------|---------|
//! | `index_<id>.index` | rkyv-encoded vector index |
//! | `chunks_<id>.bin` | rkyv-encoded ordered chunk list |
//! | `manifest_<id>.json` | model id, dimension, chunk count, index kind, generation |
//!
//! The generation is an xxh3 digest over both binary artifacts. A load only succeeds when all
//! three files exist, were written by the same save and match the configured embedding model.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use arxivlens_core::EmbeddingModel;
use rkyv::rancor::Error as RkyvError;
use rkyv::util::AlignedVec;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::Xxh3;

use crate::error::{Result, RetrievalError};
use crate::index::record::{ChunksRecord, IndexRecord};
use crate::index::{AnyIndex, IndexKind, VectorIndex};
use crate::types::DocumentId;

const MANIFEST_VERSION: u32 = 1;

/// Identity of the embedding model an index must be searched with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFingerprint {
    /// Model identifier.
    pub model_id: String,
    /// Embedding dimension.
    pub dim: usize,
}

impl ModelFingerprint {
    /// Creates a fingerprint.
    #[must_use]
    pub fn new(model_id: impl Into<String>, dim: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dim,
        }
    }

    /// Takes the fingerprint of a model.
    #[must_use]
    pub fn of<M: EmbeddingModel>(model: &M) -> Self {
        Self::new(model.model_id(), model.dim())
    }
}

/// Metadata written next to the binary artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Layout version of the artifacts.
    pub version: u32,
    /// Document the artifacts belong to.
    pub document: DocumentId,
    /// Embedding model that produced the vectors.
    pub model_id: String,
    /// Embedding dimension.
    pub dim: usize,
    /// Number of chunks, equal to the number of indexed vectors.
    pub chunk_count: usize,
    /// Structure of the stored index.
    pub index_kind: IndexKind,
    /// Digest over both binary artifacts.
    pub generation: String,
}

/// Locations of a document's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Serialized vector index.
    pub index: PathBuf,
    /// Serialized chunk list.
    pub chunks: PathBuf,
    /// JSON manifest.
    pub manifest: PathBuf,
}

impl ArtifactPaths {
    fn all(&self) -> [&Path; 3] {
        [&self.index, &self.chunks, &self.manifest]
    }
}

/// A validated index together with the chunk list its ids resolve against.
#[derive(Debug, Clone)]
pub struct LoadedIndex {
    /// Owning document.
    pub document: DocumentId,
    /// Searchable index.
    pub index: AnyIndex,
    /// Chunk list; every id returned by `index` is a valid position here.
    pub chunks: Vec<String>,
    /// Manifest the artifacts were validated against.
    pub manifest: Manifest,
}

/// Reads and writes document artifacts in one directory.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
    fingerprint: ModelFingerprint,
}

impl IndexStore {
    /// Creates a store rooted at `dir` that accepts indexes built by `fingerprint`'s model.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, fingerprint: ModelFingerprint) -> Self {
        Self {
            dir: dir.into(),
            fingerprint,
        }
    }

    /// Returns the index directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the model fingerprint this store validates against.
    #[must_use]
    pub const fn fingerprint(&self) -> &ModelFingerprint {
        &self.fingerprint
    }

    /// Returns the artifact locations of `document`.
    #[must_use]
    pub fn paths(&self, document: &DocumentId) -> ArtifactPaths {
        ArtifactPaths {
            index: self.dir.join(format!("index_{document}.index")),
            chunks: self.dir.join(format!("chunks_{document}.bin")),
            manifest: self.dir.join(format!("manifest_{document}.json")),
        }
    }

    /// Returns `true` if every artifact of `document` is present.
    #[must_use]
    pub fn exists(&self, document: &DocumentId) -> bool {
        self.paths(document).all().iter().all(|path| path.exists())
    }

    /// Persists `index` and `chunks` for `document`, replacing any previous artifacts.
    ///
    /// All artifacts are fully written to temporary files before any of them is moved into
    /// place. If moving fails part way, every artifact of the document is removed so that no
    /// mix of old and new files survives.
    ///
    /// # Errors
    /// Returns [`RetrievalError::Build`] if the index and chunk list disagree in length,
    /// [`RetrievalError::DimensionMismatch`] if the index does not match the store's model, and
    /// persistence or serialization errors.
    pub fn save(
        &self,
        document: &DocumentId,
        index: &AnyIndex,
        chunks: &[String],
    ) -> Result<Manifest> {
        if index.len() != chunks.len() {
            return Err(RetrievalError::Build(format!(
                "index holds {} vectors for {} chunks",
                index.len(),
                chunks.len()
            )));
        }
        if index.dim() != self.fingerprint.dim {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.fingerprint.dim,
                actual: index.dim(),
            });
        }

        fs::create_dir_all(&self.dir).map_err(|e| RetrievalError::Persistence {
            path: self.dir.clone(),
            source: e,
        })?;

        let index_bytes = rkyv::to_bytes::<RkyvError>(&IndexRecord::try_from(index)?)
            .map_err(|e| RetrievalError::Serialization(e.to_string()))?;
        let chunk_bytes = rkyv::to_bytes::<RkyvError>(&ChunksRecord {
            chunks: chunks.to_vec(),
        })
        .map_err(|e| RetrievalError::Serialization(e.to_string()))?;

        let manifest = Manifest {
            version: MANIFEST_VERSION,
            document: document.clone(),
            model_id: self.fingerprint.model_id.clone(),
            dim: self.fingerprint.dim,
            chunk_count: chunks.len(),
            index_kind: index.kind(),
            generation: generation(&index_bytes, &chunk_bytes),
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| RetrievalError::Serialization(e.to_string()))?;

        let paths = self.paths(document);
        let staged = [
            (self.stage(&index_bytes)?, &paths.index),
            (self.stage(&chunk_bytes)?, &paths.chunks),
            (self.stage(&manifest_bytes)?, &paths.manifest),
        ];
        for (file, target) in staged {
            if let Err(err) = file.persist(target) {
                warn!(document = %document, path = %target.display(), "failed to move artifact into place");
                self.remove_paths(&paths);
                return Err(RetrievalError::Persistence {
                    path: target.clone(),
                    source: err.error,
                });
            }
        }

        info!(
            document = %document,
            chunks = manifest.chunk_count,
            kind = %manifest.index_kind,
            generation = %manifest.generation,
            "saved index"
        );
        Ok(manifest)
    }

    /// Reads the manifest of `document` after checking that every artifact exists.
    ///
    /// # Errors
    /// Returns [`RetrievalError::NotFound`] naming the first missing artifact.
    pub fn manifest(&self, document: &DocumentId) -> Result<Manifest> {
        let paths = self.paths(document);
        for path in paths.all() {
            if !path.exists() {
                return Err(not_found(document, path));
            }
        }
        let bytes = read_artifact(document, &paths.manifest)?;
        serde_json::from_slice(&bytes).map_err(|e| RetrievalError::Corrupt {
            document: document.to_string(),
            reason: format!("unreadable manifest: {e}"),
        })
    }

    /// Loads and validates the artifacts of `document`.
    ///
    /// # Errors
    /// - [`RetrievalError::NotFound`] if any artifact is missing.
    /// - [`RetrievalError::ModelMismatch`] or [`RetrievalError::DimensionMismatch`] if the index
    ///   was built by another model.
    /// - [`RetrievalError::Corrupt`] if the artifacts come from different saves or disagree in
    ///   length.
    pub fn load(&self, document: &DocumentId) -> Result<LoadedIndex> {
        let manifest = self.manifest(document)?;
        if manifest.model_id != self.fingerprint.model_id {
            return Err(RetrievalError::ModelMismatch {
                persisted: manifest.model_id,
                configured: self.fingerprint.model_id.clone(),
            });
        }
        if manifest.dim != self.fingerprint.dim {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.fingerprint.dim,
                actual: manifest.dim,
            });
        }

        let paths = self.paths(document);
        let index_bytes = read_artifact(document, &paths.index)?;
        let chunk_bytes = read_artifact(document, &paths.chunks)?;
        let corrupt = |reason: String| RetrievalError::Corrupt {
            document: document.to_string(),
            reason,
        };

        if generation(&index_bytes, &chunk_bytes) != manifest.generation {
            return Err(corrupt("artifacts were written by different saves".into()));
        }

        let record = rkyv::from_bytes::<IndexRecord, RkyvError>(&aligned(&index_bytes))
            .map_err(|e| RetrievalError::Serialization(e.to_string()))?;
        let index = AnyIndex::try_from(record)?;
        let chunks = rkyv::from_bytes::<ChunksRecord, RkyvError>(&aligned(&chunk_bytes))
            .map_err(|e| RetrievalError::Serialization(e.to_string()))?
            .chunks;

        if index.len() != chunks.len() || chunks.len() != manifest.chunk_count {
            return Err(corrupt(format!(
                "index holds {} vectors, chunk list holds {}, manifest records {}",
                index.len(),
                chunks.len(),
                manifest.chunk_count
            )));
        }
        if index.dim() != manifest.dim || index.kind() != manifest.index_kind {
            return Err(corrupt("index does not match its manifest".into()));
        }

        debug!(document = %document, chunks = chunks.len(), kind = %index.kind(), "loaded index");
        Ok(LoadedIndex {
            document: document.clone(),
            index,
            chunks,
            manifest,
        })
    }

    /// Deletes every artifact of `document`. Returns `true` if anything was removed.
    ///
    /// # Errors
    /// Returns [`RetrievalError::Persistence`] if an existing file cannot be deleted.
    pub fn remove(&self, document: &DocumentId) -> Result<bool> {
        let mut removed = false;
        for path in self.paths(document).all() {
            match fs::remove_file(path) {
                Ok(()) => removed = true,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(RetrievalError::Persistence {
                        path: path.to_path_buf(),
                        source: err,
                    });
                }
            }
        }
        if removed {
            info!(document = %document, "removed index artifacts");
        }
        Ok(removed)
    }

    fn stage(&self, bytes: &[u8]) -> Result<NamedTempFile> {
        let persistence = |source| RetrievalError::Persistence {
            path: self.dir.clone(),
            source,
        };
        let mut file = NamedTempFile::new_in(&self.dir).map_err(persistence)?;
        file.write_all(bytes).map_err(persistence)?;
        file.as_file().sync_all().map_err(persistence)?;
        Ok(file)
    }

    fn remove_paths(&self, paths: &ArtifactPaths) {
        for path in paths.all() {
            if let Err(err) = fs::remove_file(path) {
                if err.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %err, "failed to remove partial artifact");
                }
            }
        }
        debug!(dir = %self.dir.display(), "cleaned up partial artifacts");
    }
}

fn not_found(document: &DocumentId, path: &Path) -> RetrievalError {
    RetrievalError::NotFound {
        document: document.to_string(),
        path: path.to_path_buf(),
    }
}

fn read_artifact(document: &DocumentId, path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            not_found(document, path)
        } else {
            RetrievalError::Persistence {
                path: path.to_path_buf(),
                source: err,
            }
        }
    })
}

fn aligned(bytes: &[u8]) -> AlignedVec {
    let mut buffer = AlignedVec::with_capacity(bytes.len());
    buffer.extend_from_slice(bytes);
    buffer
}

fn generation(index_bytes: &[u8], chunk_bytes: &[u8]) -> String {
    let mut hasher = Xxh3::new();
    hasher.update(&(index_bytes.len() as u64).to_le_bytes());
    hasher.update(index_bytes);
    hasher.update(chunk_bytes);
    format!("{:016x}", hasher.digest())
}
