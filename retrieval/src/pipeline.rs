//! End-to-end document processing and question answering.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arxivlens_core::{AnswerContext, AnswerGenerator, EmbeddingModel, Extractor, Message};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::builder::{IndexBuilder, IndexParams};
use crate::cache::CachedStore;
use crate::chunking::{Chunker, SentenceChunker};
use crate::config::RetrievalConfig;
use crate::embedder::Embedder;
use crate::error::{Result, RetrievalError};
use crate::expansion::{QueryExpander, SynonymSource};
use crate::index::IndexKind;
use crate::searcher::Searcher;
use crate::store::{IndexStore, LoadedIndex, Manifest, ModelFingerprint};
use crate::types::{DocumentId, NO_RELEVANT_INFORMATION, SearchOutcome};

/// Report of a [`Pipeline::process`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedDocument {
    /// Identity of the processed document.
    pub document: DocumentId,
    /// Number of indexed chunks.
    pub chunk_count: usize,
    /// Structure of the index.
    pub index_kind: IndexKind,
    /// `true` when existing artifacts were kept instead of rebuilding.
    pub reused: bool,
    /// Table rows extracted alongside the text. Empty when artifacts were reused.
    pub tables: Vec<String>,
    /// Image references extracted alongside the text. Empty when artifacts were reused.
    pub images: Vec<String>,
}

#[derive(Debug, Default)]
struct Passthrough {
    tables: Vec<String>,
    images: Vec<String>,
}

/// Ties extraction, chunking, indexing, persistence and search together.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use arxivlens_core::{ExtractedDocument, Extractor};
/// use arxivlens_retrieval::{HashingEmbedding, Pipeline, RetrievalConfig};
///
/// struct PlainText;
///
/// impl Extractor for PlainText {
///     fn extract(&self, path: &std::path::Path) -> arxivlens_core::Result<ExtractedDocument> {
///         Ok(ExtractedDocument::from_text(std::fs::read_to_string(path)?))
///     }
/// }
///
/// # async fn run() -> arxivlens_retrieval::Result<()> {
/// let pipeline = Pipeline::new(
///     RetrievalConfig::default(),
///     Arc::new(HashingEmbedding::new(384)),
///     PlainText,
/// )?;
/// pipeline.process("notes.txt".as_ref(), false).await?;
/// let outcome = pipeline.retrieve("notes.txt".as_ref(), "attention", &[]).await?;
/// println!("{:?}", outcome.texts());
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<M, E> {
    config: RetrievalConfig,
    chunker: SentenceChunker,
    builder: IndexBuilder<M>,
    store: CachedStore,
    searcher: Searcher<M>,
    extractor: E,
    passthrough: RwLock<HashMap<DocumentId, Passthrough>>,
}

impl<M, E> std::fmt::Debug for Pipeline<M, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<M, E> Pipeline<M, E>
where
    M: EmbeddingModel,
    E: Extractor,
{
    /// Creates a pipeline around a loaded model and an extractor.
    ///
    /// # Errors
    /// Returns [`RetrievalError::Config`] if `config` is invalid.
    pub fn new(config: RetrievalConfig, model: Arc<M>, extractor: E) -> Result<Self> {
        config.validate()?;
        let fingerprint = ModelFingerprint::of(model.as_ref());
        let embedder = Embedder::new(model, config.embed_batch_size);
        let searcher = Searcher::new(
            embedder.clone(),
            QueryExpander::new(config.max_expansion_terms),
            config.confidence_percentile,
        );

        Ok(Self {
            chunker: SentenceChunker::new(config.max_chunk_chars),
            builder: IndexBuilder::new(embedder, IndexParams::from(&config)),
            store: CachedStore::new(IndexStore::new(&config.index_dir, fingerprint)),
            searcher,
            extractor,
            passthrough: RwLock::new(HashMap::new()),
            config,
        })
    }

    /// Enables synonym enrichment during query expansion.
    #[must_use]
    pub fn with_synonyms(mut self, source: Arc<dyn SynonymSource>) -> Self {
        self.searcher = Searcher::new(
            self.builder.embedder().clone(),
            QueryExpander::new(self.config.max_expansion_terms).with_synonyms(source),
            self.config.confidence_percentile,
        );
        self
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Returns the cached index store.
    #[must_use]
    pub const fn store(&self) -> &CachedStore {
        &self.store
    }

    /// Returns the searcher.
    #[must_use]
    pub const fn searcher(&self) -> &Searcher<M> {
        &self.searcher
    }

    /// Extracts, chunks, indexes and persists the document at `path`.
    ///
    /// Existing artifacts are reused unless `force` is set or they were built by a different
    /// embedding model; in both cases they are deleted and rebuilt.
    ///
    /// # Errors
    /// Returns [`RetrievalError::Extraction`] if no text could be extracted, and build or
    /// persistence errors.
    pub async fn process(&self, path: &Path, force: bool) -> Result<ProcessedDocument> {
        let document = DocumentId::from_path(path);

        let mut rebuild = force;
        if !force && self.store.exists(&document) {
            let manifest = self.store.store().manifest(&document)?;
            let fingerprint = self.store.store().fingerprint();
            if manifest.model_id == fingerprint.model_id && manifest.dim == fingerprint.dim {
                info!(document = %document, path = %path.display(), "index exists, skipping");
                return Ok(ProcessedDocument {
                    document,
                    chunk_count: manifest.chunk_count,
                    index_kind: manifest.index_kind,
                    reused: true,
                    tables: Vec::new(),
                    images: Vec::new(),
                });
            }
            warn!(
                document = %document,
                built_with = %manifest.model_id,
                configured = %fingerprint.model_id,
                "index built by another model, rebuilding"
            );
            rebuild = true;
        }
        if rebuild {
            self.store.remove(&document)?;
        }

        let extracted = self
            .extractor
            .extract(path)
            .map_err(|e| RetrievalError::Extraction(format!("{}: {e:#}", path.display())))?;
        let chunks = self.chunker.chunk(&extracted.text);
        if chunks.is_empty() {
            return Err(RetrievalError::Extraction(format!(
                "no valid text extracted from {}",
                path.display()
            )));
        }
        info!(
            document = %document,
            chunks = chunks.len(),
            chunker = self.chunker.name(),
            "chunked document"
        );

        let built = self.builder.build(chunks).await?;
        let manifest = self.store.save(&document, &built.index, &built.chunks)?;

        self.passthrough.write().insert(
            document.clone(),
            Passthrough {
                tables: extracted.tables.clone(),
                images: extracted.images.clone(),
            },
        );

        Ok(ProcessedDocument {
            document,
            chunk_count: manifest.chunk_count,
            index_kind: manifest.index_kind,
            reused: false,
            tables: extracted.tables,
            images: extracted.images,
        })
    }

    /// Loads the index of the document at `path`, rebuilding it once if artifacts are missing.
    ///
    /// # Errors
    /// Returns [`RetrievalError::NotFound`] if the artifacts are still missing after the
    /// rebuild, and any processing or validation error.
    pub async fn load(&self, path: &Path) -> Result<Arc<LoadedIndex>> {
        let document = DocumentId::from_path(path);
        match self.store.load(&document) {
            Err(err) if err.is_not_found() => {
                warn!(document = %document, error = %err, "index missing, rebuilding");
                self.process(path, true).await?;
                self.store.load(&document)
            }
            other => other,
        }
    }

    /// Answers `query` against a single document.
    ///
    /// # Errors
    /// Returns [`RetrievalError::InvalidInput`] for an empty query and any load or search
    /// error.
    pub async fn retrieve(
        &self,
        path: &Path,
        query: &str,
        history: &[Message],
    ) -> Result<SearchOutcome> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidInput(
                "query must be a non-empty string".into(),
            ));
        }
        let loaded = self.load(path).await?;
        self.searcher
            .search(query, Some(&loaded), history, self.config.top_k)
            .await
    }

    /// Retrieves from every document in `paths` and lets `generator` write the answer.
    ///
    /// Kept chunks are concatenated in document order. When no document yields a confident
    /// hit, the generator receives only the fallback sentinel with `fallback` set.
    ///
    /// # Errors
    /// Returns retrieval errors and [`RetrievalError::Generation`].
    pub async fn answer<G, P>(
        &self,
        generator: &G,
        query: &str,
        paths: &[P],
        history: &[Message],
    ) -> Result<String>
    where
        G: AnswerGenerator,
        P: AsRef<Path>,
    {
        let mut context = AnswerContext::default();
        for path in paths {
            let path = path.as_ref();
            let outcome = self.retrieve(path, query, history).await?;
            context
                .chunks
                .extend(outcome.hits().iter().map(|hit| hit.text.clone()));

            let document = DocumentId::from_path(path);
            if let Some(extra) = self.passthrough.read().get(&document) {
                context.tables.extend(extra.tables.iter().cloned());
                context.images.extend(extra.images.iter().cloned());
            }
        }

        context.fallback = context.chunks.is_empty();
        if context.fallback {
            context.chunks.push(NO_RELEVANT_INFORMATION.to_string());
        }
        info!(
            documents = paths.len(),
            chunks = context.chunks.len(),
            fallback = context.fallback,
            "generating answer"
        );

        generator
            .generate(query, &context, history)
            .await
            .map_err(RetrievalError::Generation)
    }

    /// Returns the manifest of the document at `path`, or `None` if it is not indexed.
    ///
    /// # Errors
    /// Returns errors other than a missing artifact.
    pub fn status(&self, path: &Path) -> Result<Option<Manifest>> {
        match self.store.store().manifest(&DocumentId::from_path(path)) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Deletes the artifacts of the document at `path`. Returns `true` if anything was removed.
    ///
    /// # Errors
    /// Returns persistence errors.
    pub fn forget(&self, path: &Path) -> Result<bool> {
        let document = DocumentId::from_path(path);
        self.passthrough.write().remove(&document);
        self.store.remove(&document)
    }
}
