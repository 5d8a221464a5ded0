//! Retrieval core of arxivlens.
//!
//! Turns extracted document text into persisted vector indexes and answers queries against them
//! with a confidence filter:
//!
//! ```text
//! text ──▶ Chunker ──▶ Embedder ──▶ IndexBuilder ──▶ IndexStore (+ cache)
//!                                                          │
//! query ─▶ QueryExpander ─▶ Embedder ─▶ Searcher ◀─────────┘ ──▶ ranked chunks | sentinel
//! ```
//!
//! - [`chunking`] splits text into sentence-aligned chunks within a character budget.
//! - [`Embedder`] batches texts through any [`EmbeddingModel`](arxivlens_core::EmbeddingModel).
//! - [`IndexBuilder`] picks an exact [`FlatIndex`] for small corpora and a k-means
//!   [`IvfIndex`] for large ones.
//! - [`IndexStore`] persists `(index, chunks)` per [`DocumentId`] and validates them on load;
//!   [`CachedStore`] keeps loaded indexes in memory keyed by artifact generation.
//! - [`QueryExpander`] adds terms from conversation history and synonyms.
//! - [`Searcher`] keeps hits strictly below the 75th percentile of the top-k distances.
//! - [`Pipeline`] wires everything to an [`Extractor`](arxivlens_core::Extractor) and an
//!   [`AnswerGenerator`](arxivlens_core::AnswerGenerator).

pub mod builder;
pub mod cache;
pub mod chunking;
pub mod config;
pub mod embedder;
pub mod error;
pub mod expansion;
pub mod hashing;
pub mod index;
pub mod pipeline;
pub mod searcher;
pub mod service;
pub mod store;
pub mod types;

pub use builder::{BuiltIndex, IndexBuilder, IndexParams};
pub use cache::CachedStore;
pub use chunking::{Chunker, SentenceChunker};
pub use config::{RetrievalConfig, RetrievalConfigBuilder};
pub use embedder::{Embedder, Embeddings};
pub use error::{Result, RetrievalError};
pub use expansion::{QueryExpander, SynonymSource, Thesaurus, expand_query};
pub use hashing::HashingEmbedding;
pub use index::{AnyIndex, FlatIndex, IndexKind, IvfIndex, VectorIndex};
pub use pipeline::{Pipeline, ProcessedDocument};
pub use searcher::{Searcher, confidence_filter, percentile};
pub use service::ModelService;
pub use store::{ArtifactPaths, IndexStore, LoadedIndex, Manifest, ModelFingerprint};
pub use types::{DocumentId, NO_RELEVANT_INFORMATION, Neighbor, RetrievedChunk, SearchOutcome};
