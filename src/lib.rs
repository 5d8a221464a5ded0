//! # arxivlens
//!
//! Facade crate for retrieval-augmented question answering over PDF documents. It re-exports the
//! collaborator traits from [`arxivlens_core`] and, behind cargo features, the retrieval core,
//! the ONNX embedding backend and the PDF extractor.
//!
//! | Feature     | Crate                 | Contents                                            |
//! |-------------|-----------------------|-----------------------------------------------------|
//! | `retrieval` | `arxivlens-retrieval` | chunking, indexing, persistence, search, pipeline   |
//! | `ort`       | `arxivlens-ort`       | local ONNX Runtime sentence encoders                |
//! | `pdf`       | `arxivlens-pdf`       | `lopdf` text, table row and image extraction        |
//! | `full`      | all of the above      |                                                     |
//!
//! ## Example
//!
//! ```rust
//! # #[cfg(feature = "retrieval")]
//! # {
//! use std::sync::Arc;
//! use arxivlens::retrieval::{
//!     Embedder, HashingEmbedding, IndexBuilder, IndexParams, QueryExpander, RetrievalConfig,
//!     Searcher, VectorIndex,
//! };
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let model = Arc::new(HashingEmbedding::new(256));
//! let embedder = Embedder::new(model, 16);
//! let builder = IndexBuilder::new(embedder.clone(), IndexParams::from(&RetrievalConfig::default()));
//!
//! let built = builder
//!     .build(vec![
//!         "Transformers use self-attention.".to_string(),
//!         "RNNs process sequences sequentially.".to_string(),
//!     ])
//!     .await
//!     .unwrap();
//! assert_eq!(built.index.len(), 2);
//!
//! let searcher = Searcher::new(embedder, QueryExpander::new(10), 75.0);
//! # let _ = searcher;
//! # });
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`arxivlens_core::embedding`]: convert text to vectors.
//! - [`arxivlens_core::extraction`]: the document extraction boundary.
//! - [`arxivlens_core::answer`]: the answer generation boundary.
//! - [`arxivlens_core::history`]: conversation turns.

pub use arxivlens_core::*;

/// Retrieval core: chunker, embedder, indexes, store, expander, searcher and pipeline.
#[cfg(feature = "retrieval")]
pub use arxivlens_retrieval as retrieval;

/// ONNX Runtime embedding models.
#[cfg(feature = "ort")]
pub use arxivlens_ort as ort;

/// PDF extraction.
#[cfg(feature = "pdf")]
pub use arxivlens_pdf as pdf;
