//! # arxivlens-core
//!
//! Trait APIs shared by the arxivlens workspace. The retrieval core depends only on these
//! interfaces; concrete collaborators live in their own crates.
//!
//! ```text
//! ┌──────────────┐   text    ┌───────────────────┐  ranked chunks  ┌──────────────────┐
//! │  Extractor   │──────────▶│  retrieval core   │────────────────▶│ AnswerGenerator  │
//! │ (arxivlens-  │           │ (arxivlens-       │                 │ (LLM, external)  │
//! │  pdf)        │           │  retrieval)       │                 │                  │
//! └──────────────┘           └─────────┬─────────┘                 └──────────────────┘
//!                                      │ embed
//!                            ┌─────────▼─────────┐
//!                            │  EmbeddingModel   │
//!                            │ (arxivlens-ort)   │
//!                            └───────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`embedding`]: turn text into dense vectors.
//! - [`history`]: conversation turns used for query expansion and answering.
//! - [`extraction`]: the document extraction boundary.
//! - [`answer`]: the answer generation boundary.

pub mod answer;
pub mod embedding;
pub mod extraction;
pub mod history;

#[doc(inline)]
pub use answer::{AnswerContext, AnswerGenerator};
#[doc(inline)]
pub use embedding::{Embedding, EmbeddingModel};
#[doc(inline)]
pub use extraction::{ExtractedDocument, Extractor};
#[doc(inline)]
pub use history::{Message, Role};

/// Result type used by collaborator traits.
///
/// Type alias for [`anyhow::Result<T>`](anyhow::Result) with [`String`] as default success type.
pub type Result<T = String> = anyhow::Result<T>;

pub use anyhow::Error;
