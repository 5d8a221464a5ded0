//! Boundary with the answer generation collaborator.
//!
//! The retrieval core emits ranked chunk texts (or a single fallback sentinel); prompting,
//! memory conditioning and response synthesis belong entirely to the implementor of
//! [`AnswerGenerator`].

use core::future::Future;

use crate::history::Message;

/// Context handed to the answer generator for one user query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerContext {
    /// Retrieved chunk texts in rank order, across all selected documents.
    pub chunks: Vec<String>,
    /// Unindexed table blobs passed through from extraction.
    pub tables: Vec<String>,
    /// Unindexed image references passed through from extraction.
    pub images: Vec<String>,
    /// Set when no document produced a confident hit, so the generator should take its
    /// fallback path.
    pub fallback: bool,
}

/// Synthesizes an answer from retrieved context.
pub trait AnswerGenerator: Send + Sync {
    /// Produces an answer to `query`.
    fn generate(
        &self,
        query: &str,
        context: &AnswerContext,
        history: &[Message],
    ) -> impl Future<Output = crate::Result<String>> + Send;
}
