//! Text chunking strategies.
//!
//! A chunker turns the text of one document into the ordered chunk list that becomes the single
//! source of truth for id to text resolution. Chunk ids are positions in that list.

mod sentence;

pub use sentence::SentenceChunker;

/// Trait for text chunking strategies.
pub trait Chunker: Send + Sync {
    /// Splits a text blob into ordered chunks.
    ///
    /// Empty or whitespace-only input yields an empty list; callers treat that as an extraction
    /// failure.
    fn chunk(&self, text: &str) -> Vec<String>;

    /// Returns the name of this chunking strategy.
    fn name(&self) -> &'static str;
}
