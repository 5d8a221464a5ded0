//! Sentence-based text chunking.

use unicode_segmentation::UnicodeSegmentation;

use super::Chunker;

/// Chunks text by sentence boundaries.
///
/// Sentences are accumulated until adding the next one would exceed the character budget. A
/// sentence that is longer than the budget on its own becomes a single oversized chunk; nothing is
/// ever truncated.
///
/// # Example
///
/// ```rust
/// use arxivlens_retrieval::chunking::{Chunker, SentenceChunker};
///
/// let chunker = SentenceChunker::new(40);
/// let chunks = chunker.chunk("First sentence here. Second sentence here. Third one.");
/// assert_eq!(chunks[0], "First sentence here.");
/// ```
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    /// Maximum size of each chunk in characters.
    max_chunk_chars: usize,
}

impl SentenceChunker {
    /// Creates a new sentence chunker with the given character budget.
    #[must_use]
    pub const fn new(max_chunk_chars: usize) -> Self {
        Self { max_chunk_chars }
    }

    /// Returns the character budget.
    #[must_use]
    pub const fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_chars = 0usize;

        for sentence in text.unicode_sentences() {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let sentence_chars = sentence.chars().count();

            if !current.is_empty() && current_chars + 1 + sentence_chars > self.max_chunk_chars {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }

            if !current.is_empty() {
                current.push(' ');
                current_chars += 1;
            }
            current.push_str(sentence);
            current_chars += sentence_chars;
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }

    fn name(&self) -> &'static str {
        "sentence"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = SentenceChunker::default();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\t ").is_empty());
    }

    #[test]
    fn small_text_single_chunk() {
        let chunker = SentenceChunker::new(500);
        let chunks = chunker.chunk("Short. Also short. Still short.");
        assert_eq!(chunks, vec!["Short. Also short. Still short.".to_string()]);
    }

    #[test]
    fn multiple_sentences_split() {
        let chunker = SentenceChunker::new(45);
        let chunks =
            chunker.chunk("First sentence here. Second sentence here. Third sentence here.");

        assert_eq!(
            chunks,
            vec![
                "First sentence here. Second sentence here.".to_string(),
                "Third sentence here.".to_string(),
            ]
        );
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 45);
            assert!(chunk.ends_with('.'));
        }
    }

    #[test]
    fn oversized_sentence_kept_whole() {
        let long = format!("Long{}.", " word".repeat(30));
        let text = format!("Tiny. {long} Tail.");
        let chunks = SentenceChunker::new(20).chunk(&text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "Tiny.");
        assert_eq!(chunks[1], long);
        assert_eq!(chunks[2], "Tail.");
    }

    #[test]
    fn budget_counts_characters_not_bytes() {
        let text = "Ünïcödé. Ärger.";
        assert!(text.len() > 15);
        let chunks = SentenceChunker::new(15).chunk(text);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn default_budget() {
        assert_eq!(SentenceChunker::default().max_chunk_chars(), 1000);
    }
}
