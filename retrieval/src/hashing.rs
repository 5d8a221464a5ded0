//! Deterministic feature-hashing embeddings.
//!
//! [`HashingEmbedding`] needs no model files: every lowercase character trigram of the input is
//! hashed with xxh3 into one of `dim` buckets and the resulting count vector is L2-normalised.
//! Texts sharing many trigrams land close together under squared L2 distance, which is enough
//! for offline runs and for exercising the retrieval pipeline in tests.

use arxivlens_core::{Embedding, EmbeddingModel};
use xxhash_rust::xxh3::xxh3_64;

/// Offline embedding model based on hashed character trigrams.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dim: usize,
    model_id: String,
}

impl HashingEmbedding {
    /// Creates a hashing model with `dim` buckets. A zero dimension is treated as one.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self {
            dim,
            model_id: format!("hashing-trigram-{dim}"),
        }
    }

    /// Embeds `text` synchronously.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn embed_sync(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dim];
        let chars: Vec<char> = text.to_lowercase().chars().collect();

        let mut feature = String::with_capacity(12);
        let mut bump = |window: &[char]| {
            feature.clear();
            feature.extend(window);
            let bucket = (xxh3_64(feature.as_bytes()) % self.dim as u64) as usize;
            vector[bucket] += 1.0;
        };

        if chars.len() < 3 {
            if !chars.is_empty() {
                bump(chars.as_slice());
            }
        } else {
            chars.windows(3).for_each(&mut bump);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl EmbeddingModel for HashingEmbedding {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> arxivlens_core::Result<Embedding> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> arxivlens_core::Result<Vec<Embedding>> {
        Ok(texts.iter().map(|text| self.embed_sync(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    #[test]
    fn deterministic_and_normalised() {
        let model = HashingEmbedding::new(256);
        let a = model.embed_sync("Transformers use self-attention.");
        let b = model.embed_sync("Transformers use self-attention.");

        assert_eq!(a, b);
        assert_eq!(a.len(), 256);
        let norm: f32 = a.iter().map(|x| x * x).sum();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn case_insensitive() {
        let model = HashingEmbedding::new(64);
        assert_eq!(model.embed_sync("Attention"), model.embed_sync("attention"));
    }

    #[test]
    fn shared_trigrams_are_closer() {
        let model = HashingEmbedding::new(1024);
        let query = model.embed_sync("self-attention");
        let close = model.embed_sync("Attention requires no recurrence.");
        let far = model.embed_sync("RNNs process sequences sequentially.");

        assert!(squared_l2(&query, &close) < squared_l2(&query, &far));
    }

    #[test]
    fn empty_and_short_inputs() {
        let model = HashingEmbedding::new(8);
        assert!(model.embed_sync("").iter().all(|x| *x == 0.0));
        let short = model.embed_sync("ab");
        assert!((short.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert_eq!(model.model_id(), "hashing-trigram-8");
    }
}
