//! Pooling strategies for turning token hidden states into sentence embeddings.

use ndarray::ArrayView3;

/// Strategy for pooling hidden states into a single embedding vector.
///
/// Sentence-transformers encoders (all-MiniLM-L6-v2 and friends) are trained with
/// [`Mean`](PoolingStrategy::Mean); BERT classifiers use [`Cls`](PoolingStrategy::Cls); decoder
/// embedding models use [`LastToken`](PoolingStrategy::LastToken).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PoolingStrategy {
    /// Average all non-padding token hidden states.
    #[default]
    Mean,

    /// Use the first token's hidden state (typically `[CLS]`).
    Cls,

    /// Use the last non-padding token's hidden state.
    LastToken,
}

impl PoolingStrategy {
    /// Pools one row of a batched output.
    ///
    /// `hidden_states` has shape `[batch, seq_len, hidden_dim]`; `attention_mask` is the mask of
    /// row `row` and marks valid tokens with 1 and padding with 0.
    #[must_use]
    pub fn apply(&self, hidden_states: &ArrayView3<f32>, row: usize, attention_mask: &[u32]) -> Vec<f32> {
        let seq_len = hidden_states.shape()[1];
        let hidden_dim = hidden_states.shape()[2];

        match self {
            Self::Mean => {
                let valid: Vec<usize> = attention_mask
                    .iter()
                    .take(seq_len)
                    .enumerate()
                    .filter(|(_, m)| **m != 0)
                    .map(|(i, _)| i)
                    .collect();
                if valid.is_empty() {
                    return vec![0.0; hidden_dim];
                }

                let mut result = vec![0.0; hidden_dim];
                for &token in &valid {
                    for (d, value) in result.iter_mut().enumerate() {
                        *value += hidden_states[[row, token, d]];
                    }
                }

                #[allow(clippy::cast_precision_loss)]
                let count = valid.len() as f32;
                for value in &mut result {
                    *value /= count;
                }
                result
            }
            Self::Cls => (0..hidden_dim).map(|d| hidden_states[[row, 0, d]]).collect(),
            Self::LastToken => {
                let last = attention_mask
                    .iter()
                    .take(seq_len)
                    .rposition(|&m| m != 0)
                    .unwrap_or_else(|| seq_len.saturating_sub(1));
                (0..hidden_dim)
                    .map(|d| hidden_states[[row, last, d]])
                    .collect()
            }
        }
    }
}
