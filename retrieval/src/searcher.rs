//! Confidence-filtered nearest-neighbor search.

use arxivlens_core::{EmbeddingModel, Message};
use ordered_float::OrderedFloat;
use tracing::debug;

use crate::embedder::Embedder;
use crate::error::{Result, RetrievalError};
use crate::expansion::QueryExpander;
use crate::index::VectorIndex;
use crate::store::LoadedIndex;
use crate::types::{Neighbor, RetrievedChunk, SearchOutcome};

/// Percentile of `values` with linear interpolation between closest ranks.
///
/// Matches the default method of numpy's `percentile`. Returns `None` for an empty slice.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile(values: &[f32], percentile: f32) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by_key(|v| OrderedFloat(*v));

    let rank = f64::from(percentile.clamp(0.0, 100.0)) / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = (rank - lower as f64) as f32;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Keeps neighbors strictly closer than the `pct` percentile of the `k` requested distances
/// whose ids resolve inside a chunk list of `chunk_count` entries. Input order is preserved.
///
/// Slots the index could not fill (fewer than `k` neighbors) count as `f32::MAX`, so a document
/// with fewer chunks than `k` keeps its real neighbors.
#[must_use]
pub fn confidence_filter(
    neighbors: &[Neighbor],
    pct: f32,
    k: usize,
    chunk_count: usize,
) -> Vec<Neighbor> {
    let mut distances: Vec<f32> = neighbors.iter().map(|n| n.distance).collect();
    distances.resize(distances.len().max(k), f32::MAX);
    let Some(threshold) = percentile(&distances, pct) else {
        return Vec::new();
    };
    neighbors
        .iter()
        .filter(|n| n.id < chunk_count && n.distance < threshold)
        .copied()
        .collect()
}

/// Runs expanded, embedded, confidence-filtered queries against loaded indexes.
///
/// The searcher holds no per-query state and never mutates the index it searches.
#[derive(Debug)]
pub struct Searcher<M> {
    embedder: Embedder<M>,
    expander: QueryExpander,
    confidence_percentile: f32,
}

impl<M: EmbeddingModel> Searcher<M> {
    /// Creates a searcher.
    #[must_use]
    pub const fn new(
        embedder: Embedder<M>,
        expander: QueryExpander,
        confidence_percentile: f32,
    ) -> Self {
        Self {
            embedder,
            expander,
            confidence_percentile,
        }
    }

    /// Returns the query expander.
    #[must_use]
    pub const fn expander(&self) -> &QueryExpander {
        &self.expander
    }

    /// Searches `index` for `query`.
    ///
    /// The query is expanded with `history`, embedded and matched against the `k` nearest
    /// chunks. Only chunks strictly closer than the configured percentile of those `k` distances
    /// are kept, with unfilled slots counted as `f32::MAX`; if none are, the outcome is
    /// [`SearchOutcome::NoRelevantInformation`].
    ///
    /// # Errors
    /// - [`RetrievalError::NotReady`] if `index` is `None`.
    /// - [`RetrievalError::InvalidInput`] for an empty query or `k == 0`.
    /// - Embedding and dimension errors.
    pub async fn search(
        &self,
        query: &str,
        index: Option<&LoadedIndex>,
        history: &[Message],
        k: usize,
    ) -> Result<SearchOutcome> {
        let index = index.ok_or_else(|| {
            RetrievalError::NotReady("index is not loaded; process the document first".into())
        })?;
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidInput(
                "query must be a non-empty string".into(),
            ));
        }
        if k == 0 {
            return Err(RetrievalError::InvalidInput("k must be positive".into()));
        }

        let expanded = self.expander.expand(query, history);
        debug!(document = %index.document, query = %expanded, "searching");
        let vector = self.embedder.encode_query(&expanded).await?.to_vec();
        let neighbors = index.index.search(&vector, k)?;
        let kept = confidence_filter(
            &neighbors,
            self.confidence_percentile,
            k,
            index.chunks.len(),
        );
        debug!(
            document = %index.document,
            returned = neighbors.len(),
            kept = kept.len(),
            "confidence filter applied"
        );

        let hits = kept
            .into_iter()
            .map(|n| RetrievedChunk {
                id: n.id,
                text: index.chunks[n.id].clone(),
                distance: n.distance,
            })
            .collect();
        Ok(SearchOutcome::from_hits(hits))
    }
}
