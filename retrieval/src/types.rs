//! Core types for the retrieval crate.

use std::fmt;
use std::path::Path;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// Text returned in place of results when nothing passes the confidence filter.
pub const NO_RELEVANT_INFORMATION: &str = "I couldn't find relevant information.";

/// Stable identifier of a source document.
///
/// Identifiers are lowercase hex MD5 digests, either of the identifying path string or of the raw
/// document bytes. They name every persisted artifact of the document.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wraps an already computed identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the identifier from the path string used to reach the document.
    ///
    /// The same file reached through two different paths gets two identities.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::from_content(path.as_ref().to_string_lossy().as_bytes())
    }

    /// Derives the identifier from the document bytes.
    #[must_use]
    pub fn from_content(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Md5::digest(bytes)))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One raw nearest-neighbor hit returned by a vector index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    /// Position of the chunk in the chunk list the index was built from.
    pub id: usize,
    /// Squared L2 distance to the query.
    pub distance: f32,
}

impl Neighbor {
    /// Creates a neighbor.
    #[must_use]
    pub const fn new(id: usize, distance: f32) -> Self {
        Self { id, distance }
    }
}

/// A chunk that survived the confidence filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Position of the chunk in its document's chunk list.
    pub id: usize,
    /// Chunk text.
    pub text: String,
    /// Squared L2 distance to the query (lower is closer).
    pub distance: f32,
}

/// Result of a confidence-filtered search.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchOutcome {
    /// Chunks kept by the filter, closest first.
    Hits(Vec<RetrievedChunk>),
    /// The search ran but nothing was confident enough.
    NoRelevantInformation,
}

impl SearchOutcome {
    /// Builds an outcome from the kept chunks, using the sentinel when none were kept.
    #[must_use]
    pub fn from_hits(hits: Vec<RetrievedChunk>) -> Self {
        if hits.is_empty() {
            Self::NoRelevantInformation
        } else {
            Self::Hits(hits)
        }
    }

    /// Returns the kept chunks, or an empty slice for the sentinel outcome.
    #[must_use]
    pub fn hits(&self) -> &[RetrievedChunk] {
        match self {
            Self::Hits(hits) => hits,
            Self::NoRelevantInformation => &[],
        }
    }

    /// Returns `true` when nothing passed the filter.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::NoRelevantInformation)
    }

    /// Returns the kept chunk texts in rank order, or the single sentinel text.
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        match self {
            Self::Hits(hits) => hits.iter().map(|hit| hit.text.clone()).collect(),
            Self::NoRelevantInformation => vec![NO_RELEVANT_INFORMATION.to_string()],
        }
    }
}
