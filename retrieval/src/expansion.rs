//! Query expansion from conversation history and lexical synonyms.
//!
//! Follow-up questions such as "how does it scale?" carry little meaning on their own. The
//! expander appends terms from earlier user turns that share vocabulary with the query, and
//! optionally synonyms of the query's own terms, before the query is embedded.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use arxivlens_core::Message;

use crate::error::{Result, RetrievalError};

/// Words that carry no topic on their own.
const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "be", "but", "by", "can", "do", "does", "for", "from",
    "he", "her", "him", "his", "how", "i", "in", "is", "it", "its", "me", "more", "of", "on", "or",
    "she", "so", "that", "the", "their", "them", "these", "they", "this", "those", "to", "was",
    "we", "were", "what", "when", "where", "which", "who", "why", "with", "you",
];

fn is_stopword(term: &str) -> bool {
    STOPWORDS.contains(&term)
}

/// Lowercase whitespace tokens with surrounding punctuation removed. Inner hyphens survive, so
/// "self-attention" stays one token.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|raw| {
            raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
                .trim_matches('-')
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

/// Source of lexical synonyms.
pub trait SynonymSource: Send + Sync {
    /// Returns synonyms of `term` (already lowercase), best first.
    fn synonyms(&self, term: &str) -> Vec<String>;
}

/// In-memory thesaurus.
///
/// Loaded from a JSON object mapping a term to its synonyms. Multiword entries may use `_` in
/// place of spaces:
///
/// ```json
/// { "attention": ["care", "aid"], "network": ["net", "neural_network"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thesaurus {
    entries: HashMap<String, Vec<String>>,
}

impl Thesaurus {
    /// Creates an empty thesaurus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds synonyms for `term`.
    pub fn insert<I, S>(&mut self, term: &str, synonyms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.entries.entry(term.to_lowercase()).or_default();
        for synonym in synonyms {
            let synonym = synonym.as_ref().replace('_', " ").to_lowercase();
            if !synonym.is_empty() && !entry.contains(&synonym) {
                entry.push(synonym);
            }
        }
    }

    /// Parses a JSON thesaurus.
    ///
    /// # Errors
    /// Returns [`RetrievalError::Config`] if the document is not a map of string lists.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let parsed: HashMap<String, Vec<String>> =
            serde_json::from_str(raw).map_err(|e| RetrievalError::Config(format!("thesaurus: {e}")))?;
        let mut thesaurus = Self::new();
        for (term, synonyms) in parsed {
            thesaurus.insert(&term, synonyms);
        }
        Ok(thesaurus)
    }

    /// Reads a JSON thesaurus file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| RetrievalError::Persistence {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&raw)
    }

    /// Returns the number of terms with synonyms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the thesaurus holds no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SynonymSource for Thesaurus {
    fn synonyms(&self, term: &str) -> Vec<String> {
        self.entries.get(term).cloned().unwrap_or_default()
    }
}

/// Expands queries with related terms.
#[derive(Clone)]
pub struct QueryExpander {
    max_terms: usize,
    synonyms: Option<Arc<dyn SynonymSource>>,
}

impl std::fmt::Debug for QueryExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExpander")
            .field("max_terms", &self.max_terms)
            .field("synonyms", &self.synonyms.is_some())
            .finish()
    }
}

impl QueryExpander {
    /// Creates an expander that stops at `max_terms` terms and uses no synonyms.
    #[must_use]
    pub const fn new(max_terms: usize) -> Self {
        Self {
            max_terms,
            synonyms: None,
        }
    }

    /// Adds a synonym source.
    #[must_use]
    pub fn with_synonyms(mut self, source: Arc<dyn SynonymSource>) -> Self {
        self.synonyms = Some(source);
        self
    }

    /// Returns the term cap.
    #[must_use]
    pub const fn max_terms(&self) -> usize {
        self.max_terms
    }

    /// Returns the expanded term list: the query's own tokens followed by added terms.
    ///
    /// Prior user turns are visited in chronological order. A turn is merged when it shares any
    /// token with the terms collected so far, or unconditionally when the query consists only
    /// of stopwords (an anaphoric follow-up like "what about it?"). Synonyms of
    /// the query's content tokens are appended last. Adding stops once `max_terms` is reached;
    /// the query's own tokens are always kept.
    #[must_use]
    pub fn expand_terms(&self, query: &str, history: &[Message]) -> Vec<String> {
        self.collect(query, history).1
    }

    /// Returns the query text followed by the terms expansion added.
    ///
    /// When nothing is added the trimmed query is returned unchanged, so a query that repeats a
    /// chunk verbatim still embeds exactly like that chunk.
    #[must_use]
    pub fn expand(&self, query: &str, history: &[Message]) -> String {
        let (own, terms) = self.collect(query, history);
        let query = query.trim();
        if terms.len() == own {
            query.to_string()
        } else {
            format!("{query} {}", terms[own..].join(" "))
        }
    }

    fn collect(&self, query: &str, history: &[Message]) -> (usize, Vec<String>) {
        let query_tokens = tokenize(query);
        let mut seen: HashSet<String> = HashSet::new();
        let mut terms: Vec<String> = Vec::new();
        for token in &query_tokens {
            if seen.insert(token.clone()) {
                terms.push(token.clone());
            }
        }
        let own = terms.len();
        let anaphoric = own > 0 && terms.iter().all(|t| is_stopword(t));

        for message in history.iter().filter(|m| m.is_user()) {
            if terms.len() >= self.max_terms {
                break;
            }
            let turn = tokenize(&message.content);
            let related = anaphoric || turn.iter().any(|t| seen.contains(t));
            if !related {
                continue;
            }
            for token in turn {
                if terms.len() >= self.max_terms {
                    break;
                }
                if seen.insert(token.clone()) {
                    terms.push(token);
                }
            }
        }

        if let Some(source) = &self.synonyms {
            'outer: for token in query_tokens.iter().filter(|t| !is_stopword(t)) {
                for synonym in source.synonyms(token) {
                    if terms.len() >= self.max_terms {
                        break 'outer;
                    }
                    if seen.insert(synonym.clone()) {
                        terms.push(synonym);
                    }
                }
            }
        }

        (own, terms)
    }
}

/// Expands `query` with `history` without synonyms.
#[must_use]
pub fn expand_query(query: &str, history: &[Message], max_terms: usize) -> String {
    QueryExpander::new(max_terms).expand(query, history)
}
