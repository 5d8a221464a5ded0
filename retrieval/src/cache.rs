//! In-memory cache of loaded indexes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::index::AnyIndex;
use crate::store::{IndexStore, LoadedIndex, Manifest};
use crate::types::DocumentId;

/// An [`IndexStore`] fronted by a process-wide cache of loaded indexes.
///
/// Entries are keyed by document id and tagged with the manifest generation they were loaded
/// from. Every lookup re-reads the small manifest, so a rebuilt document (new generation) or a
/// document with missing artifacts is never served from a stale entry. Searches that already
/// hold an `Arc<LoadedIndex>` keep using it while a rebuild replaces the files.
#[derive(Debug)]
pub struct CachedStore {
    store: IndexStore,
    entries: RwLock<HashMap<DocumentId, Arc<LoadedIndex>>>,
}

impl CachedStore {
    /// Wraps `store` with an empty cache.
    #[must_use]
    pub fn new(store: IndexStore) -> Self {
        Self {
            store,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Loads `document`, serving the cached entry when its generation is current.
    ///
    /// # Errors
    /// Propagates [`IndexStore::load`] errors. A `NotFound` also evicts the cached entry.
    pub fn load(&self, document: &DocumentId) -> Result<Arc<LoadedIndex>> {
        let manifest = match self.store.manifest(document) {
            Ok(manifest) => manifest,
            Err(err) => {
                if err.is_not_found() {
                    self.invalidate(document);
                }
                return Err(err);
            }
        };

        if let Some(entry) = self.entries.read().get(document) {
            if entry.manifest.generation == manifest.generation {
                debug!(document = %document, "index cache hit");
                return Ok(Arc::clone(entry));
            }
        }

        debug!(document = %document, generation = %manifest.generation, "index cache miss");
        let loaded = Arc::new(self.store.load(document)?);
        self.entries
            .write()
            .insert(document.clone(), Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Saves through to the store and drops any cached entry for `document`.
    ///
    /// # Errors
    /// Propagates [`IndexStore::save`] errors.
    pub fn save(
        &self,
        document: &DocumentId,
        index: &AnyIndex,
        chunks: &[String],
    ) -> Result<Manifest> {
        let manifest = self.store.save(document, index, chunks)?;
        self.invalidate(document);
        Ok(manifest)
    }

    /// Returns `true` if every artifact of `document` exists on disk.
    #[must_use]
    pub fn exists(&self, document: &DocumentId) -> bool {
        self.store.exists(document)
    }

    /// Deletes the artifacts of `document` and its cached entry.
    ///
    /// # Errors
    /// Propagates [`IndexStore::remove`] errors.
    pub fn remove(&self, document: &DocumentId) -> Result<bool> {
        self.invalidate(document);
        self.store.remove(document)
    }

    /// Drops the cached entry of `document`. Returns `true` if one was present.
    pub fn invalidate(&self, document: &DocumentId) -> bool {
        self.entries.write().remove(document).is_some()
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Returns `true` if `document` currently has a cached entry.
    #[must_use]
    pub fn is_cached(&self, document: &DocumentId) -> bool {
        self.entries.read().contains_key(document)
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FlatIndex;
    use crate::store::ModelFingerprint;
    use ndarray::array;
    use std::fs;
    use tempfile::tempdir;

    fn index(offset: f32) -> AnyIndex {
        let mut index = FlatIndex::new(2);
        index
            .add(&array![[offset, 0.0], [0.0, offset]])
            .unwrap();
        index.into()
    }

    fn cached(dir: &std::path::Path) -> CachedStore {
        CachedStore::new(IndexStore::new(dir, ModelFingerprint::new("m", 2)))
    }

    #[test]
    fn repeated_loads_share_entry() {
        let dir = tempdir().unwrap();
        let cache = cached(dir.path());
        let id = DocumentId::new("doc");
        cache
            .save(&id, &index(1.0), &["a".into(), "b".into()])
            .unwrap();

        let first = cache.load(&id).unwrap();
        let second = cache.load(&id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn rebuild_replaces_stale_entry() {
        let dir = tempdir().unwrap();
        let cache = cached(dir.path());
        let id = DocumentId::new("doc");
        cache
            .save(&id, &index(1.0), &["a".into(), "b".into()])
            .unwrap();
        let before = cache.load(&id).unwrap();

        // A second writer bypassing the cache.
        cache
            .store()
            .save(&id, &index(2.0), &["c".into(), "d".into()])
            .unwrap();
        let after = cache.load(&id).unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.chunks, vec!["c".to_string(), "d".to_string()]);
        assert_eq!(before.chunks, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn deleted_artifact_is_not_served_from_cache() {
        let dir = tempdir().unwrap();
        let cache = cached(dir.path());
        let id = DocumentId::new("doc");
        cache
            .save(&id, &index(1.0), &["a".into(), "b".into()])
            .unwrap();
        cache.load(&id).unwrap();
        assert!(cache.is_cached(&id));

        fs::remove_file(cache.store().paths(&id).index).unwrap();

        assert!(cache.load(&id).unwrap_err().is_not_found());
        assert!(!cache.is_cached(&id));
    }

    #[test]
    fn explicit_invalidation() {
        let dir = tempdir().unwrap();
        let cache = cached(dir.path());
        let id = DocumentId::new("doc");
        cache
            .save(&id, &index(1.0), &["a".into(), "b".into()])
            .unwrap();
        cache.load(&id).unwrap();

        assert!(cache.invalidate(&id));
        assert!(!cache.invalidate(&id));
        cache.load(&id).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.remove(&id).unwrap());
        assert!(!cache.exists(&id));
    }
}
