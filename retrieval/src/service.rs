//! Lazily initialised, shared embedding model handle.
//!
//! Loading a model is expensive, so it happens once behind an explicit
//! [`initialize`](ModelService::initialize) call. Components receive the loaded model through
//! [`get`](ModelService::get) instead of reaching for process-global state.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::error::{Result, RetrievalError};

type Loader<M> = Box<dyn Fn() -> anyhow::Result<M> + Send + Sync>;

/// Owns the single instance of an embedding model.
pub struct ModelService<M> {
    loader: Option<Loader<M>>,
    model: Mutex<Option<Arc<M>>>,
}

impl<M> std::fmt::Debug for ModelService<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelService")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl<M> ModelService<M> {
    /// Creates an uninitialised service that will call `loader` on first
    /// [`initialize`](Self::initialize).
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<M> + Send + Sync + 'static,
    {
        Self {
            loader: Some(Box::new(loader)),
            model: Mutex::new(None),
        }
    }

    /// Creates a service around an already loaded model.
    #[must_use]
    pub fn with_model(model: M) -> Self {
        Self {
            loader: None,
            model: Mutex::new(Some(Arc::new(model))),
        }
    }

    /// Loads the model if needed and returns it. Repeated calls reuse the loaded instance.
    ///
    /// # Errors
    /// Returns [`RetrievalError::ModelInit`] if the loader fails, or
    /// [`RetrievalError::NotReady`] if there is nothing to load.
    pub fn initialize(&self) -> Result<Arc<M>> {
        let mut slot = self.model.lock();
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }
        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| RetrievalError::NotReady("no model loader configured".into()))?;
        let model = Arc::new(loader().map_err(RetrievalError::ModelInit)?);
        info!("embedding model initialized");
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Returns the loaded model.
    ///
    /// # Errors
    /// Returns [`RetrievalError::NotReady`] if [`initialize`](Self::initialize) has not succeeded yet.
    pub fn get(&self) -> Result<Arc<M>> {
        self.model
            .lock()
            .as_ref()
            .cloned()
            .ok_or_else(|| RetrievalError::NotReady("embedding model is not initialized".into()))
    }

    /// Returns `true` once a model is loaded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.model.lock().is_some()
    }
}
