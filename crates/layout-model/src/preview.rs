//! Revocable preview handles.
//!
//! A [`PreviewStore`] plays the role of an object-URL registry: it maps
//! opaque [`PreviewUrl`]s to source bytes. A [`PreviewHandle`] owns exactly
//! one registration and revokes it when dropped, so whatever drops a batch
//! (replacement, failure, shutdown) also releases its previews.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::source::SourceFile;

/// Opaque descriptor for registered image bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviewUrl(String);

impl PreviewUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    next_id: u64,
    entries: HashMap<PreviewUrl, Arc<[u8]>>,
}

/// Shared registry of live previews. Clones refer to the same registry.
#[derive(Debug, Clone, Default)]
pub struct PreviewStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // The map is always left consistent, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a source's bytes and return the owning handle.
    pub fn create(&self, source: &SourceFile) -> PreviewHandle {
        let url = {
            let mut inner = self.lock();
            inner.next_id += 1;
            let url = PreviewUrl(format!("preview:{}", inner.next_id));
            inner.entries.insert(url.clone(), source.bytes().clone());
            url
        };
        PreviewHandle {
            url,
            store: self.clone(),
        }
    }

    /// Bytes behind a URL, or `None` once the handle has been released.
    pub fn fetch(&self, url: &PreviewUrl) -> Option<Arc<[u8]>> {
        self.lock().entries.get(url).cloned()
    }

    pub fn is_live(&self, url: &PreviewUrl) -> bool {
        self.lock().entries.contains_key(url)
    }

    /// Number of previews not yet released.
    pub fn live_count(&self) -> usize {
        self.lock().entries.len()
    }

    fn revoke(&self, url: &PreviewUrl) {
        self.lock().entries.remove(url);
    }
}

/// Owned registration in a [`PreviewStore`]. Revoked on drop.
#[derive(Debug)]
pub struct PreviewHandle {
    url: PreviewUrl,
    store: PreviewStore,
}

impl PreviewHandle {
    pub fn url(&self) -> &PreviewUrl {
        &self.url
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.store.revoke(&self.url);
    }
}
