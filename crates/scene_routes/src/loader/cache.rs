//! Weak-reference cache for loaded content.
//!
//! Entries do not keep content alive: once every node holding a piece of content lets go of
//! it, the entry goes dead and [`ContentCache::get`] returns `None`. Readers must always
//! handle a miss, even right after an insert from another thread.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::loader::content::Content;

/// URL-keyed cache of shared content, safe to use from loader threads.
#[derive(Debug, Default)]
pub struct ContentCache {
    entries: Mutex<HashMap<String, Weak<Content>>>,
}

impl ContentCache {
    /// Creates a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Weak<Content>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Live content for `url`. Dead entries found on the way are dropped.
    pub fn get(&self, url: &str) -> Option<Arc<Content>> {
        let mut entries = self.lock();
        let hit = entries.get(url)?.upgrade();
        if hit.is_none() {
            entries.remove(url);
        }
        hit
    }

    pub fn insert(&self, url: impl Into<String>, content: &Arc<Content>) {
        self.lock().insert(url.into(), Arc::downgrade(content));
    }

    pub fn remove(&self, url: &str) -> bool {
        self.lock().remove(url).is_some()
    }

    /// Drops dead entries, returning how many were removed.
    pub fn purge(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, weak| weak.strong_count() > 0);
        before - entries.len()
    }

    /// Number of entries, dead ones included until the next [`Self::purge`].
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
