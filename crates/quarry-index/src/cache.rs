use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::document::Source;
use crate::index::VectorIndex;

/// Identity of a processed input set: the ordered source list plus the
/// embedding model that indexed it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn for_sources(sources: &[Source], embedding_model: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(embedding_model.as_bytes());
        for source in sources {
            hasher.update(b"\n");
            hasher.update(source.url().as_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Bounded cache of built indexes. The oldest insertion is evicted first.
#[derive(Debug)]
pub struct IndexCache {
    capacity: usize,
    entries: Mutex<VecDeque<(CacheKey, VectorIndex)>>,
}

impl IndexCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<VectorIndex> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, index)| index.clone())
    }

    /// Insert or replace the index for `key`.
    ///
    /// Returns evicted indexes whose collection no remaining entry shares; the
    /// caller owns dropping their collections.
    pub fn insert(&self, key: CacheKey, index: VectorIndex) -> Vec<VectorIndex> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut removed = Vec::new();

        if let Some(pos) = entries.iter().position(|(k, _)| *k == key)
            && let Some((_, old)) = entries.remove(pos)
        {
            removed.push(old);
        }
        entries.push_back((key, index));
        while entries.len() > self.capacity {
            if let Some((_, old)) = entries.pop_front() {
                removed.push(old);
            }
        }

        removed.retain(|old| {
            !entries
                .iter()
                .any(|(_, live)| live.collection() == old.collection())
        });
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry, returning the indexes for cleanup.
    pub fn clear(&self) -> Vec<VectorIndex> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .map(|(_, index)| index)
            .collect()
    }
}
