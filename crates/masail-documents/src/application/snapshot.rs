//! Bounded cache of replayed `Document` aggregates.
//!
//! A cached aggregate is only a starting point: the command handler always
//! catches it up with the events after its version before use, so a stale
//! entry costs a longer suffix read, never a wrong decision.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use masail_core::aggregate::AggregateRoot;
use uuid::Uuid;

use crate::domain::aggregates::Document;

#[derive(Debug, Default)]
struct Entries {
    documents: HashMap<Uuid, Document>,
    insertion_order: VecDeque<Uuid>,
}

/// Snapshot cache keyed by aggregate id, evicting the oldest insert once
/// full.
#[derive(Debug)]
pub struct DocumentSnapshotCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl DocumentSnapshotCache {
    /// Creates a cache holding at most `capacity` aggregates. A capacity of
    /// 0 stores nothing.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Returns a copy of the cached aggregate, if any.
    #[must_use]
    pub fn get(&self, document_id: Uuid) -> Option<Document> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.documents.get(&document_id).cloned()
    }

    /// Caches `document` unless it has pending events or is older than the
    /// cached copy.
    pub fn store(&self, document: &Document) {
        if self.capacity == 0 || !document.uncommitted_events().is_empty() {
            return;
        }
        let id = document.aggregate_id();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        match entries.documents.get(&id) {
            Some(cached) if cached.version() > document.version() => return,
            Some(_) => {}
            None => {
                while entries.documents.len() >= self.capacity {
                    let Some(oldest) = entries.insertion_order.pop_front() else {
                        break;
                    };
                    entries.documents.remove(&oldest);
                }
                entries.insertion_order.push_back(id);
            }
        }
        entries.documents.insert(id, document.clone());
    }

    /// Drops the cached aggregate for `document_id`.
    pub fn invalidate(&self, document_id: Uuid) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.documents.remove(&document_id).is_some() {
            entries.insertion_order.retain(|id| *id != document_id);
        }
    }

    /// Number of cached aggregates.
    #[must_use]
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.documents.len()
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document_at(version: i64) -> Document {
        let mut document = Document::new(Uuid::new_v4());
        document.version = version;
        document
    }

    #[test]
    fn test_store_and_get_returns_copy() {
        let cache = DocumentSnapshotCache::new(4);
        let document = document_at(2);

        cache.store(&document);

        assert_eq!(cache.get(document.id), Some(document));
    }

    #[test]
    fn test_older_version_does_not_replace_newer() {
        let cache = DocumentSnapshotCache::new(4);
        let newer = document_at(5);
        let mut older = newer.clone();
        older.version = 3;

        cache.store(&newer);
        cache.store(&older);

        assert_eq!(cache.get(newer.id).unwrap().version(), 5);
    }

    #[test]
    fn test_oldest_entry_is_evicted_at_capacity() {
        let cache = DocumentSnapshotCache::new(2);
        let first = document_at(1);
        let second = document_at(1);
        let third = document_at(1);

        cache.store(&first);
        cache.store(&second);
        cache.store(&third);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(first.id).is_none());
        assert!(cache.get(third.id).is_some());
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let cache = DocumentSnapshotCache::new(2);
        let document = document_at(1);
        cache.store(&document);

        cache.invalidate(document.id);

        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = DocumentSnapshotCache::new(0);

        cache.store(&document_at(1));

        assert!(cache.is_empty());
    }
}
