//! Storage collaborator contract and an in-process implementation.
//!
//! Production deployments plug in their own backend; `MemoryStore` serves the
//! binary's default wiring and the test-suite.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::ResponseCache;
use crate::error::StorageError;

/// Outcome of a bulk upsert. Partial success is normal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

/// Key/value store with TTL cache semantics and collection-scoped records.
#[async_trait]
pub trait Storage: ResponseCache {
    async fn bulk_upsert(
        &self,
        collection: &str,
        items: Vec<(String, Value)>,
    ) -> Result<BulkOutcome, StorageError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StorageError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    /// `None` when the TTL runs past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now <= at)
    }
}

/// In-memory storage. Cache entries are evicted lazily on lookup or via
/// [`purge_expired`](MemoryStore::purge_expired).
#[derive(Debug, Default)]
pub struct MemoryStore {
    cache: Mutex<HashMap<String, CacheEntry>>,
    collections: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired cache entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        let before = cache.len();
        cache.retain(|_, e| e.is_fresh(now));
        before - cache.len()
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn collection_len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(collection)
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl ResponseCache for MemoryStore {
    async fn get_cached(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        match cache.get(key) {
            Some(entry) if entry.is_fresh(now) => Some(entry.value.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set_cached(&self, key: &str, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.cache
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), entry);
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn bulk_upsert(
        &self,
        collection: &str,
        items: Vec<(String, Value)>,
    ) -> Result<BulkOutcome, StorageError> {
        let mut collections = self.collections.lock().unwrap_or_else(|p| p.into_inner());
        let records = collections.entry(collection.to_string()).or_default();
        let mut outcome = BulkOutcome::default();
        for (id, value) in items {
            if id.is_empty() {
                outcome.failed += 1;
                continue;
            }
            records.insert(id, value);
            outcome.succeeded += 1;
        }
        Ok(outcome)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StorageError> {
        let collections = self.collections.lock().unwrap_or_else(|p| p.into_inner());
        Ok(collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }
}
