//! Single-process caches with wall-clock expiry checked on read.
//!
//! Nothing is evicted except by age; `purge_expired` exists for a periodic
//! sweep but correctness never depends on it.

use crate::db::GmaoStorage;
use crate::error::GmaoError;
use crate::types::extraction::DocumentMetadata;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let fresh = entries
            .get(key)
            .map(|e| now.saturating_duration_since(e.inserted_at) < self.ttl)?;
        if fresh {
            entries.get(key).map(|e| e.value.clone())
        } else {
            entries.remove(key);
            None
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    fn insert_at(&self, key: K, value: V, inserted_at: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.insert(key, Entry { value, inserted_at });
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.remove(key).map(|e| e.value)
    }

    /// Entry count, expired entries included until they are read or purged.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.inserted_at) < self.ttl);
        before - entries.len()
    }
}

/// SHA-256 of document bytes, lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Extracted metadata keyed by document hash: memory first, then the
/// `metadata_cache` table. Database hits are promoted into memory.
pub struct DocumentHashCache {
    memory: TtlCache<String, DocumentMetadata>,
}

impl DocumentHashCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            memory: TtlCache::new(ttl),
        }
    }

    pub async fn get(
        &self,
        storage: &GmaoStorage,
        hash: &str,
    ) -> Result<Option<DocumentMetadata>, GmaoError> {
        if let Some(hit) = self.memory.get(&hash.to_string()) {
            debug!(hash, "metadata cache hit (memory)");
            return Ok(Some(hit));
        }
        let stored = storage.get_cached_metadata(hash).await?;
        if let Some(meta) = stored.as_ref() {
            debug!(hash, "metadata cache hit (database)");
            self.memory.insert(hash.to_string(), meta.clone());
        }
        Ok(stored)
    }

    pub async fn put(
        &self,
        storage: &GmaoStorage,
        hash: &str,
        metadata: &DocumentMetadata,
    ) -> Result<(), GmaoError> {
        storage.put_cached_metadata(hash, metadata).await?;
        self.memory.insert(hash.to_string(), metadata.clone());
        Ok(())
    }

    pub fn memory(&self) -> &TtlCache<String, DocumentMetadata> {
        &self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_on_read() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let start = Instant::now();
        cache.insert_at("k", 1, start);
        assert_eq!(cache.get_at(&"k", start + Duration::from_secs(59)), Some(1));
        assert_eq!(cache.get_at(&"k", start + Duration::from_secs(60)), None);
        assert!(cache.is_empty(), "expired entry is removed when read");
    }

    #[test]
    fn insert_refreshes_age() {
        let cache = TtlCache::new(Duration::from_secs(10));
        let start = Instant::now();
        cache.insert_at("k", "old", start);
        cache.insert_at("k", "new", start + Duration::from_secs(8));
        assert_eq!(
            cache.get_at(&"k", start + Duration::from_secs(15)),
            Some("new")
        );
    }

    #[test]
    fn purge_drops_only_expired() {
        let cache = TtlCache::new(Duration::from_millis(50));
        cache.insert_at("old", 1, Instant::now() - Duration::from_secs(1));
        cache.insert("fresh", 2);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.remove(&"fresh"), Some(2));
    }

    #[test]
    fn content_hash_is_hex_sha256() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn database_hits_are_promoted_to_memory() {
        let storage = GmaoStorage::connect("sqlite::memory:").await.unwrap();
        let meta = DocumentMetadata {
            title: Some("GA37".into()),
            ..Default::default()
        };
        storage.put_cached_metadata("h1", &meta).await.unwrap();

        let cache = DocumentHashCache::new(Duration::from_secs(60));
        assert!(cache.memory().is_empty());
        assert_eq!(cache.get(&storage, "h1").await.unwrap(), Some(meta));
        assert_eq!(cache.memory().len(), 1);
        assert_eq!(cache.get(&storage, "h2").await.unwrap(), None);
    }
}
