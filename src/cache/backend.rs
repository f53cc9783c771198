//! Cache backend implementations.

use super::key::CacheKey;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CacheEntry {
    data: Vec<u8>,
    created_at: Instant,
    ttl: Duration,
    last_accessed: Instant,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            data,
            created_at: now,
            ttl,
            last_accessed: now,
        }
    }
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
    /// Live keys currently held.
    async fn keys(&self) -> Result<Vec<CacheKey>>;
    async fn clear(&self) -> Result<()>;
    async fn len(&self) -> Result<usize>;
    fn name(&self) -> &'static str;

    /// Delete every key starting with `prefix` and return how many went.
    /// Keys outside the prefix are never touched.
    async fn evict_by_prefix(&self, prefix: &str) -> Result<usize> {
        let mut evicted = 0;
        for key in self.keys().await? {
            if key.starts_with(prefix) && self.delete(&key).await? {
                evicted += 1;
            }
        }
        Ok(evicted)
    }
}

fn poisoned() -> Error {
    Error::cache_with_context(
        "memory cache lock poisoned",
        ErrorContext::new().with_source("memory_cache"),
    )
}

pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries,
        }
    }
    fn evict_if_needed(&self, entries: &mut HashMap<String, CacheEntry>) {
        entries.retain(|_, e| !e.is_expired());
        while entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                entries.remove(&k);
            } else {
                break;
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        if let Some(entry) = entries.get_mut(key.as_str()) {
            if entry.is_expired() {
                entries.remove(key.as_str());
                return Ok(None);
            }
            entry.last_accessed = Instant::now();
            return Ok(Some(entry.data.clone()));
        }
        Ok(None)
    }
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        if !entries.contains_key(key.as_str()) {
            self.evict_if_needed(&mut entries);
        }
        entries.insert(key.key.clone(), CacheEntry::new(value.to_vec(), ttl));
        Ok(())
    }
    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        Ok(entries.remove(key.as_str()).is_some())
    }
    async fn keys(&self) -> Result<Vec<CacheKey>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries
            .iter()
            .filter(|(_, e)| !e.is_expired())
            .map(|(k, _)| CacheKey::new(k.clone()))
            .collect())
    }
    async fn evict_by_prefix(&self, prefix: &str) -> Result<usize> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok(before - entries.len())
    }
    async fn clear(&self) -> Result<()> {
        self.entries.write().map_err(|_| poisoned())?.clear();
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(self
            .entries
            .read()
            .map_err(|_| poisoned())?
            .values()
            .filter(|e| !e.is_expired())
            .count())
    }
    fn name(&self) -> &'static str {
        "memory"
    }
}

pub struct NullCache;
impl NullCache {
    pub fn new() -> Self {
        Self
    }
}
impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
    async fn set(&self, _: &CacheKey, _: &[u8], _: Duration) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn keys(&self) -> Result<Vec<CacheKey>> {
        Ok(Vec::new())
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_expires_entries() {
        let cache = MemoryCache::new(10);
        let key = CacheKey::new("enrichment:global:acme:x");
        cache.set(&key, b"v", Duration::from_millis(10)).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"v".to_vec()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert_eq!(cache.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_cache_bounds_entries() {
        let cache = MemoryCache::new(2);
        let ttl = Duration::from_secs(60);
        for k in ["a", "b", "c"] {
            cache.set(&CacheKey::new(k), b"v", ttl).await.unwrap();
        }
        assert_eq!(cache.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_prefix_eviction_counts_only_matches() {
        let cache = MemoryCache::new(10);
        let ttl = Duration::from_secs(60);
        for k in ["ns:a:1", "ns:a:2", "ns:b:1", "other:a:1"] {
            cache.set(&CacheKey::new(k), b"v", ttl).await.unwrap();
        }
        assert_eq!(cache.evict_by_prefix("ns:a:").await.unwrap(), 2);
        let mut left: Vec<String> = cache.keys().await.unwrap().into_iter().map(|k| k.key).collect();
        left.sort();
        assert_eq!(left, vec!["ns:b:1", "other:a:1"]);
    }
}
