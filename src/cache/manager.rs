//! Cache manager.
//!
//! Fail-open wrapper over a [`CacheBackend`]: backend errors are counted and
//! logged, reads turn into misses and writes or evictions into no-ops.

use super::backend::CacheBackend;
use super::key::{CacheKey, KeyPrefix};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub namespace: String,
    pub default_ttl: Duration,
    pub enabled: bool,
    pub max_entry_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "cache".to_string(),
            default_ttl: Duration::from_secs(3600),
            enabled: true,
            max_entry_size: 10 * 1024 * 1024,
        }
    }
}

impl CacheConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    pub fn with_max_entry_size(mut self, bytes: usize) -> Self {
        self.max_entry_size = bytes;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    evictions: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

pub struct CacheManager {
    config: CacheConfig,
    backend: Arc<dyn CacheBackend>,
    stats: AtomicStats,
}

impl CacheManager {
    pub fn new(config: CacheConfig, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            stats: AtomicStats::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn default_ttl(&self) -> Duration {
        self.config.default_ttl
    }

    /// Root of every key this manager owns.
    pub fn prefix(&self) -> KeyPrefix {
        KeyPrefix::namespace(&self.config.namespace)
    }

    fn record_error(&self, op: &'static str, key: &str, err: &crate::Error) {
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        warn!(
            namespace = %self.config.namespace,
            op,
            key,
            error = %err,
            "cache backend error ignored"
        );
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        if !self.config.enabled {
            return None;
        }
        match self.backend.get(key).await {
            Ok(Some(data)) => match serde_json::from_slice(&data) {
                Ok(val) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "cache hit");
                    Some(val)
                }
                Err(e) => {
                    self.record_error("decode", key.as_str(), &e.into());
                    None
                }
            },
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.record_error("get", key.as_str(), &e);
                None
            }
        }
    }

    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T) {
        self.put_with_ttl(key, value, self.config.default_ttl).await
    }

    pub async fn put_with_ttl<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        if !self.config.enabled {
            return;
        }
        let data = match serde_json::to_vec(value) {
            Ok(data) => data,
            Err(e) => return self.record_error("encode", key.as_str(), &e.into()),
        };
        if data.len() > self.config.max_entry_size {
            debug!(key = %key, bytes = data.len(), "entry too large, not cached");
            return;
        }
        match self.backend.set(key, &data, ttl).await {
            Ok(()) => {
                self.stats.sets.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => self.record_error("set", key.as_str(), &e),
        }
    }

    pub async fn delete(&self, key: &CacheKey) -> bool {
        if !self.config.enabled {
            return false;
        }
        match self.backend.delete(key).await {
            Ok(deleted) => {
                if deleted {
                    self.stats.deletes.fetch_add(1, Ordering::Relaxed);
                }
                deleted
            }
            Err(e) => {
                self.record_error("delete", key.as_str(), &e);
                false
            }
        }
    }

    /// Evict every key under `prefix`. The prefix must lie inside this
    /// manager's namespace; anything else evicts nothing.
    pub async fn evict_by_prefix(&self, prefix: &str) -> usize {
        if !self.config.enabled {
            return 0;
        }
        let root = self.prefix().as_prefix();
        if !prefix.starts_with(&root) {
            warn!(namespace = %self.config.namespace, prefix, "eviction prefix outside namespace ignored");
            return 0;
        }
        match self.backend.evict_by_prefix(prefix).await {
            Ok(n) => {
                self.stats.evictions.fetch_add(n as u64, Ordering::Relaxed);
                debug!(prefix, evicted = n, "evicted cache entries by prefix");
                n
            }
            Err(e) => {
                self.record_error("evict_by_prefix", prefix, &e);
                0
            }
        }
    }

    pub async fn evict(&self, prefix: &KeyPrefix) -> usize {
        self.evict_by_prefix(&prefix.as_prefix()).await
    }

    /// Drop everything in this namespace. Other namespaces sharing the
    /// backend are left alone.
    pub async fn clear_all(&self) -> usize {
        self.evict(&self.prefix()).await
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}
