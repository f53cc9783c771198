//! 响应缓存模块：按租户与供应商划分命名空间的补全结果缓存。
//!
//! # Caching Module
//!
//! Caches provider responses and operation results under namespaced,
//! prefix-structured keys so that a tenant's or a provider's entries can be
//! dropped without clearing anything else.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheBackend`] | Trait for storage backends, with prefix eviction |
//! | [`MemoryCache`] | In-memory TTL cache |
//! | [`NullCache`] | No-op backend |
//! | [`CacheManager`] | Namespaced, fail-open cache with statistics |
//! | [`EnrichmentCache`] | Provider responses, keyed per request |
//! | [`OperationCache`] | Arbitrary operation results |
//! | [`KeyPrefix`] | Builder for `namespace:tenant:provider:operation:` |
//!
//! ## Example
//!
//! ```rust
//! use enrichment_router::cache::{EnrichmentCache, MemoryCache};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache = EnrichmentCache::new(Arc::new(MemoryCache::new(1000)), true, Duration::from_secs(3600));
//! // drop every entry of one tenant
//! let evicted = cache.evict_tenant("tenant-a").await;
//! assert_eq!(evicted, 0);
//! # }
//! ```

mod backend;
mod key;
mod manager;
mod services;

pub use backend::{CacheBackend, MemoryCache, NullCache};
pub use key::{escape_segment, request_hash, CacheKey, KeyPrefix, GLOBAL_TENANT};
pub use manager::{CacheConfig, CacheManager, CacheStats};
pub use services::{
    EnrichmentCache, OperationCache, DEFAULT_ENRICHMENT_TTL, DEFAULT_OPERATION_TTL,
    ENRICHMENT_NAMESPACE, OPERATION_NAMESPACE,
};
