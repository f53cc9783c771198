//! Enrichment and operation caches.
//!
//! Both sit on a [`CacheManager`] with their own namespace, so they can share
//! one backend without seeing each other's entries.

use super::backend::CacheBackend;
use super::key::{request_hash, CacheKey, KeyPrefix};
use super::manager::{CacheConfig, CacheManager, CacheStats};
use crate::types::{EnrichmentRequest, EnrichmentResponse};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const ENRICHMENT_NAMESPACE: &str = "enrichment";
pub const OPERATION_NAMESPACE: &str = "operation";

pub const DEFAULT_ENRICHMENT_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_OPERATION_TTL: Duration = Duration::from_secs(1800);

/// Cache of provider responses keyed by
/// `enrichment:tenant:provider:type:hash(parameters, strategy)`.
pub struct EnrichmentCache {
    manager: CacheManager,
}

impl EnrichmentCache {
    pub fn new(backend: Arc<dyn CacheBackend>, enabled: bool, ttl: Duration) -> Self {
        let config = CacheConfig::new(ENRICHMENT_NAMESPACE)
            .with_enabled(enabled)
            .with_ttl(ttl);
        Self {
            manager: CacheManager::new(config, backend),
        }
    }

    pub fn key(&self, request: &EnrichmentRequest, provider: &str) -> CacheKey {
        self.manager
            .prefix()
            .tenant(request.tenant_id.as_deref())
            .provider(provider)
            .operation(request.enrichment_type.clone())
            .key(&request_hash(&(&request.parameters, request.strategy)))
    }

    pub async fn get(
        &self,
        request: &EnrichmentRequest,
        provider: &str,
    ) -> Option<EnrichmentResponse> {
        if !self.manager.is_enabled() {
            return None;
        }
        self.manager.get(&self.key(request, provider)).await
    }

    /// Store `response` unless it is a failure.
    pub async fn put(
        &self,
        request: &EnrichmentRequest,
        provider: &str,
        response: &EnrichmentResponse,
    ) {
        if !self.manager.is_enabled() || !response.success {
            return;
        }
        self.manager.put(&self.key(request, provider), response).await
    }

    pub async fn evict(&self, request: &EnrichmentRequest, provider: &str) -> bool {
        if !self.manager.is_enabled() {
            return false;
        }
        self.manager.delete(&self.key(request, provider)).await
    }

    pub async fn evict_tenant(&self, tenant: &str) -> usize {
        self.manager
            .evict(&self.manager.prefix().tenant(Some(tenant)))
            .await
    }

    pub async fn evict_provider(&self, tenant: &str, provider: &str) -> usize {
        self.manager
            .evict(&self.manager.prefix().tenant(Some(tenant)).provider(provider))
            .await
    }

    pub async fn clear_all(&self) -> usize {
        self.manager.clear_all().await
    }

    pub fn is_enabled(&self) -> bool {
        self.manager.is_enabled()
    }

    pub fn stats(&self) -> CacheStats {
        self.manager.stats()
    }
}

/// Cache of arbitrary operation results keyed by
/// `operation:tenant:provider:operation:hash(request)`.
pub struct OperationCache {
    manager: CacheManager,
}

impl OperationCache {
    pub fn new(backend: Arc<dyn CacheBackend>, enabled: bool, ttl: Duration) -> Self {
        let config = CacheConfig::new(OPERATION_NAMESPACE)
            .with_enabled(enabled)
            .with_ttl(ttl);
        Self {
            manager: CacheManager::new(config, backend),
        }
    }

    fn scope(&self, tenant: &str, provider: &str, operation: &str) -> KeyPrefix {
        self.manager
            .prefix()
            .tenant(Some(tenant))
            .provider(provider)
            .operation(operation)
    }

    pub fn key<R: Serialize>(
        &self,
        tenant: &str,
        provider: &str,
        operation: &str,
        request: &R,
    ) -> CacheKey {
        self.scope(tenant, provider, operation)
            .key(&request_hash(request))
    }

    pub async fn get<R: Serialize, T: DeserializeOwned>(
        &self,
        tenant: &str,
        provider: &str,
        operation: &str,
        request: &R,
    ) -> Option<T> {
        if !self.manager.is_enabled() {
            return None;
        }
        self.manager
            .get(&self.key(tenant, provider, operation, request))
            .await
    }

    pub async fn put<R: Serialize, T: Serialize>(
        &self,
        tenant: &str,
        provider: &str,
        operation: &str,
        request: &R,
        value: &T,
    ) {
        if !self.manager.is_enabled() {
            return;
        }
        self.manager
            .put(&self.key(tenant, provider, operation, request), value)
            .await
    }

    pub async fn evict_by_tenant(&self, tenant: &str) -> usize {
        self.manager
            .evict(&self.manager.prefix().tenant(Some(tenant)))
            .await
    }

    pub async fn evict_by_provider(&self, tenant: &str, provider: &str) -> usize {
        self.manager
            .evict(&self.manager.prefix().tenant(Some(tenant)).provider(provider))
            .await
    }

    pub async fn evict_by_operation(&self, tenant: &str, provider: &str, operation: &str) -> usize {
        self.manager.evict(&self.scope(tenant, provider, operation)).await
    }

    pub async fn clear_all(&self) -> usize {
        self.manager.clear_all().await
    }

    pub fn is_enabled(&self) -> bool {
        self.manager.is_enabled()
    }

    pub fn stats(&self) -> CacheStats {
        self.manager.stats()
    }
}
