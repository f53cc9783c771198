//! 供应商注册表：按类型与租户确定性地选择最佳数据供应商
//!
//! Provider registry. Selection is a pure function of the registered set:
//! matching type, tenant either absent (global) or equal, highest priority,
//! ties broken by ascending name.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::provider::EnrichmentProvider;
use crate::{Error, ErrorContext, Result};

/// Immutable set of providers, built once at startup.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn EnrichmentProvider>>,
    by_name: HashMap<String, usize>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

/// Priority descending, then name ascending.
fn rank(a: &Arc<dyn EnrichmentProvider>, b: &Arc<dyn EnrichmentProvider>) -> Ordering {
    b.priority()
        .cmp(&a.priority())
        .then_with(|| a.name().cmp(b.name()))
}

impl ProviderRegistry {
    /// Register `providers`. A repeated name is a startup error.
    pub fn new(providers: Vec<Arc<dyn EnrichmentProvider>>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(providers.len());
        for (idx, p) in providers.iter().enumerate() {
            if by_name.insert(p.name().to_string(), idx).is_some() {
                return Err(Error::configuration_with_context(
                    format!("duplicate provider name '{}'", p.name()),
                    ErrorContext::new()
                        .with_field_path("providers")
                        .with_source("provider_registry"),
                ));
            }
            info!(
                provider = p.name(),
                enrichment_type = p.enrichment_type(),
                tenant = p.tenant_id().unwrap_or("*"),
                priority = p.priority(),
                "registered provider"
            );
        }
        Ok(Self { providers, by_name })
    }

    /// Candidates for `enrichment_type` visible to `tenant`, best first.
    /// `None` means no tenant filter.
    pub fn candidates(
        &self,
        enrichment_type: &str,
        tenant: Option<&str>,
    ) -> Vec<Arc<dyn EnrichmentProvider>> {
        let mut out: Vec<_> = self
            .providers
            .iter()
            .filter(|p| p.enrichment_type() == enrichment_type)
            .filter(|p| p.descriptor().serves_tenant(tenant))
            .cloned()
            .collect();
        out.sort_by(rank);
        out
    }

    /// Best provider for a type, across every tenant.
    pub fn select_for_type(&self, enrichment_type: &str) -> Option<Arc<dyn EnrichmentProvider>> {
        self.best(enrichment_type, None)
    }

    /// Best provider for a type that is global or owned by `tenant`.
    pub fn select_for_type_and_tenant(
        &self,
        enrichment_type: &str,
        tenant: &str,
    ) -> Option<Arc<dyn EnrichmentProvider>> {
        self.best(enrichment_type, Some(tenant))
    }

    /// Dispatch on an optional tenant.
    pub fn select(
        &self,
        enrichment_type: &str,
        tenant: Option<&str>,
    ) -> Option<Arc<dyn EnrichmentProvider>> {
        self.best(enrichment_type, tenant)
    }

    fn best(&self, enrichment_type: &str, tenant: Option<&str>) -> Option<Arc<dyn EnrichmentProvider>> {
        self.providers
            .iter()
            .filter(|p| p.enrichment_type() == enrichment_type)
            .filter(|p| p.descriptor().serves_tenant(tenant))
            .min_by(|a, b| rank(a, b))
            .cloned()
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<dyn EnrichmentProvider>> {
        self.by_name.get(name).map(|&idx| self.providers[idx].clone())
    }

    /// All providers of a type regardless of tenant, best first.
    pub fn providers_for_type(&self, enrichment_type: &str) -> Vec<Arc<dyn EnrichmentProvider>> {
        self.candidates(enrichment_type, None)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
