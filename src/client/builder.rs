use crate::cache::{CacheBackend, EnrichmentCache, MemoryCache, NullCache, OperationCache};
use crate::client::core::EnrichmentClient;
use crate::config::EnrichmentConfig;
use crate::cost::{CostTracker, ProviderPricing};
use crate::events::{noop_sink, EventSink};
use crate::fallback::{FallbackExecutor, FallbackPolicy};
use crate::provider::EnrichmentProvider;
use crate::registry::ProviderRegistry;
use crate::resilience::{ResilienceProfile, ResilienceRegistry};
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Builder for [`EnrichmentClient`].
///
/// Starts from [`EnrichmentConfig::default`]. Explicit `with_*` calls made
/// after [`config`](Self::config) win over the config's values.
pub struct EnrichmentClientBuilder {
    providers: Vec<Arc<dyn EnrichmentProvider>>,
    config: EnrichmentConfig,
    sink: Arc<dyn EventSink>,
    backend: Option<Arc<dyn CacheBackend>>,
    costs: Option<Arc<CostTracker>>,
}

impl Default for EnrichmentClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EnrichmentClientBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            config: EnrichmentConfig::default(),
            sink: noop_sink(),
            backend: None,
            costs: None,
        }
    }

    pub fn provider(mut self, provider: Arc<dyn EnrichmentProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers<I>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn EnrichmentProvider>>,
    {
        self.providers.extend(providers);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: EnrichmentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn fallback(mut self, provider: impl Into<String>, policy: FallbackPolicy) -> Self {
        self.config.fallbacks.insert(provider.into(), policy);
        self
    }

    pub fn resilience(mut self, provider: impl Into<String>, profile: ResilienceProfile) -> Self {
        self.config
            .resilience
            .providers
            .insert(provider.into(), profile);
        self
    }

    pub fn default_resilience(mut self, profile: ResilienceProfile) -> Self {
        self.config.resilience.default = profile;
        self
    }

    pub fn pricing(mut self, pricing: ProviderPricing) -> Self {
        self.config.pricing.push(pricing);
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    pub fn operation_cache_enabled(mut self, enabled: bool) -> Self {
        self.config.operation_cache.enabled = enabled;
        self
    }

    /// Shared store for both cache namespaces. Defaults to an in-memory
    /// cache sized from the config, or [`NullCache`] when both are disabled.
    pub fn cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Share a cost tracker across clients. Configured prices are still
    /// registered into it.
    pub fn cost_tracker(mut self, costs: Arc<CostTracker>) -> Self {
        self.costs = Some(costs);
        self
    }

    pub fn batch_concurrency(mut self, limit: usize) -> Self {
        self.config.batch.concurrency = limit;
        self
    }

    pub fn build(self) -> Result<EnrichmentClient> {
        self.config.validate()?;
        let config = self.config;

        let registry = Arc::new(ProviderRegistry::new(self.providers)?);
        let unknown = config.unknown_providers(registry.names());
        if !unknown.is_empty() {
            warn!(providers = ?unknown, "configuration names providers that are not registered");
        }

        let resilience = Arc::new(ResilienceRegistry::new(
            config.resilience.providers.clone(),
            config.resilience.default.clone(),
        )?);

        let backend = self.backend.unwrap_or_else(|| {
            if config.cache.enabled || config.operation_cache.enabled {
                Arc::new(MemoryCache::new(config.cache.max_entries)) as Arc<dyn CacheBackend>
            } else {
                Arc::new(NullCache::new())
            }
        });
        let enrichment_cache = Arc::new(EnrichmentCache::new(
            backend.clone(),
            config.cache.enabled,
            config.cache.ttl(),
        ));
        let operation_cache = Arc::new(OperationCache::new(
            backend,
            config.operation_cache.enabled,
            config.operation_cache.ttl(),
        ));

        let costs = self.costs.unwrap_or_default();
        for p in &config.pricing {
            costs.register_provider(&p.provider, p.cost_per_call, &p.currency);
        }

        let executor = FallbackExecutor::new(
            registry.clone(),
            resilience.clone(),
            config.fallbacks.clone(),
            self.sink.clone(),
        );

        info!(
            providers = registry.len(),
            fallbacks = config.fallbacks.len(),
            cache = config.cache.enabled,
            operation_cache = config.operation_cache.enabled,
            batch_concurrency = config.batch.concurrency,
            "built enrichment client"
        );

        Ok(EnrichmentClient {
            registry,
            resilience,
            executor,
            enrichment_cache,
            operation_cache,
            costs,
            sink: self.sink,
            batch_concurrency: config.batch.concurrency,
        })
    }
}
