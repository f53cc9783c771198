use crate::cache::{EnrichmentCache, OperationCache};
use crate::cost::{CostReport, CostTracker};
use crate::events::{emit, timestamp, EnrichmentEvent, EventSink};
use crate::fallback::{FallbackExecutor, FallbackPolicy};
use crate::provider::EnrichmentProvider;
use crate::registry::ProviderRegistry;
use crate::resilience::{ResilienceRegistry, ResilienceSnapshot};
use crate::types::{EnrichmentRequest, EnrichmentResponse};
use crate::{Error, ErrorContext, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Routing client: selects a provider, consults the cache, runs the
/// fallback chain and keeps the books.
pub struct EnrichmentClient {
    pub(crate) registry: Arc<ProviderRegistry>,
    pub(crate) resilience: Arc<ResilienceRegistry>,
    pub(crate) executor: FallbackExecutor,
    pub(crate) enrichment_cache: Arc<EnrichmentCache>,
    pub(crate) operation_cache: Arc<OperationCache>,
    pub(crate) costs: Arc<CostTracker>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) batch_concurrency: usize,
}

/// What one `enrich` call produced.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentOutcome {
    /// Provider chosen by the registry.
    pub provider: String,
    pub priority: i32,
    pub response: EnrichmentResponse,
    /// true when the response was served from the enrichment cache.
    pub cached: bool,
    /// Providers actually called, primary first. Empty on a cache hit.
    pub attempted: Vec<String>,
}

impl EnrichmentOutcome {
    /// Provider whose answer is in `response`. Differs from `provider`
    /// after a fallback.
    pub fn answered_by(&self) -> &str {
        if self.response.provider_name.is_empty() {
            &self.provider
        } else {
            &self.response.provider_name
        }
    }

    pub fn fell_back(&self) -> bool {
        self.response.fallback_depth().is_some()
    }
}

/// Which provider would serve a request, without calling it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewResponse {
    pub provider: String,
    pub enrichment_type: String,
    pub version: String,
    pub priority: i32,
    /// Whether the enrichment cache is active.
    pub cached: bool,
    pub tenant_id: Option<String>,
    pub auto_selected: bool,
    pub description: String,
    pub tags: Vec<String>,
}

impl EnrichmentClient {
    pub fn builder() -> crate::client::EnrichmentClientBuilder {
        crate::client::EnrichmentClientBuilder::new()
    }

    fn select(
        &self,
        enrichment_type: &str,
        tenant_id: Option<&str>,
    ) -> Result<Arc<dyn EnrichmentProvider>> {
        self.registry
            .select(enrichment_type, tenant_id)
            .ok_or_else(|| Error::NotFound {
                enrichment_type: enrichment_type.to_string(),
                tenant_id: tenant_id.map(str::to_string),
            })
    }

    fn validate(request: &EnrichmentRequest) -> Result<()> {
        if request.enrichment_type.trim().is_empty() {
            return Err(Error::validation_with_context(
                "enrichment type must not be empty",
                ErrorContext::new()
                    .with_field_path("type")
                    .with_details(format!("request_id={}", request.request_id)),
            ));
        }
        Ok(())
    }

    /// Route one request.
    ///
    /// Fails only when the request is invalid or no provider serves its type
    /// and tenant. Provider failures come back inside the outcome's response.
    pub async fn enrich(&self, request: EnrichmentRequest) -> Result<EnrichmentOutcome> {
        Self::validate(&request)?;
        let primary = self.select(&request.enrichment_type, request.tenant_id.as_deref())?;
        let provider = primary.name().to_string();
        let priority = primary.priority();

        info!(
            provider = %provider,
            priority,
            enrichment_type = %request.enrichment_type,
            tenant_id = request.tenant_id.as_deref().unwrap_or("-"),
            request_id = %request.request_id,
            "selected provider"
        );
        emit(
            self.sink.as_ref(),
            EnrichmentEvent::ProviderSelected {
                request_id: request.request_id.clone(),
                provider: provider.clone(),
                enrichment_type: request.enrichment_type.clone(),
                tenant_id: request.tenant_id.clone(),
                priority,
                timestamp: timestamp(),
            },
        )
        .await;

        if let Some(hit) = self.enrichment_cache.get(&request, &provider).await {
            debug!(provider = %provider, request_id = %request.request_id, "enrichment cache hit");
            emit(
                self.sink.as_ref(),
                EnrichmentEvent::CacheHit {
                    request_id: request.request_id.clone(),
                    provider: provider.clone(),
                    timestamp: timestamp(),
                },
            )
            .await;
            return Ok(EnrichmentOutcome {
                provider,
                priority,
                response: hit.with_request_id(request.request_id.clone()),
                cached: true,
                attempted: Vec::new(),
            });
        }

        let outcome = self.executor.execute(primary, &request).await;
        for name in &outcome.attempted {
            self.costs.record_call(name);
        }

        let response = outcome.response;
        let answered_by = if response.provider_name.is_empty() {
            provider.as_str()
        } else {
            response.provider_name.as_str()
        };
        self.enrichment_cache.put(&request, answered_by, &response).await;

        Ok(EnrichmentOutcome {
            provider,
            priority,
            response,
            cached: false,
            attempted: outcome.attempted,
        })
    }

    /// Show which provider `enrich` would pick.
    pub fn preview(&self, enrichment_type: &str, tenant_id: Option<&str>) -> Result<PreviewResponse> {
        let provider = self.select(enrichment_type, tenant_id)?;
        let descriptor = provider.descriptor();
        Ok(PreviewResponse {
            provider: descriptor.name.clone(),
            enrichment_type: enrichment_type.to_string(),
            version: descriptor.version.clone(),
            priority: descriptor.priority,
            cached: self.enrichment_cache.is_enabled(),
            tenant_id: tenant_id.map(str::to_string),
            auto_selected: true,
            description: descriptor.description.clone(),
            tags: descriptor.tags.clone(),
        })
    }

    pub fn cost_report(&self) -> CostReport {
        self.costs.report()
    }

    pub fn cost_tracker(&self) -> &Arc<CostTracker> {
        &self.costs
    }

    pub async fn resilience_snapshot(&self, provider: &str) -> ResilienceSnapshot {
        self.resilience.snapshot(provider).await
    }

    pub fn enrichment_cache(&self) -> &Arc<EnrichmentCache> {
        &self.enrichment_cache
    }

    pub fn operation_cache(&self) -> &Arc<OperationCache> {
        &self.operation_cache
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn fallback_policy(&self, provider: &str) -> Option<&FallbackPolicy> {
        self.executor.policy(provider)
    }

    pub fn batch_concurrency(&self) -> usize {
        self.batch_concurrency
    }
}
