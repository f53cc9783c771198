use super::policy::{should_fallback, FallbackPolicy};
use crate::events::{emit, timestamp, EnrichmentEvent, EventSink, ExhaustionReason};
use crate::provider::EnrichmentProvider;
use crate::registry::ProviderRegistry;
use crate::resilience::{operation, ResilienceRegistry};
use crate::types::response::{ERROR_CODE, FALLBACK_DEPTH, FALLBACK_FROM};
use crate::types::{EnrichmentRequest, EnrichmentResponse};
use async_recursion::async_recursion;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a fallback traversal.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub response: EnrichmentResponse,
    /// Every provider actually invoked, in call order.
    pub attempted: Vec<String>,
}

impl FallbackOutcome {
    pub fn hops(&self) -> usize {
        self.attempted.len().saturating_sub(1)
    }
}

/// Per-traversal state carried through the recursion.
struct Chain {
    /// Hop budget fixed by the primary's policy.
    limit: u32,
    visited: HashSet<String>,
    attempted: Vec<String>,
}

/// Calls a primary provider through its resilience stages and walks the
/// declared fallback chain when the answer is unsatisfactory.
///
/// Never fails: every error becomes a failure response, and an exhausted
/// chain returns the last response observed.
pub struct FallbackExecutor {
    registry: Arc<ProviderRegistry>,
    resilience: Arc<ResilienceRegistry>,
    policies: HashMap<String, FallbackPolicy>,
    sink: Arc<dyn EventSink>,
}

impl FallbackExecutor {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        resilience: Arc<ResilienceRegistry>,
        policies: HashMap<String, FallbackPolicy>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            registry,
            resilience,
            policies,
            sink,
        }
    }

    pub fn policy(&self, provider: &str) -> Option<&FallbackPolicy> {
        self.policies.get(provider)
    }

    pub fn should_fallback(&self, provider: &str, response: &EnrichmentResponse) -> bool {
        should_fallback(self.policy(provider), response)
    }

    pub async fn enrich_with_fallback(
        &self,
        primary: Arc<dyn EnrichmentProvider>,
        request: &EnrichmentRequest,
    ) -> EnrichmentResponse {
        self.execute(primary, request).await.response
    }

    /// Like [`enrich_with_fallback`](Self::enrich_with_fallback), also
    /// reporting which providers were called.
    pub async fn execute(
        &self,
        primary: Arc<dyn EnrichmentProvider>,
        request: &EnrichmentRequest,
    ) -> FallbackOutcome {
        let mut chain = Chain {
            limit: self.policy(primary.name()).map_or(0, |p| p.max_fallbacks),
            visited: HashSet::from([primary.name().to_string()]),
            attempted: vec![primary.name().to_string()],
        };
        let response = self.invoke(&primary, request).await;
        let response = self.traverse(primary, response, request, 0, &mut chain).await;
        FallbackOutcome {
            response,
            attempted: chain.attempted,
        }
    }

    #[async_recursion]
    async fn traverse(
        &self,
        current: Arc<dyn EnrichmentProvider>,
        response: EnrichmentResponse,
        request: &EnrichmentRequest,
        depth: u32,
        chain: &mut Chain,
    ) -> EnrichmentResponse {
        let Some(policy) = self.policy(current.name()) else {
            return response;
        };
        if !policy.strategy.triggers(&response) {
            return response;
        }
        if depth >= chain.limit.min(policy.max_fallbacks) {
            debug!(provider = current.name(), depth, "fallback budget spent");
            self.exhausted(request, current.name(), depth, ExhaustionReason::BudgetSpent)
                .await;
            return response;
        }

        let target = policy.fallback_to.as_str();
        if chain.visited.contains(target) {
            warn!(
                provider = current.name(),
                fallback = target,
                "fallback provider already tried in this chain"
            );
            self.exhausted(request, current.name(), depth, ExhaustionReason::Cycle)
                .await;
            return response;
        }
        let Some(next) = self.registry.by_name(target) else {
            warn!(
                provider = current.name(),
                fallback = target,
                "fallback provider not found in registry"
            );
            self.exhausted(request, current.name(), depth, ExhaustionReason::ProviderNotFound)
                .await;
            return response;
        };

        let hop = depth + 1;
        info!(
            from = current.name(),
            to = target,
            depth = hop,
            request_id = %request.request_id,
            "falling back"
        );
        emit(
            self.sink.as_ref(),
            EnrichmentEvent::FallbackTriggered {
                request_id: request.request_id.clone(),
                from: current.name().to_string(),
                to: target.to_string(),
                depth: hop,
                timestamp: timestamp(),
            },
        )
        .await;
        chain.visited.insert(target.to_string());
        chain.attempted.push(target.to_string());

        let next_response = self
            .invoke(&next, request)
            .await
            .with_metadata(FALLBACK_FROM, current.name())
            .with_metadata(FALLBACK_DEPTH, hop.to_string());
        self.traverse(next, next_response, request, hop, chain).await
    }

    async fn exhausted(
        &self,
        request: &EnrichmentRequest,
        last_provider: &str,
        depth: u32,
        reason: ExhaustionReason,
    ) {
        emit(
            self.sink.as_ref(),
            EnrichmentEvent::FallbackExhausted {
                request_id: request.request_id.clone(),
                last_provider: last_provider.to_string(),
                depth,
                reason,
                timestamp: timestamp(),
            },
        )
        .await;
    }

    /// One decorated provider call. Errors come back as failure responses
    /// tagged with their failure code.
    pub async fn invoke(
        &self,
        provider: &Arc<dyn EnrichmentProvider>,
        request: &EnrichmentRequest,
    ) -> EnrichmentResponse {
        let name = provider.name().to_string();
        let shared = provider.clone();
        let shared_request = Arc::new(request.clone());
        let op = operation(move || {
            let provider = shared.clone();
            let request = shared_request.clone();
            async move { provider.enrich(&request).await }
        });
        let decorated = self
            .resilience
            .decorate_with_timeout(&name, op, request.timeout_override);
        self.finish(&name, request, decorated().await).await
    }

    async fn finish(
        &self,
        name: &str,
        request: &EnrichmentRequest,
        result: crate::Result<EnrichmentResponse>,
    ) -> EnrichmentResponse {
        match result {
            Ok(mut response) => {
                if response.provider_name.is_empty() {
                    response.provider_name = name.to_string();
                }
                response
            }
            Err(err) => {
                let code = err.failure_code();
                if err.rejection().is_some() {
                    emit(
                        self.sink.as_ref(),
                        EnrichmentEvent::CallRejected {
                            request_id: request.request_id.clone(),
                            provider: name.to_string(),
                            code,
                            timestamp: timestamp(),
                        },
                    )
                    .await;
                }
                warn!(provider = name, code = code.code(), error = %err, "provider call failed");
                EnrichmentResponse::failure(name, err.to_string())
                    .with_type(request.enrichment_type.clone())
                    .with_request_id(request.request_id.clone())
                    .with_metadata(ERROR_CODE, code.code())
            }
        }
    }
}
