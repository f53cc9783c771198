//! Scripted providers shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use enrichment_router::provider::EnrichmentProvider;
use enrichment_router::{EnrichmentRequest, EnrichmentResponse, Error, ProviderDescriptor, Result};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Script = Box<dyn Fn(usize, &EnrichmentRequest) -> Result<EnrichmentResponse> + Send + Sync>;

/// Provider whose answer is computed from the 0-based call number.
pub struct ScriptedProvider {
    descriptor: ProviderDescriptor,
    calls: AtomicUsize,
    delay: Option<Duration>,
    script: Script,
}

impl ScriptedProvider {
    pub fn new<F>(descriptor: ProviderDescriptor, script: F) -> Self
    where
        F: Fn(usize, &EnrichmentRequest) -> Result<EnrichmentResponse> + Send + Sync + 'static,
    {
        Self {
            descriptor,
            calls: AtomicUsize::new(0),
            delay: None,
            script: Box::new(script),
        }
    }

    /// Succeeds with `fields` enriched fields.
    pub fn ok(name: &str, enrichment_type: &str, fields: u32) -> Self {
        let owned = name.to_string();
        Self::new(ProviderDescriptor::new(name, enrichment_type), move |n, req| {
            Ok(EnrichmentResponse::success(
                owned.clone(),
                json!({ "source": owned, "call": n, "params": req.parameters }),
                fields,
            ))
        })
    }

    /// Succeeds with nothing enriched.
    pub fn empty(name: &str, enrichment_type: &str) -> Self {
        let owned = name.to_string();
        Self::new(ProviderDescriptor::new(name, enrichment_type), move |_, _| {
            Ok(EnrichmentResponse::empty(owned.clone()))
        })
    }

    /// Always raises a provider error.
    pub fn failing(name: &str, enrichment_type: &str) -> Self {
        let owned = name.to_string();
        Self::new(ProviderDescriptor::new(name, enrichment_type), move |n, _| {
            Err(Error::provider(owned.clone(), format!("upstream down (call {n})")))
        })
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.descriptor = self.descriptor.with_priority(priority);
        self
    }

    pub fn with_tenant(mut self, tenant: &str) -> Self {
        self.descriptor = self.descriptor.with_tenant(tenant);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnrichmentProvider for ScriptedProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<EnrichmentResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.script)(n, request)
    }
}

pub fn dyn_provider(p: &Arc<ScriptedProvider>) -> Arc<dyn EnrichmentProvider> {
    p.clone()
}
