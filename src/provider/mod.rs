//! 数据供应商抽象：所有外部数据源实现的统一接口。
//!
//! # Provider Module
//!
//! An [`EnrichmentProvider`] wraps one external data source. The routing core
//! only sees its [`ProviderDescriptor`] and its `enrich` call.

use crate::types::{EnrichmentRequest, EnrichmentResponse, ProviderDescriptor};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Call the data source. A returned `Err` and an `Ok` response with
    /// `success == false` are both treated as a failed hop.
    async fn enrich(&self, request: &EnrichmentRequest) -> Result<EnrichmentResponse>;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    fn enrichment_type(&self) -> &str {
        &self.descriptor().enrichment_type
    }

    fn priority(&self) -> i32 {
        self.descriptor().priority
    }

    fn tenant_id(&self) -> Option<&str> {
        self.descriptor().tenant_id.as_deref()
    }
}

/// Provider backed by an async closure. Handy for tests and for adapting
/// existing clients without a dedicated type.
pub struct FnProvider<F> {
    descriptor: ProviderDescriptor,
    handler: F,
}

impl<F, Fut> FnProvider<F>
where
    F: Fn(EnrichmentRequest) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<EnrichmentResponse>> + Send + 'static,
{
    pub fn new(descriptor: ProviderDescriptor, handler: F) -> Self {
        Self {
            descriptor,
            handler,
        }
    }
}

#[async_trait]
impl<F, Fut> EnrichmentProvider for FnProvider<F>
where
    F: Fn(EnrichmentRequest) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<EnrichmentResponse>> + Send + 'static,
{
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<EnrichmentResponse> {
        (self.handler)(request.clone()).await
    }
}
