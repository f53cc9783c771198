//! # enrichment-router
//!
//! 数据增强路由核心：在多个可互换的外部数据供应商之间选择、回退并隔离故障。
//!
//! Routing core for data enrichment. A logical "enrich this record" request is
//! routed to one of several interchangeable external-data providers; failed or
//! empty answers are handed down declarative fallback chains; and every
//! provider runs behind its own operational limits so one unhealthy source
//! cannot degrade the others.
//!
//! ## Core Guarantees
//!
//! - **Deterministic selection**: highest priority wins, ties go to the
//!   lexicographically smallest name.
//! - **Bounded failover**: a chain never takes more hops than the primary's
//!   `max_fallbacks` and never calls a provider twice.
//! - **Per-provider isolation**: bulkhead, rate limiter, circuit breaker,
//!   retry and timeout are built once per provider and applied in that order.
//! - **Scoped mutation**: cache eviction stays inside its prefix; cost
//!   counters only grow.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use enrichment_router::provider::FnProvider;
//! use enrichment_router::{EnrichmentClient, EnrichmentRequest, EnrichmentResponse, ProviderDescriptor};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> enrichment_router::Result<()> {
//!     let bureau = FnProvider::new(
//!         ProviderDescriptor::new("credit-bureau", "credit-report").with_priority(10),
//!         |req: EnrichmentRequest| async move {
//!             Ok::<_, enrichment_router::Error>(EnrichmentResponse::success("credit-bureau", serde_json::json!({"score": 720}), 1)
//!                 .with_request_id(req.request_id))
//!         },
//!     );
//!
//!     let client = EnrichmentClient::builder()
//!         .provider(Arc::new(bureau))
//!         .build()?;
//!
//!     let outcome = client
//!         .enrich(EnrichmentRequest::new("credit-report").with_tenant("acme"))
//!         .await?;
//!     println!("{} answered: {}", outcome.answered_by(), outcome.response.enriched_data);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Provider descriptors, requests and responses |
//! | [`provider`] | The `EnrichmentProvider` trait |
//! | [`registry`] | Best-match provider selection |
//! | [`resilience`] | Bulkhead, rate limiter, circuit breaker, retry, timeout |
//! | [`fallback`] | Bounded fallback chains |
//! | [`cache`] | Namespaced caches with prefix eviction |
//! | [`cost`] | Per-provider call counting and pricing |
//! | [`events`] | Routing events and sinks |
//! | [`config`] | YAML configuration |
//! | [`client`] | The composition root |

pub mod cache;
pub mod client;
pub mod config;
pub mod cost;
pub mod error_code;
pub mod events;
pub mod fallback;
pub mod provider;
pub mod registry;
pub mod resilience;
pub mod types;

// Re-export main types for convenience
pub use client::{
    EnrichmentClient, EnrichmentClientBuilder, EnrichmentOutcome, IndexedResult, PreviewResponse,
    StreamEvent,
};
pub use config::EnrichmentConfig;
pub use events::{EnrichmentEvent, EventSink};
pub use fallback::{FallbackPolicy, FallbackStrategy};
pub use provider::EnrichmentProvider;
pub use resilience::ResilienceProfile;
pub use types::{EnrichmentRequest, EnrichmentResponse, EnrichmentStrategy, ProviderDescriptor};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A pinned, boxed, sendable stream.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
pub use error_code::FailureCode;
