//! 类型系统模块：定义数据补全请求、响应与供应商描述等核心数据类型。
//!
//! # Types Module
//!
//! This module defines the data model shared by every layer of the runtime:
//! the request a caller submits, the response a provider returns, and the
//! static descriptor each provider registers with.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`EnrichmentRequest`] | Logical "enrich this record" request |
//! | [`EnrichmentResponse`] | Provider answer, including failure and provenance metadata |
//! | [`EnrichmentStrategy`] | Merge semantics tag carried through untouched |
//! | [`ProviderDescriptor`] | Immutable provider metadata used for selection |
//!
//! ## Example
//!
//! ```rust
//! use enrichment_router::types::{EnrichmentRequest, EnrichmentResponse};
//!
//! let request = EnrichmentRequest::new("company-profile")
//!     .with_tenant("tenant-a")
//!     .with_parameter("companyId", "12345");
//!
//! let response = EnrichmentResponse::success(
//!     "Financial Data Provider",
//!     serde_json::json!({"name": "Acme Corp", "revenue": 1000000}),
//!     2,
//! );
//! assert!(response.success);
//! assert_eq!(request.tenant_id.as_deref(), Some("tenant-a"));
//! ```

pub mod provider;
pub mod request;
pub mod response;

pub use provider::ProviderDescriptor;
pub use request::{EnrichmentRequest, EnrichmentStrategy};
pub use response::EnrichmentResponse;
