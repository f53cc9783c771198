//! 客户端模块：面向上层调用方的组合入口，负责选择、缓存、回退执行与计费。
//!
//! # Client Module
//!
//! [`EnrichmentClient`] ties the pieces together. For each request it
//!
//! 1. picks the best provider for the type and tenant,
//! 2. answers from the enrichment cache when it can,
//! 3. otherwise runs the fallback chain through the resilience stages,
//! 4. records one billable call per provider attempted and caches a
//!    successful answer.
//!
//! Batches and streams fan out with bounded concurrency.

pub mod batch;
pub mod builder;
pub mod core;

pub use batch::{IndexedResult, StreamEvent};
pub use builder::EnrichmentClientBuilder;
pub use core::{EnrichmentClient, EnrichmentOutcome, PreviewResponse};
