//! 回退执行模块：当主供应商失败或返回空结果时，按声明的回退链依次尝试。
//!
//! # Fallback Module
//!
//! A provider may declare a [`FallbackPolicy`] naming the provider to try when
//! its answer fails, is empty, or either. The [`FallbackExecutor`] calls the
//! primary through its resilience stages and follows the chain hop by hop.
//!
//! ## Guarantees
//!
//! - The number of hops never exceeds the primary's `max_fallbacks`; a later
//!   provider's policy may lower it but never raise it.
//! - A provider is called at most once per chain.
//! - A response that came from a fallback hop carries `fallbackFrom` and
//!   `fallbackDepth` in its metadata.
//! - The executor never fails. Exhaustion returns the last response seen.

mod executor;
mod policy;

pub use executor::{FallbackExecutor, FallbackOutcome};
pub use policy::{should_fallback, FallbackPolicy, FallbackStrategy, DEFAULT_MAX_FALLBACKS};
