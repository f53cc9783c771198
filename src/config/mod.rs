//! 配置模块：从 YAML 加载回退策略、弹性配置、缓存与计费设置。
//!
//! # Configuration Module
//!
//! Everything the router reads at startup: fallback policies and resilience
//! profiles keyed by provider name, cache settings for both namespaces,
//! per-call pricing and the batch fan-out limit.
//!
//! ```yaml
//! cache:
//!   enabled: true
//!   ttl_secs: 3600
//! operation_cache:
//!   enabled: false
//! resilience:
//!   default:
//!     timeout_ms: 30000
//!   providers:
//!     credit-bureau:
//!       circuit_breaker:
//!         failure_rate_threshold: 50
//!         sliding_window_size: 10
//!       timeout_ms: 5000
//! fallbacks:
//!   credit-bureau:
//!     fallback_to: backup-bureau
//!     strategy: ON_ERROR
//! pricing:
//!   - provider: credit-bureau
//!     cost_per_call: 1.5
//! ```
//!
//! Environment overrides, applied by [`EnrichmentConfig::load`]:
//! - `ENRICH_CACHE_ENABLED`
//! - `ENRICH_CACHE_TTL_SECS`
//! - `ENRICH_OPERATION_CACHE_ENABLED`
//! - `ENRICH_BATCH_CONCURRENCY`

use crate::cache::{DEFAULT_ENRICHMENT_TTL, DEFAULT_OPERATION_TTL};
use crate::cost::ProviderPricing;
use crate::fallback::FallbackPolicy;
use crate::resilience::ResilienceProfile;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BATCH_CONCURRENCY: usize = 10;
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl CacheSettings {
    fn with_ttl(ttl: Duration) -> Self {
        Self {
            enabled: true,
            ttl_secs: ttl.as_secs(),
            max_entries: DEFAULT_MAX_CACHE_ENTRIES,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_ENRICHMENT_TTL)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationCacheSettings {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for OperationCacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: DEFAULT_OPERATION_TTL.as_secs(),
        }
    }
}

impl OperationCacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    /// Used by every provider without an entry in `providers`.
    pub default: ResilienceProfile,
    pub providers: HashMap<String, ResilienceProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub concurrency: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub cache: CacheSettings,
    pub operation_cache: OperationCacheSettings,
    pub resilience: ResilienceSettings,
    pub fallbacks: HashMap<String, FallbackPolicy>,
    pub pricing: Vec<ProviderPricing>,
    pub batch: BatchSettings,
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> Error {
    Error::configuration_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field)
            .with_source("config_validator"),
    )
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl EnrichmentConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file: {e}"),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Read a file, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_path(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ENRICH_CACHE_ENABLED").as_deref().and_then(parse_bool) {
            self.cache.enabled = v;
        }
        if let Some(v) = lookup("ENRICH_CACHE_TTL_SECS").and_then(|s| s.trim().parse::<u64>().ok()) {
            self.cache.ttl_secs = v;
        }
        if let Some(v) = lookup("ENRICH_OPERATION_CACHE_ENABLED")
            .as_deref()
            .and_then(parse_bool)
        {
            self.operation_cache.enabled = v;
        }
        if let Some(v) = lookup("ENRICH_BATCH_CONCURRENCY")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
        {
            self.batch.concurrency = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(invalid("cache.ttl_secs", "cache TTL must be greater than 0"));
        }
        if self.cache.max_entries == 0 {
            return Err(invalid("cache.max_entries", "cache must hold at least one entry"));
        }
        if self.operation_cache.enabled && self.operation_cache.ttl_secs == 0 {
            return Err(invalid(
                "operation_cache.ttl_secs",
                "operation cache TTL must be greater than 0",
            ));
        }
        if self.batch.concurrency == 0 {
            return Err(invalid("batch.concurrency", "batch concurrency must be at least 1"));
        }

        self.resilience.default.validate("resilience.default")?;
        for (name, profile) in &self.resilience.providers {
            profile.validate(&format!("resilience.providers.{name}"))?;
        }

        for (name, policy) in &self.fallbacks {
            if policy.fallback_to.trim().is_empty() {
                return Err(invalid(
                    format!("fallbacks.{name}.fallback_to"),
                    "fallback target must not be empty",
                ));
            }
            if policy.fallback_to == *name {
                return Err(invalid(
                    format!("fallbacks.{name}.fallback_to"),
                    format!("provider '{name}' cannot fall back to itself"),
                ));
            }
        }

        for (idx, p) in self.pricing.iter().enumerate() {
            if !p.cost_per_call.is_finite() || p.cost_per_call < 0.0 {
                return Err(invalid(
                    format!("pricing[{idx}].cost_per_call"),
                    format!("invalid cost for '{}': {}", p.provider, p.cost_per_call),
                ));
            }
        }
        Ok(())
    }

    /// Provider names referenced anywhere in this config.
    pub fn referenced_providers(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        names.extend(self.resilience.providers.keys().cloned());
        for (name, policy) in &self.fallbacks {
            names.insert(name.clone());
            names.insert(policy.fallback_to.clone());
        }
        names.extend(self.pricing.iter().map(|p| p.provider.clone()));
        names
    }

    /// Referenced names missing from `registered`.
    pub fn unknown_providers<'a, I>(&self, registered: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let known: BTreeSet<&str> = registered.into_iter().collect();
        self.referenced_providers()
            .into_iter()
            .filter(|n| !known.contains(n.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FallbackStrategy;

    const SAMPLE: &str = r#"
cache:
  ttl_secs: 120
operation_cache:
  enabled: false
resilience:
  default:
    timeout_ms: 10000
  providers:
    bureau:
      bulkhead:
        max_concurrent_calls: 4
      timeout_ms: 2000
fallbacks:
  bureau:
    fallback_to: backup
    strategy: ON_ERROR_OR_EMPTY
pricing:
  - provider: bureau
    cost_per_call: 1.5
  - provider: backup
    cost_per_call: 0.5
    currency: EUR
"#;

    #[test]
    fn test_parse_sample() {
        let config = EnrichmentConfig::from_yaml_str(SAMPLE).unwrap();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_secs(120));
        assert!(!config.operation_cache.enabled);
        assert_eq!(config.operation_cache.ttl(), Duration::from_secs(1800));
        assert_eq!(config.resilience.default.timeout, Duration::from_secs(10));
        assert_eq!(
            config.resilience.providers["bureau"].bulkhead.as_ref().unwrap().max_concurrent_calls,
            4
        );
        assert_eq!(config.fallbacks["bureau"].strategy, FallbackStrategy::OnErrorOrEmpty);
        assert_eq!(config.pricing[0].currency, "USD");
        assert_eq!(config.pricing[1].currency, "EUR");
        assert_eq!(config.batch.concurrency, DEFAULT_BATCH_CONCURRENCY);
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EnrichmentConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, EnrichmentConfig::default());
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EnrichmentConfig::default();
        config.apply_overrides_from(|key| match key {
            "ENRICH_CACHE_ENABLED" => Some("false".into()),
            "ENRICH_CACHE_TTL_SECS" => Some("60".into()),
            "ENRICH_OPERATION_CACHE_ENABLED" => Some("nonsense".into()),
            "ENRICH_BATCH_CONCURRENCY" => Some("0".into()),
            _ => None,
        });
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(config.operation_cache.enabled);
        assert_eq!(config.batch.concurrency, DEFAULT_BATCH_CONCURRENCY);
    }

    #[test]
    fn test_self_fallback_rejected() {
        let yaml = "fallbacks:\n  loop:\n    fallback_to: loop\n";
        let err = EnrichmentConfig::from_yaml_str(yaml).unwrap().validate().unwrap_err();
        assert_eq!(
            err.context().unwrap().field_path.as_deref(),
            Some("fallbacks.loop.fallback_to")
        );
    }

    #[test]
    fn test_negative_price_rejected() {
        let yaml = "pricing:\n  - provider: p\n    cost_per_call: -1\n";
        assert!(EnrichmentConfig::from_yaml_str(yaml).unwrap().validate().is_err());
    }

    #[test]
    fn test_unknown_providers() {
        let config = EnrichmentConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.unknown_providers(["bureau"]), vec!["backup".to_string()]);
    }
}
