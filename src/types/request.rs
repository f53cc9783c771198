//! Enrichment request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Merge semantics requested by the caller. The routing core carries it through
/// to providers without interpreting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrichmentStrategy {
    #[default]
    Enhance,
    Merge,
    Replace,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    #[serde(rename = "type")]
    pub enrichment_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Ordered so that the cache request hash is stable.
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub request_id: String,
    #[serde(default)]
    pub strategy: EnrichmentStrategy,
    /// Replaces the provider's configured timeout for this request only.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_millis")]
    pub timeout_override: Option<Duration>,
}

impl EnrichmentRequest {
    pub fn new(enrichment_type: impl Into<String>) -> Self {
        Self {
            enrichment_type: enrichment_type.into(),
            tenant_id: None,
            parameters: BTreeMap::new(),
            request_id: uuid::Uuid::new_v4().to_string(),
            strategy: EnrichmentStrategy::default(),
            timeout_override: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_parameter(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_strategy(mut self, strategy: EnrichmentStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
