//! Enrichment response.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key naming the provider that handed off to the one that answered.
pub const FALLBACK_FROM: &str = "fallbackFrom";
/// Metadata key holding the 1-based fallback hop count.
pub const FALLBACK_DEPTH: &str = "fallbackDepth";
/// Metadata key holding the failure code of a failed hop.
pub const ERROR_CODE: &str = "errorCode";

/// Provider answer. Failures are values: `success == false` with `error` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResponse {
    pub success: bool,
    #[serde(default)]
    pub fields_enriched: u32,
    #[serde(default)]
    pub enriched_data: serde_json::Value,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub provider_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl EnrichmentResponse {
    pub fn success(
        provider_name: impl Into<String>,
        enriched_data: serde_json::Value,
        fields_enriched: u32,
    ) -> Self {
        Self {
            success: true,
            fields_enriched,
            enriched_data,
            metadata: HashMap::new(),
            error: None,
            provider_name: provider_name.into(),
            enrichment_type: None,
            request_id: None,
            message: None,
        }
    }

    /// A successful call that enriched nothing.
    pub fn empty(provider_name: impl Into<String>) -> Self {
        Self::success(provider_name, serde_json::Value::Null, 0)
    }

    pub fn failure(provider_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            fields_enriched: 0,
            enriched_data: serde_json::Value::Null,
            metadata: HashMap::new(),
            error: Some(error.into()),
            provider_name: provider_name.into(),
            enrichment_type: None,
            request_id: None,
            message: None,
        }
    }

    pub fn with_type(mut self, enrichment_type: impl Into<String>) -> Self {
        self.enrichment_type = Some(enrichment_type.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.success && self.fields_enriched == 0
    }

    pub fn fallback_from(&self) -> Option<&str> {
        self.metadata.get(FALLBACK_FROM).map(String::as_str)
    }

    pub fn fallback_depth(&self) -> Option<u32> {
        self.metadata.get(FALLBACK_DEPTH).and_then(|d| d.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_success_without_fields() {
        let r = EnrichmentResponse::empty("acme");
        assert!(r.success);
        assert!(r.is_empty());
        assert!(!EnrichmentResponse::failure("acme", "down").is_empty());
    }

    #[test]
    fn test_fallback_accessors() {
        let r = EnrichmentResponse::success("backup", serde_json::json!({}), 1)
            .with_metadata(FALLBACK_FROM, "primary")
            .with_metadata(FALLBACK_DEPTH, "2");
        assert_eq!(r.fallback_from(), Some("primary"));
        assert_eq!(r.fallback_depth(), Some(2));
    }
}
