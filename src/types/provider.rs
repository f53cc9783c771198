//! Provider descriptor.

use serde::{Deserialize, Serialize};

/// Static metadata a provider registers with. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique provider name; also the key for fallback and resilience configuration.
    pub name: String,
    /// `None` means the provider is global and serves every tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Enrichment category, e.g. `"credit-report"`.
    #[serde(rename = "type")]
    pub enrichment_type: String,
    /// Higher wins.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl ProviderDescriptor {
    pub fn new(name: impl Into<String>, enrichment_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tenant_id: None,
            enrichment_type: enrichment_type.into(),
            priority: 0,
            version: default_version(),
            tags: Vec::new(),
            description: String::new(),
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_global(&self) -> bool {
        self.tenant_id.is_none()
    }

    /// Whether this provider may serve `tenant`. Global providers serve everyone;
    /// a `None` tenant matches every provider.
    pub fn serves_tenant(&self, tenant: Option<&str>) -> bool {
        match (self.tenant_id.as_deref(), tenant) {
            (None, _) | (_, None) => true,
            (Some(own), Some(requested)) => own == requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_matching() {
        let global = ProviderDescriptor::new("global", "credit-report");
        let scoped = ProviderDescriptor::new("scoped", "credit-report").with_tenant("tenant-a");

        assert!(global.serves_tenant(Some("tenant-a")));
        assert!(global.serves_tenant(None));
        assert!(scoped.serves_tenant(Some("tenant-a")));
        assert!(!scoped.serves_tenant(Some("tenant-b")));
        assert!(scoped.serves_tenant(None));
    }

    #[test]
    fn test_deserialize_defaults() {
        let yaml = "name: acme\ntype: company-profile\n";
        let d: ProviderDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(d.priority, 0);
        assert_eq!(d.version, "1.0.0");
        assert!(d.is_global());
    }
}
