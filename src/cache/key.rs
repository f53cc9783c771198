//! Cache key generation.
//!
//! Keys are a colon-separated prefix chain
//! `namespace:tenant:provider:operation:requestHash`. Any leading run of
//! segments, ending in `:`, is a valid eviction prefix.
//!
//! Segments are escaped (`%` as `%25`, `:` as `%3A`) so a separator inside a
//! tenant or provider name cannot extend a prefix into a sibling scope.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Cow;

pub const SEPARATOR: char = ':';

/// Tenant segment used when a request carries no tenant. Escaping never
/// produces a bare `%` followed by a non-hex letter, so no tenant id maps here.
pub const GLOBAL_TENANT: &str = "%global";

/// Escape one key segment.
pub fn escape_segment(segment: &str) -> Cow<'_, str> {
    if !segment.contains([SEPARATOR, '%']) {
        return Cow::Borrowed(segment);
    }
    let mut out = String::with_capacity(segment.len() + 8);
    for c in segment.chars() {
        match c {
            '%' => out.push_str("%25"),
            SEPARATOR => out.push_str("%3A"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub key: String,
}

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.key.starts_with(prefix)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Builder for the ordered prefix chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefix {
    segments: Vec<String>,
}

impl KeyPrefix {
    pub fn namespace(namespace: impl AsRef<str>) -> Self {
        Self {
            segments: vec![escape_segment(namespace.as_ref()).into_owned()],
        }
    }

    pub fn tenant(mut self, tenant: Option<&str>) -> Self {
        let segment = match tenant {
            Some(t) => escape_segment(t).into_owned(),
            None => GLOBAL_TENANT.to_string(),
        };
        self.segments.push(segment);
        self
    }

    pub fn provider(self, provider: impl AsRef<str>) -> Self {
        self.push(provider.as_ref())
    }

    pub fn operation(self, operation: impl AsRef<str>) -> Self {
        self.push(operation.as_ref())
    }

    fn push(mut self, segment: &str) -> Self {
        self.segments.push(escape_segment(segment).into_owned());
        self
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Prefix string with a trailing separator, so `ns:tenantA:` never
    /// matches `ns:tenantAB:...`.
    pub fn as_prefix(&self) -> String {
        let mut out = self.segments.join(":");
        out.push(SEPARATOR);
        out
    }

    /// Full key: this prefix followed by `hash`.
    pub fn key(&self, hash: &str) -> CacheKey {
        CacheKey::new(format!("{}{}", self.as_prefix(), hash))
    }
}

/// SHA-256 over the canonical JSON form of `value`, hex encoded.
///
/// Map-typed inputs should be ordered (`BTreeMap`) for the hash to be stable.
pub fn request_hash<T: Serialize>(value: &T) -> String {
    let canonical = serde_json::to_string(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_prefix_chain() {
        let p = KeyPrefix::namespace("operation")
            .tenant(Some("tenant-1"))
            .provider("ProviderA");
        assert_eq!(p.as_prefix(), "operation:tenant-1:ProviderA:");
        assert_eq!(p.depth(), 3);

        let key = p.clone().operation("lookup").key("abc");
        assert_eq!(key.as_str(), "operation:tenant-1:ProviderA:lookup:abc");
        assert!(key.starts_with(&p.as_prefix()));
    }

    #[test]
    fn test_missing_tenant_is_global() {
        let p = KeyPrefix::namespace("enrichment").tenant(None);
        assert_eq!(p.as_prefix(), "enrichment:%global:");

        // A tenant literally named "global" keeps its own scope.
        let named = KeyPrefix::namespace("enrichment").tenant(Some("global"));
        assert_ne!(named.as_prefix(), p.as_prefix());
        let odd = KeyPrefix::namespace("enrichment").tenant(Some("%global"));
        assert_eq!(odd.as_prefix(), "enrichment:%25global:");
    }

    #[test]
    fn test_separator_in_segment_is_escaped() {
        let acme = KeyPrefix::namespace("enrichment").tenant(Some("acme"));
        let acme_eu = KeyPrefix::namespace("enrichment")
            .tenant(Some("acme:eu"))
            .provider("bureau");
        assert_eq!(acme_eu.as_prefix(), "enrichment:acme%3Aeu:bureau:");
        assert!(!acme_eu.key("h").starts_with(&acme.as_prefix()));

        assert_eq!(escape_segment("50%:off"), "50%25%3Aoff");
        assert!(matches!(escape_segment("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn test_request_hash_is_stable() {
        let mut a = BTreeMap::new();
        a.insert("b", 2);
        a.insert("a", 1);
        let mut b = BTreeMap::new();
        b.insert("a", 1);
        b.insert("b", 2);
        assert_eq!(request_hash(&a), request_hash(&b));
        assert_eq!(request_hash(&a).len(), 64);

        b.insert("c", 3);
        assert_ne!(request_hash(&a), request_hash(&b));
    }
}
