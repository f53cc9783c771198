use crate::types::EnrichmentResponse;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_FALLBACKS: u32 = 3;

fn default_max_fallbacks() -> u32 {
    DEFAULT_MAX_FALLBACKS
}

/// What makes a response worth handing to the fallback provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackStrategy {
    #[default]
    OnError,
    OnEmpty,
    OnErrorOrEmpty,
}

impl FallbackStrategy {
    pub fn triggers(&self, response: &EnrichmentResponse) -> bool {
        let failed = !response.success;
        let empty = response.success && response.fields_enriched == 0;
        match self {
            FallbackStrategy::OnError => failed,
            FallbackStrategy::OnEmpty => empty,
            FallbackStrategy::OnErrorOrEmpty => failed || empty,
        }
    }
}

/// Fallback declaration attached to one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackPolicy {
    /// Name of the provider to try next.
    pub fallback_to: String,
    #[serde(default)]
    pub strategy: FallbackStrategy,
    /// Most fallback hops a chain starting here may take.
    #[serde(default = "default_max_fallbacks")]
    pub max_fallbacks: u32,
}

impl FallbackPolicy {
    pub fn new(fallback_to: impl Into<String>) -> Self {
        Self {
            fallback_to: fallback_to.into(),
            strategy: FallbackStrategy::default(),
            max_fallbacks: DEFAULT_MAX_FALLBACKS,
        }
    }

    pub fn with_strategy(mut self, strategy: FallbackStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_fallbacks(mut self, max: u32) -> Self {
        self.max_fallbacks = max;
        self
    }
}

/// A provider without a policy never falls back.
pub fn should_fallback(policy: Option<&FallbackPolicy>, response: &EnrichmentResponse) -> bool {
    policy.map_or(false, |p| p.strategy.triggers(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truth_table() {
        let failed = EnrichmentResponse::failure("p", "boom");
        let empty = EnrichmentResponse::empty("p");
        let full = EnrichmentResponse::success("p", serde_json::json!({"a": 1}), 1);

        let cases = [
            (FallbackStrategy::OnError, [true, false, false]),
            (FallbackStrategy::OnEmpty, [false, true, false]),
            (FallbackStrategy::OnErrorOrEmpty, [true, true, false]),
        ];
        for (strategy, expected) in cases {
            let policy = FallbackPolicy::new("next").with_strategy(strategy);
            let got = [&failed, &empty, &full].map(|r| should_fallback(Some(&policy), r));
            assert_eq!(got, expected, "{strategy:?}");
        }

        for r in [&failed, &empty, &full] {
            assert!(!should_fallback(None, r));
        }
    }

    #[test]
    fn test_yaml_defaults() {
        let policy: FallbackPolicy = serde_yaml::from_str("fallback_to: backup").unwrap();
        assert_eq!(policy.strategy, FallbackStrategy::OnError);
        assert_eq!(policy.max_fallbacks, 3);

        let policy: FallbackPolicy =
            serde_yaml::from_str("fallback_to: backup\nstrategy: ON_ERROR_OR_EMPTY\nmax_fallbacks: 1").unwrap();
        assert_eq!(policy.strategy, FallbackStrategy::OnErrorOrEmpty);
        assert_eq!(policy.max_fallbacks, 1);
    }
}
