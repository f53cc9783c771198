//! 成本追踪模块：按供应商统计调用次数并计算调用成本。
//!
//! # Cost Tracking Module
//!
//! Counts calls per provider and prices them with a per-call rate. Counters
//! are lock-free and only ever grow; registering or re-pricing a provider
//! never resets its count.
//!
//! ```rust
//! use enrichment_router::cost::CostTracker;
//!
//! let tracker = CostTracker::new();
//! tracker.register_provider("credit-bureau", 0.25, "USD");
//! tracker.record_call("credit-bureau");
//! tracker.record_call("credit-bureau");
//! assert_eq!(tracker.report().total_cost, 0.5);
//! ```

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_CURRENCY: &str = "USD";

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// Price of one provider call, as found in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPricing {
    pub provider: String,
    pub cost_per_call: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl ProviderPricing {
    pub fn new(provider: impl Into<String>, cost_per_call: f64) -> Self {
        Self {
            provider: provider.into(),
            cost_per_call,
            currency: default_currency(),
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}

#[derive(Debug)]
struct CostRecord {
    calls: AtomicU64,
    cost_per_call: f64,
    currency: String,
    registered: bool,
}

impl CostRecord {
    fn unregistered() -> Self {
        Self {
            calls: AtomicU64::new(0),
            cost_per_call: 0.0,
            currency: default_currency(),
            registered: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCost {
    pub call_count: u64,
    pub cost_per_call: f64,
    pub total_cost: f64,
    pub currency: String,
    /// false when calls were seen but no price was ever registered.
    pub registered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub providers: BTreeMap<String, ProviderCost>,
    pub total_cost: f64,
    pub total_calls: u64,
    pub currency: String,
    pub generated_at_ms: u64,
}

impl CostReport {
    pub fn format(&self) -> String {
        format!("{} {:.4}", self.currency, self.total_cost)
    }
}

/// Process-wide call counter and price table.
#[derive(Debug, Default)]
pub struct CostTracker {
    records: DashMap<String, CostRecord>,
    currency: OnceLock<String>,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a tracker from configured prices.
    pub fn with_pricing<I: IntoIterator<Item = ProviderPricing>>(pricing: I) -> Self {
        let tracker = Self::new();
        for p in pricing {
            tracker.register_provider(&p.provider, p.cost_per_call, &p.currency);
        }
        tracker
    }

    /// Set the per-call price. Existing call counts are kept.
    pub fn register_provider(&self, provider: &str, cost_per_call: f64, currency: &str) {
        let _ = self.currency.set(currency.to_string());
        let mut record = self
            .records
            .entry(provider.to_string())
            .or_insert_with(CostRecord::unregistered);
        record.cost_per_call = cost_per_call;
        record.currency = currency.to_string();
        record.registered = true;
        tracing::debug!(provider, cost_per_call, currency, "registered provider pricing");
    }

    pub fn record_call(&self, provider: &str) {
        if let Some(record) = self.records.get(provider) {
            record.calls.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.records
            .entry(provider.to_string())
            .or_insert_with(CostRecord::unregistered)
            .calls
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn call_count(&self, provider: &str) -> u64 {
        self.records
            .get(provider)
            .map(|r| r.calls.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn currency(&self) -> &str {
        self.currency
            .get()
            .map(String::as_str)
            .unwrap_or(DEFAULT_CURRENCY)
    }

    pub fn report(&self) -> CostReport {
        let mut providers = BTreeMap::new();
        let mut total_cost = 0.0;
        let mut total_calls = 0;
        for entry in self.records.iter() {
            let record = entry.value();
            let call_count = record.calls.load(Ordering::Relaxed);
            let cost = call_count as f64 * record.cost_per_call;
            total_cost += cost;
            total_calls += call_count;
            providers.insert(
                entry.key().clone(),
                ProviderCost {
                    call_count,
                    cost_per_call: record.cost_per_call,
                    total_cost: cost,
                    currency: record.currency.clone(),
                    registered: record.registered,
                },
            );
        }
        CostReport {
            providers,
            total_cost,
            total_calls,
            currency: self.currency().to_string(),
            generated_at_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.report().total_cost
    }
}
