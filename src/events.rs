//! 路由事件：提供 EventSink trait 以及供应商选择、回退和拒绝等事件。
//!
//! Routing events.
//!
//! The executor and client report what they decided to an [`EventSink`].
//! Sinks are observers: a failing sink is logged and otherwise ignored.

use crate::error_code::FailureCode;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Why a fallback chain stopped before a successful answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionReason {
    /// Hop budget used up.
    BudgetSpent,
    /// The declared fallback provider is not registered.
    ProviderNotFound,
    /// The declared fallback provider was already tried in this chain.
    Cycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EnrichmentEvent {
    ProviderSelected {
        request_id: String,
        provider: String,
        enrichment_type: String,
        tenant_id: Option<String>,
        priority: i32,
        timestamp: f64,
    },
    FallbackTriggered {
        request_id: String,
        from: String,
        to: String,
        depth: u32,
        timestamp: f64,
    },
    FallbackExhausted {
        request_id: String,
        last_provider: String,
        depth: u32,
        reason: ExhaustionReason,
        timestamp: f64,
    },
    CallRejected {
        request_id: String,
        provider: String,
        code: FailureCode,
        timestamp: f64,
    },
    CacheHit {
        request_id: String,
        provider: String,
        timestamp: f64,
    },
}

impl EnrichmentEvent {
    pub fn request_id(&self) -> &str {
        match self {
            EnrichmentEvent::ProviderSelected { request_id, .. }
            | EnrichmentEvent::FallbackTriggered { request_id, .. }
            | EnrichmentEvent::FallbackExhausted { request_id, .. }
            | EnrichmentEvent::CallRejected { request_id, .. }
            | EnrichmentEvent::CacheHit { request_id, .. } => request_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EnrichmentEvent::ProviderSelected { .. } => "provider_selected",
            EnrichmentEvent::FallbackTriggered { .. } => "fallback_triggered",
            EnrichmentEvent::FallbackExhausted { .. } => "fallback_exhausted",
            EnrichmentEvent::CallRejected { .. } => "call_rejected",
            EnrichmentEvent::CacheHit { .. } => "cache_hit",
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn report(&self, event: EnrichmentEvent) -> Result<()>;
}

/// Report `event`, logging instead of failing.
pub(crate) async fn emit(sink: &dyn EventSink, event: EnrichmentEvent) {
    let name = event.name();
    if let Err(e) = sink.report(event).await {
        tracing::warn!(event = name, error = %e, "event sink failed");
    }
}

/// No-op sink.
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn report(&self, _: EnrichmentEvent) -> Result<()> {
        Ok(())
    }
}

/// Returns a no-op event sink.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoopEventSink)
}

/// Keeps every event in memory. Meant for tests and diagnostics.
#[derive(Default)]
pub struct InMemoryEventSink {
    events: Mutex<Vec<EnrichmentEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EnrichmentEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(EnrichmentEvent::name).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut e) = self.events.lock() {
            e.clear();
        }
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn report(&self, event: EnrichmentEvent) -> Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_sink_records_in_order() {
        let sink = InMemoryEventSink::new();
        emit(
            &sink,
            EnrichmentEvent::CacheHit {
                request_id: "r1".into(),
                provider: "acme".into(),
                timestamp: timestamp(),
            },
        )
        .await;
        emit(
            &sink,
            EnrichmentEvent::CallRejected {
                request_id: "r1".into(),
                provider: "acme".into(),
                code: FailureCode::RateLimited,
                timestamp: timestamp(),
            },
        )
        .await;
        assert_eq!(sink.names(), vec!["cache_hit", "call_rejected"]);
        assert_eq!(sink.events()[1].request_id(), "r1");
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = EnrichmentEvent::FallbackTriggered {
            request_id: "r1".into(),
            from: "primary".into(),
            to: "backup".into(),
            depth: 1,
            timestamp: 0.0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "fallback_triggered");
        assert_eq!(json["to"], "backup");
    }
}
