use crate::error::RejectionKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkheadConfig {
    pub max_concurrent_calls: u32,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 25,
        }
    }
}

impl BulkheadConfig {
    pub fn new(max_concurrent_calls: u32) -> Self {
        Self {
            max_concurrent_calls,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkheadSnapshot {
    pub max_concurrent_calls: u32,
    pub available: u32,
}

/// Concurrency cap. A call that finds every slot taken is rejected instead of queued.
pub struct Bulkhead {
    cfg: BulkheadConfig,
    permits: Arc<Semaphore>,
}

impl Bulkhead {
    pub fn new(cfg: BulkheadConfig) -> Self {
        let permits = Arc::new(Semaphore::new(cfg.max_concurrent_calls as usize));
        Self { cfg, permits }
    }

    /// Take a slot; it is released when the returned permit drops.
    pub fn try_enter(&self, provider: &str) -> Result<OwnedSemaphorePermit> {
        self.permits.clone().try_acquire_owned().map_err(|_| {
            tracing::debug!(
                provider,
                max_concurrent_calls = self.cfg.max_concurrent_calls,
                "bulkhead full"
            );
            Error::rejected(provider, RejectionKind::BulkheadFull)
        })
    }

    pub fn snapshot(&self) -> BulkheadSnapshot {
        BulkheadSnapshot {
            max_concurrent_calls: self.cfg.max_concurrent_calls,
            available: self.permits.available_permits() as u32,
        }
    }
}
