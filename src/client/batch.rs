use crate::client::core::{EnrichmentClient, EnrichmentOutcome};
use crate::types::EnrichmentRequest;
use crate::{BoxStream, Error, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// One batch entry, tagged with its position in the input.
#[derive(Debug)]
pub struct IndexedResult {
    pub index: usize,
    pub request_id: String,
    pub result: Result<EnrichmentOutcome>,
}

/// Items produced by [`EnrichmentClient::enrich_stream`], in completion order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    Result {
        index: usize,
        outcome: EnrichmentOutcome,
    },
    Error {
        index: usize,
        request_id: String,
        message: String,
    },
    /// Always the last item.
    Complete { total: usize, failed: usize },
}

impl StreamEvent {
    pub fn index(&self) -> Option<usize> {
        match self {
            StreamEvent::Result { index, .. } | StreamEvent::Error { index, .. } => Some(*index),
            StreamEvent::Complete { .. } => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. })
    }
}

impl EnrichmentClient {
    /// Route every request with bounded concurrency. Results come back in
    /// input order; a failing item never affects its siblings.
    pub async fn enrich_batch(&self, requests: Vec<EnrichmentRequest>) -> Vec<IndexedResult> {
        self.enrich_batch_with_limit(requests, None).await
    }

    pub async fn enrich_batch_with_limit(
        &self,
        requests: Vec<EnrichmentRequest>,
        concurrency_limit: Option<usize>,
    ) -> Vec<IndexedResult> {
        let n = requests.len();
        if n == 0 {
            return Vec::new();
        }
        let limit = concurrency_limit.unwrap_or(self.batch_concurrency).max(1);
        info!(items = n, concurrency = limit, "running enrichment batch");

        let mut out: Vec<Option<IndexedResult>> = (0..n).map(|_| None).collect();
        let results: Vec<IndexedResult> = stream::iter(requests.into_iter().enumerate())
            .map(|(index, request)| async move {
                let request_id = request.request_id.clone();
                let result = self.enrich(request).await;
                IndexedResult {
                    index,
                    request_id,
                    result,
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        for r in results {
            let idx = r.index;
            out[idx] = Some(r);
        }

        out.into_iter()
            .enumerate()
            .map(|(index, o)| {
                o.unwrap_or_else(|| IndexedResult {
                    index,
                    request_id: String::new(),
                    result: Err(Error::provider("batch", "batch result missing")),
                })
            })
            .collect()
    }

    /// Like [`enrich_batch`](Self::enrich_batch) but yields each item as it
    /// completes, then a final [`StreamEvent::Complete`].
    pub fn enrich_stream(
        self: &Arc<Self>,
        requests: Vec<EnrichmentRequest>,
    ) -> BoxStream<'static, StreamEvent> {
        let total = requests.len();
        let limit = self.batch_concurrency.max(1);
        let client = Arc::clone(self);

        let items = stream::iter(requests.into_iter().enumerate())
            .map(move |(index, request)| {
                let client = client.clone();
                async move {
                    let request_id = request.request_id.clone();
                    match client.enrich(request).await {
                        Ok(outcome) => StreamEvent::Result { index, outcome },
                        Err(e) => StreamEvent::Error {
                            index,
                            request_id,
                            message: e.to_string(),
                        },
                    }
                }
            })
            .buffer_unordered(limit);

        let failed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = failed.clone();
        let items = items.inspect(move |event| {
            if matches!(event, StreamEvent::Error { .. }) {
                counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        });
        let complete = stream::once(async move {
            StreamEvent::Complete {
                total,
                failed: failed.load(std::sync::atomic::Ordering::Relaxed),
            }
        });

        Box::pin(items.chain(complete))
    }
}
