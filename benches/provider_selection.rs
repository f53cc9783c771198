//! Benchmarks for the routing hot path
//!
//! This benchmark measures:
//! - Best-match provider selection as the registry grows
//! - Cache key derivation (canonical JSON + SHA-256)
//! - A full cached `enrich` round trip through the client

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use enrichment_router::cache::{request_hash, KeyPrefix};
use enrichment_router::provider::{EnrichmentProvider, FnProvider};
use enrichment_router::registry::ProviderRegistry;
use enrichment_router::{EnrichmentClient, EnrichmentRequest, EnrichmentResponse, ProviderDescriptor};

fn provider(name: String, enrichment_type: &str, tenant: Option<String>, priority: i32) -> Arc<dyn EnrichmentProvider> {
    let mut descriptor = ProviderDescriptor::new(name.clone(), enrichment_type).with_priority(priority);
    if let Some(t) = tenant {
        descriptor = descriptor.with_tenant(t);
    }
    Arc::new(FnProvider::new(descriptor, move |_req: EnrichmentRequest| {
        let name = name.clone();
        async move { Ok::<_, enrichment_router::Error>(EnrichmentResponse::success(name, serde_json::json!({"ok": true}), 1)) }
    }))
}

fn build_registry(size: usize) -> ProviderRegistry {
    let types = ["credit-report", "company-profile", "address", "sanctions"];
    let providers = (0..size)
        .map(|i| {
            let tenant = (i % 3 == 0).then(|| format!("tenant-{}", i % 7));
            provider(format!("provider-{i:04}"), types[i % types.len()], tenant, (i % 5) as i32)
        })
        .collect();
    ProviderRegistry::new(providers).expect("unique names")
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("provider_selection");
    for size in [8usize, 64, 512] {
        let registry = build_registry(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("for_type", size), &registry, |b, r| {
            b.iter(|| r.select_for_type(black_box("credit-report")))
        });
        group.bench_with_input(BenchmarkId::new("for_type_and_tenant", size), &registry, |b, r| {
            b.iter(|| r.select_for_type_and_tenant(black_box("credit-report"), black_box("tenant-3")))
        });
    }
    group.finish();
}

fn bench_cache_key(c: &mut Criterion) {
    let request = EnrichmentRequest::new("credit-report")
        .with_tenant("acme")
        .with_parameter("tax_id", "B12345678")
        .with_parameter("country", "ES")
        .with_parameter("depth", 3);

    c.bench_function("cache_key", |b| {
        b.iter(|| {
            KeyPrefix::namespace("enrichment")
                .tenant(request.tenant_id.as_deref())
                .provider("credit-bureau")
                .operation("credit-report")
                .key(&request_hash(&(black_box(&request.parameters), request.strategy)))
        })
    });
}

fn bench_cached_enrich(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let client = EnrichmentClient::builder()
        .provider(provider("credit-bureau".into(), "credit-report", None, 10))
        .build()
        .expect("client");
    let request = EnrichmentRequest::new("credit-report").with_parameter("tax_id", "B12345678");
    rt.block_on(client.enrich(request.clone())).expect("warm cache");

    c.bench_function("enrich_cache_hit", |b| {
        b.to_async(&rt)
            .iter(|| async { client.enrich(black_box(request.clone())).await.expect("enrich") })
    });
}

criterion_group!(benches, bench_selection, bench_cache_key, bench_cached_enrich);
criterion_main!(benches);
