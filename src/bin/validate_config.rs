//! Standalone binary to validate enrichment router configuration files.
//! Prints what each configured provider will run with.
//!
//! Usage: `validate_config [FILE ...]`. Without arguments it reads
//! `ENRICH_CONFIG`, falling back to `enrichment.yaml`.

use anyhow::Context;
use enrichment_router::config::EnrichmentConfig;
use enrichment_router::fallback::FallbackPolicy;
use enrichment_router::ResilienceProfile;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn stages(profile: &ResilienceProfile) -> String {
    let mut out = Vec::new();
    if let Some(b) = &profile.bulkhead {
        out.push(format!("bulkhead({})", b.max_concurrent_calls));
    }
    if let Some(r) = &profile.rate_limiter {
        out.push(format!(
            "rate_limiter({}/{}ms)",
            r.limit_for_period,
            r.limit_refresh_period.as_millis()
        ));
    }
    if let Some(c) = &profile.circuit_breaker {
        out.push(format!(
            "circuit_breaker({}% of {})",
            c.failure_rate_threshold, c.sliding_window_size
        ));
    }
    if let Some(r) = &profile.retry {
        out.push(format!("retry(x{})", r.max_attempts));
    }
    out.push(format!("timeout({}ms)", profile.timeout.as_millis()));
    out.join(" -> ")
}

/// Follow the declared chain from `start` the way the executor would.
fn chain(start: &str, fallbacks: &HashMap<String, FallbackPolicy>) -> (Vec<String>, bool) {
    let mut path = vec![start.to_string()];
    let mut seen = HashSet::from([start.to_string()]);
    let limit = fallbacks.get(start).map_or(0, |p| p.max_fallbacks);
    let mut current = start.to_string();
    while let Some(policy) = fallbacks.get(&current) {
        if path.len() as u32 > limit.min(policy.max_fallbacks) {
            break;
        }
        if !seen.insert(policy.fallback_to.clone()) {
            return (path, true);
        }
        path.push(policy.fallback_to.clone());
        current = policy.fallback_to.clone();
    }
    (path, false)
}

fn check(path: &PathBuf) -> anyhow::Result<Vec<String>> {
    let mut config = EnrichmentConfig::from_path(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    config.apply_env_overrides();
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;

    let mut warnings = Vec::new();
    println!(
        "cache: {} (ttl {}s, max {}), operation cache: {} (ttl {}s), batch concurrency: {}",
        if config.cache.enabled { "on" } else { "off" },
        config.cache.ttl_secs,
        config.cache.max_entries,
        if config.operation_cache.enabled { "on" } else { "off" },
        config.operation_cache.ttl_secs,
        config.batch.concurrency,
    );
    println!("default resilience: {}", stages(&config.resilience.default));

    let prices: HashMap<&str, _> = config
        .pricing
        .iter()
        .map(|p| (p.provider.as_str(), p))
        .collect();

    for name in config.referenced_providers() {
        println!("\n  {name}");
        match config.resilience.providers.get(&name) {
            Some(profile) => println!("    resilience: {}", stages(profile)),
            None => println!("    resilience: default"),
        }
        if let Some(policy) = config.fallbacks.get(&name) {
            let (path, cycle) = chain(&name, &config.fallbacks);
            println!(
                "    fallback:   {:?} up to {} hop(s): {}",
                policy.strategy,
                policy.max_fallbacks,
                path.join(" -> ")
            );
            if cycle {
                warnings.push(format!("{name}: fallback chain loops back on itself"));
            }
        }
        match prices.get(name.as_str()) {
            Some(p) => println!("    price:      {} {} per call", p.cost_per_call, p.currency),
            None => println!("    price:      unpriced"),
        }
    }
    Ok(warnings)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut files: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if files.is_empty() {
        files.push(
            std::env::var("ENRICH_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("enrichment.yaml")),
        );
    }

    let mut errors = Vec::new();
    for file in &files {
        println!("=== {} ===", file.display());
        match check(file) {
            Ok(warnings) => {
                for w in warnings {
                    println!("  warning: {w}");
                }
                println!("\nOK");
            }
            Err(e) => {
                println!("FAILED");
                errors.push(format!("  {}: {e:#}", file.display()));
            }
        }
    }

    println!("\n=== Summary ===");
    if errors.is_empty() {
        println!("All {} configuration file(s) are valid", files.len());
        Ok(())
    } else {
        println!("Found {} invalid file(s):", errors.len());
        for err in &errors {
            println!("{err}");
        }
        std::process::exit(1);
    }
}
