use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metric registration so series show up on /metrics before the
/// first search.
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "jobs_source_requests_total",
            "Network requests issued to a job board (cache misses)."
        );
        describe_counter!(
            "jobs_source_errors_total",
            "Per-source failures recorded during a search."
        );
        describe_counter!(
            "jobs_rate_limited_total",
            "Requests rejected by a source's rate limiter."
        );
        describe_counter!("jobs_cache_hits_total", "Adapter responses served from cache.");
        describe_counter!("jobs_cache_misses_total", "Adapter responses fetched fresh.");
        describe_counter!("jobs_dedup_total", "Jobs dropped as cross-source duplicates.");
        describe_counter!("jobs_persisted_total", "Jobs upserted into storage.");
        describe_histogram!(
            "jobs_search_duration_ms",
            "Aggregated search latency in milliseconds."
        );
        describe_histogram!(
            "jobs_source_fetch_ms",
            "Single job-board request latency in milliseconds."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("installing prometheus recorder")?;
        describe_metrics();
        Ok(Self { handle })
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
