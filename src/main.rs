//! Job Aggregator — Binary Entrypoint
//! Boots the Axum HTTP server: config, storage, aggregator, routes, metrics.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use job_aggregator::metrics::Metrics;
use job_aggregator::{api, config, Aggregator, MemoryStore};

const DEFAULT_PORT: u16 = 3000;

/// Compact logs by default; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("job_aggregator=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = Metrics::init()?;
    let cfg = config::load_default().context("loading aggregator config")?;

    let store = Arc::new(MemoryStore::new());
    let aggregator = Aggregator::init(&cfg, store.clone())?;

    // Lazy eviction covers reads; sweep periodically so idle keys go too.
    let sweep_every = cfg.cache_ttl().max(std::time::Duration::from_secs(60));
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(sweep_every);
        loop {
            tick.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "expired cache entries removed");
            }
        }
    });

    let app = api::router(Arc::new(aggregator)).merge(metrics.router());

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
