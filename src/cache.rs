//! Response cache contract consumed by the adapters, plus the
//! check-then-produce wrapper every adapter funnels its network calls through.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// TTL-keyed store. Entries past their expiry must read as absent.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get_cached(&self, key: &str) -> Option<Value>;
    async fn set_cached(&self, key: &str, value: Value, ttl: Duration);
}

/// Deterministic cache key: `{prefix}:{sha256(params)}` (first 16 hex chars).
///
/// `params` should cover the endpoint, query, location, and the adapter's
/// view of the options so distinct queries never collide.
pub fn cache_key<P: Serialize + ?Sized>(prefix: &str, params: &P) -> String {
    let encoded = serde_json::to_vec(params).unwrap_or_default();
    let digest = Sha256::digest(&encoded);
    let mut out = String::with_capacity(prefix.len() + 17);
    out.push_str(prefix);
    out.push(':');
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Return the cached value for `key`, or run `produce`, store its output for
/// `ttl`, and return it. Errors from `produce` are not cached.
pub async fn cached_request<F, Fut, E>(
    cache: &dyn ResponseCache,
    key: &str,
    ttl: Duration,
    produce: F,
) -> Result<Value, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, E>>,
{
    if let Some(hit) = cache.get_cached(key).await {
        counter!("jobs_cache_hits_total").increment(1);
        tracing::debug!(target: "sources", key, "cache hit");
        return Ok(hit);
    }
    counter!("jobs_cache_misses_total").increment(1);

    let fresh = produce().await?;
    cache.set_cached(key, fresh.clone(), ttl).await;
    Ok(fresh)
}
