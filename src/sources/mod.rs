// src/sources/mod.rs
//! Job-board adapters.
//!
//! Every adapter follows the same flow: admit through its rate limiter,
//! consult the response cache, call the board's API, then normalize each raw
//! record into a [`Job`]. The plumbing lives in [`SourceContext`]; the
//! adapters only know how to build requests and map payloads.

pub mod adzuna;
pub mod auth;
pub mod indeed;
pub mod linkedin;
pub mod normalize;
pub mod reed;
pub mod remoteok;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::Value;

use crate::cache::{cache_key, cached_request, ResponseCache};
use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::job::{Job, SearchOptions, SourceId};
use crate::rate_limiter::RateLimiter;

/// One job board.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> SourceId;

    async fn search_jobs(
        &self,
        query: &str,
        location: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Job>, SourceError>;

    /// Map one raw record. Never fails; missing fields are defaulted.
    fn normalize_job(&self, raw: &Value) -> Job;
}

/// Shared plumbing handed to every adapter.
#[derive(Clone)]
pub struct SourceContext {
    pub source: SourceId,
    pub config: SourceConfig,
    pub http: reqwest::Client,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<dyn ResponseCache>,
    pub cache_ttl: Duration,
}

impl SourceContext {
    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Required credential or `MissingCredentials`.
    pub fn credential(
        &self,
        value: &Option<String>,
        field: &'static str,
    ) -> Result<String, SourceError> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(SourceError::MissingCredentials {
                board: self.source,
                field,
            })
    }

    /// Cache key over the endpoint, query, location, and adapter options.
    pub fn cache_key<P: Serialize + ?Sized>(&self, endpoint: &str, params: &P) -> String {
        cache_key(&format!("{}:{}", self.source, endpoint), params)
    }

    /// Serve `key` from cache or send `request` and parse its JSON body.
    /// Adapters check the rate limiter before calling this.
    pub async fn fetch_json(
        &self,
        key: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, SourceError> {
        cached_request(self.cache.as_ref(), key, self.cache_ttl, move || async move {
            let t0 = Instant::now();
            counter!("jobs_source_requests_total", "source" => self.source.as_str()).increment(1);

            let resp = request
                .send()
                .await
                .map_err(|e| SourceError::transport(self.source, e))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(SourceError::SourceApi {
                    board: self.source,
                    status: status.as_u16(),
                });
            }
            let body: Value = resp.json().await.map_err(|e| SourceError::Decode {
                board: self.source,
                message: e.to_string(),
            })?;

            histogram!("jobs_source_fetch_ms", "source" => self.source.as_str())
                .record(t0.elapsed().as_secs_f64() * 1_000.0);
            Ok(body)
        })
        .await
    }

    pub fn decode_error(&self, message: impl Into<String>) -> SourceError {
        SourceError::Decode {
            board: self.source,
            message: message.into(),
        }
    }
}

/// Build the adapter for `ctx.source`. LinkedIn gets its own
/// [`auth::LinkedInAuth`]; callers that also serve the OAuth routes build the
/// auth once and use [`linkedin::LinkedInAdapter::new`] directly.
pub fn build_adapter(ctx: SourceContext) -> Arc<dyn SourceAdapter> {
    match ctx.source {
        SourceId::Linkedin => {
            let auth = Arc::new(auth::LinkedInAuth::from_context(&ctx));
            Arc::new(linkedin::LinkedInAdapter::new(ctx, auth))
        }
        SourceId::Indeed => Arc::new(indeed::IndeedAdapter::new(ctx)),
        SourceId::Adzuna => Arc::new(adzuna::AdzunaAdapter::new(ctx)),
        SourceId::Reed => Arc::new(reed::ReedAdapter::new(ctx)),
        SourceId::Remoteok => Arc::new(remoteok::RemoteOkAdapter::new(ctx)),
    }
}

/// Records array at `pointer` (e.g. `/results`), or a decode error.
pub(crate) fn records<'a>(
    ctx: &SourceContext,
    body: &'a Value,
    pointer: &str,
) -> Result<&'a Vec<Value>, SourceError> {
    body.pointer(pointer)
        .and_then(Value::as_array)
        .ok_or_else(|| ctx.decode_error(format!("missing `{pointer}` array")))
}

/// Best-effort typed view of a raw record: falls back to `T::default()` when
/// the record does not fit the expected shape.
pub(crate) fn lenient<T>(raw: &Value) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    serde_json::from_value(raw.clone()).unwrap_or_default()
}

/// Ids arrive as strings or numbers depending on the board.
pub(crate) fn id_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Numbers sometimes arrive as strings.
pub(crate) fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}
