//! # Aggregator
//! Fans a search out to the configured job boards in sequential batches,
//! then merges, deduplicates, persists, and (for smart search) filters and
//! ranks the results.
//!
//! Within a batch every adapter call runs concurrently and is awaited to
//! completion; a failing or hanging source contributes an `errors` entry and
//! an empty job list instead of failing the search.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use metrics::{counter, histogram};

use crate::cache::ResponseCache;
use crate::config::AggregatorConfig;
use crate::error::{AggregatorError, ErrorReport, SourceError, StorageError};
use crate::job::{
    Job, Preferences, SearchOptions, SearchResult, SmartSearchResult, SourceFailure, SourceId,
};
use crate::metrics::describe_metrics;
use crate::rate_limiter::RateLimiter;
use crate::scoring::{calculate_job_score, ScoreContext};
use crate::sources::auth::LinkedInAuth;
use crate::sources::linkedin::LinkedInAdapter;
use crate::sources::{build_adapter, SourceAdapter, SourceContext};
use crate::storage::Storage;

/// Collection persisted jobs are upserted into.
pub const JOBS_COLLECTION: &str = "jobs";

/// Search-wide knobs, separate from the per-board settings.
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub priority: Vec<SourceId>,
    pub concurrent: usize,
    pub request_timeout: Duration,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self::from(&AggregatorConfig::default())
    }
}

impl From<&AggregatorConfig> for AggregatorSettings {
    fn from(cfg: &AggregatorConfig) -> Self {
        Self {
            priority: cfg.priority.clone(),
            concurrent: cfg.concurrent.max(1),
            request_timeout: cfg.request_timeout(),
        }
    }
}

pub struct Aggregator {
    adapters: HashMap<SourceId, Arc<dyn SourceAdapter>>,
    storage: Arc<dyn Storage>,
    settings: AggregatorSettings,
    linkedin_auth: Option<Arc<LinkedInAuth>>,
}

impl Aggregator {
    /// Wire every enabled board with its own rate limiter and the shared
    /// cache/storage handle.
    pub fn init<S>(config: &AggregatorConfig, storage: Arc<S>) -> Result<Self, AggregatorError>
    where
        S: Storage + 'static,
    {
        describe_metrics();

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AggregatorError::Config(anyhow::Error::new(e)))?;
        let cache: Arc<dyn ResponseCache> = storage.clone();

        let mut adapters: HashMap<SourceId, Arc<dyn SourceAdapter>> = HashMap::new();
        let mut linkedin_auth = None;
        for id in SourceId::ALL {
            let source_cfg = config.source(id);
            if !source_cfg.enabled {
                tracing::debug!(target: "aggregator", source = %id, "source disabled");
                continue;
            }
            let limiter = Arc::new(RateLimiter::new(
                id,
                source_cfg.rate_limit.requests,
                Duration::from_millis(source_cfg.rate_limit.window_ms),
            ));
            let ctx = SourceContext {
                source: id,
                config: source_cfg,
                http: http.clone(),
                limiter,
                cache: cache.clone(),
                cache_ttl: config.cache_ttl(),
            };
            let adapter: Arc<dyn SourceAdapter> = if id == SourceId::Linkedin {
                // One auth for both the adapter and the OAuth routes.
                let auth = Arc::new(LinkedInAuth::from_context(&ctx));
                linkedin_auth = Some(auth.clone());
                Arc::new(LinkedInAdapter::new(ctx, auth))
            } else {
                build_adapter(ctx)
            };
            adapters.insert(id, adapter);
        }

        tracing::info!(
            target: "aggregator",
            sources = ?adapters.keys().map(SourceId::as_str).collect::<Vec<_>>(),
            concurrent = config.concurrent,
            "aggregator initialized"
        );

        Ok(Self {
            adapters,
            storage,
            settings: AggregatorSettings::from(config),
            linkedin_auth,
        })
    }

    /// Assemble from ready-made adapters (keyed by their own `source()`).
    pub fn from_parts(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        storage: Arc<dyn Storage>,
        settings: AggregatorSettings,
    ) -> Self {
        describe_metrics();
        Self {
            adapters: adapters.into_iter().map(|a| (a.source(), a)).collect(),
            storage,
            settings,
            linkedin_auth: None,
        }
    }

    pub fn with_linkedin_auth(mut self, auth: LinkedInAuth) -> Self {
        self.linkedin_auth = Some(Arc::new(auth));
        self
    }

    pub fn linkedin_auth(&self) -> Option<&LinkedInAuth> {
        self.linkedin_auth.as_deref()
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Configured sources in priority order, then any others.
    pub fn configured_sources(&self) -> Vec<SourceId> {
        let mut out: Vec<SourceId> = self
            .settings
            .priority
            .iter()
            .copied()
            .filter(|id| self.adapters.contains_key(id))
            .collect();
        for id in SourceId::ALL {
            if self.adapters.contains_key(&id) && !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }

    fn adapter(&self, id: SourceId) -> Result<Arc<dyn SourceAdapter>, AggregatorError> {
        self.adapters
            .get(&id)
            .cloned()
            .ok_or(AggregatorError::SourceNotConfigured(id))
    }

    /// One adapter call bounded by the request timeout.
    async fn call_adapter(
        &self,
        adapter: Arc<dyn SourceAdapter>,
        query: &str,
        location: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Job>, SourceError> {
        let timeout = self.settings.request_timeout;
        match tokio::time::timeout(timeout, adapter.search_jobs(query, location, options)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SourceError::Timeout {
                board: adapter.source(),
                after_ms: timeout.as_millis() as u64,
            }),
        }
    }

    pub async fn search_jobs(
        &self,
        query: &str,
        location: &str,
        options: &SearchOptions,
    ) -> Result<SearchResult, AggregatorError> {
        let t0 = Instant::now();

        let sources = options
            .sources
            .clone()
            .unwrap_or_else(|| self.configured_sources());
        let adapters = sources
            .iter()
            .map(|id| self.adapter(*id))
            .collect::<Result<Vec<_>, _>>()?;
        let concurrent = options
            .concurrent
            .unwrap_or(self.settings.concurrent)
            .max(1);
        let adapter_options = options.for_adapter();

        let mut collected: Vec<Job> = Vec::new();
        let mut errors: Vec<SourceFailure> = Vec::new();

        for batch in adapters.chunks(concurrent) {
            let calls = batch.iter().map(|adapter| {
                self.call_adapter(adapter.clone(), query, location, &adapter_options)
            });
            // Results come back in batch order regardless of completion order.
            let outcomes = join_all(calls).await;

            for (adapter, outcome) in batch.iter().zip(outcomes) {
                let source = adapter.source();
                match outcome {
                    Ok(mut jobs) => {
                        tracing::debug!(target: "aggregator", source = %source, jobs = jobs.len(), "source ok");
                        collected.append(&mut jobs);
                    }
                    Err(e) => {
                        tracing::warn!(target: "aggregator", source = %source, error = %e, "source failed");
                        counter!("jobs_source_errors_total", "source" => source.as_str())
                            .increment(1);
                        errors.push(SourceFailure {
                            source: source.to_string(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        let before = collected.len();
        let jobs = deduplicate(collected);
        counter!("jobs_dedup_total").increment((before - jobs.len()) as u64);

        self.persist(&jobs).await;

        let elapsed_ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("jobs_search_duration_ms").record(elapsed_ms);
        tracing::info!(
            target: "aggregator",
            query,
            sources = sources.len(),
            total = jobs.len(),
            errors = errors.len(),
            elapsed_ms = elapsed_ms as u64,
            "search complete"
        );

        Ok(SearchResult {
            total: jobs.len(),
            jobs,
            sources: sources.iter().map(|s| s.to_string()).collect(),
            errors,
            timestamp: Utc::now(),
        })
    }

    /// Best-effort upsert; failures are logged, never returned.
    async fn persist(&self, jobs: &[Job]) {
        if jobs.is_empty() {
            return;
        }
        let items: Vec<(String, serde_json::Value)> = jobs
            .iter()
            .filter_map(|j| serde_json::to_value(j).ok().map(|v| (j.id.clone(), v)))
            .collect();

        match self.storage.bulk_upsert(JOBS_COLLECTION, items).await {
            Ok(outcome) => {
                counter!("jobs_persisted_total").increment(outcome.succeeded as u64);
                if outcome.failed > 0 {
                    tracing::warn!(target: "aggregator", failed = outcome.failed, "some jobs not persisted");
                }
            }
            Err(e) => {
                tracing::warn!(target: "aggregator", error = %e, "persisting jobs failed");
            }
        }
    }

    /// Search with preference-derived options, then filter by skills and
    /// excluded companies, score, and rank.
    pub async fn smart_search(
        &self,
        query: &str,
        preferences: &Preferences,
    ) -> Result<SmartSearchResult, AggregatorError> {
        let options = preferences.to_search_options();
        let location = preferences.location.as_deref().unwrap_or_default();
        let mut result = self.search_jobs(query, location, &options).await?;
        let total = result.total;

        let skills: Vec<String> = preferences
            .skills
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if !skills.is_empty() {
            result.jobs.retain(|job| {
                let text = job.search_text();
                skills.iter().any(|s| text.contains(s.as_str()))
            });
        }

        let excluded: Vec<String> = preferences
            .exclude_companies
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        if !excluded.is_empty() {
            result.jobs.retain(|job| {
                let company = job.company.to_lowercase();
                !excluded.iter().any(|c| company.contains(c.as_str()))
            });
        }

        let ctx = ScoreContext {
            skills: &preferences.skills,
            preferred_companies: &preferences.preferred_companies,
            query,
        };
        for job in result.jobs.iter_mut() {
            job.score = Some(calculate_job_score(job, &ctx));
        }
        // sort_by is stable: ties keep dedup order.
        result
            .jobs
            .sort_by(|a, b| b.score.unwrap_or(0).cmp(&a.score.unwrap_or(0)));

        let filtered = total - result.jobs.len();
        Ok(SmartSearchResult { result, filtered })
    }

    /// Query a single board, reporting failure as an [`ErrorReport`].
    pub async fn search_source(
        &self,
        source: SourceId,
        query: &str,
        location: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Job>, ErrorReport> {
        let adapter = self
            .adapter(source)
            .map_err(|e| ErrorReport::new(source, e.to_string()))?;
        self.call_adapter(adapter, query, location, &options.for_adapter())
            .await
            .map_err(|e| {
                tracing::warn!(target: "aggregator", source = %source, error = %e, "source failed");
                counter!("jobs_source_errors_total", "source" => source.as_str()).increment(1);
                ErrorReport::from_source_error(&e)
            })
    }

    /// Previously persisted job by id.
    pub async fn job_details(&self, id: &str) -> Result<Option<Job>, AggregatorError> {
        let Some(raw) = self.storage.get(JOBS_COLLECTION, id).await? else {
            return Ok(None);
        };
        let job: Job = serde_json::from_value(raw).map_err(StorageError::from)?;
        Ok(Some(job))
    }
}

/// First-wins merge on the lowercased `title_company_location` key.
///
/// Later duplicates only backfill the kept record: a listed salary replaces
/// "Not specified", and a strictly longer requirements list replaces the
/// existing one. Everything else comes from the first occurrence.
pub fn deduplicate(jobs: Vec<Job>) -> Vec<Job> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(jobs.len());
    let mut out: Vec<Job> = Vec::with_capacity(jobs.len());

    for job in jobs {
        let key = job.dedup_key();
        match index.get(&key) {
            Some(&i) => {
                let kept = &mut out[i];
                if !kept.has_salary() && job.has_salary() {
                    kept.salary = job.salary;
                }
                if job.requirements.len() > kept.requirements.len() {
                    kept.requirements = job.requirements;
                }
            }
            None => {
                index.insert(key, out.len());
                out.push(job);
            }
        }
    }
    out
}
