// tests/aggregator_search.rs
//
// Aggregator behaviour against in-process mock adapters (no network):
// - partial failure tolerance
// - sequential batches capped at `concurrent` in-flight calls
// - deterministic source-order output regardless of completion order
// - per-call timeout
// - dedup + best-effort persistence
// - smart search filtering and ranking

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use job_aggregator::aggregator::{Aggregator, AggregatorSettings};
use job_aggregator::cache::ResponseCache;
use job_aggregator::error::{AggregatorError, SourceError, StorageError};
use job_aggregator::job::{Job, Preferences, SearchOptions, SourceId};
use job_aggregator::sources::SourceAdapter;
use job_aggregator::storage::{BulkOutcome, MemoryStore, Storage};

#[derive(Default)]
struct Tracker {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    spans: Mutex<Vec<(SourceId, Instant, Instant)>>,
}

enum Behavior {
    Jobs(Vec<Job>),
    Fail,
    Hang,
}

struct MockAdapter {
    id: SourceId,
    behavior: Behavior,
    delay: Duration,
    tracker: Arc<Tracker>,
    calls: AtomicUsize,
}

impl MockAdapter {
    fn new(id: SourceId, behavior: Behavior, delay_ms: u64, tracker: &Arc<Tracker>) -> Arc<Self> {
        Arc::new(Self {
            id,
            behavior,
            delay: Duration::from_millis(delay_ms),
            tracker: tracker.clone(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn source(&self) -> SourceId {
        self.id
    }

    async fn search_jobs(
        &self,
        _query: &str,
        _location: &str,
        _options: &SearchOptions,
    ) -> Result<Vec<Job>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let start = Instant::now();
        let now = self.tracker.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.tracker.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let outcome = match &self.behavior {
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(vec![])
            }
            Behavior::Fail => {
                tokio::time::sleep(self.delay).await;
                Err(SourceError::SourceApi {
                    board: self.id,
                    status: 500,
                })
            }
            Behavior::Jobs(jobs) => {
                tokio::time::sleep(self.delay).await;
                Ok(jobs.clone())
            }
        };

        self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.tracker
            .spans
            .lock()
            .unwrap()
            .push((self.id, start, Instant::now()));
        outcome
    }

    fn normalize_job(&self, _raw: &Value) -> Job {
        Job::blank(self.id, "mock")
    }
}

fn job(source: SourceId, ext: &str, title: &str, company: &str) -> Job {
    let mut j = Job::blank(source, ext);
    j.title = title.into();
    j.company = company.into();
    j.location = "Remote".into();
    j
}

fn settings(concurrent: usize, timeout_ms: u64) -> AggregatorSettings {
    AggregatorSettings {
        priority: SourceId::ALL.to_vec(),
        concurrent,
        request_timeout: Duration::from_millis(timeout_ms),
    }
}

fn aggregator(adapters: Vec<Arc<dyn SourceAdapter>>, store: Arc<MemoryStore>, s: AggregatorSettings) -> Aggregator {
    Aggregator::from_parts(adapters, store, s)
}

#[tokio::test]
async fn one_failing_source_does_not_fail_the_search() {
    let t = Arc::new(Tracker::default());
    let store = Arc::new(MemoryStore::new());
    let agg = aggregator(
        vec![
            MockAdapter::new(SourceId::Linkedin, Behavior::Jobs(vec![job(SourceId::Linkedin, "1", "A", "X")]), 5, &t),
            MockAdapter::new(SourceId::Indeed, Behavior::Fail, 5, &t),
            MockAdapter::new(SourceId::Adzuna, Behavior::Jobs(vec![job(SourceId::Adzuna, "2", "B", "Y")]), 5, &t),
        ],
        store,
        settings(3, 1_000),
    );

    let res = agg
        .search_jobs("rust", "", &SearchOptions::default())
        .await
        .expect("partial failure must not escape");

    assert_eq!(res.jobs.len(), 2);
    assert_eq!(res.total, 2);
    assert_eq!(res.errors.len(), 1);
    assert_eq!(res.errors[0].source, "indeed");
    assert_eq!(res.errors[0].error, "indeed API error: HTTP 500");
    assert_eq!(res.sources, vec!["linkedin", "indeed", "adzuna"]);
}

#[tokio::test]
async fn every_source_failing_yields_empty_jobs_and_all_errors() {
    let t = Arc::new(Tracker::default());
    let agg = aggregator(
        vec![
            MockAdapter::new(SourceId::Reed, Behavior::Fail, 1, &t),
            MockAdapter::new(SourceId::Remoteok, Behavior::Fail, 1, &t),
        ],
        Arc::new(MemoryStore::new()),
        settings(3, 1_000),
    );
    let res = agg
        .search_jobs("x", "", &SearchOptions::default())
        .await
        .unwrap();
    assert!(res.jobs.is_empty());
    assert_eq!(res.errors.len(), 2);
}

#[tokio::test]
async fn batches_run_sequentially_with_capped_in_flight_calls() {
    let t = Arc::new(Tracker::default());
    // Earlier sources are slower, so completion order inverts source order.
    let sources = SourceId::ALL;
    let adapters: Vec<Arc<dyn SourceAdapter>> = sources
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let delay = 60 - (i as u64) * 10;
            MockAdapter::new(
                *id,
                Behavior::Jobs(vec![job(*id, "1", &format!("role-{i}"), "Co")]),
                delay,
                &t,
            ) as Arc<dyn SourceAdapter>
        })
        .collect();
    let agg = aggregator(adapters, Arc::new(MemoryStore::new()), settings(3, 5_000));

    let opts = SearchOptions {
        sources: Some(sources.to_vec()),
        concurrent: Some(2),
        ..Default::default()
    };
    let res = agg.search_jobs("dev", "", &opts).await.unwrap();

    assert_eq!(t.max_in_flight.load(Ordering::SeqCst), 2);

    let ids: Vec<_> = res.jobs.iter().map(|j| j.source).collect();
    assert_eq!(ids, sources.to_vec(), "output follows source order");

    // Batch N+1 starts only after every call in batch N has settled.
    let spans = t.spans.lock().unwrap().clone();
    let span = |id: SourceId| spans.iter().find(|s| s.0 == id).copied().unwrap();
    let batch1_end = span(SourceId::Linkedin).2.max(span(SourceId::Indeed).2);
    assert!(span(SourceId::Adzuna).1 >= batch1_end);
    assert!(span(SourceId::Reed).1 >= batch1_end);
    let batch2_end = span(SourceId::Adzuna).2.max(span(SourceId::Reed).2);
    assert!(span(SourceId::Remoteok).1 >= batch2_end);
}

#[tokio::test]
async fn hanging_source_is_recorded_as_timeout() {
    let t = Arc::new(Tracker::default());
    let agg = aggregator(
        vec![
            MockAdapter::new(SourceId::Reed, Behavior::Hang, 0, &t),
            MockAdapter::new(SourceId::Adzuna, Behavior::Jobs(vec![job(SourceId::Adzuna, "1", "A", "X")]), 1, &t),
        ],
        Arc::new(MemoryStore::new()),
        settings(2, 50),
    );

    let opts = SearchOptions {
        sources: Some(vec![SourceId::Reed, SourceId::Adzuna]),
        ..Default::default()
    };
    let started = Instant::now();
    let res = agg.search_jobs("x", "", &opts).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(res.jobs.len(), 1);
    assert_eq!(res.errors.len(), 1);
    assert_eq!(res.errors[0].source, "reed");
    assert_eq!(res.errors[0].error, "timeout");
}

#[tokio::test]
async fn unconfigured_source_is_rejected_up_front() {
    let t = Arc::new(Tracker::default());
    let reed = MockAdapter::new(SourceId::Reed, Behavior::Jobs(vec![]), 1, &t);
    let agg = aggregator(vec![reed.clone()], Arc::new(MemoryStore::new()), settings(3, 1_000));

    let opts = SearchOptions {
        sources: Some(vec![SourceId::Reed, SourceId::Linkedin]),
        ..Default::default()
    };
    let err = agg.search_jobs("x", "", &opts).await.unwrap_err();
    assert!(matches!(err, AggregatorError::SourceNotConfigured(SourceId::Linkedin)));
    assert_eq!(reed.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn duplicates_merge_and_survivors_are_persisted() {
    let t = Arc::new(Tracker::default());
    let first = job(SourceId::Indeed, "1", "Rust Dev", "Acme");
    let mut dup = job(SourceId::Reed, "9", "RUST DEV", "acme");
    dup.salary = "$80k+".into();
    dup.requirements = vec!["a".into(), "b".into(), "c".into()];
    let other = job(SourceId::Reed, "10", "Go Dev", "Acme");

    let store = Arc::new(MemoryStore::new());
    let agg = aggregator(
        vec![
            MockAdapter::new(SourceId::Indeed, Behavior::Jobs(vec![first]), 1, &t),
            MockAdapter::new(SourceId::Reed, Behavior::Jobs(vec![dup, other]), 1, &t),
        ],
        store.clone(),
        settings(3, 1_000),
    );
    let opts = SearchOptions {
        sources: Some(vec![SourceId::Indeed, SourceId::Reed]),
        ..Default::default()
    };
    let res = agg.search_jobs("dev", "", &opts).await.unwrap();

    assert_eq!(res.total, 2);
    assert_eq!(res.jobs[0].id, "indeed_1");
    assert_eq!(res.jobs[0].salary, "$80k+");
    assert_eq!(res.jobs[0].requirements.len(), 3);
    assert_eq!(store.collection_len("jobs"), 2);

    let stored = agg.job_details("indeed_1").await.unwrap().expect("persisted");
    assert_eq!(stored.salary, "$80k+");
    assert!(agg.job_details("missing").await.unwrap().is_none());
}

struct BrokenStore;

#[async_trait]
impl ResponseCache for BrokenStore {
    async fn get_cached(&self, _key: &str) -> Option<Value> {
        None
    }
    async fn set_cached(&self, _key: &str, _value: Value, _ttl: Duration) {}
}

#[async_trait]
impl Storage for BrokenStore {
    async fn bulk_upsert(
        &self,
        _collection: &str,
        _items: Vec<(String, Value)>,
    ) -> Result<BulkOutcome, StorageError> {
        Err(StorageError::Unavailable("disk on fire".into()))
    }
    async fn get(&self, _collection: &str, _id: &str) -> Result<Option<Value>, StorageError> {
        Err(StorageError::Unavailable("disk on fire".into()))
    }
}

#[tokio::test]
async fn storage_failure_is_not_fatal() {
    let t = Arc::new(Tracker::default());
    let agg = Aggregator::from_parts(
        vec![MockAdapter::new(SourceId::Adzuna, Behavior::Jobs(vec![job(SourceId::Adzuna, "1", "A", "X")]), 1, &t)],
        Arc::new(BrokenStore),
        settings(3, 1_000),
    );
    let res = agg
        .search_jobs("a", "", &SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(res.jobs.len(), 1);
    assert!(res.errors.is_empty());
    assert!(agg.job_details("adzuna_1").await.is_err());
}

#[tokio::test]
async fn smart_search_filters_scores_and_ranks() {
    let t = Arc::new(Tracker::default());
    let now = Utc::now();

    let mut rust_acme = job(SourceId::Adzuna, "1", "Rust Engineer", "Acme");
    rust_acme.date_posted = now - chrono::Duration::days(30);
    let mut rust_fresh = job(SourceId::Adzuna, "2", "Backend Engineer", "Initech");
    rust_fresh.description = "We use Rust and Postgres".into();
    rust_fresh.date_posted = now - chrono::Duration::days(1);
    let mut java = job(SourceId::Adzuna, "3", "Java Engineer", "Globex");
    java.date_posted = now;
    let mut excluded = job(SourceId::Adzuna, "4", "Rust Engineer", "Evil Corp");
    excluded.date_posted = now;

    let agg = aggregator(
        vec![MockAdapter::new(
            SourceId::Adzuna,
            Behavior::Jobs(vec![rust_acme, rust_fresh, java, excluded]),
            1,
            &t,
        )],
        Arc::new(MemoryStore::new()),
        settings(3, 1_000),
    );

    let prefs = Preferences {
        skills: vec!["rust".into()],
        exclude_companies: vec!["evil".into()],
        preferred_companies: vec!["ACME".into()],
        ..Default::default()
    };
    let res = agg.smart_search("engineer", &prefs).await.unwrap();

    assert_eq!(res.result.total, 4);
    assert_eq!(res.filtered, 2);
    let ids: Vec<_> = res.result.jobs.iter().map(|j| j.id.as_str()).collect();
    // acme: 50 + 10 + 5 = 65; initech: 10 + 5 + 10 = 25
    assert_eq!(ids, vec!["adzuna_1", "adzuna_2"]);
    assert_eq!(res.result.jobs[0].score, Some(65));
    assert_eq!(res.result.jobs[1].score, Some(25));
}

#[tokio::test]
async fn smart_search_ties_keep_dedup_order() {
    let t = Arc::new(Tracker::default());
    let a = job(SourceId::Reed, "1", "Dev A", "Co");
    let b = job(SourceId::Reed, "2", "Dev B", "Co");
    let agg = aggregator(
        vec![MockAdapter::new(SourceId::Reed, Behavior::Jobs(vec![a, b]), 1, &t)],
        Arc::new(MemoryStore::new()),
        settings(3, 1_000),
    );
    let res = agg.smart_search("", &Preferences::default()).await.unwrap();
    let ids: Vec<_> = res.result.jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["reed_1", "reed_2"]);
    assert_eq!(res.filtered, 0);
}

#[tokio::test]
async fn single_source_failure_becomes_error_report() {
    let t = Arc::new(Tracker::default());
    let agg = aggregator(
        vec![MockAdapter::new(SourceId::Indeed, Behavior::Fail, 1, &t)],
        Arc::new(MemoryStore::new()),
        settings(3, 1_000),
    );
    let report = agg
        .search_source(SourceId::Indeed, "x", "", &SearchOptions::default())
        .await
        .unwrap_err();
    assert!(report.error);
    assert_eq!(report.api, "indeed");
    assert_eq!(report.message, "indeed API error: HTTP 500");

    let missing = agg
        .search_source(SourceId::Reed, "x", "", &SearchOptions::default())
        .await
        .unwrap_err();
    assert_eq!(missing.api, "reed");
}
