// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod job;
pub mod metrics;
pub mod rate_limiter;
pub mod scoring;
pub mod sources;
pub mod storage;

// ---- Re-exports for stable public API ----
pub use crate::aggregator::{deduplicate, Aggregator, AggregatorSettings};
pub use crate::api::router;
pub use crate::config::AggregatorConfig;
pub use crate::error::{AggregatorError, ErrorReport, SourceError, StorageError};
pub use crate::job::{Job, Preferences, SearchOptions, SearchResult, SourceId};
pub use crate::storage::{MemoryStore, Storage};
