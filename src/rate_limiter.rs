//! # Rate Limiter
//! Sliding-window admission control, one instance per job board.
//!
//! Keeps the instants of granted requests inside the trailing window.
//! Every check prunes entries older than the window before deciding, so the
//! buffer never holds more than `max_requests` timestamps.

use std::{
    collections::VecDeque,
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::error::SourceError;
use crate::job::SourceId;

/// Thread-safe sliding-window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    source: SourceId,
    max_requests: usize,
    window: Duration,
    granted: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(source: SourceId, max_requests: usize, window: Duration) -> Self {
        Self {
            source,
            max_requests,
            window,
            granted: Mutex::new(VecDeque::with_capacity(max_requests.min(1024))),
        }
    }

    /// Admit one request now, or fail with `RateLimitExceeded`.
    pub fn check_limit(&self) -> Result<(), SourceError> {
        self.check_limit_at(Instant::now())
    }

    /// Same as [`check_limit`](Self::check_limit) with an explicit clock.
    pub fn check_limit_at(&self, now: Instant) -> Result<(), SourceError> {
        let mut granted = self
            .granted
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        while let Some(&t) = granted.front() {
            if now.saturating_duration_since(t) >= self.window {
                granted.pop_front();
            } else {
                break;
            }
        }

        if granted.len() < self.max_requests {
            granted.push_back(now);
            tracing::debug!(
                target: "sources",
                source = %self.source,
                in_window = granted.len(),
                "rate limit admitted"
            );
            Ok(())
        } else {
            metrics::counter!("jobs_rate_limited_total", "source" => self.source.as_str())
                .increment(1);
            Err(SourceError::RateLimitExceeded { board: self.source })
        }
    }

    /// Requests granted inside the window ending at `now`.
    pub fn in_window_at(&self, now: Instant) -> usize {
        let granted = self
            .granted
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        granted
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) < self.window)
            .count()
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
