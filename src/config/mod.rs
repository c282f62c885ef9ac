// src/config/mod.rs
pub mod sources;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::job::SourceId;
pub use sources::{RateLimitConfig, SourceConfig};

pub const ENV_CONFIG_PATH: &str = "JOBS_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/sources.toml";
pub const DEFAULT_JSON_PATH: &str = "config/sources.json";

fn default_priority() -> Vec<SourceId> {
    SourceId::ALL.to_vec()
}
fn default_concurrent() -> usize {
    3
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_cache_ttl_ms() -> u64 {
    30 * 60 * 1_000
}
fn default_user_agent() -> String {
    "job-aggregator/0.1".to_string()
}

/// Static aggregator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Default source ordering when a search names none.
    #[serde(default = "default_priority")]
    pub priority: Vec<SourceId>,
    /// Sources queried in parallel per batch.
    #[serde(default = "default_concurrent")]
    pub concurrent: usize,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-board settings; boards absent here fall back to built-in defaults.
    #[serde(default)]
    pub sources: BTreeMap<SourceId, SourceConfig>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            concurrent: default_concurrent(),
            request_timeout_ms: default_request_timeout_ms(),
            cache_ttl_ms: default_cache_ttl_ms(),
            user_agent: default_user_agent(),
            sources: BTreeMap::new(),
        }
    }
}

impl AggregatorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Effective settings for `id`: explicit entry or built-in default.
    pub fn source(&self, id: SourceId) -> SourceConfig {
        self.sources
            .get(&id)
            .cloned()
            .unwrap_or_else(|| SourceConfig::default_for(id))
    }

    /// Coerce, resolve `"ENV"` credentials, and validate.
    pub fn finalize(mut self) -> Result<Self> {
        if self.concurrent == 0 {
            tracing::warn!("concurrent=0 in config, using 1");
            self.concurrent = 1;
        }
        let mut seen = std::collections::HashSet::new();
        self.priority.retain(|id| seen.insert(*id));

        for (id, cfg) in self.sources.iter_mut() {
            cfg.resolve_env(*id)?;
            cfg.validate(*id)?;
        }
        Ok(self)
    }
}

/// Load configuration from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<AggregatorConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())?.finalize()
}

/// Load configuration using env var + fallbacks:
/// 1) $JOBS_CONFIG_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) built-in defaults
pub fn load_default() -> Result<AggregatorConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_JSON_PATH);
    if json_p.exists() {
        return load_from(&json_p);
    }
    AggregatorConfig::default().finalize()
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AggregatorConfig> {
    match hint_ext {
        "toml" => toml::from_str(s).context("parsing TOML config"),
        "json" => serde_json::from_str(s).context("parsing JSON config"),
        _ => serde_json::from_str(s)
            .or_else(|_| toml::from_str(s))
            .map_err(|_| anyhow!("unsupported config format")),
    }
}
