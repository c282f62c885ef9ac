// src/config/sources.rs
use serde::{Deserialize, Serialize};
use std::env;

use crate::job::SourceId;

/// `{requests, window_ms}` admission budget for one board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests: usize,
    pub window_ms: u64,
}

/// Per-board settings. Credential fields set to `"ENV"` are read from
/// `<SOURCE>_<FIELD>` (e.g. `ADZUNA_APP_KEY`) at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub base_url: String,
    pub rate_limit: RateLimitConfig,
    /// Adzuna country segment.
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_key: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub publisher_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// OAuth endpoints (LinkedIn only).
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl SourceConfig {
    pub fn bare(base_url: &str, requests: usize, window_ms: u64) -> Self {
        Self {
            enabled: true,
            base_url: base_url.to_string(),
            rate_limit: RateLimitConfig {
                requests,
                window_ms,
            },
            country: None,
            app_id: None,
            app_key: None,
            api_key: None,
            publisher_id: None,
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            auth_url: None,
            token_url: None,
        }
    }

    /// Built-in endpoint and budget for `id`.
    pub fn default_for(id: SourceId) -> Self {
        match id {
            SourceId::Linkedin => Self {
                auth_url: Some("https://www.linkedin.com/oauth/v2/authorization".into()),
                token_url: Some("https://www.linkedin.com/oauth/v2/accessToken".into()),
                ..Self::bare("https://api.linkedin.com/v2", 100, 60_000)
            },
            SourceId::Indeed => Self::bare("https://api.indeed.com/ads", 100, 60_000),
            SourceId::Adzuna => Self {
                country: Some("us".into()),
                ..Self::bare("https://api.adzuna.com/v1/api", 250, 60_000)
            },
            SourceId::Reed => Self::bare("https://www.reed.co.uk/api/1.0", 200, 60_000),
            SourceId::Remoteok => Self::bare("https://remoteok.com", 60, 60_000),
        }
    }

    /// Resolve every `"ENV"` credential for `id`.
    pub fn resolve_env(&mut self, id: SourceId) -> anyhow::Result<()> {
        let prefix = id.as_str().to_ascii_uppercase();
        for (field, slot) in [
            ("APP_ID", &mut self.app_id),
            ("APP_KEY", &mut self.app_key),
            ("API_KEY", &mut self.api_key),
            ("PUBLISHER_ID", &mut self.publisher_id),
            ("CLIENT_ID", &mut self.client_id),
            ("CLIENT_SECRET", &mut self.client_secret),
        ] {
            let wants_env = slot
                .as_deref()
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("env"));
            if wants_env {
                let var = format!("{prefix}_{field}");
                let value =
                    env::var(&var).map_err(|_| anyhow::anyhow!("Missing {var} env var"))?;
                *slot = Some(value);
            }
        }
        Ok(())
    }

    pub fn validate(&self, id: SourceId) -> anyhow::Result<()> {
        if self.rate_limit.requests == 0 || self.rate_limit.window_ms == 0 {
            anyhow::bail!("{id}: rate_limit requests and window_ms must be non-zero");
        }
        if self.base_url.trim().is_empty() {
            anyhow::bail!("{id}: base_url is empty");
        }
        Ok(())
    }
}
