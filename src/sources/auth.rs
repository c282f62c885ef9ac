// src/sources/auth.rs
//! LinkedIn OAuth 2.0 authorization-code flow.
//!
//! The access token lives in the shared response cache under
//! [`TOKEN_KEY`] with the TTL LinkedIn reports, so an expired token simply
//! reads as absent and the adapter answers `AuthenticationRequired`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::cache::ResponseCache;
use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::job::SourceId;
use crate::sources::SourceContext;

pub const TOKEN_KEY: &str = "linkedin_access_token";
const SCOPE: &str = "r_liteprofile r_emailaddress";
/// Used when the token response omits `expires_in`.
const DEFAULT_EXPIRES_IN: u64 = 3_600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Access token persisted in the response cache with its expiry as TTL.
#[derive(Clone)]
pub struct TokenStore {
    cache: Arc<dyn ResponseCache>,
}

impl TokenStore {
    pub fn new(cache: Arc<dyn ResponseCache>) -> Self {
        Self { cache }
    }

    pub async fn load(&self) -> Option<AccessToken> {
        self.cache
            .get_cached(TOKEN_KEY)
            .await
            .and_then(|v| serde_json::from_value::<AccessToken>(v).ok())
            .filter(|t| !t.access_token.is_empty())
    }

    pub async fn save(&self, token: &AccessToken) {
        let ttl = Duration::from_secs(token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN));
        let value = serde_json::to_value(token).unwrap_or(Value::Null);
        self.cache.set_cached(TOKEN_KEY, value, ttl).await;
    }
}

#[derive(Clone)]
pub struct LinkedInAuth {
    config: SourceConfig,
    http: reqwest::Client,
    tokens: TokenStore,
}

impl LinkedInAuth {
    pub fn new(config: SourceConfig, http: reqwest::Client, cache: Arc<dyn ResponseCache>) -> Self {
        Self {
            config,
            http,
            tokens: TokenStore::new(cache),
        }
    }

    /// Auth sharing the adapter's config, HTTP client, and token cache.
    pub fn from_context(ctx: &SourceContext) -> Self {
        Self::new(ctx.config.clone(), ctx.http.clone(), ctx.cache.clone())
    }

    fn required(&self, value: &Option<String>, field: &'static str) -> Result<String, SourceError> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(SourceError::MissingCredentials {
                board: SourceId::Linkedin,
                field,
            })
    }

    /// Consent page URL the user must visit. A fresh `state` is derived when
    /// none is given.
    pub fn authorization_url(&self, state: Option<&str>) -> Result<String, SourceError> {
        let auth_url = self.required(&self.config.auth_url, "auth_url")?;
        let client_id = self.required(&self.config.client_id, "client_id")?;
        let redirect_uri = self.required(&self.config.redirect_uri, "redirect_uri")?;
        let state = state.map_or_else(fresh_state, str::to_string);

        let url = reqwest::Url::parse_with_params(
            &auth_url,
            &[
                ("response_type", "code"),
                ("client_id", client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("state", state.as_str()),
                ("scope", SCOPE),
            ],
        )
        .map_err(|e| SourceError::Decode {
            board: SourceId::Linkedin,
            message: format!("invalid auth_url: {e}"),
        })?;
        Ok(url.into())
    }

    /// Trade an authorization code for an access token and store it.
    pub async fn exchange_code(&self, code: &str) -> Result<AccessToken, SourceError> {
        let token_url = self.required(&self.config.token_url, "token_url")?;
        let client_id = self.required(&self.config.client_id, "client_id")?;
        let client_secret = self.required(&self.config.client_secret, "client_secret")?;
        let redirect_uri = self.required(&self.config.redirect_uri, "redirect_uri")?;

        let resp = self
            .http
            .post(&token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::transport(SourceId::Linkedin, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::SourceApi {
                board: SourceId::Linkedin,
                status: status.as_u16(),
            });
        }
        let token: AccessToken = resp.json().await.map_err(|e| SourceError::Decode {
            board: SourceId::Linkedin,
            message: e.to_string(),
        })?;

        self.store_token(&token).await;
        tracing::info!(target: "sources", expires_in = ?token.expires_in, "linkedin token stored");
        Ok(token)
    }

    pub async fn store_token(&self, token: &AccessToken) {
        self.tokens.save(token).await;
    }

    /// Current bearer token, or `AuthenticationRequired` carrying the consent
    /// URL when none is stored or it has expired.
    pub async fn access_token(&self) -> Result<String, SourceError> {
        match self.tokens.load().await {
            Some(token) => Ok(token.access_token),
            None => Err(SourceError::AuthenticationRequired {
                board: SourceId::Linkedin,
                authorize_url: self.authorization_url(None).ok(),
            }),
        }
    }
}

fn fresh_state() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let digest = Sha256::digest(nanos.to_le_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}
