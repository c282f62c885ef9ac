use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tower_http::cors::CorsLayer;

use crate::aggregator::Aggregator;
use crate::error::{AggregatorError, SourceError};
use crate::job::{Job, Preferences, SearchOptions, SearchResult, SmartSearchResult, SourceId};

pub type AppState = Arc<Aggregator>;

/// HTTP-facing error; renders as `{"error": {"code", "message"}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Aggregator(#[from] AggregatorError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Aggregator(
                AggregatorError::SourceNotConfigured(_) | AggregatorError::UnknownSource(_),
            ) => (StatusCode::BAD_REQUEST, "INVALID_SOURCE"),
            ApiError::Aggregator(e) => {
                tracing::error!(error = %e, "aggregator error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            ApiError::Source(SourceError::AuthenticationRequired { .. }) => {
                (StatusCode::UNAUTHORIZED, "AUTHENTICATION_REQUIRED")
            }
            ApiError::Source(SourceError::MissingCredentials { .. }) => {
                (StatusCode::BAD_REQUEST, "MISSING_CREDENTIALS")
            }
            ApiError::Source(SourceError::RateLimitExceeded { .. }) => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED")
            }
            ApiError::Source(_) => (StatusCode::BAD_GATEWAY, "SOURCE_ERROR"),
        };
        let body = Json(json!({
            "error": { "code": code, "message": self.to_string() }
        }));
        (status, body).into_response()
    }
}

pub fn router(aggregator: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search))
        .route("/smart-search", post(smart_search))
        .route("/sources/{source}/search", get(search_source))
        .route("/jobs/{id}", get(job_details))
        .route("/auth/linkedin/url", get(linkedin_url))
        .route("/auth/linkedin/callback", get(linkedin_callback))
        .layer(CorsLayer::very_permissive())
        .with_state(aggregator)
}

/// `/search` query string. `sources` is comma-separated.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub q: String,
    pub location: String,
    pub sources: Option<String>,
    pub concurrent: Option<usize>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub experience_level: Option<String>,
    pub job_type: Option<String>,
    pub days_ago: Option<u32>,
    pub min_salary: Option<u64>,
    pub max_salary: Option<u64>,
    pub radius: Option<u32>,
    pub sort_by: Option<String>,
}

impl SearchQuery {
    fn options(&self) -> Result<SearchOptions, ApiError> {
        let sources = match self.sources.as_deref() {
            Some(list) if !list.trim().is_empty() => Some(parse_sources(list)?),
            _ => None,
        };
        Ok(SearchOptions {
            sources,
            concurrent: self.concurrent,
            limit: self.limit,
            offset: self.offset,
            experience_level: self.experience_level.clone(),
            job_type: self.job_type.clone(),
            days_ago: self.days_ago,
            min_salary: self.min_salary,
            max_salary: self.max_salary,
            radius: self.radius,
            sort_by: self.sort_by.clone(),
        })
    }
}

fn parse_sources(list: &str) -> Result<Vec<SourceId>, ApiError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<SourceId>().map_err(ApiError::from))
        .collect()
}

async fn search(
    State(agg): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<SearchResult>, ApiError> {
    let options = q.options()?;
    let result = agg.search_jobs(&q.q, &q.location, &options).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct SmartSearchReq {
    query: String,
    #[serde(default)]
    preferences: Preferences,
}

async fn smart_search(
    State(agg): State<AppState>,
    Json(body): Json<SmartSearchReq>,
) -> Result<Json<SmartSearchResult>, ApiError> {
    let result = agg.smart_search(&body.query, &body.preferences).await?;
    Ok(Json(result))
}

async fn search_source(
    State(agg): State<AppState>,
    Path(source): Path<String>,
    Query(q): Query<SearchQuery>,
) -> Result<Response, ApiError> {
    let source: SourceId = source.parse()?;
    let options = q.options()?;
    let resp = match agg.search_source(source, &q.q, &q.location, &options).await {
        Ok(jobs) => Json(jobs).into_response(),
        Err(report) => (StatusCode::BAD_GATEWAY, Json(report)).into_response(),
    };
    Ok(resp)
}

async fn job_details(
    State(agg): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    agg.job_details(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("job `{id}`")))
}

async fn linkedin_url(State(agg): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let auth = agg
        .linkedin_auth()
        .ok_or(AggregatorError::SourceNotConfigured(SourceId::Linkedin))?;
    let url = auth.authorization_url(None)?;
    Ok(Json(json!({ "url": url })))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
}

async fn linkedin_callback(
    State(agg): State<AppState>,
    Query(q): Query<CallbackQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(err) = q.error {
        return Err(ApiError::Validation(format!("authorization denied: {err}")));
    }
    let code = q
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("missing `code`".into()))?;
    let auth = agg
        .linkedin_auth()
        .ok_or(AggregatorError::SourceNotConfigured(SourceId::Linkedin))?;
    let token = auth.exchange_code(&code).await?;
    Ok(Json(json!({
        "authenticated": true,
        "expiresIn": token.expires_in,
    })))
}
