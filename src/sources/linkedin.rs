// src/sources/linkedin.rs
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::job::{Job, SearchOptions, SourceId};
use crate::sources::auth::LinkedInAuth;
use crate::sources::normalize::{
    clean_inline, extract_requirements, from_epoch, html_to_text, normalize_job_type,
};
use crate::sources::{id_string, lenient, number, records, SourceAdapter, SourceContext};

const DEFAULT_COUNT: u32 = 25;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompanyName {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CompanyDetails {
    company: Option<CompanyName>,
    company_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Text {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ApplyMethod {
    company_apply_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LinkedInJob {
    id: Value,
    title: Option<String>,
    company_details: Option<CompanyDetails>,
    formatted_location: Option<String>,
    description: Option<Text>,
    listed_at: Value,
    apply_method: Option<ApplyMethod>,
    job_posting_url: Option<String>,
    employment_status: Option<String>,
    experience_level: Option<String>,
}

/// LinkedIn job search (`/jobSearch`) behind an OAuth bearer token.
pub struct LinkedInAdapter {
    ctx: SourceContext,
    auth: Arc<LinkedInAuth>,
}

impl LinkedInAdapter {
    /// The adapter reads tokens through `auth`, the same handle that serves
    /// the OAuth routes.
    pub fn new(ctx: SourceContext, auth: Arc<LinkedInAuth>) -> Self {
        Self { ctx, auth }
    }
}

fn company_name(details: Option<CompanyDetails>) -> String {
    details
        .and_then(|d| d.company.and_then(|c| c.name).or(d.company_name))
        .unwrap_or_default()
}

#[async_trait]
impl SourceAdapter for LinkedInAdapter {
    fn source(&self) -> SourceId {
        SourceId::Linkedin
    }

    async fn search_jobs(
        &self,
        query: &str,
        location: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Job>, SourceError> {
        self.ctx.limiter.check_limit()?;
        let token = self.auth.access_token().await?;

        let mut params: Vec<(&str, String)> = vec![
            ("keywords", query.to_string()),
            ("start", options.offset.unwrap_or(0).to_string()),
            ("count", options.limit.unwrap_or(DEFAULT_COUNT).to_string()),
        ];
        if !location.is_empty() {
            params.push(("location", location.to_string()));
        }
        if let Some(level) = options.experience_level.as_deref() {
            params.push(("experienceLevel", level.to_string()));
        }
        if let Some(jt) = options.job_type.as_deref() {
            params.push(("jobType", jt.to_string()));
        }
        if let Some(days) = options.days_ago {
            params.push(("datePosted", days.to_string()));
        }

        let url = format!("{}/jobSearch", self.ctx.base_url());
        let key = self
            .ctx
            .cache_key("jobSearch", &(query, location, options.for_adapter()));
        let request = self
            .ctx
            .http
            .get(&url)
            .bearer_auth(token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .query(&params);

        let body = self.ctx.fetch_json(&key, request).await?;
        let jobs = records(&self.ctx, &body, "/elements")?
            .iter()
            .map(|raw| self.normalize_job(raw))
            .collect();
        Ok(jobs)
    }

    fn normalize_job(&self, raw: &Value) -> Job {
        let r: LinkedInJob = lenient(raw);
        let mut job = Job::blank(SourceId::Linkedin, &id_string(&r.id));

        let description = html_to_text(
            r.description
                .and_then(|d| d.text)
                .as_deref()
                .unwrap_or_default(),
        );
        job.title = clean_inline(r.title.as_deref().unwrap_or_default());
        job.company = clean_inline(&company_name(r.company_details));
        job.location = clean_inline(r.formatted_location.as_deref().unwrap_or_default());
        job.requirements = extract_requirements(&description);
        job.description = description;
        job.job_type = normalize_job_type(r.employment_status.as_deref().unwrap_or_default());
        if let Some(dt) = number(&r.listed_at).and_then(|ms| from_epoch(ms as i64)) {
            job.date_posted = dt;
        }
        job.url = r.job_posting_url.unwrap_or_default();
        job.apply_url = r
            .apply_method
            .and_then(|m| m.company_apply_url)
            .unwrap_or_else(|| job.url.clone());
        job.experience_level = r.experience_level;
        job.raw_data = raw.clone();
        job
    }
}
