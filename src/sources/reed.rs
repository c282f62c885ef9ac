// src/sources/reed.rs
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::job::{EmploymentType, Job, SearchOptions, SourceId};
use crate::sources::normalize::{
    clean_inline, extract_requirements, format_salary, html_to_text, normalize_job_type,
    parse_date,
};
use crate::sources::{id_string, lenient, number, records, SourceAdapter, SourceContext};

const DEFAULT_TAKE: u32 = 25;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ReedJob {
    job_id: Value,
    employer_name: Option<String>,
    job_title: Option<String>,
    location_name: Option<String>,
    minimum_salary: Value,
    maximum_salary: Value,
    date: Option<String>,
    job_description: Option<String>,
    job_url: Option<String>,
    contract_type: Option<String>,
}

/// Reed.co.uk search API, HTTP basic auth with the API key as user name.
pub struct ReedAdapter {
    ctx: SourceContext,
}

impl ReedAdapter {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }
}

fn job_type_param(job_type: &str) -> Option<&'static str> {
    match normalize_job_type(job_type) {
        EmploymentType::FullTime => Some("fullTime"),
        EmploymentType::PartTime => Some("partTime"),
        EmploymentType::Contract => Some("contract"),
        EmploymentType::Temporary => Some("temp"),
        EmploymentType::NotSpecified => None,
    }
}

#[async_trait]
impl SourceAdapter for ReedAdapter {
    fn source(&self) -> SourceId {
        SourceId::Reed
    }

    async fn search_jobs(
        &self,
        query: &str,
        location: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Job>, SourceError> {
        self.ctx.limiter.check_limit()?;
        let api_key = self.ctx.credential(&self.ctx.config.api_key, "api_key")?;

        let mut params: Vec<(&str, String)> = vec![
            ("keywords", query.to_string()),
            (
                "resultsToTake",
                options.limit.unwrap_or(DEFAULT_TAKE).to_string(),
            ),
            ("resultsToSkip", options.offset.unwrap_or(0).to_string()),
        ];
        if !location.is_empty() {
            params.push(("locationName", location.to_string()));
        }
        if let Some(radius) = options.radius {
            params.push(("distanceFromLocation", radius.to_string()));
        }
        if let Some(min) = options.min_salary {
            params.push(("minimumSalary", min.to_string()));
        }
        if let Some(max) = options.max_salary {
            params.push(("maximumSalary", max.to_string()));
        }
        if let Some(flag) = options.job_type.as_deref().and_then(job_type_param) {
            params.push((flag, "true".to_string()));
        }

        let url = format!("{}/search", self.ctx.base_url());
        let key = self
            .ctx
            .cache_key("search", &(query, location, options.for_adapter()));
        let request = self
            .ctx
            .http
            .get(&url)
            .basic_auth(api_key, Some(""))
            .query(&params);

        let body = self.ctx.fetch_json(&key, request).await?;
        let mut jobs: Vec<Job> = records(&self.ctx, &body, "/results")?
            .iter()
            .map(|raw| self.normalize_job(raw))
            .collect();

        // Reed has no posting-age filter; apply it locally.
        if let Some(days) = options.days_ago {
            let cutoff = chrono::Utc::now() - chrono::Duration::days(i64::from(days));
            jobs.retain(|j| j.date_posted >= cutoff);
        }
        Ok(jobs)
    }

    fn normalize_job(&self, raw: &Value) -> Job {
        let r: ReedJob = lenient(raw);
        let mut job = Job::blank(SourceId::Reed, &id_string(&r.job_id));

        let description = html_to_text(r.job_description.as_deref().unwrap_or_default());
        job.title = clean_inline(r.job_title.as_deref().unwrap_or_default());
        job.company = clean_inline(r.employer_name.as_deref().unwrap_or_default());
        job.location = clean_inline(r.location_name.as_deref().unwrap_or_default());
        job.requirements = extract_requirements(&description);
        job.description = description;
        job.job_type = normalize_job_type(r.contract_type.as_deref().unwrap_or_default());
        job.salary = format_salary(number(&r.minimum_salary), number(&r.maximum_salary));
        if let Some(dt) = r.date.as_deref().and_then(parse_date) {
            job.date_posted = dt;
        }
        let url = r.job_url.unwrap_or_default();
        job.apply_url = url.clone();
        job.url = url;
        job.raw_data = raw.clone();
        job
    }
}
