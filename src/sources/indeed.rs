// src/sources/indeed.rs
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::job::{EmploymentType, Job, SearchOptions, SourceId, NOT_SPECIFIED};
use crate::sources::normalize::{
    clean_inline, extract_requirements, html_to_text, normalize_job_type, parse_date,
};
use crate::sources::{id_string, lenient, records, SourceAdapter, SourceContext};

const DEFAULT_LIMIT: u32 = 25;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IndeedJob {
    jobkey: Value,
    jobtitle: Option<String>,
    company: Option<String>,
    formatted_location: Option<String>,
    city: Option<String>,
    snippet: Option<String>,
    date: Option<String>,
    url: Option<String>,
    jobtype: Option<String>,
    salary: Option<String>,
}

/// Indeed publisher search API (`/apisearch`).
pub struct IndeedAdapter {
    ctx: SourceContext,
}

impl IndeedAdapter {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }
}

fn jt_param(job_type: &str) -> Option<&'static str> {
    match normalize_job_type(job_type) {
        EmploymentType::FullTime => Some("fulltime"),
        EmploymentType::PartTime => Some("parttime"),
        EmploymentType::Contract => Some("contract"),
        EmploymentType::Temporary => Some("temporary"),
        EmploymentType::NotSpecified => None,
    }
}

#[async_trait]
impl SourceAdapter for IndeedAdapter {
    fn source(&self) -> SourceId {
        SourceId::Indeed
    }

    async fn search_jobs(
        &self,
        query: &str,
        location: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Job>, SourceError> {
        self.ctx.limiter.check_limit()?;
        let publisher = self
            .ctx
            .credential(&self.ctx.config.publisher_id, "publisher_id")?;

        let mut params: Vec<(&str, String)> = vec![
            ("publisher", publisher),
            ("q", query.to_string()),
            ("l", location.to_string()),
            ("start", options.offset.unwrap_or(0).to_string()),
            ("limit", options.limit.unwrap_or(DEFAULT_LIMIT).to_string()),
            ("format", "json".to_string()),
            ("v", "2".to_string()),
        ];
        if let Some(sort) = options.sort_by.as_deref() {
            params.push(("sort", sort.to_string()));
        }
        if let Some(radius) = options.radius {
            params.push(("radius", radius.to_string()));
        }
        if let Some(days) = options.days_ago {
            params.push(("fromage", days.to_string()));
        }
        if let Some(jt) = options.job_type.as_deref().and_then(jt_param) {
            params.push(("jt", jt.to_string()));
        }

        let url = format!("{}/apisearch", self.ctx.base_url());
        let key = self
            .ctx
            .cache_key("apisearch", &(query, location, options.for_adapter()));
        let request = self.ctx.http.get(&url).query(&params);

        let body = self.ctx.fetch_json(&key, request).await?;
        let jobs = records(&self.ctx, &body, "/results")?
            .iter()
            .map(|raw| self.normalize_job(raw))
            .collect();
        Ok(jobs)
    }

    fn normalize_job(&self, raw: &Value) -> Job {
        let r: IndeedJob = lenient(raw);
        let mut job = Job::blank(SourceId::Indeed, &id_string(&r.jobkey));

        let description = html_to_text(r.snippet.as_deref().unwrap_or_default());
        job.title = clean_inline(r.jobtitle.as_deref().unwrap_or_default());
        job.company = clean_inline(r.company.as_deref().unwrap_or_default());
        job.location = clean_inline(
            r.formatted_location
                .as_deref()
                .or(r.city.as_deref())
                .unwrap_or_default(),
        );
        job.requirements = extract_requirements(&description);
        job.description = description;
        job.job_type = normalize_job_type(r.jobtype.as_deref().unwrap_or_default());
        job.salary = r
            .salary
            .map(|s| clean_inline(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NOT_SPECIFIED.to_string());
        if let Some(dt) = r.date.as_deref().and_then(parse_date) {
            job.date_posted = dt;
        }
        let url = r.url.unwrap_or_default();
        job.apply_url = url.clone();
        job.url = url;
        job.raw_data = raw.clone();
        job
    }
}
