// src/sources/adzuna.rs
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::job::{Job, SearchOptions, SourceId};
use crate::sources::normalize::{
    clean_inline, extract_requirements, format_salary, html_to_text, normalize_job_type,
    parse_date,
};
use crate::sources::{id_string, lenient, number, records, SourceAdapter, SourceContext};

const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Named {
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Category {
    label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AdzunaJob {
    id: Value,
    title: Option<String>,
    description: Option<String>,
    created: Option<String>,
    redirect_url: Option<String>,
    company: Option<Named>,
    location: Option<Named>,
    salary_min: Value,
    salary_max: Value,
    contract_time: Option<String>,
    contract_type: Option<String>,
    category: Option<Category>,
}

/// Adzuna search API (`/jobs/{country}/search/{page}`), app id + key auth.
pub struct AdzunaAdapter {
    ctx: SourceContext,
}

impl AdzunaAdapter {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }

    fn query_params(
        &self,
        query: &str,
        location: &str,
        options: &SearchOptions,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            (
                "results_per_page",
                options.limit.unwrap_or(DEFAULT_PAGE_SIZE).to_string(),
            ),
            ("what", query.to_string()),
            ("content-type", "application/json".to_string()),
        ];
        if !location.is_empty() {
            params.push(("where", location.to_string()));
        }
        if let Some(days) = options.days_ago {
            params.push(("max_days_old", days.to_string()));
        }
        if let Some(min) = options.min_salary {
            params.push(("salary_min", min.to_string()));
        }
        if let Some(max) = options.max_salary {
            params.push(("salary_max", max.to_string()));
        }
        if let Some(radius) = options.radius {
            params.push(("distance", radius.to_string()));
        }
        if let Some(sort) = options.sort_by.as_deref() {
            params.push(("sort_by", sort.to_string()));
        }
        if let Some(flag) = options.job_type.as_deref().and_then(job_type_flag) {
            params.push((flag, "1".to_string()));
        }
        params
    }
}

fn display_name(named: Option<Named>) -> String {
    named.and_then(|n| n.display_name).unwrap_or_default()
}

fn job_type_flag(job_type: &str) -> Option<&'static str> {
    match job_type.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
        "full_time" | "fulltime" => Some("full_time"),
        "part_time" | "parttime" => Some("part_time"),
        "contract" => Some("contract"),
        "permanent" => Some("permanent"),
        _ => None,
    }
}

#[async_trait]
impl SourceAdapter for AdzunaAdapter {
    fn source(&self) -> SourceId {
        SourceId::Adzuna
    }

    async fn search_jobs(
        &self,
        query: &str,
        location: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Job>, SourceError> {
        self.ctx.limiter.check_limit()?;
        let app_id = self.ctx.credential(&self.ctx.config.app_id, "app_id")?;
        let app_key = self.ctx.credential(&self.ctx.config.app_key, "app_key")?;
        let country = self
            .ctx
            .config
            .country
            .clone()
            .unwrap_or_else(|| "us".to_string());

        let limit = options.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let page = options.offset.unwrap_or(0) / limit + 1;
        let url = format!("{}/jobs/{}/search/{}", self.ctx.base_url(), country, page);
        let params = self.query_params(query, location, options);

        let key = self.ctx.cache_key(
            "search",
            &(&country, page, query, location, options.for_adapter()),
        );
        let request = self
            .ctx
            .http
            .get(&url)
            .query(&[("app_id", app_id.as_str()), ("app_key", app_key.as_str())])
            .query(&params);

        let body = self.ctx.fetch_json(&key, request).await?;
        let jobs = records(&self.ctx, &body, "/results")?
            .iter()
            .map(|raw| self.normalize_job(raw))
            .collect();
        Ok(jobs)
    }

    fn normalize_job(&self, raw: &Value) -> Job {
        let r: AdzunaJob = lenient(raw);
        let mut job = Job::blank(SourceId::Adzuna, &id_string(&r.id));

        let description = html_to_text(r.description.as_deref().unwrap_or_default());
        job.title = clean_inline(r.title.as_deref().unwrap_or_default());
        job.company = clean_inline(&display_name(r.company));
        job.location = clean_inline(&display_name(r.location));
        job.requirements = extract_requirements(&description);
        job.description = description;
        job.job_type = normalize_job_type(
            r.contract_time
                .as_deref()
                .or(r.contract_type.as_deref())
                .unwrap_or_default(),
        );
        job.salary = format_salary(number(&r.salary_min), number(&r.salary_max));
        if let Some(dt) = r.created.as_deref().and_then(parse_date) {
            job.date_posted = dt;
        }
        let url = r.redirect_url.unwrap_or_default();
        job.apply_url = url.clone();
        job.url = url;
        job.category = r.category.and_then(|c| c.label);
        job.raw_data = raw.clone();
        job
    }
}
