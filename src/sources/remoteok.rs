// src/sources/remoteok.rs
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::job::{EmploymentType, Job, SearchOptions, SourceId};
use crate::sources::normalize::{
    clean_inline, extract_requirements, format_salary, from_epoch, html_to_text, parse_date,
};
use crate::sources::{id_string, lenient, number, SourceAdapter, SourceContext};

const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RemoteOkJob {
    id: Value,
    epoch: Value,
    date: Option<String>,
    company: Option<String>,
    company_logo: Option<String>,
    logo: Option<String>,
    position: Option<String>,
    tags: Option<Vec<String>>,
    description: Option<String>,
    location: Option<String>,
    salary_min: Value,
    salary_max: Value,
    apply_url: Option<String>,
    url: Option<String>,
}

/// RemoteOK public feed (`/api`). The feed has no server-side search, so
/// query, location, age, and paging are applied locally.
pub struct RemoteOkAdapter {
    ctx: SourceContext,
}

impl RemoteOkAdapter {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }
}

fn matches_query(job: &Job, words: &[String]) -> bool {
    if words.is_empty() {
        return true;
    }
    let mut text = job.search_text();
    text.push(' ');
    text.push_str(&job.company.to_lowercase());
    if let Some(tags) = &job.tags {
        text.push(' ');
        text.push_str(&tags.join(" ").to_lowercase());
    }
    words.iter().all(|w| text.contains(w.as_str()))
}

fn matches_location(job: &Job, location: &str) -> bool {
    let wanted = location.trim().to_lowercase();
    if wanted.is_empty() || wanted == "remote" {
        return true;
    }
    let have = job.location.to_lowercase();
    have.is_empty()
        || have.contains(&wanted)
        || ["worldwide", "anywhere", "remote"]
            .iter()
            .any(|w| have.contains(w))
}

#[async_trait]
impl SourceAdapter for RemoteOkAdapter {
    fn source(&self) -> SourceId {
        SourceId::Remoteok
    }

    async fn search_jobs(
        &self,
        query: &str,
        location: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Job>, SourceError> {
        self.ctx.limiter.check_limit()?;
        let url = format!("{}/api", self.ctx.base_url());
        // The feed is identical for every query, so one key covers it.
        let key = self.ctx.cache_key("api", &url);
        let request = self.ctx.http.get(&url);

        let body = self.ctx.fetch_json(&key, request).await?;
        let feed = body
            .as_array()
            .ok_or_else(|| self.ctx.decode_error("expected a JSON array"))?;

        let words: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        let cutoff = options
            .days_ago
            .map(|d| chrono::Utc::now() - chrono::Duration::days(i64::from(d)));

        let jobs = feed
            .iter()
            // First element is the legal notice, not a posting.
            .filter(|raw| raw.get("position").is_some())
            .map(|raw| self.normalize_job(raw))
            .filter(|job| matches_query(job, &words))
            .filter(|job| matches_location(job, location))
            .filter(|job| cutoff.map_or(true, |c| job.date_posted >= c))
            .skip(options.offset.unwrap_or(0) as usize)
            .take(options.limit.map_or(DEFAULT_LIMIT, |l| l as usize))
            .collect();
        Ok(jobs)
    }

    fn normalize_job(&self, raw: &Value) -> Job {
        let r: RemoteOkJob = lenient(raw);
        let mut job = Job::blank(SourceId::Remoteok, &id_string(&r.id));

        let description = html_to_text(r.description.as_deref().unwrap_or_default());
        job.title = clean_inline(r.position.as_deref().unwrap_or_default());
        job.company = clean_inline(r.company.as_deref().unwrap_or_default());
        job.location = match r.location.as_deref().map(clean_inline) {
            Some(loc) if !loc.is_empty() => loc,
            _ => "Remote".to_string(),
        };
        job.requirements = extract_requirements(&description);
        job.description = description;
        job.job_type = EmploymentType::FullTime;
        job.salary = format_salary(number(&r.salary_min), number(&r.salary_max));

        let posted = r
            .date
            .as_deref()
            .and_then(parse_date)
            .or_else(|| number(&r.epoch).and_then(|e| from_epoch(e as i64)));
        if let Some(dt) = posted {
            job.date_posted = dt;
        }

        job.url = r.url.unwrap_or_default();
        job.apply_url = r.apply_url.unwrap_or_else(|| job.url.clone());
        job.tags = r.tags.filter(|t| !t.is_empty());
        job.logo = r.company_logo.or(r.logo).filter(|l| !l.is_empty());
        job.raw_data = raw.clone();
        job
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(title: &str, location: &str, tags: &[&str]) -> Job {
        let mut j = Job::blank(SourceId::Remoteok, "1");
        j.title = title.into();
        j.location = location.into();
        j.tags = Some(tags.iter().map(|t| t.to_string()).collect());
        j
    }

    #[test]
    fn query_words_must_all_match_title_or_tags() {
        let j = job("Senior Backend Engineer", "Worldwide", &["rust", "postgres"]);
        assert!(matches_query(&j, &["rust".into(), "backend".into()]));
        assert!(!matches_query(&j, &["rust".into(), "frontend".into()]));
        assert!(matches_query(&j, &[]));
    }

    #[test]
    fn location_filter_accepts_worldwide_roles() {
        assert!(matches_location(&job("x", "Worldwide", &[]), "Berlin"));
        assert!(matches_location(&job("x", "Europe, Berlin", &[]), "berlin"));
        assert!(!matches_location(&job("x", "USA only", &[]), "Berlin"));
        assert!(matches_location(&job("x", "USA only", &[]), "remote"));
    }
}
