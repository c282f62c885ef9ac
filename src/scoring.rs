//! Relevance scoring for smart search.
//!
//! Additive and uncapped:
//! - +50 when the company matches a preferred company (substring, case-folded)
//! - +10 per skill found in the job's search text
//! - +5 per query word found in the same text
//! - +10 when posted under 7 days ago, else +5 under 14 days
//! - +5 when a salary is listed

use chrono::{DateTime, Utc};

use crate::job::Job;

const PREFERRED_COMPANY: u32 = 50;
const PER_SKILL: u32 = 10;
const PER_QUERY_WORD: u32 = 5;
const FRESH_WEEK: u32 = 10;
const FRESH_FORTNIGHT: u32 = 5;
const HAS_SALARY: u32 = 5;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Inputs that score a job besides the job itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreContext<'a> {
    pub skills: &'a [String],
    pub preferred_companies: &'a [String],
    pub query: &'a str,
}

pub fn calculate_job_score(job: &Job, ctx: &ScoreContext<'_>) -> u32 {
    calculate_job_score_at(job, ctx, Utc::now())
}

/// Same as [`calculate_job_score`] with an explicit clock.
pub fn calculate_job_score_at(job: &Job, ctx: &ScoreContext<'_>, now: DateTime<Utc>) -> u32 {
    let mut score = 0u32;

    let company = job.company.to_lowercase();
    if ctx
        .preferred_companies
        .iter()
        .map(|c| c.trim().to_lowercase())
        .any(|c| !c.is_empty() && company.contains(&c))
    {
        score += PREFERRED_COMPANY;
    }

    let text = job.search_text();
    let skill_hits = ctx
        .skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty() && text.contains(s.as_str()))
        .count() as u32;
    score += skill_hits * PER_SKILL;

    let query_hits = ctx
        .query
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|w| text.contains(w.as_str()))
        .count() as u32;
    score += query_hits * PER_QUERY_WORD;

    let days_ago = (now - job.date_posted).num_milliseconds() as f64 / MS_PER_DAY;
    if days_ago < 7.0 {
        score += FRESH_WEEK;
    } else if days_ago < 14.0 {
        score += FRESH_FORTNIGHT;
    }

    if job.has_salary() {
        score += HAS_SALARY;
    }
    score
}
