//! # Job model
//! Source-agnostic job record plus the option/result envelopes shared by
//! adapters, the aggregator, and the HTTP layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AggregatorError;

/// Sentinel used wherever a source did not report a value.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Known job boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Linkedin,
    Indeed,
    Adzuna,
    Reed,
    Remoteok,
}

impl SourceId {
    pub const ALL: [SourceId; 5] = [
        SourceId::Linkedin,
        SourceId::Indeed,
        SourceId::Adzuna,
        SourceId::Reed,
        SourceId::Remoteok,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Linkedin => "linkedin",
            SourceId::Indeed => "indeed",
            SourceId::Adzuna => "adzuna",
            SourceId::Reed => "reed",
            SourceId::Remoteok => "remoteok",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SourceId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AggregatorError::UnknownSource(wanted.to_string()))
    }
}

/// Closed employment-type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmploymentType {
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Part-time")]
    PartTime,
    #[serde(rename = "Contract")]
    Contract,
    #[serde(rename = "Temporary")]
    Temporary,
    #[default]
    #[serde(rename = "Not specified")]
    NotSpecified,
}

impl EmploymentType {
    pub fn label(&self) -> &'static str {
        match self {
            EmploymentType::FullTime => "Full-time",
            EmploymentType::PartTime => "Part-time",
            EmploymentType::Contract => "Contract",
            EmploymentType::Temporary => "Temporary",
            EmploymentType::NotSpecified => NOT_SPECIFIED,
        }
    }
}

/// Normalized job posting.
///
/// `id` is `{source}_{externalId}` and stays stable across fetches of the
/// same posting. Every string field is populated (possibly empty); `salary`
/// is either a display string or [`NOT_SPECIFIED`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub source: SourceId,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub requirements: Vec<String>,
    #[serde(rename = "type")]
    pub job_type: EmploymentType,
    pub salary: String,
    pub date_posted: DateTime<Utc>,
    pub url: String,
    pub apply_url: String,
    pub raw_data: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benefits: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<String>,

    /// Relevance score, only set by smart search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
}

impl Job {
    /// Empty record for `source` with every field defaulted.
    pub fn blank(source: SourceId, external_id: &str) -> Self {
        Self {
            id: format!("{}_{}", source, external_id),
            source,
            title: String::new(),
            company: String::new(),
            location: String::new(),
            description: String::new(),
            requirements: Vec::new(),
            job_type: EmploymentType::NotSpecified,
            salary: NOT_SPECIFIED.to_string(),
            date_posted: Utc::now(),
            url: String::new(),
            apply_url: String::new(),
            raw_data: serde_json::Value::Null,
            benefits: None,
            skills: None,
            tags: None,
            logo: None,
            category: None,
            experience_level: None,
            score: None,
        }
    }

    pub fn has_salary(&self) -> bool {
        !self.salary.is_empty() && self.salary != NOT_SPECIFIED
    }

    /// Lowercased `title_company_location`, the deduplication key.
    pub fn dedup_key(&self) -> String {
        format!("{}_{}_{}", self.title, self.company, self.location).to_lowercase()
    }

    /// Lowercased `title description requirements...` used for skill and
    /// query matching.
    pub fn search_text(&self) -> String {
        let mut parts = Vec::with_capacity(2 + self.requirements.len());
        parts.push(self.title.as_str());
        parts.push(self.description.as_str());
        parts.extend(self.requirements.iter().map(String::as_str));
        parts.join(" ").to_lowercase()
    }
}

/// Search configuration bag. Each adapter reads the subset it understands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchOptions {
    pub sources: Option<Vec<SourceId>>,
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

impl SearchOptions {
    /// Options relevant to a single adapter call. `sources` and `concurrent`
    /// steer the aggregator only, so they are dropped from cache keys.
    pub fn for_adapter(&self) -> SearchOptions {
        SearchOptions {
            sources: None,
            concurrent: None,
            ..self.clone()
        }
    }
}

/// One failed source inside a [`SearchResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// Aggregator output envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub jobs: Vec<Job>,
    pub total: usize,
    pub sources: Vec<String>,
    pub errors: Vec<SourceFailure>,
    pub timestamp: DateTime<Utc>,
}

/// Smart-search envelope: a [`SearchResult`] plus how many jobs the
/// preference filters removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartSearchResult {
    #[serde(flatten)]
    pub result: SearchResult,
    pub filtered: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

/// User preferences driving smart search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub location: Option<String>,
    pub sources: Option<Vec<SourceId>>,
    pub skills: Vec<String>,
    pub exclude_companies: Vec<String>,
    pub preferred_companies: Vec<String>,
    pub experience_level: Option<String>,
    pub job_type: Option<String>,
    /// Maximum posting age in days.
    pub date_posted: Option<u32>,
    pub salary: Option<SalaryRange>,
}

impl Preferences {
    pub fn to_search_options(&self) -> SearchOptions {
        let salary = self.salary.clone().unwrap_or_default();
        SearchOptions {
            sources: self.sources.clone(),
            experience_level: self.experience_level.clone(),
            job_type: self.job_type.clone(),
            days_ago: self.date_posted,
            min_salary: salary.min,
            max_salary: salary.max,
            ..SearchOptions::default()
        }
    }
}
