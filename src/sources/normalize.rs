//! Shared normalization helpers: text cleanup, requirement extraction,
//! salary display, employment-type mapping, and date parsing.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::job::{EmploymentType, NOT_SPECIFIED};

const MAX_REQUIREMENTS: usize = 10;

fn re(cell: &'static OnceCell<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// Single-line cleanup for titles, companies, and locations: decode
/// entities, strip tags, normalize curly quotes, collapse whitespace.
pub fn clean_inline(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();

    let mut out = html_escape::decode_html_entities(s).to_string();
    out = re(&RE_TAGS, r"(?is)</?[^>]+>").replace_all(&out, "").to_string();
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    out = re(&RE_WS, r"\s+").replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Convert an HTML (or plain) description into text that keeps line
/// structure: block tags and `<br>` become newlines, `<li>` becomes a bullet.
pub fn html_to_text(s: &str) -> String {
    static RE_BREAK: OnceCell<Regex> = OnceCell::new();
    static RE_LI: OnceCell<Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_SPACES: OnceCell<Regex> = OnceCell::new();
    static RE_BLANKS: OnceCell<Regex> = OnceCell::new();

    let mut out = re(&RE_BREAK, r"(?i)<br\s*/?>|</(p|div|ul|ol|h[1-6])>")
        .replace_all(s, "\n")
        .to_string();
    out = re(&RE_LI, r"(?i)<li[^>]*>").replace_all(&out, "\n- ").to_string();
    out = re(&RE_TAGS, r"(?is)</?[^>]+>").replace_all(&out, "").to_string();
    out = html_escape::decode_html_entities(&out).to_string();
    out = out
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace("\r\n", "\n")
        .replace('\u{a0}', " ");
    out = re(&RE_SPACES, r"[ \t]+").replace_all(&out, " ").to_string();
    let lines: Vec<&str> = out.lines().map(str::trim).collect();
    out = lines.join("\n");
    out = re(&RE_BLANKS, r"\n{3,}").replace_all(&out, "\n\n").to_string();
    out.trim().to_string()
}

/// Best-effort requirement extraction from a free-text description.
///
/// Finds the first requirements-style header (at a line start, or followed by
/// a colon), takes the text after it up to the next blank line or a
/// responsibilities/duties/benefits header line, splits on bullets and
/// newlines, and keeps at most ten non-empty items. The stop words inside a
/// bullet do not end the section.
pub fn extract_requirements(description: &str) -> Vec<String> {
    static RE_HEADER: OnceCell<Regex> = OnceCell::new();
    static RE_STOP: OnceCell<Regex> = OnceCell::new();
    static RE_BLANK: OnceCell<Regex> = OnceCell::new();
    static RE_BULLET: OnceCell<Regex> = OnceCell::new();

    let header = re(
        &RE_HEADER,
        r"(?im)^[ \t]*(?:requirements|qualifications|must have|required skills|we(?:'|\u{2019})?re looking for)\b|\b(?:requirements|qualifications|must have|required skills)[ \t]*:",
    );
    let Some(m) = header.find(description) else {
        return Vec::new();
    };

    let rest = description[m.end()..]
        .trim_start_matches(|c: char| c == ':' || c == '-' || c.is_whitespace());

    let mut end = rest.len();
    if let Some(b) = re(&RE_BLANK, r"\n[ \t]*\n").find(rest) {
        end = end.min(b.start());
    }
    let stop = re(
        &RE_STOP,
        r"(?im)^[ \t]*(?:[a-z']+[ \t]+){0,2}(?:responsibilities|duties|benefits)[ \t]*:?[ \t]*$|^[ \t]*(?:responsibilities|duties|benefits)\b[^\n]*:[ \t]*$",
    );
    if let Some(s) = stop.find(rest) {
        end = end.min(s.start());
    }
    let section = &rest[..end];

    let bullet = re(&RE_BULLET, r"^(?:[-*\u{2022}\u{00B7}\u{25AA}]+|\d+[.)])\s*");
    section
        .split(['\n', '\u{2022}', '\u{00B7}', '\u{25AA}'])
        .map(|line| bullet.replace(line.trim(), "").trim().to_string())
        .filter(|line| !line.is_empty())
        .take(MAX_REQUIREMENTS)
        .collect()
}

/// `$50,000 - $80,000`, `$50,000+`, `Up to $80,000`, or `Not specified`.
pub fn format_salary(min: Option<f64>, max: Option<f64>) -> String {
    let valid = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0);
    match (valid(min), valid(max)) {
        (None, None) => NOT_SPECIFIED.to_string(),
        (Some(lo), Some(hi)) => format!("${} - ${}", thousands(lo), thousands(hi)),
        (Some(lo), None) => format!("${}+", thousands(lo)),
        (None, Some(hi)) => format!("Up to ${}", thousands(hi)),
    }
}

fn thousands(v: f64) -> String {
    let digits = (v.round() as u64).to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Map a source's free-form employment type onto the closed vocabulary.
pub fn normalize_job_type(raw: &str) -> EmploymentType {
    let s = raw.to_ascii_lowercase();
    if s.contains("full") || s.contains("permanent") {
        EmploymentType::FullTime
    } else if s.contains("part") {
        EmploymentType::PartTime
    } else if s.contains("contract") || s.contains("freelance") {
        EmploymentType::Contract
    } else if s.contains("temp") || s.contains("intern") {
        EmploymentType::Temporary
    } else {
        EmploymentType::NotSpecified
    }
}

/// Parse the assorted date formats the boards emit (RFC 3339, RFC 2822,
/// `dd/mm/yyyy`, `yyyy-mm-dd`).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%d/%m/%Y", "%Y-%m-%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Unix epoch (seconds or milliseconds) to UTC.
pub fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    // Anything past year 33658 in seconds is really milliseconds.
    if value.abs() >= 1_000_000_000_000 {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}
