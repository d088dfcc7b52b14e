//! Job-post ingestion and skill matching.
//!
//! Scraped job posts arrive as loose JSON. [`PostingDraft::from_payload`]
//! cleans them into a [`NewJobPosting`] scored against the post's own skills;
//! [`match_score`] is reused to re-score or rank stored posts against any
//! other skill list.

pub mod handlers;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::posting::NewJobPosting;

#[derive(Debug, Error, PartialEq)]
pub enum PostingError {
    #[error("job payload must be a JSON object")]
    NotAnObject,

    #[error("malformed job payload: {0}")]
    Malformed(String),

    #[error("description is required unless tos_safe=true is provided")]
    DescriptionRequired,

    /// Remote fetching is not supported: the text has to be pasted in.
    #[error("automatic URL fetching is disabled; paste the job description into the payload")]
    FetchDisabled,

    #[error("deadline '{0}' is not a YYYY-MM-DD date")]
    BadDeadline(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Skills
// ────────────────────────────────────────────────────────────────────────────

/// Skills arrive as a comma-separated string or as a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawSkills {
    Text(String),
    List(Vec<Value>),
}

/// Trims, collapses inner whitespace and drops case-insensitive duplicates,
/// keeping the first spelling. Multi-word skills ("google analytics") survive.
pub fn normalize_skills(raw: Option<&RawSkills>) -> Vec<String> {
    let parts: Vec<String> = match raw {
        None => return Vec::new(),
        Some(RawSkills::Text(text)) => text.split(',').map(collapse_whitespace).collect(),
        Some(RawSkills::List(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => collapse_whitespace(s),
                other => collapse_whitespace(&other.to_string()),
            })
            .collect(),
    };

    let mut seen = std::collections::HashSet::new();
    parts
        .into_iter()
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fraction of skills mentioned in `text`, counting every occurrence, capped
/// at 1.0. Empty text or no skills score 0.
pub fn match_score(text: &str, skills: &[String]) -> f64 {
    let tokens: Vec<String> = skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if text.is_empty() || tokens.is_empty() {
        return 0.0;
    }
    let text = text.to_lowercase();
    let hits: usize = tokens.iter().map(|t| text.matches(t.as_str()).count()).sum();
    (hits as f64 / tokens.len() as f64).min(1.0)
}

// ────────────────────────────────────────────────────────────────────────────
// HTML cleanup
// ────────────────────────────────────────────────────────────────────────────

/// Plain text from scraped HTML: script/style blocks and tags removed, common
/// entities decoded, line breaks and tabs folded into spaces.
pub fn clean_html(html: &str) -> String {
    let without_blocks = drop_blocks(html, "script");
    let without_blocks = drop_blocks(&without_blocks, "style");

    let mut text = String::with_capacity(without_blocks.len());
    let mut in_tag = false;
    for c in without_blocks.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            '\t' | '\r' | '\n' => {
                if !text.ends_with(' ') {
                    text.push(' ');
                }
            }
            _ => text.push(c),
        }
    }
    decode_entities(&text).trim().to_string()
}

/// Removes `<tag ...>...</tag>` blocks, case-insensitively. An unclosed block
/// runs to the end of the input.
fn drop_blocks(html: &str, tag: &str) -> String {
    // ASCII lowering keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = lower[pos..].find(&open).map(|i| pos + i) {
        out.push_str(&html[pos..start]);
        out.push(' ');
        pos = match lower[start..].find(&close) {
            Some(end) => start + end + close.len(),
            None => html.len(),
        };
    }
    out.push_str(&html[pos..]);
    out
}

fn decode_entities(text: &str) -> String {
    const ENTITIES: &[(&str, &str)] = &[
        ("&nbsp;", " "),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&apos;", "'"),
        // Last, so "&amp;lt;" decodes to "&lt;" and not "<".
        ("&amp;", "&"),
    ];
    ENTITIES
        .iter()
        .fold(text.to_string(), |acc, (entity, plain)| acc.replace(entity, plain))
}

// ────────────────────────────────────────────────────────────────────────────
// Payload
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct RawPosting {
    title: Option<String>,
    job_title: Option<String>,
    description: Option<String>,
    project_text: Option<String>,
    html: Option<String>,
    budget: Option<Value>,
    skills_required: Option<RawSkills>,
    skills: Option<RawSkills>,
    deadline: Option<String>,
    url: Option<String>,
    language: Option<String>,
    client: Option<String>,
    #[serde(default)]
    tos_safe: bool,
}

/// First non-blank value among the candidates.
fn first_filled(candidates: [Option<String>; 3]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
}

fn text_or_empty(value: Option<String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

pub struct PostingDraft;

impl PostingDraft {
    /// Accepts the post itself or `{"payload": {...}}`.
    pub fn from_payload(body: &Value) -> Result<NewJobPosting, PostingError> {
        let payload = match body.get("payload") {
            Some(inner @ Value::Object(_)) => inner,
            _ => body,
        };
        if !payload.is_object() {
            return Err(PostingError::NotAnObject);
        }
        let raw: RawPosting = serde_json::from_value(payload.clone())
            .map_err(|e| PostingError::Malformed(e.to_string()))?;

        let url = raw.url.filter(|u| !u.trim().is_empty());
        let description = match first_filled([raw.description, raw.project_text, raw.html]) {
            Some(text) => clean_html(&text),
            None if url.is_some() && !raw.tos_safe => return Err(PostingError::DescriptionRequired),
            None if url.is_some() => return Err(PostingError::FetchDisabled),
            None => String::new(),
        };

        let title = first_filled([raw.title, raw.job_title, None])
            .map(|t| clean_html(&t))
            .unwrap_or_default();

        let skills_required = normalize_skills(raw.skills_required.as_ref().or(raw.skills.as_ref()));

        let deadline = match raw.deadline.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(d) => Some(
                NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map_err(|_| PostingError::BadDeadline(d.to_string()))?,
            ),
        };

        let budget = match raw.budget {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => other.to_string(),
        };

        let match_score = match_score(&description, &skills_required);

        Ok(NewJobPosting {
            title,
            description,
            budget,
            skills_required,
            deadline,
            fetch_method: if url.is_some() { "api" } else { "manual" }.to_string(),
            url,
            language: text_or_empty(raw.language),
            client: text_or_empty(raw.client),
            tos_safe: raw.tos_safe,
            match_score,
        })
    }
}
