use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A scraped job post, stored with its match score against the skills it
/// was ingested with.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPostingRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub budget: String,
    pub skills_required: Vec<String>,
    pub deadline: Option<NaiveDate>,
    pub url: Option<String>,
    pub language: String,
    pub client: String,
    /// "api" when a source url was given, "manual" otherwise.
    pub fetch_method: String,
    pub tos_safe: bool,
    pub match_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewJobPosting {
    pub title: String,
    pub description: String,
    pub budget: String,
    pub skills_required: Vec<String>,
    pub deadline: Option<NaiveDate>,
    pub url: Option<String>,
    pub language: String,
    pub client: String,
    pub fetch_method: String,
    pub tos_safe: bool,
    pub match_score: f64,
}
