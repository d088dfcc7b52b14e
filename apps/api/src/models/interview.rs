use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::interview::questions::GeneratedQuestion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "paused" => Ok(SessionStatus::Paused),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    /// Weak reference: the context may have been removed since.
    pub context_id: Option<Uuid>,
    pub session_name: String,
    pub candidate_name: Option<String>,
    pub interview_type: String,
    pub difficulty: String,
    pub status: String,
    pub total_questions: i32,
    pub total_responses: i32,
    pub avg_response_time: f64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub context_id: Option<Uuid>,
    pub session_name: String,
    pub candidate_name: Option<String>,
    pub interview_type: String,
    pub difficulty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub position: i32,
    pub question_text: String,
    pub question_type: String,
    pub difficulty: String,
    pub related_topics: Vec<String>,
    pub generated_by_model: String,
    pub generation_confidence: f64,
    pub created_at: DateTime<Utc>,
    pub asked_at: Option<DateTime<Utc>>,
}

/// Question payload; the store assigns id and position.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question_text: String,
    pub question_type: String,
    pub difficulty: String,
    pub related_topics: Vec<String>,
    pub generated_by_model: String,
    pub generation_confidence: f64,
}

impl From<GeneratedQuestion> for NewQuestion {
    fn from(q: GeneratedQuestion) -> Self {
        Self {
            question_text: q.text,
            question_type: q.question_type.as_str().to_string(),
            difficulty: q.difficulty.as_str().to_string(),
            related_topics: q.related_topics,
            generated_by_model: q.generated_by_model,
            generation_confidence: q.generation_confidence,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResponseRow {
    pub id: Uuid,
    pub question_id: Uuid,
    pub session_id: Uuid,
    pub response_text: String,
    pub response_time_seconds: f64,
    pub sentiment_score: f64,
    pub relevance_score: f64,
    pub technical_accuracy: f64,
    pub analysis: Value,
    pub needs_follow_up: bool,
    pub follow_up_text: Option<String>,
    pub follow_up_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub analyzed_at: DateTime<Utc>,
}

/// Response payload, upserted by `question_id`.
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub question_id: Uuid,
    pub session_id: Uuid,
    pub response_text: String,
    pub response_time_seconds: f64,
    pub sentiment_score: f64,
    pub relevance_score: f64,
    pub technical_accuracy: f64,
    pub analysis: Value,
    pub needs_follow_up: bool,
    pub follow_up_text: Option<String>,
    pub follow_up_type: Option<String>,
}
