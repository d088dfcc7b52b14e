//! Persistence seam for chat contexts and interview sessions.
//!
//! `AppState` holds an `Arc<dyn InterviewStore>`: [`PgStore`] when
//! `DATABASE_URL` is set, [`InMemoryStore`] otherwise (and in tests).
//!
//! Session counters are owned by the store: every write that adds a question
//! or upserts a response recomputes `total_questions`, `total_responses` and
//! `avg_response_time` from the child rows in the same write.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::models::chat::{ChatContextRow, ContextUpsert, NewChatContext};
use crate::models::interview::{
    NewQuestion, NewResponse, NewSession, QuestionRow, ResponseRow, SessionRow, SessionStatus,
};
use crate::models::posting::{JobPostingRow, NewJobPosting};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow)]
pub struct StoreStats {
    pub total_contexts: i64,
    pub total_sessions: i64,
    pub active_sessions: i64,
    pub completed_sessions: i64,
    pub total_responses: i64,
    pub total_postings: i64,
}

#[async_trait]
pub trait InterviewStore: Send + Sync {
    /// Name reported in status output.
    fn backend(&self) -> &'static str;

    // ── Chat contexts ──────────────────────────────────────────────────────

    /// Creates a context, or refreshes messages/topics of the active context
    /// with the same URL. A context without a URL is always created.
    async fn upsert_chat_context(&self, new: NewChatContext) -> Result<ContextUpsert>;

    async fn get_chat_context(&self, id: Uuid) -> Result<Option<ChatContextRow>>;

    /// Marks a context inactive. Idempotent.
    async fn deactivate_chat_context(&self, id: Uuid) -> Result<Option<ChatContextRow>>;

    // ── Sessions ───────────────────────────────────────────────────────────

    async fn create_session(&self, new: NewSession) -> Result<SessionRow>;

    async fn get_session(&self, id: Uuid) -> Result<Option<SessionRow>>;

    /// Newest first.
    async fn list_sessions(&self, limit: i64) -> Result<Vec<SessionRow>>;

    /// Sets `status`; stamps `completed_at` when completing.
    async fn update_session_status(
        &self,
        id: Uuid,
        status: SessionStatus,
    ) -> Result<Option<SessionRow>>;

    /// Sets status to active and stamps `started_at` if it was never set.
    async fn mark_session_started(&self, id: Uuid) -> Result<Option<SessionRow>>;

    // ── Questions ──────────────────────────────────────────────────────────

    /// Appends questions after the session's last position.
    async fn add_questions(
        &self,
        session_id: Uuid,
        questions: Vec<NewQuestion>,
    ) -> Result<Vec<QuestionRow>>;

    /// Ordered by position.
    async fn list_questions(&self, session_id: Uuid) -> Result<Vec<QuestionRow>>;

    async fn get_question(&self, id: Uuid) -> Result<Option<QuestionRow>>;

    /// Stamps `asked_at` if it was never set.
    async fn mark_question_asked(&self, id: Uuid) -> Result<Option<QuestionRow>>;

    // ── Responses ──────────────────────────────────────────────────────────

    /// Insert or replace the response for `new.question_id` (last write wins).
    async fn upsert_response(&self, new: NewResponse) -> Result<ResponseRow>;

    async fn list_responses(&self, session_id: Uuid) -> Result<Vec<ResponseRow>>;

    // ── Job postings ───────────────────────────────────────────────────────

    async fn insert_posting(&self, new: NewJobPosting) -> Result<JobPostingRow>;

    async fn get_posting(&self, id: Uuid) -> Result<Option<JobPostingRow>>;

    /// Newest first.
    async fn list_postings(&self, limit: i64) -> Result<Vec<JobPostingRow>>;

    async fn update_posting_score(&self, id: Uuid, score: f64) -> Result<Option<JobPostingRow>>;

    async fn stats(&self) -> Result<StoreStats>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by store-backed tests.

    use super::*;
    use crate::chat::conversation::ChatMessage;

    pub fn new_context(url: Option<&str>, messages: &[&str]) -> NewChatContext {
        NewChatContext {
            url: url.map(str::to_string),
            chat_title: Some("Chat".to_string()),
            project_title: Some("Portal".to_string()),
            client_name: Some("Dana".to_string()),
            participants: vec!["Dana".to_string(), "me".to_string()],
            messages: messages
                .iter()
                .map(|m| ChatMessage::new("Dana", *m))
                .collect(),
            extracted_topics: vec!["Python".to_string()],
        }
    }

    pub fn new_session(context_id: Option<Uuid>) -> NewSession {
        NewSession {
            context_id,
            session_name: "Interview for Portal".to_string(),
            candidate_name: None,
            interview_type: "technical".to_string(),
            difficulty: "medium".to_string(),
        }
    }

    pub fn new_question(text: &str) -> NewQuestion {
        NewQuestion {
            question_text: text.to_string(),
            question_type: "technical".to_string(),
            difficulty: "medium".to_string(),
            related_topics: vec![],
            generated_by_model: "template".to_string(),
            generation_confidence: 0.8,
        }
    }

    pub fn new_posting(title: &str, score: f64) -> NewJobPosting {
        NewJobPosting {
            title: title.to_string(),
            description: "Need a Django developer".to_string(),
            budget: String::new(),
            skills_required: vec!["django".to_string()],
            deadline: None,
            url: None,
            language: String::new(),
            client: String::new(),
            fetch_method: "manual".to_string(),
            tos_safe: false,
            match_score: score,
        }
    }

    pub fn new_response(question: &QuestionRow, text: &str, seconds: f64) -> NewResponse {
        NewResponse {
            question_id: question.id,
            session_id: question.session_id,
            response_text: text.to_string(),
            response_time_seconds: seconds,
            sentiment_score: 0.0,
            relevance_score: 0.5,
            technical_accuracy: 0.5,
            analysis: serde_json::json!({}),
            needs_follow_up: false,
            follow_up_text: None,
            follow_up_type: None,
        }
    }
}
