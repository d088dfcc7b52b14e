//! In-process store used when no database is configured, and by tests.
//!
//! A single `RwLock` guards all tables, so each trait method is one atomic
//! write and the session counters can never drift from the child rows.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{InterviewStore, StoreStats};
use crate::models::chat::{ChatContextRow, ContextUpsert, NewChatContext};
use crate::models::interview::{
    NewQuestion, NewResponse, NewSession, QuestionRow, ResponseRow, SessionRow, SessionStatus,
};
use crate::models::posting::{JobPostingRow, NewJobPosting};

#[derive(Default)]
struct Tables {
    contexts: HashMap<Uuid, ChatContextRow>,
    sessions: HashMap<Uuid, SessionRow>,
    questions: HashMap<Uuid, QuestionRow>,
    /// Keyed by question id: at most one response per question.
    responses: HashMap<Uuid, ResponseRow>,
    /// Insertion order, oldest first.
    postings: Vec<JobPostingRow>,
}

impl Tables {
    fn recount(&mut self, session_id: Uuid) {
        let total_questions = self
            .questions
            .values()
            .filter(|q| q.session_id == session_id)
            .count();
        let times: Vec<f64> = self
            .responses
            .values()
            .filter(|r| r.session_id == session_id)
            .map(|r| r.response_time_seconds)
            .collect();
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.total_questions = total_questions as i32;
            session.total_responses = times.len() as i32;
            session.avg_response_time = if times.is_empty() {
                0.0
            } else {
                times.iter().sum::<f64>() / times.len() as f64
            };
            session.updated_at = Utc::now();
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InterviewStore for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn upsert_chat_context(&self, new: NewChatContext) -> Result<ContextUpsert> {
        let mut tables = self.tables.write();
        let now = Utc::now();

        let existing = new.url.as_ref().and_then(|url| {
            tables
                .contexts
                .values_mut()
                .find(|c| c.url.as_deref() == Some(url.as_str()))
        });

        if let Some(row) = existing {
            if !row.is_active {
                return Ok(ContextUpsert::Frozen(row.clone()));
            }
            row.total_messages = new.messages.len() as i32;
            row.messages.0 = new.messages;
            row.extracted_topics = new.extracted_topics;
            row.extracted_at = now;
            row.updated_at = now;
            return Ok(ContextUpsert::Updated(row.clone()));
        }

        let row = ChatContextRow {
            id: Uuid::new_v4(),
            url: new.url,
            chat_title: new.chat_title,
            project_title: new.project_title,
            client_name: new.client_name,
            participants: new.participants,
            total_messages: new.messages.len() as i32,
            messages: sqlx::types::Json(new.messages),
            extracted_topics: new.extracted_topics,
            is_active: true,
            extracted_at: now,
            created_at: now,
            updated_at: now,
        };
        tables.contexts.insert(row.id, row.clone());
        Ok(ContextUpsert::Created(row))
    }

    async fn get_chat_context(&self, id: Uuid) -> Result<Option<ChatContextRow>> {
        Ok(self.tables.read().contexts.get(&id).cloned())
    }

    async fn deactivate_chat_context(&self, id: Uuid) -> Result<Option<ChatContextRow>> {
        let mut tables = self.tables.write();
        Ok(tables.contexts.get_mut(&id).map(|row| {
            if row.is_active {
                row.is_active = false;
                row.updated_at = Utc::now();
            }
            row.clone()
        }))
    }

    async fn create_session(&self, new: NewSession) -> Result<SessionRow> {
        let now = Utc::now();
        let row = SessionRow {
            id: Uuid::new_v4(),
            context_id: new.context_id,
            session_name: new.session_name,
            candidate_name: new.candidate_name,
            interview_type: new.interview_type,
            difficulty: new.difficulty,
            status: SessionStatus::Active.as_str().to_string(),
            total_questions: 0,
            total_responses: 0,
            avg_response_time: 0.0,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        };
        self.tables.write().sessions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<SessionRow>> {
        Ok(self.tables.read().sessions.get(&id).cloned())
    }

    async fn list_sessions(&self, limit: i64) -> Result<Vec<SessionRow>> {
        let tables = self.tables.read();
        let mut sessions: Vec<_> = tables.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit.max(0) as usize);
        Ok(sessions)
    }

    async fn update_session_status(
        &self,
        id: Uuid,
        status: SessionStatus,
    ) -> Result<Option<SessionRow>> {
        let mut tables = self.tables.write();
        Ok(tables.sessions.get_mut(&id).map(|row| {
            let now = Utc::now();
            row.status = status.as_str().to_string();
            if status == SessionStatus::Completed {
                row.completed_at = Some(now);
            }
            row.updated_at = now;
            row.clone()
        }))
    }

    async fn mark_session_started(&self, id: Uuid) -> Result<Option<SessionRow>> {
        let mut tables = self.tables.write();
        Ok(tables.sessions.get_mut(&id).map(|row| {
            let now = Utc::now();
            row.status = SessionStatus::Active.as_str().to_string();
            row.started_at.get_or_insert(now);
            row.updated_at = now;
            row.clone()
        }))
    }

    async fn add_questions(
        &self,
        session_id: Uuid,
        questions: Vec<NewQuestion>,
    ) -> Result<Vec<QuestionRow>> {
        let mut tables = self.tables.write();
        if !tables.sessions.contains_key(&session_id) {
            anyhow::bail!("session {session_id} not found");
        }
        let next = tables
            .questions
            .values()
            .filter(|q| q.session_id == session_id)
            .map(|q| q.position + 1)
            .max()
            .unwrap_or(0);

        let now = Utc::now();
        let rows: Vec<QuestionRow> = questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| QuestionRow {
                id: Uuid::new_v4(),
                session_id,
                position: next + i as i32,
                question_text: q.question_text,
                question_type: q.question_type,
                difficulty: q.difficulty,
                related_topics: q.related_topics,
                generated_by_model: q.generated_by_model,
                generation_confidence: q.generation_confidence,
                created_at: now,
                asked_at: None,
            })
            .collect();
        for row in &rows {
            tables.questions.insert(row.id, row.clone());
        }
        tables.recount(session_id);
        Ok(rows)
    }

    async fn list_questions(&self, session_id: Uuid) -> Result<Vec<QuestionRow>> {
        let tables = self.tables.read();
        let mut questions: Vec<_> = tables
            .questions
            .values()
            .filter(|q| q.session_id == session_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.position);
        Ok(questions)
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<QuestionRow>> {
        Ok(self.tables.read().questions.get(&id).cloned())
    }

    async fn mark_question_asked(&self, id: Uuid) -> Result<Option<QuestionRow>> {
        let mut tables = self.tables.write();
        Ok(tables.questions.get_mut(&id).map(|row| {
            row.asked_at.get_or_insert_with(Utc::now);
            row.clone()
        }))
    }

    async fn upsert_response(&self, new: NewResponse) -> Result<ResponseRow> {
        let mut tables = self.tables.write();
        if !tables.questions.contains_key(&new.question_id) {
            anyhow::bail!("question {} not found", new.question_id);
        }
        let now = Utc::now();
        let (id, created_at) = tables
            .responses
            .get(&new.question_id)
            .map(|r| (r.id, r.created_at))
            .unwrap_or_else(|| (Uuid::new_v4(), now));

        let row = ResponseRow {
            id,
            question_id: new.question_id,
            session_id: new.session_id,
            response_text: new.response_text,
            response_time_seconds: new.response_time_seconds,
            sentiment_score: new.sentiment_score,
            relevance_score: new.relevance_score,
            technical_accuracy: new.technical_accuracy,
            analysis: new.analysis,
            needs_follow_up: new.needs_follow_up,
            follow_up_text: new.follow_up_text,
            follow_up_type: new.follow_up_type,
            created_at,
            analyzed_at: now,
        };
        tables.responses.insert(row.question_id, row.clone());
        tables.recount(row.session_id);
        Ok(row)
    }

    async fn list_responses(&self, session_id: Uuid) -> Result<Vec<ResponseRow>> {
        let tables = self.tables.read();
        let position = |question_id: &Uuid| {
            tables
                .questions
                .get(question_id)
                .map(|q| q.position)
                .unwrap_or(i32::MAX)
        };
        let mut responses: Vec<_> = tables
            .responses
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        responses.sort_by_key(|r| position(&r.question_id));
        Ok(responses)
    }

    async fn insert_posting(&self, new: NewJobPosting) -> Result<JobPostingRow> {
        let now = Utc::now();
        let row = JobPostingRow {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            budget: new.budget,
            skills_required: new.skills_required,
            deadline: new.deadline,
            url: new.url,
            language: new.language,
            client: new.client,
            fetch_method: new.fetch_method,
            tos_safe: new.tos_safe,
            match_score: new.match_score,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().postings.push(row.clone());
        Ok(row)
    }

    async fn get_posting(&self, id: Uuid) -> Result<Option<JobPostingRow>> {
        Ok(self.tables.read().postings.iter().find(|p| p.id == id).cloned())
    }

    async fn list_postings(&self, limit: i64) -> Result<Vec<JobPostingRow>> {
        Ok(self
            .tables
            .read()
            .postings
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn update_posting_score(&self, id: Uuid, score: f64) -> Result<Option<JobPostingRow>> {
        let mut tables = self.tables.write();
        Ok(tables.postings.iter_mut().find(|p| p.id == id).map(|p| {
            p.match_score = score;
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let tables = self.tables.read();
        let with_status = |status: SessionStatus| {
            tables
                .sessions
                .values()
                .filter(|s| s.status == status.as_str())
                .count() as i64
        };
        Ok(StoreStats {
            total_contexts: tables.contexts.len() as i64,
            total_sessions: tables.sessions.len() as i64,
            active_sessions: with_status(SessionStatus::Active),
            completed_sessions: with_status(SessionStatus::Completed),
            total_responses: tables.responses.len() as i64,
            total_postings: tables.postings.len() as i64,
        })
    }
}
