//! Interview session progress tracking.
//!
//! A session is created `active` with its questions already generated, moves
//! through `pause`/`resume`, and ends `completed` (with a report) or
//! `cancelled`. Responses are only accepted while active. Counters are owned
//! by the store; this module only reads them back.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::ai::manager::ModelHandles;
use crate::chat::conversation::Conversation;
use crate::errors::AppError;
use crate::interview::follow_up::{select_follow_up, FollowUp};
use crate::interview::questions::{Difficulty, QuestionGenerator, QuestionType};
use crate::interview::scoring::{ResponseAnalysis, ResponseAnalyzer, ResponseScores};
use crate::interview::selector::TemplateSelector;
use crate::interview::suggest::{suggest_answer, AnswerSuggestion};
use crate::models::chat::ChatContextRow;
use crate::models::interview::{
    NewQuestion, NewResponse, NewSession, QuestionRow, ResponseRow, SessionRow, SessionStatus,
};
use crate::store::InterviewStore;

const DEFAULT_NUM_QUESTIONS: usize = 3;
const MAX_NUM_QUESTIONS: usize = 20;

const EXCELLENT_SCORE: f64 = 0.8;
const GOOD_SCORE: f64 = 0.6;
const WEAK_TECHNICAL_SCORE: f64 = 0.5;
const VERBOSE_SECONDS: f64 = 120.0;
const BRIEF_SECONDS: f64 = 30.0;

// ────────────────────────────────────────────────────────────────────────────
// State machine
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Start,
    Pause,
    Resume,
    Cancel,
    Complete,
}

impl SessionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionAction::Start => "start",
            SessionAction::Pause => "pause",
            SessionAction::Resume => "resume",
            SessionAction::Cancel => "cancel",
            SessionAction::Complete => "complete",
        }
    }
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("cannot {action} a session that is {from}")]
pub struct TransitionError {
    pub from: SessionStatus,
    pub action: SessionAction,
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        AppError::Conflict(e.to_string())
    }
}

pub fn transition(from: SessionStatus, action: SessionAction) -> Result<SessionStatus, TransitionError> {
    use SessionAction as A;
    use SessionStatus as S;

    match (from, action) {
        (S::Active | S::Paused, A::Start) => Ok(S::Active),
        (S::Active, A::Pause) => Ok(S::Paused),
        (S::Paused, A::Resume) => Ok(S::Active),
        (S::Active | S::Paused, A::Cancel) => Ok(S::Cancelled),
        (S::Active | S::Paused, A::Complete) => Ok(S::Completed),
        _ => Err(TransitionError { from, action }),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Request / response models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub context_id: Option<Uuid>,
    pub session_name: Option<String>,
    pub candidate_name: Option<String>,
    pub interview_type: Option<String>,
    pub difficulty: Option<String>,
    pub num_questions: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddQuestionsRequest {
    pub question_type: Option<String>,
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponseRequest {
    #[serde(default)]
    pub response_text: String,
    #[serde(default)]
    pub response_time_seconds: f64,
}

#[derive(Debug, Serialize)]
pub struct QuestionWithResponse {
    #[serde(flatten)]
    pub question: QuestionRow,
    pub response: Option<ResponseRow>,
}

#[derive(Debug, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: SessionRow,
    pub questions: Vec<QuestionWithResponse>,
    pub context_topics: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StartedSession {
    pub session: SessionRow,
    /// `None` once every question has a response.
    pub current_question: Option<QuestionRow>,
    pub question_number: Option<i32>,
    pub total_questions: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub completed_questions: i32,
    pub total_questions: i32,
    pub percentage: f64,
}

impl Progress {
    fn of(session: &SessionRow) -> Self {
        let percentage = if session.total_questions > 0 {
            session.total_responses as f64 / session.total_questions as f64 * 100.0
        } else {
            0.0
        };
        Self {
            completed_questions: session.total_responses,
            total_questions: session.total_questions,
            percentage,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmittedResponse {
    pub response: ResponseRow,
    pub analysis: ResponseAnalysis,
    pub follow_up: Option<FollowUp>,
    pub next_question: Option<QuestionRow>,
    pub progress: Progress,
}

// ────────────────────────────────────────────────────────────────────────────
// Report
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverallScores {
    pub sentiment: f64,
    pub relevance: f64,
    pub technical_accuracy: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportStatistics {
    pub total_questions: i32,
    pub total_responses: usize,
    pub average_response_time: f64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedResponse {
    pub question: String,
    pub question_type: String,
    pub response: String,
    pub response_time: f64,
    pub scores: ResponseScores,
    pub analysis: Value,
    pub follow_up_generated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub session_name: String,
    pub candidate_name: Option<String>,
    pub interview_type: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_minutes: f64,
    pub overall_scores: OverallScores,
    pub statistics: ReportStatistics,
    pub detailed_responses: Vec<DetailedResponse>,
    pub context_topics: Vec<String>,
    pub recommendations: Vec<&'static str>,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Aggregates a finished session. Scores are plain means; nothing is rounded.
pub fn build_report(
    session: &SessionRow,
    questions: &[QuestionRow],
    responses: &[ResponseRow],
    context_topics: Vec<String>,
) -> SessionReport {
    let detailed_responses: Vec<DetailedResponse> = responses
        .iter()
        .map(|r| {
            let question = questions.iter().find(|q| q.id == r.question_id);
            DetailedResponse {
                question: question.map(|q| q.question_text.clone()).unwrap_or_default(),
                question_type: question.map(|q| q.question_type.clone()).unwrap_or_default(),
                response: r.response_text.clone(),
                response_time: r.response_time_seconds,
                scores: ResponseScores {
                    sentiment: r.sentiment_score,
                    relevance: r.relevance_score,
                    technical_accuracy: r.technical_accuracy,
                },
                analysis: r.analysis.clone(),
                follow_up_generated: r.follow_up_text.is_some(),
            }
        })
        .collect();

    let scores = ResponseScores {
        sentiment: mean(detailed_responses.iter().map(|d| d.scores.sentiment)),
        relevance: mean(detailed_responses.iter().map(|d| d.scores.relevance)),
        technical_accuracy: mean(detailed_responses.iter().map(|d| d.scores.technical_accuracy)),
    };
    let overall = if detailed_responses.is_empty() { 0.0 } else { scores.mean() };

    let total_questions = session.total_questions;
    let completion_rate = if total_questions > 0 {
        (responses.len() as f64 / total_questions as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };

    let duration_minutes = match (session.started_at, session.completed_at) {
        (Some(started), Some(completed)) => (completed - started).num_milliseconds() as f64 / 60_000.0,
        _ => 0.0,
    };

    SessionReport {
        session_id: session.id,
        session_name: session.session_name.clone(),
        candidate_name: session.candidate_name.clone(),
        interview_type: session.interview_type.clone(),
        completed_at: session.completed_at,
        duration_minutes,
        overall_scores: OverallScores {
            sentiment: scores.sentiment,
            relevance: scores.relevance,
            technical_accuracy: scores.technical_accuracy,
            overall,
        },
        statistics: ReportStatistics {
            total_questions,
            total_responses: responses.len(),
            average_response_time: mean(responses.iter().map(|r| r.response_time_seconds)),
            completion_rate,
        },
        recommendations: recommendations(overall, &detailed_responses),
        detailed_responses,
        context_topics,
    }
}

pub fn recommendations(overall: f64, responses: &[DetailedResponse]) -> Vec<&'static str> {
    let mut out = Vec::new();

    out.push(if overall >= EXCELLENT_SCORE {
        "Excellent performance! Strong technical knowledge and communication skills."
    } else if overall >= GOOD_SCORE {
        "Good performance with room for improvement in specific areas."
    } else {
        "Performance needs improvement. Consider additional preparation."
    });

    let technical: Vec<f64> = responses
        .iter()
        .filter(|r| r.question_type == QuestionType::Technical.as_str())
        .map(|r| r.scores.technical_accuracy)
        .collect();
    if !technical.is_empty() && mean(technical.into_iter()) < WEAK_TECHNICAL_SCORE {
        out.push("Focus on strengthening technical knowledge and providing concrete examples.");
    }

    let avg_time = mean(responses.iter().map(|r| r.response_time));
    if avg_time > VERBOSE_SECONDS {
        out.push("Consider practicing to provide more concise responses.");
    } else if avg_time < BRIEF_SECONDS {
        out.push("Consider providing more detailed and thorough responses.");
    }

    out
}

// ────────────────────────────────────────────────────────────────────────────
// Tracker
// ────────────────────────────────────────────────────────────────────────────

/// Session operations over a store and the current model handles.
pub struct SessionTracker<'a> {
    store: &'a dyn InterviewStore,
    models: &'a ModelHandles,
    timeout: Duration,
}

impl<'a> SessionTracker<'a> {
    pub fn new(store: &'a dyn InterviewStore, models: &'a ModelHandles, timeout: Duration) -> Self {
        Self {
            store,
            models,
            timeout,
        }
    }

    fn question_generator(&self) -> QuestionGenerator<'a> {
        QuestionGenerator::new(self.models.generator.as_deref(), self.timeout)
    }

    async fn load(&self, id: Uuid) -> Result<(SessionRow, SessionStatus), AppError> {
        let session = self
            .store
            .get_session(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Interview session {id} not found")))?;
        let status = session
            .status
            .parse::<SessionStatus>()
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        Ok((session, status))
    }

    /// The session's context, if it still exists.
    async fn context(&self, session: &SessionRow) -> Result<Option<ChatContextRow>, AppError> {
        match session.context_id {
            Some(id) => Ok(self.store.get_chat_context(id).await?),
            None => Ok(None),
        }
    }

    pub async fn create(
        &self,
        req: CreateSessionRequest,
        selector: &mut dyn TemplateSelector,
    ) -> Result<SessionDetail, AppError> {
        let context_id = req
            .context_id
            .ok_or_else(|| AppError::Validation("context_id is required".to_string()))?;
        let context = self
            .store
            .get_chat_context(context_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Chat context {context_id} not found")))?;

        let question_type = match req.interview_type.as_deref() {
            Some(t) => t.parse::<QuestionType>().map_err(AppError::Validation)?,
            None => QuestionType::General,
        };
        let difficulty = match req.difficulty.as_deref() {
            Some(d) => d.parse::<Difficulty>().map_err(AppError::Validation)?,
            None => Difficulty::default(),
        };
        let num_questions = question_count(req.num_questions)?;

        let session_name = req.session_name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| {
            let title = context
                .project_title
                .as_deref()
                .or(context.chat_title.as_deref())
                .unwrap_or("Project");
            format!("Interview for {title}")
        });

        let session = self
            .store
            .create_session(NewSession {
                context_id: Some(context.id),
                session_name,
                candidate_name: req.candidate_name.filter(|n| !n.trim().is_empty()),
                interview_type: question_type.as_str().to_string(),
                difficulty: difficulty.as_str().to_string(),
            })
            .await?;

        let generated = self
            .question_generator()
            .generate(&context.extracted_topics, question_type, num_questions, selector)
            .await;
        let questions = self
            .store
            .add_questions(session.id, generated.into_iter().map(NewQuestion::from).collect())
            .await?;

        let session = self.store.get_session(session.id).await?.unwrap_or(session);
        info!(
            "Created interview session {} with {} questions",
            session.id,
            questions.len()
        );

        Ok(SessionDetail {
            session,
            questions: questions
                .into_iter()
                .map(|question| QuestionWithResponse {
                    question,
                    response: None,
                })
                .collect(),
            context_topics: context.extracted_topics,
        })
    }

    pub async fn detail(&self, id: Uuid) -> Result<SessionDetail, AppError> {
        let (session, _) = self.load(id).await?;
        let questions = self.questions(id).await?;
        let context_topics = self
            .context(&session)
            .await?
            .map(|c| c.extracted_topics)
            .unwrap_or_default();
        Ok(SessionDetail {
            session,
            questions,
            context_topics,
        })
    }

    /// Questions in order, each with its response if there is one.
    pub async fn questions(&self, id: Uuid) -> Result<Vec<QuestionWithResponse>, AppError> {
        self.load(id).await?;
        let questions = self.store.list_questions(id).await?;
        let mut responses = self.store.list_responses(id).await?;

        Ok(questions
            .into_iter()
            .map(|question| {
                let response = responses
                    .iter()
                    .position(|r| r.question_id == question.id)
                    .map(|i| responses.swap_remove(i));
                QuestionWithResponse { question, response }
            })
            .collect())
    }

    pub async fn add_questions(
        &self,
        id: Uuid,
        req: AddQuestionsRequest,
        selector: &mut dyn TemplateSelector,
    ) -> Result<Vec<QuestionRow>, AppError> {
        let (session, status) = self.load(id).await?;
        if status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "cannot add questions to a session that is {status}"
            )));
        }

        let question_type = req
            .question_type
            .as_deref()
            .unwrap_or(&session.interview_type)
            .parse::<QuestionType>()
            .map_err(AppError::Validation)?;
        let count = question_count(req.count)?;
        let topics = self
            .context(&session)
            .await?
            .map(|c| c.extracted_topics)
            .unwrap_or_default();

        let generated = self
            .question_generator()
            .generate(&topics, question_type, count, selector)
            .await;
        Ok(self
            .store
            .add_questions(id, generated.into_iter().map(NewQuestion::from).collect())
            .await?)
    }

    /// Starts (or restarts) the session and asks the first unanswered question.
    pub async fn start(&self, id: Uuid) -> Result<StartedSession, AppError> {
        let (_, status) = self.load(id).await?;
        transition(status, SessionAction::Start)?;

        let questions = self.store.list_questions(id).await?;
        if questions.is_empty() {
            return Err(AppError::NotFound(
                "No questions found for this session".to_string(),
            ));
        }

        let session = self
            .store
            .mark_session_started(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Interview session {id} not found")))?;

        let answered = self.answered(id).await?;
        let current = match questions.iter().find(|q| !answered.contains(&q.id)) {
            Some(q) => self.store.mark_question_asked(q.id).await?,
            None => None,
        };

        Ok(StartedSession {
            question_number: current.as_ref().map(|q| q.position + 1),
            total_questions: session.total_questions,
            current_question: current,
            session,
        })
    }

    /// Pause, resume or cancel.
    pub async fn apply(&self, id: Uuid, action: SessionAction) -> Result<SessionRow, AppError> {
        let (_, status) = self.load(id).await?;
        let next = transition(status, action)?;
        let session = self
            .store
            .update_session_status(id, next)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Interview session {id} not found")))?;
        info!("Session {id}: {action} ({status} -> {next})");
        Ok(session)
    }

    pub async fn complete(&self, id: Uuid) -> Result<SessionReport, AppError> {
        let session = self.apply(id, SessionAction::Complete).await?;
        let questions = self.store.list_questions(id).await?;
        let responses = self.store.list_responses(id).await?;
        let context_topics = self
            .context(&session)
            .await?
            .map(|c| c.extracted_topics)
            .unwrap_or_default();

        Ok(build_report(&session, &questions, &responses, context_topics))
    }

    pub async fn submit_response(
        &self,
        question_id: Uuid,
        req: SubmitResponseRequest,
    ) -> Result<SubmittedResponse, AppError> {
        if !req.response_time_seconds.is_finite() || req.response_time_seconds < 0.0 {
            return Err(AppError::Validation(
                "response_time_seconds must be a non-negative number".to_string(),
            ));
        }

        let question = self
            .store
            .get_question(question_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Interview question {question_id} not found")))?;
        let (_, status) = self.load(question.session_id).await?;
        if status != SessionStatus::Active {
            return Err(AppError::Conflict(format!(
                "responses are not accepted while the session is {status}"
            )));
        }

        let analyzer = ResponseAnalyzer::new(self.models.sentiment.as_deref(), self.timeout);
        let analysis = analyzer
            .analyze(&question.question_text, &req.response_text)
            .await;
        let follow_up = analysis.needs_follow_up.then(|| {
            select_follow_up(&question.question_text, &req.response_text, &analysis.scores)
        });

        let response = self
            .store
            .upsert_response(NewResponse {
                question_id: question.id,
                session_id: question.session_id,
                response_text: req.response_text,
                response_time_seconds: req.response_time_seconds,
                sentiment_score: analysis.scores.sentiment,
                relevance_score: analysis.scores.relevance,
                technical_accuracy: analysis.scores.technical_accuracy,
                analysis: serde_json::to_value(&analysis.details).map_err(anyhow::Error::from)?,
                needs_follow_up: analysis.needs_follow_up,
                follow_up_text: follow_up.as_ref().map(|f| f.text.clone()),
                follow_up_type: follow_up.as_ref().map(|f| f.follow_up_type.as_str().to_string()),
            })
            .await?;
        self.store.mark_question_asked(question.id).await?;

        let answered = self.answered(question.session_id).await?;
        let next = self
            .store
            .list_questions(question.session_id)
            .await?
            .into_iter()
            .find(|q| q.id != question.id && !answered.contains(&q.id));
        let next_question = match next {
            Some(q) => self.store.mark_question_asked(q.id).await?,
            None => None,
        };

        let (session, _) = self.load(question.session_id).await?;
        Ok(SubmittedResponse {
            response,
            analysis,
            follow_up,
            next_question,
            progress: Progress::of(&session),
        })
    }

    pub async fn suggest_answer(
        &self,
        id: Uuid,
        question: &str,
    ) -> Result<AnswerSuggestion, AppError> {
        if question.trim().is_empty() {
            return Err(AppError::Validation("question is required".to_string()));
        }
        let (session, _) = self.load(id).await?;
        let conversation = self
            .context(&session)
            .await?
            .map(|c| c.conversation())
            .unwrap_or_else(Conversation::default);
        Ok(suggest_answer(question, &conversation))
    }

    async fn answered(&self, session_id: Uuid) -> Result<HashSet<Uuid>, AppError> {
        Ok(self
            .store
            .list_responses(session_id)
            .await?
            .into_iter()
            .map(|r| r.question_id)
            .collect())
    }
}

fn question_count(requested: Option<usize>) -> Result<usize, AppError> {
    match requested.unwrap_or(DEFAULT_NUM_QUESTIONS) {
        n @ 1..=MAX_NUM_QUESTIONS => Ok(n),
        n => Err(AppError::Validation(format!(
            "question count must be between 1 and {MAX_NUM_QUESTIONS}, got {n}"
        ))),
    }
}
