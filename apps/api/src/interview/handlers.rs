use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::chat::conversation::Conversation;
use crate::chat::topics::TopicExtractor;
use crate::errors::AppError;
use crate::interview::session::{
    AddQuestionsRequest, CreateSessionRequest, QuestionWithResponse, SessionAction, SessionDetail,
    SessionReport, SessionTracker, StartedSession, SubmitResponseRequest, SubmittedResponse,
};
use crate::interview::smart_reply::{SmartReply, SmartReplyGenerator};
use crate::interview::suggest::AnswerSuggestion;
use crate::models::interview::{QuestionRow, SessionRow};
use crate::state::AppState;

const DEFAULT_SESSION_LIMIT: i64 = 50;
const MAX_SESSION_LIMIT: i64 = 200;

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct SuggestAnswerRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Deserialize)]
pub struct SmartResponsesRequest {
    #[serde(default)]
    pub chat_data: Value,
    /// Skips topic extraction when supplied.
    #[serde(default)]
    pub topics: Option<Vec<String>>,
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionDetail>), AppError> {
    let models = state.models.handles().await;
    let tracker = SessionTracker::new(state.store.as_ref(), &models, state.config.model_timeout());
    let detail = tracker.create(req, &mut state.selector()).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/v1/sessions
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<SessionRow>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SESSION_LIMIT)
        .clamp(1, MAX_SESSION_LIMIT);
    Ok(Json(state.store.list_sessions(limit).await?))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionDetail>, AppError> {
    let models = state.models.handles().await;
    let tracker = SessionTracker::new(state.store.as_ref(), &models, state.config.model_timeout());
    Ok(Json(tracker.detail(id).await?))
}

/// GET /api/v1/sessions/:id/questions
pub async fn handle_list_questions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<QuestionWithResponse>>, AppError> {
    let models = state.models.handles().await;
    let tracker = SessionTracker::new(state.store.as_ref(), &models, state.config.model_timeout());
    Ok(Json(tracker.questions(id).await?))
}

/// POST /api/v1/sessions/:id/questions
pub async fn handle_add_questions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<AddQuestionsRequest>>,
) -> Result<(StatusCode, Json<Vec<QuestionRow>>), AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let models = state.models.handles().await;
    let tracker = SessionTracker::new(state.store.as_ref(), &models, state.config.model_timeout());
    let added = tracker.add_questions(id, req, &mut state.selector()).await?;
    Ok((StatusCode::CREATED, Json(added)))
}

/// POST /api/v1/sessions/:id/start
pub async fn handle_start_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StartedSession>, AppError> {
    let models = state.models.handles().await;
    let tracker = SessionTracker::new(state.store.as_ref(), &models, state.config.model_timeout());
    Ok(Json(tracker.start(id).await?))
}

async fn apply_action(
    state: &AppState,
    id: Uuid,
    action: SessionAction,
) -> Result<Json<SessionRow>, AppError> {
    let models = state.models.handles().await;
    let tracker = SessionTracker::new(state.store.as_ref(), &models, state.config.model_timeout());
    Ok(Json(tracker.apply(id, action).await?))
}

/// POST /api/v1/sessions/:id/pause
pub async fn handle_pause_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionRow>, AppError> {
    apply_action(&state, id, SessionAction::Pause).await
}

/// POST /api/v1/sessions/:id/resume
pub async fn handle_resume_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionRow>, AppError> {
    apply_action(&state, id, SessionAction::Resume).await
}

/// POST /api/v1/sessions/:id/cancel
pub async fn handle_cancel_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionRow>, AppError> {
    apply_action(&state, id, SessionAction::Cancel).await
}

/// POST /api/v1/sessions/:id/complete
pub async fn handle_complete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionReport>, AppError> {
    let models = state.models.handles().await;
    let tracker = SessionTracker::new(state.store.as_ref(), &models, state.config.model_timeout());
    Ok(Json(tracker.complete(id).await?))
}

/// POST /api/v1/sessions/:id/suggest-answer
pub async fn handle_suggest_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SuggestAnswerRequest>,
) -> Result<Json<AnswerSuggestion>, AppError> {
    let models = state.models.handles().await;
    let tracker = SessionTracker::new(state.store.as_ref(), &models, state.config.model_timeout());
    Ok(Json(tracker.suggest_answer(id, &req.question).await?))
}

/// POST /api/v1/questions/:id/respond
pub async fn handle_submit_response(
    State(state): State<AppState>,
    Path(question_id): Path<Uuid>,
    Json(req): Json<SubmitResponseRequest>,
) -> Result<Json<SubmittedResponse>, AppError> {
    let models = state.models.handles().await;
    let tracker = SessionTracker::new(state.store.as_ref(), &models, state.config.model_timeout());
    Ok(Json(tracker.submit_response(question_id, req).await?))
}

/// POST /api/v1/smart-responses
pub async fn handle_smart_responses(
    State(state): State<AppState>,
    Json(req): Json<SmartResponsesRequest>,
) -> Result<Json<Vec<SmartReply>>, AppError> {
    let conversation = Conversation::from_value_lossy(&req.chat_data);
    let models = state.models.handles().await;
    let timeout = state.config.model_timeout();

    let topics = match req.topics {
        Some(topics) => topics,
        None => {
            TopicExtractor::new(models.classifier.as_deref(), timeout)
                .extract(&conversation)
                .await
        }
    };

    let replies = SmartReplyGenerator::new(models.generator.as_deref(), timeout)
        .generate(&conversation, &topics, &mut state.selector())
        .await;
    if replies.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "Unable to generate smart responses from chat context".to_string(),
        ));
    }
    Ok(Json(replies))
}
