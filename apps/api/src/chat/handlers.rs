use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::conversation::Conversation;
use crate::chat::topics::TopicExtractor;
use crate::errors::AppError;
use crate::jobs::IngestJob;
use crate::models::chat::{ChatContextRow, ContextUpsert, NewChatContext};
use crate::state::AppState;

#[derive(Serialize)]
pub struct IngestResponse {
    pub job_id: Uuid,
    pub created: bool,
    pub context: ChatContextRow,
}

/// POST /api/v1/chat-contexts/ingest
///
/// 201 when a new context is created, 200 when an active one is refreshed.
pub async fn handle_ingest(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    let conversation =
        Conversation::normalize(&payload).map_err(|e| AppError::Validation(e.to_string()))?;
    if conversation.is_empty() {
        return Err(AppError::Validation("No messages provided".to_string()));
    }

    let job_id = state
        .jobs
        .create(conversation.url.clone(), conversation.messages.len());
    if let Err(job_err) = state.jobs.start(job_id) {
        warn!("Could not record ingest start: {job_err}");
    }

    match ingest(&state, conversation).await {
        Ok((status, context)) => {
            // The context is saved at this point; job bookkeeping only warns.
            if let Err(job_err) = state.jobs.complete(job_id, context.id) {
                warn!("Could not record ingest completion: {job_err}");
            }
            Ok((
                status,
                Json(IngestResponse {
                    job_id,
                    created: status == StatusCode::CREATED,
                    context,
                }),
            ))
        }
        Err(e) => {
            if let Err(job_err) = state.jobs.fail(job_id, e.to_string()) {
                warn!("Could not record ingest failure: {job_err}");
            }
            Err(e)
        }
    }
}

async fn ingest(
    state: &AppState,
    conversation: Conversation,
) -> Result<(StatusCode, ChatContextRow), AppError> {
    let models = state.models.handles().await;
    let topics = TopicExtractor::new(models.classifier.as_deref(), state.config.model_timeout())
        .extract(&conversation)
        .await;

    match state
        .store
        .upsert_chat_context(NewChatContext::from_conversation(conversation, topics))
        .await?
    {
        ContextUpsert::Created(row) => {
            info!("Chat context created: {} ({} messages)", row.id, row.total_messages);
            Ok((StatusCode::CREATED, row))
        }
        ContextUpsert::Updated(row) => {
            info!("Chat context updated: {} ({} messages)", row.id, row.total_messages);
            Ok((StatusCode::OK, row))
        }
        ContextUpsert::Frozen(row) => Err(AppError::Conflict(format!(
            "Chat context {} is inactive and cannot be updated",
            row.id
        ))),
    }
}

/// GET /api/v1/chat-contexts/:id
pub async fn handle_get_context(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatContextRow>, AppError> {
    let context = state
        .store
        .get_chat_context(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Chat context {id} not found")))?;
    Ok(Json(context))
}

/// POST /api/v1/chat-contexts/:id/deactivate
pub async fn handle_deactivate_context(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatContextRow>, AppError> {
    let context = state
        .store
        .deactivate_chat_context(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Chat context {id} not found")))?;
    info!("Chat context deactivated: {id}");
    Ok(Json(context))
}

/// GET /api/v1/ingest-jobs
pub async fn handle_list_jobs(State(state): State<AppState>) -> Json<Vec<IngestJob>> {
    Json(state.jobs.list())
}

/// GET /api/v1/ingest-jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<IngestJob>, AppError> {
    state
        .jobs
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Ingest job {id} not found")))
}
