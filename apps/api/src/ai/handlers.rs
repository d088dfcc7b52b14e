use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::ai::manager::ModelStatus;
use crate::errors::AppError;
use crate::jobs::JobSummary;
use crate::store::StoreStats;
use crate::state::AppState;

#[derive(Serialize)]
pub struct AiStatusResponse {
    pub models: ModelStatus,
    pub storage_backend: &'static str,
    pub statistics: StoreStats,
    pub ingest_jobs: JobSummary,
}

#[derive(Default, Deserialize)]
pub struct InitializeRequest {
    #[serde(default)]
    pub force_reload: bool,
}

/// GET /api/v1/ai/status
pub async fn handle_ai_status(
    State(state): State<AppState>,
) -> Result<Json<AiStatusResponse>, AppError> {
    Ok(Json(AiStatusResponse {
        models: state.models.status().await,
        storage_backend: state.store.backend(),
        statistics: state.store.stats().await?,
        ingest_jobs: state.jobs.summary(),
    }))
}

/// POST /api/v1/ai/initialize
pub async fn handle_ai_initialize(
    State(state): State<AppState>,
    body: Option<Json<InitializeRequest>>,
) -> Result<Json<ModelStatus>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    state
        .models
        .initialize(req.force_reload)
        .await
        .map_err(|e| AppError::ServiceUnavailable(format!("Model initialization failed: {e:#}")))?;
    Ok(Json(state.models.status().await))
}
