//! Axum route handlers for scraped job posts.

use std::cmp::Ordering;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::posting::JobPostingRow;
use crate::postings::{match_score, normalize_skills, PostingDraft, RawSkills};
use crate::state::AppState;

const DEFAULT_POSTING_LIMIT: i64 = 50;
const MAX_POSTING_LIMIT: i64 = 200;
/// Search ranks at most this many of the newest posts.
const SEARCH_WINDOW: i64 = 500;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PostingListQuery {
    pub limit: Option<i64>,
}

#[derive(Default, Deserialize)]
pub struct SkillsRequest {
    #[serde(default)]
    pub skills: Option<RawSkills>,
}

#[derive(Serialize)]
pub struct ScoreResponse {
    pub id: Uuid,
    pub skills: Vec<String>,
    pub match_score: f64,
}

#[derive(Serialize)]
pub struct RankedPosting {
    /// Score against the searched skills; the stored `match_score` is untouched.
    pub search_score: f64,
    #[serde(flatten)]
    pub posting: JobPostingRow,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/job-postings/ingest
pub async fn handle_ingest_posting(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<JobPostingRow>), AppError> {
    let draft = PostingDraft::from_payload(&body).map_err(|e| AppError::Validation(e.to_string()))?;
    let posting = state.store.insert_posting(draft).await?;
    info!(
        "Job posting ingested: {} (match {:.2})",
        posting.id, posting.match_score
    );
    Ok((StatusCode::CREATED, Json(posting)))
}

/// GET /api/v1/job-postings
pub async fn handle_list_postings(
    State(state): State<AppState>,
    Query(params): Query<PostingListQuery>,
) -> Result<Json<Vec<JobPostingRow>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_POSTING_LIMIT)
        .clamp(1, MAX_POSTING_LIMIT);
    Ok(Json(state.store.list_postings(limit).await?))
}

/// GET /api/v1/job-postings/:id
pub async fn handle_get_posting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobPostingRow>, AppError> {
    let posting = state
        .store
        .get_posting(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job posting {id} not found")))?;
    Ok(Json(posting))
}

/// POST /api/v1/job-postings/:id/score
///
/// Re-scores against the given skills, or the post's own when none are sent,
/// and stores the result.
pub async fn handle_score_posting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<SkillsRequest>>,
) -> Result<Json<ScoreResponse>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let posting = state
        .store
        .get_posting(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job posting {id} not found")))?;

    let skills = match req.skills {
        Some(raw) => normalize_skills(Some(&raw)),
        None => posting.skills_required,
    };
    let score = match_score(&posting.description, &skills);

    state
        .store
        .update_posting_score(id, score)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job posting {id} not found")))?;

    Ok(Json(ScoreResponse {
        id,
        skills,
        match_score: score,
    }))
}

/// POST /api/v1/job-postings/search
///
/// Ranks recent posts by match against the given skills, best first. Ties
/// keep newest first.
pub async fn handle_search_postings(
    State(state): State<AppState>,
    Json(req): Json<SkillsRequest>,
) -> Result<Json<Vec<RankedPosting>>, AppError> {
    let skills = normalize_skills(req.skills.as_ref());
    let mut ranked: Vec<RankedPosting> = state
        .store
        .list_postings(SEARCH_WINDOW)
        .await?
        .into_iter()
        .map(|posting| RankedPosting {
            search_score: match_score(&posting.description, &skills),
            posting,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.search_score
            .partial_cmp(&a.search_score)
            .unwrap_or(Ordering::Equal)
    });
    Ok(Json(ranked))
}
