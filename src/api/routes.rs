use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::clock::RoundClock;
use crate::draft::DraftService;
use crate::error::AppError;
use crate::scheduler::Scheduler;
use crate::store::ScoreStore;
use crate::types::{DraftPick, Round, RoundId, ScoreRecord};

#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<Scheduler>,
    pub scores: Arc<dyn ScoreStore>,
    pub clock: Arc<RoundClock>,
    pub draft: Arc<DraftService>,
    pub health: Arc<HealthState>,
    pub league_id: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/rounds/current", get(get_current_round))
        .route("/rounds/:round_id/recompute", post(post_recompute))
        .route("/teams/:team_id/rounds/:round_id/score", get(get_score))
        .route("/draft", post(post_start_draft))
        .route("/draft/current", get(get_current_pick))
        .route("/draft/advance", post(post_advance_pick))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RecomputeQuery {
    /// Append a fresh version even when records already exist.
    pub force: Option<bool>,
}

#[derive(Serialize)]
pub struct RecomputeResponse {
    pub round_id: RoundId,
    pub computed: usize,
    pub skipped_in_flight: bool,
}

#[derive(Deserialize)]
pub struct StartDraftRequest {
    pub team_ids: Vec<String>,
    pub rounds: u32,
    pub seed: Option<u64>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub scheduler_ticks: u64,
    pub rounds_scored: u64,
    pub last_tick_at_ms: i64,
}

#[derive(Serialize)]
pub struct AdvanceResponse {
    pub pick: Option<DraftPick>,
    pub complete: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        scheduler_ticks: state.health.scheduler_ticks(),
        rounds_scored: state.health.rounds_scored(),
        last_tick_at_ms: state.health.last_tick_at_ms(),
    })
}

async fn get_current_round(State(state): State<ApiState>) -> Result<Json<Round>, AppError> {
    Ok(Json(state.clock.current_round().await?))
}

async fn get_score(
    State(state): State<ApiState>,
    Path((team_id, round_id)): Path<(String, RoundId)>,
) -> Result<Json<ScoreRecord>, AppError> {
    let record = state
        .scores
        .latest(&team_id, round_id)
        .await?
        .ok_or_else(|| AppError::MissingData(format!("no score for {team_id} round {round_id}")))?;
    Ok(Json(record))
}

/// Manual trigger. Unlike the scheduler tick this surfaces errors to the
/// caller instead of swallowing them.
async fn post_recompute(
    State(state): State<ApiState>,
    Path(round_id): Path<RoundId>,
    Query(params): Query<RecomputeQuery>,
) -> Result<Json<RecomputeResponse>, AppError> {
    let summary = state
        .scheduler
        .recompute_round(round_id, params.force.unwrap_or(false))
        .await?;
    Ok(Json(RecomputeResponse {
        round_id,
        computed: summary.computed,
        skipped_in_flight: summary.skipped_in_flight,
    }))
}

async fn post_start_draft(
    State(state): State<ApiState>,
    Json(req): Json<StartDraftRequest>,
) -> Result<Json<Vec<DraftPick>>, AppError> {
    let picks = state
        .draft
        .start_draft(&state.league_id, &req.team_ids, req.rounds, req.seed)
        .await?;
    Ok(Json(picks))
}

async fn get_current_pick(
    State(state): State<ApiState>,
) -> Result<Json<AdvanceResponse>, AppError> {
    let pick = state.draft.current_pick(&state.league_id).await?;
    let complete = pick.is_none();
    Ok(Json(AdvanceResponse { pick, complete }))
}

async fn post_advance_pick(
    State(state): State<ApiState>,
) -> Result<Json<AdvanceResponse>, AppError> {
    let pick = state.draft.advance_pick(&state.league_id).await?;
    let complete = pick.is_none();
    Ok(Json(AdvanceResponse { pick, complete }))
}
