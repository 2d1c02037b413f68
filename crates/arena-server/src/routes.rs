//! REST control surface.

use axum::extract::{Path, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use arena::session::{DebateListing, ReactionKind, ReactionOutcome};
use arena::{NewDebate, SessionSnapshot};

use crate::error::{ApiError, ApiResult};
use crate::ws;
use crate::AppState;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CreateDebateRequest {
    #[serde(flatten)]
    pub debate: NewDebate,
    #[serde(default = "default_true")]
    pub autostart: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub viewer_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewerResponse {
    pub viewer_id: String,
    pub viewer_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewerCountResponse {
    pub viewer_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub argument_id: String,
    pub viewer_id: String,
    pub kind: ReactionKind,
}

#[derive(Debug, Deserialize)]
pub struct BranchRequest {
    pub round: u32,
    pub argument_index: usize,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub autostart: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShareResponse {
    pub share_code: String,
}

/// Build the application router. Any origin is allowed when `cors_origins` is empty.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers([CONTENT_TYPE, ACCEPT])
    } else {
        let origins: Vec<HeaderValue> = cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers([CONTENT_TYPE, ACCEPT])
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/debates", get(list_debates).post(create_debate))
        .route("/api/debates/:id", get(get_debate).delete(end_debate))
        .route("/api/debates/:id/start", post(start_debate))
        .route("/api/debates/:id/pause", post(pause_debate))
        .route("/api/debates/:id/resume", post(resume_debate))
        .route("/api/debates/:id/viewers", post(join_debate))
        .route("/api/debates/:id/viewers/:viewer_id", delete(leave_debate))
        .route("/api/debates/:id/reactions", post(react))
        .route("/api/debates/:id/branches", post(branch_debate))
        .route("/api/debates/:id/share", get(share_code))
        .route("/api/share/:code", get(resolve_share_code))
        .route("/ws/debates/:id", get(ws::debate_stream))
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn list_debates(State(state): State<AppState>) -> ApiResult<Json<Vec<DebateListing>>> {
    Ok(Json(state.arena.list()?))
}

async fn create_debate(
    State(state): State<AppState>,
    Json(request): Json<CreateDebateRequest>,
) -> ApiResult<(StatusCode, Json<SessionSnapshot>)> {
    if request.debate.topic.trim().is_empty() {
        return Err(ApiError::BadRequest("topic must not be empty".to_string()));
    }
    let snapshot = state.arena.create_debate(request.debate)?;
    info!(debate_id = %snapshot.id, autostart = request.autostart, "Debate created");
    if !request.autostart {
        return Ok((StatusCode::CREATED, Json(snapshot)));
    }
    state.arena.start_debate(&snapshot.id)?;
    Ok((StatusCode::CREATED, Json(state.arena.snapshot(&snapshot.id)?)))
}

async fn get_debate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionSnapshot>> {
    Ok(Json(state.arena.snapshot(&id)?))
}

async fn end_debate(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.arena.end_debate(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn start_debate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionSnapshot>> {
    state.arena.start_debate(&id)?;
    Ok(Json(state.arena.snapshot(&id)?))
}

async fn pause_debate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionSnapshot>> {
    state.arena.pause(&id)?;
    Ok(Json(state.arena.snapshot(&id)?))
}

async fn resume_debate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionSnapshot>> {
    state.arena.resume(&id)?;
    Ok(Json(state.arena.snapshot(&id)?))
}

async fn join_debate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<JoinRequest>>,
) -> ApiResult<Json<ViewerResponse>> {
    let viewer_id = body.and_then(|Json(b)| b.viewer_id);
    let (viewer_id, viewer_count) = state.arena.join(&id, viewer_id)?;
    Ok(Json(ViewerResponse {
        viewer_id,
        viewer_count,
    }))
}

async fn leave_debate(
    State(state): State<AppState>,
    Path((id, viewer_id)): Path<(String, String)>,
) -> ApiResult<Json<ViewerCountResponse>> {
    let viewer_count = state.arena.leave(&id, &viewer_id)?;
    Ok(Json(ViewerCountResponse { viewer_count }))
}

async fn react(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ReactionRequest>,
) -> ApiResult<Json<ReactionOutcome>> {
    Ok(Json(state.arena.react(
        &id,
        &request.argument_id,
        &request.viewer_id,
        request.kind,
    )?))
}

async fn branch_debate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<BranchRequest>,
) -> ApiResult<(StatusCode, Json<SessionSnapshot>)> {
    let snapshot = state.arena.branch(
        &id,
        request.round,
        request.argument_index,
        request.topic,
        request.autostart,
    )?;
    info!(parent_id = %id, debate_id = %snapshot.id, round = request.round, "Debate branched");
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn share_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ShareResponse>> {
    Ok(Json(ShareResponse {
        share_code: state.arena.share_code(&id)?,
    }))
}

async fn resolve_share_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<SessionSnapshot>> {
    Ok(Json(state.arena.resolve_share_code(&code)?))
}
