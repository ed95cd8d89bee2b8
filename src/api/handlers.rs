//! HTTP handlers for the context engine
//!
//! Every handler locks the conversation's manager for the duration of the
//! call, so requests for one conversation are applied in arrival order.

use crate::branching::{
    BranchInfo, BranchNavigation, BranchReason, MergeCandidate, MergeOutcome,
};
use crate::context::{
    AddMessageOutcome, ContextExport, ContextStats, IncomingMessage, ModelMessage,
    OptimizationReport,
};
use crate::engine::ContextEngine;
use crate::error::ContextError;
use crate::metrics::METRICS;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Shared state for all handlers
#[derive(Clone)]
pub struct ApiState {
    pub engine: ContextEngine,
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn status_for(err: &ContextError) -> StatusCode {
    match err {
        ContextError::BranchNotFound(_) => StatusCode::NOT_FOUND,
        ContextError::BranchActive(_) | ContextError::BranchLimit(_) => StatusCode::CONFLICT,
        ContextError::NotInitialized => StatusCode::PRECONDITION_FAILED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ContextError) -> (StatusCode, Json<ApiError>) {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    (status, Json(ApiError::new(err.code(), err.to_string())))
}

#[derive(Debug, Default, Deserialize)]
pub struct InitializeRequest {
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBranchRequest {
    pub topic: String,
    #[serde(default)]
    pub reason: Option<BranchReason>,
    #[serde(default)]
    pub branch_point: Option<usize>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateBranchResponse {
    pub branch_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub source_id: String,
    pub target_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArchiveResponse {
    pub archived: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub conversations: usize,
}

/// POST /api/v1/conversations/:id/initialize
pub async fn initialize(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<InitializeRequest>,
) -> ApiResult<ContextStats> {
    info!("Initialize request: conversation={}", id);
    let manager = state.engine.conversation(&id);
    let mut manager = manager.lock().await;
    manager
        .initialize_context(request.messages)
        .await
        .map_err(reject)?;
    manager.get_context_stats().map(Json).map_err(reject)
}

/// POST /api/v1/conversations/:id/messages
pub async fn add_message(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(message): Json<IncomingMessage>,
) -> ApiResult<AddMessageOutcome> {
    if message.content.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("VALIDATION_ERROR", "Content cannot be empty")),
        ));
    }
    let manager = state.engine.conversation(&id);
    let mut manager = manager.lock().await;
    manager.add_message(message).await.map(Json).map_err(reject)
}

/// GET /api/v1/conversations/:id/context
pub async fn get_context(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ModelMessage>> {
    let manager = state.engine.conversation(&id);
    let manager = manager.lock().await;
    manager.get_context_for_model().map(Json).map_err(reject)
}

/// GET /api/v1/conversations/:id/stats
pub async fn get_stats(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<ContextStats> {
    let manager = state.engine.conversation(&id);
    let manager = manager.lock().await;
    manager.get_context_stats().map(Json).map_err(reject)
}

/// POST /api/v1/conversations/:id/optimize
pub async fn optimize(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<OptimizationReport> {
    let manager = state.engine.conversation(&id);
    let mut manager = manager.lock().await;
    manager.force_optimization().await.map(Json).map_err(reject)
}

/// GET /api/v1/conversations/:id/export
pub async fn export(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<ContextExport> {
    let manager = state.engine.conversation(&id);
    let manager = manager.lock().await;
    manager.export_context().map(Json).map_err(reject)
}

/// DELETE /api/v1/conversations/:id
pub async fn clear(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    info!("Clear request: conversation={}", id);
    let manager = state.engine.conversation(&id);
    manager
        .lock()
        .await
        .clear_persisted_data()
        .await
        .map_err(reject)?;
    state.engine.evict(&id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/conversations/:id/branches
pub async fn list_branches(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<BranchInfo>> {
    let manager = state.engine.conversation(&id);
    let manager = manager.lock().await;
    manager.get_branches().map(Json).map_err(reject)
}

/// POST /api/v1/conversations/:id/branches
pub async fn create_branch(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<CreateBranchRequest>,
) -> ApiResult<CreateBranchResponse> {
    let manager = state.engine.conversation(&id);
    let mut manager = manager.lock().await;
    let branch_id = manager
        .create_conversation_branch(
            request.topic,
            request.reason.unwrap_or(BranchReason::UserRequest),
            request.branch_point,
            request.parent_id.as_deref(),
        )
        .map_err(reject)?;
    Ok(Json(CreateBranchResponse { branch_id }))
}

/// POST /api/v1/conversations/:id/branches/:branch_id/switch
pub async fn switch_branch(
    State(state): State<ApiState>,
    Path((id, branch_id)): Path<(String, String)>,
) -> ApiResult<ContextStats> {
    let manager = state.engine.conversation(&id);
    let mut manager = manager.lock().await;
    manager.switch_to_branch(&branch_id).map_err(reject)?;
    manager.get_context_stats().map(Json).map_err(reject)
}

/// DELETE /api/v1/conversations/:id/branches/:branch_id
pub async fn archive_branch(
    State(state): State<ApiState>,
    Path((id, branch_id)): Path<(String, String)>,
) -> ApiResult<ArchiveResponse> {
    let manager = state.engine.conversation(&id);
    let mut manager = manager.lock().await;
    let archived = manager.archive_branch(&branch_id).map_err(reject)?;
    Ok(Json(ArchiveResponse { archived }))
}

/// GET /api/v1/conversations/:id/merge-candidates
pub async fn merge_candidates(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<MergeCandidate>> {
    let manager = state.engine.conversation(&id);
    let manager = manager.lock().await;
    manager.find_merge_candidates().map(Json).map_err(reject)
}

/// POST /api/v1/conversations/:id/merge
///
/// Only pairs currently reported as merge candidates are accepted.
pub async fn merge(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<MergeRequest>,
) -> ApiResult<MergeOutcome> {
    let manager = state.engine.conversation(&id);
    let mut manager = manager.lock().await;
    let candidate = manager
        .find_merge_candidates()
        .map_err(reject)?
        .into_iter()
        .find(|c| c.source_id == request.source_id && c.target_id == request.target_id)
        .ok_or_else(|| {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiError::new(
                    "NOT_A_MERGE_CANDIDATE",
                    format!(
                        "{} -> {} is not a merge candidate",
                        request.source_id, request.target_id
                    ),
                )),
            )
        })?;
    manager.merge_branches(&candidate).await.map(Json).map_err(reject)
}

/// GET /api/v1/conversations/:id/navigation
pub async fn navigation(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<BranchNavigation> {
    let manager = state.engine.conversation(&id);
    let manager = manager.lock().await;
    manager.navigation().map(Json).map_err(reject)
}

/// GET /health
pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        conversations: state.engine.len(),
    })
}

/// GET /metrics
pub async fn metrics() -> String {
    METRICS.export_prometheus()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&ContextError::BranchNotFound("b".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ContextError::BranchActive("b".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ContextError::NotInitialized),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            status_for(&ContextError::Persistence("io".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_reject_body_carries_code() {
        let (status, Json(body)) = reject(ContextError::NotInitialized);
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(body.code, "NOT_INITIALIZED");
    }
}
