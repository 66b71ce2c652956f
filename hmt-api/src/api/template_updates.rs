//! Template reconciliation endpoints
//!
//! GET /tasks/:taskId/template-diff, POST /tasks/apply-template-updates,
//! GET /tasks/updates

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use hmt_common::models::User;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::services::template_sync::{
    self, ApplyRequest, ApplyResult, PendingUpdate, TemplateDiff,
};
use crate::AppState;

/// POST /tasks/apply-template-updates request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyUpdatesRequest {
    #[serde(default)]
    pub updates: Vec<ApplyRequest>,
    #[serde(default)]
    pub override_policy: Option<String>,
}

/// POST /tasks/apply-template-updates response
#[derive(Debug, Serialize)]
pub struct ApplyUpdatesResponse {
    pub results: Vec<ApplyResult>,
}

/// GET /tasks/updates query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdatesQuery {
    pub trackable_id: Option<String>,
}

/// GET /tasks/updates response
#[derive(Debug, Serialize)]
pub struct PendingUpdatesResponse {
    pub updates: Vec<PendingUpdate>,
}

/// GET /tasks/:taskId/template-diff
///
/// 404 `TASK_OR_TEMPLATE_NOT_FOUND` when the task is not the caller's or has no template.
pub async fn get_template_diff(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TemplateDiff>> {
    template_sync::template_diff(&state.db, user.id, &task_id)
        .await?
        .map(Json)
        .ok_or(ApiError::TaskOrTemplateNotFound)
}

/// POST /tasks/apply-template-updates
///
/// Results come back in request order. Items that cannot be resolved carry
/// `skippedReason` instead of failing the request.
pub async fn apply_template_updates(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<ApplyUpdatesRequest>,
) -> ApiResult<Json<ApplyUpdatesResponse>> {
    let policy = template_sync::parse_policy(request.override_policy.as_deref());
    let results =
        template_sync::apply_template_updates(&state.db, user.id, &request.updates, policy)
            .await?;

    Ok(Json(ApplyUpdatesResponse { results }))
}

/// GET /tasks/updates
pub async fn get_pending_updates(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PendingUpdatesQuery>,
) -> ApiResult<Json<PendingUpdatesResponse>> {
    let trackable_id = super::parse_trackable_id(query.trackable_id.as_deref())?;
    let updates = template_sync::pending_updates(&state.db, user.id, trackable_id).await?;

    Ok(Json(PendingUpdatesResponse { updates }))
}

/// Build template reconciliation routes
pub fn template_update_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks/:task_id/template-diff", get(get_template_diff))
        .route("/tasks/apply-template-updates", post(apply_template_updates))
        .route("/tasks/updates", get(get_pending_updates))
}
