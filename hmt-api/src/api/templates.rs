//! Template authoring endpoints
//!
//! Admins create, edit, and move templates through their lifecycle. Other
//! users can only read verified templates.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use hmt_common::models::{TaskContent, TaskTemplate, TemplateState, User};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::auth::require_admin;
use crate::db::templates;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /templates/:templateId/state request
#[derive(Debug, Deserialize)]
pub struct SetStateRequest {
    pub state: TemplateState,
}

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<TaskTemplate>,
}

fn parse_template_id(template_id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(template_id).map_err(|_| ApiError::template_not_found(template_id))
}

/// POST /templates
///
/// New templates start as DRAFT at version 1.
pub async fn create_template(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(content): Json<TaskContent>,
) -> ApiResult<(StatusCode, Json<TaskTemplate>)> {
    require_admin(&user)?;
    content.validate()?;

    let now = hmt_common::time::now();
    let template = TaskTemplate {
        id: Uuid::new_v4(),
        version: 1,
        state: TemplateState::Draft,
        content,
        created_at: now,
        updated_at: now,
    };
    templates::insert_template(&state.db, &template).await?;
    info!("Template {} created: {}", template.id, template.content.title);

    Ok((StatusCode::CREATED, Json(template)))
}

/// PUT /templates/:templateId
///
/// Replaces the content and bumps the version. Linked tasks pick the change
/// up through pending updates once the template is verified.
pub async fn update_template(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(template_id): Path<String>,
    Json(content): Json<TaskContent>,
) -> ApiResult<Json<TaskTemplate>> {
    require_admin(&user)?;
    let id = parse_template_id(&template_id)?;
    content.validate()?;

    let template = templates::update_template_content(&state.db, id, &content)
        .await?
        .ok_or_else(|| ApiError::template_not_found(&template_id))?;
    info!("Template {} updated to v{}", template.id, template.version);

    Ok(Json(template))
}

/// POST /templates/:templateId/state
pub async fn set_template_state(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(template_id): Path<String>,
    Json(request): Json<SetStateRequest>,
) -> ApiResult<Json<TaskTemplate>> {
    require_admin(&user)?;
    let id = parse_template_id(&template_id)?;

    let template = templates::set_template_state(&state.db, id, request.state)
        .await?
        .ok_or_else(|| ApiError::template_not_found(&template_id))?;
    info!("Template {} is now {}", template.id, template.state);

    Ok(Json(template))
}

/// GET /templates
pub async fn list_templates(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> ApiResult<Json<TemplateListResponse>> {
    let filter = if user.is_admin {
        None
    } else {
        Some(TemplateState::Verified)
    };
    let templates = templates::list_templates(&state.db, filter).await?;

    Ok(Json(TemplateListResponse { templates }))
}

/// GET /templates/:templateId
///
/// Unverified templates are invisible to non-admins.
pub async fn get_template(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(template_id): Path<String>,
) -> ApiResult<Json<TaskTemplate>> {
    let id = parse_template_id(&template_id)?;

    templates::find_template(&state.db, id)
        .await?
        .filter(|t| user.is_admin || t.state == TemplateState::Verified)
        .map(Json)
        .ok_or_else(|| ApiError::template_not_found(&template_id))
}

/// Build template authoring routes
pub fn template_routes() -> Router<AppState> {
    Router::new()
        .route("/templates", get(list_templates).post(create_template))
        .route("/templates/:template_id", get(get_template).put(update_template))
        .route("/templates/:template_id/state", post(set_template_state))
}
