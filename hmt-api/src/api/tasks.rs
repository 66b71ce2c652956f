//! User task endpoints
//!
//! Creation (custom or from a verified template), reads, user edits,
//! archiving, override reset, and sync history.

use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use hmt_common::models::{TaskContent, TemplateState, TemplateSyncRecord, User, UserTask};
use hmt_common::reconcile::apply_user_edits;
use hmt_common::TaskField;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::db::{sync_history, tasks, templates};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /tasks request: a custom task with no template behind it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub trackable_id: Option<Uuid>,
    #[serde(flatten)]
    pub content: TaskContent,
}

/// POST /tasks/from-template request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FromTemplateRequest {
    pub template_id: String,
    #[serde(default)]
    pub trackable_id: Option<Uuid>,
}

/// GET /tasks query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksQuery {
    pub trackable_id: Option<String>,
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<UserTask>,
}

#[derive(Debug, Serialize)]
pub struct TemplateHistoryResponse {
    pub history: Vec<TemplateSyncRecord>,
}

fn new_task(
    user_id: Uuid,
    trackable_id: Option<Uuid>,
    template: Option<(Uuid, i64)>,
    content: TaskContent,
) -> UserTask {
    let now = hmt_common::time::now();
    UserTask {
        id: Uuid::new_v4(),
        user_id,
        trackable_id,
        source_template_id: template.map(|(id, _)| id),
        source_template_version: template.map(|(_, version)| version).unwrap_or(0),
        overridden_fields: BTreeSet::new(),
        content,
        archived: false,
        created_at: now,
        updated_at: now,
    }
}

/// Load one of the caller's tasks or fail with 404 `TASK_NOT_FOUND`
async fn load_task(state: &AppState, user: &User, task_id: &str) -> ApiResult<UserTask> {
    let id = Uuid::parse_str(task_id).map_err(|_| ApiError::task_not_found(task_id))?;
    tasks::find_task_for_user(&state.db, id, user.id)
        .await?
        .ok_or_else(|| ApiError::task_not_found(task_id))
}

async fn save_task(state: &AppState, task: &mut UserTask) -> ApiResult<()> {
    task.updated_at = hmt_common::time::now();
    tasks::update_task(&state.db, task).await?;
    Ok(())
}

/// POST /tasks
pub async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<UserTask>)> {
    request.content.validate()?;

    let task = new_task(user.id, request.trackable_id, None, request.content);
    tasks::insert_task(&state.db, &task).await?;
    info!("User {} created custom task {}", user.username, task.id);

    Ok((StatusCode::CREATED, Json(task)))
}

/// POST /tasks/from-template
///
/// Copies the template's content; only verified templates may be used.
pub async fn create_from_template(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<FromTemplateRequest>,
) -> ApiResult<(StatusCode, Json<UserTask>)> {
    let template_id = Uuid::parse_str(&request.template_id)
        .map_err(|_| ApiError::template_not_found(&request.template_id))?;
    let template = templates::find_template(&state.db, template_id)
        .await?
        .ok_or_else(|| ApiError::template_not_found(&request.template_id))?;

    if template.state != TemplateState::Verified {
        return Err(ApiError::BadRequest(format!(
            "Template {} is {}, only VERIFIED templates can be used",
            template.id, template.state
        )));
    }

    let task = new_task(
        user.id,
        request.trackable_id,
        Some((template.id, template.version)),
        template.content,
    );
    tasks::insert_task(&state.db, &task).await?;
    info!(
        "User {} created task {} from template {} v{}",
        user.username, task.id, template.id, template.version
    );

    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<TaskListResponse>> {
    let trackable_id = super::parse_trackable_id(query.trackable_id.as_deref())?;
    let tasks =
        tasks::list_tasks_for_user(&state.db, user.id, trackable_id, query.include_archived)
            .await?;

    Ok(Json(TaskListResponse { tasks }))
}

/// GET /tasks/:taskId
pub async fn get_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<UserTask>> {
    Ok(Json(load_task(&state, &user, &task_id).await?))
}

/// PATCH /tasks/:taskId
///
/// Body is an object keyed by content field name. On a template-linked task,
/// every field whose value changes becomes overridden.
pub async fn edit_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(task_id): Path<String>,
    Json(changes): Json<Map<String, Value>>,
) -> ApiResult<Json<UserTask>> {
    let mut task = load_task(&state, &user, &task_id).await?;

    let changed = apply_user_edits(&mut task, changes)?;
    if !changed.is_empty() {
        save_task(&state, &mut task).await?;
        info!("Task {} edited: {:?}", task.id, changed);
    }

    Ok(Json(task))
}

/// POST /tasks/:taskId/archive
pub async fn archive_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<UserTask>> {
    let mut task = load_task(&state, &user, &task_id).await?;

    if !task.archived {
        task.archived = true;
        save_task(&state, &mut task).await?;
        info!("Task {} archived", task.id);
    }

    Ok(Json(task))
}

/// DELETE /tasks/:taskId/overrides/:field
///
/// Values stay as they are; the field simply becomes eligible for
/// template updates again.
pub async fn reset_override(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((task_id, field)): Path<(String, String)>,
) -> ApiResult<Json<UserTask>> {
    let field: TaskField = field.parse()?;
    let mut task = load_task(&state, &user, &task_id).await?;

    if task.overridden_fields.remove(&field) {
        save_task(&state, &mut task).await?;
        info!("Task {}: override on {} cleared", task.id, field);
    }

    Ok(Json(task))
}

/// GET /tasks/:taskId/template-history
pub async fn template_history(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TemplateHistoryResponse>> {
    let task = load_task(&state, &user, &task_id).await?;
    let history = sync_history::list_for_task(&state.db, task.id).await?;

    Ok(Json(TemplateHistoryResponse { history }))
}

/// Build user task routes
pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/from-template", post(create_from_template))
        .route("/tasks/:task_id", get(get_task).patch(edit_task))
        .route("/tasks/:task_id/archive", post(archive_task))
        .route("/tasks/:task_id/overrides/:field", delete(reset_override))
        .route("/tasks/:task_id/template-history", get(template_history))
}
