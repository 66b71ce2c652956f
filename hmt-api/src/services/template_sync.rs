//! Template reconciliation against stored tasks
//!
//! Loads tasks and templates, runs the pure planning in
//! [`hmt_common::reconcile`], and persists results. Each applied item is
//! written in its own transaction: task update plus audit record commit
//! together or not at all. Items never share a transaction, and each one
//! opens as a write transaction.

use hmt_common::models::TemplateSyncRecord;
use hmt_common::reconcile::{
    apply_template, diff_fields, pending_changes, FieldDiff, OverridePolicy,
};
use hmt_common::{fields::parse_field_names, Result, TaskField};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{sync_history, tasks, templates};

/// Reason reported for batch items whose task or template cannot be resolved
pub const SKIPPED_NOT_FOUND: &str = "task or template not found";

/// Field-level comparison between a task and its template
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDiff {
    pub user_task_id: Uuid,
    pub source_template_id: Uuid,
    pub current_version: i64,
    pub latest_version: i64,
    pub diffs: Vec<FieldDiff>,
}

/// One entry of an apply batch
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub user_task_id: String,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

/// Per-item outcome of an apply batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApplyResult {
    #[serde(rename_all = "camelCase")]
    Applied {
        user_task_id: String,
        applied_fields: Vec<TaskField>,
        new_version: i64,
    },
    #[serde(rename_all = "camelCase")]
    Skipped {
        user_task_id: String,
        skipped_reason: String,
    },
}

/// A task whose verified template has moved past the synced version
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub user_task_id: Uuid,
    pub source_template_id: Uuid,
    pub current_version: i64,
    pub latest_version: i64,
    pub changed_fields: Vec<TaskField>,
    pub is_overridden: bool,
}

/// Resolve a request policy literal, defaulting to `respect_overrides`
pub fn parse_policy(literal: Option<&str>) -> OverridePolicy {
    match literal {
        None => OverridePolicy::default(),
        Some(literal) => OverridePolicy::from_literal(literal).unwrap_or_else(|| {
            warn!(
                "Unknown override policy '{}', using {}",
                literal,
                OverridePolicy::default().as_str()
            );
            OverridePolicy::default()
        }),
    }
}

/// Diff a task against its linked template
///
/// `None` when the task is missing, not the caller's, or has no resolvable template.
pub async fn template_diff(
    pool: &SqlitePool,
    user_id: Uuid,
    task_id: &str,
) -> Result<Option<TemplateDiff>> {
    let Ok(task_id) = Uuid::parse_str(task_id) else {
        return Ok(None);
    };
    let Some(task) = tasks::find_task_for_user(pool, task_id, user_id).await? else {
        return Ok(None);
    };
    let Some(template_id) = task.source_template_id else {
        return Ok(None);
    };
    let Some(template) = templates::find_template(pool, template_id).await? else {
        return Ok(None);
    };

    Ok(Some(TemplateDiff {
        user_task_id: task.id,
        source_template_id: template.id,
        current_version: task.source_template_version,
        latest_version: template.version,
        diffs: diff_fields(&task, &template),
    }))
}

/// Apply template values to a batch of tasks
///
/// Unresolvable items are reported as skipped and the batch continues.
/// A storage error aborts the remaining items; items already committed stay committed.
pub async fn apply_template_updates(
    pool: &SqlitePool,
    user_id: Uuid,
    requests: &[ApplyRequest],
    policy: OverridePolicy,
) -> Result<Vec<ApplyResult>> {
    let mut results = Vec::with_capacity(requests.len());

    for request in requests {
        let result = apply_one(pool, user_id, request, policy).await?;
        results.push(result);
    }

    let applied = results
        .iter()
        .filter(|r| matches!(r, ApplyResult::Applied { .. }))
        .count();
    info!(
        "Applied template updates: {} of {} items ({})",
        applied,
        results.len(),
        policy.as_str()
    );

    Ok(results)
}

async fn apply_one(
    pool: &SqlitePool,
    user_id: Uuid,
    request: &ApplyRequest,
    policy: OverridePolicy,
) -> Result<ApplyResult> {
    let skipped = || ApplyResult::Skipped {
        user_task_id: request.user_task_id.clone(),
        skipped_reason: SKIPPED_NOT_FOUND.to_string(),
    };

    let Ok(task_id) = Uuid::parse_str(&request.user_task_id) else {
        debug!("Skipping malformed task id '{}'", request.user_task_id);
        return Ok(skipped());
    };

    // An absent or empty list means every field
    let requested = match request.fields.as_deref() {
        Some(names) if !names.is_empty() => {
            let (fields, unknown) = parse_field_names(names);
            if !unknown.is_empty() {
                warn!("Ignoring unknown fields for task {}: {:?}", task_id, unknown);
            }
            Some(fields)
        }
        _ => None,
    };

    // Take the write lock before reading so a concurrent commit cannot
    // invalidate this item's snapshot; contention waits on the busy timeout
    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

    let Some(mut task) = tasks::find_task_for_user(&mut *tx, task_id, user_id).await? else {
        debug!("Skipping task {}: not found", task_id);
        return Ok(skipped());
    };
    let Some(template_id) = task.source_template_id else {
        debug!("Skipping task {}: no source template", task_id);
        return Ok(skipped());
    };
    let Some(template) = templates::find_template(&mut *tx, template_id).await? else {
        debug!("Skipping task {}: template {} missing", task_id, template_id);
        return Ok(skipped());
    };

    let outcome = apply_template(&mut task, &template, requested.as_deref(), policy);
    let now = hmt_common::time::now();
    task.updated_at = now;

    tasks::update_task(&mut *tx, &task).await?;
    sync_history::insert_sync_record(
        &mut *tx,
        &TemplateSyncRecord {
            id: Uuid::new_v4(),
            user_task_id: task.id,
            user_id,
            from_version: outcome.from_version,
            to_version: outcome.to_version,
            fields_changed: outcome.applied_fields.clone(),
            before: outcome.before,
            after: outcome.after,
            applied_at: now,
        },
    )
    .await?;

    tx.commit().await?;

    debug!(
        "Task {} synced v{} -> v{} ({} fields)",
        task.id,
        outcome.from_version,
        outcome.to_version,
        outcome.applied_fields.len()
    );

    Ok(ApplyResult::Applied {
        user_task_id: request.user_task_id.clone(),
        applied_fields: outcome.applied_fields,
        new_version: task.source_template_version,
    })
}

/// Tasks with a newer verified template version, oldest task first
pub async fn pending_updates(
    pool: &SqlitePool,
    user_id: Uuid,
    trackable_id: Option<Uuid>,
) -> Result<Vec<PendingUpdate>> {
    let behind = tasks::list_tasks_behind_template(pool, user_id, trackable_id).await?;

    Ok(behind
        .into_iter()
        .map(|(task, template)| {
            let (changed_fields, is_overridden) = pending_changes(&task, &template);
            PendingUpdate {
                user_task_id: task.id,
                source_template_id: template.id,
                current_version: task.source_template_version,
                latest_version: template.version,
                changed_fields,
                is_overridden,
            }
        })
        .collect())
}
