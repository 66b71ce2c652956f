//! User task database operations
//!
//! Every lookup is scoped to the owning user; a task id belonging to someone
//! else behaves exactly like a missing one.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use hmt_common::models::{TaskTemplate, UserTask};
use hmt_common::{Result, TaskField};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use super::templates::template_from_prefixed_row;
use super::{
    aliased_content_columns, bind_content, content_from_row, parse_uuid, placeholders,
    CONTENT_ASSIGNMENTS, CONTENT_COLUMNS,
};

/// Column prefix for the template side of joined rows
const TEMPLATE_PREFIX: &str = "t_";

fn task_from_row(row: &SqliteRow) -> Result<UserTask> {
    let id: String = row.try_get("guid")?;
    let user_id: String = row.try_get("user_id")?;
    let trackable_id: Option<String> = row.try_get("trackable_id")?;
    let source_template_id: Option<String> = row.try_get("source_template_id")?;
    let overridden: String = row.try_get("overridden_fields")?;

    Ok(UserTask {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        trackable_id: trackable_id.as_deref().map(parse_uuid).transpose()?,
        source_template_id: source_template_id.as_deref().map(parse_uuid).transpose()?,
        source_template_version: row.try_get("source_template_version")?,
        overridden_fields: decode_overrides(&overridden)?,
        content: content_from_row(row)?,
        archived: row.try_get("archived")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Decode the overrides column, skipping names no longer in the catalog
fn decode_overrides(json: &str) -> Result<BTreeSet<TaskField>> {
    let names: Vec<String> = serde_json::from_str(json)?;
    let mut fields = BTreeSet::new();
    for name in names {
        match name.parse::<TaskField>() {
            Ok(field) => {
                fields.insert(field);
            }
            Err(_) => warn!("Ignoring unknown overridden field '{}'", name),
        }
    }
    Ok(fields)
}

fn encode_overrides(fields: &BTreeSet<TaskField>) -> Result<String> {
    Ok(serde_json::to_string(fields)?)
}

/// Save a new task
pub async fn insert_task(pool: &SqlitePool, task: &UserTask) -> Result<()> {
    let sql = format!(
        "INSERT INTO user_tasks (guid, user_id, trackable_id, source_template_id, \
         source_template_version, overridden_fields, {}, archived, created_at, updated_at) \
         VALUES ({})",
        CONTENT_COLUMNS,
        placeholders(24)
    );

    let query = sqlx::query(&sql)
        .bind(task.id.to_string())
        .bind(task.user_id.to_string())
        .bind(task.trackable_id.map(|id| id.to_string()))
        .bind(task.source_template_id.map(|id| id.to_string()))
        .bind(task.source_template_version)
        .bind(encode_overrides(&task.overridden_fields)?);
    bind_content(query, &task.content)?
        .bind(task.archived)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(pool)
        .await?;

    Ok(())
}

/// Load a task owned by `user_id`
pub async fn find_task_for_user<'e, E>(
    executor: E,
    task_id: Uuid,
    user_id: Uuid,
) -> Result<Option<UserTask>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM user_tasks WHERE guid = ? AND user_id = ?")
        .bind(task_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(task_from_row).transpose()
}

/// List a user's tasks, oldest first
pub async fn list_tasks_for_user(
    pool: &SqlitePool,
    user_id: Uuid,
    trackable_id: Option<Uuid>,
    include_archived: bool,
) -> Result<Vec<UserTask>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM user_tasks
        WHERE user_id = ?
          AND (? IS NULL OR trackable_id = ?)
          AND (? OR archived = 0)
        ORDER BY created_at, guid
        "#,
    )
    .bind(user_id.to_string())
    .bind(trackable_id.map(|id| id.to_string()))
    .bind(trackable_id.map(|id| id.to_string()))
    .bind(include_archived)
    .fetch_all(pool)
    .await?;

    rows.iter().map(task_from_row).collect()
}

/// Non-archived tasks whose verified template is ahead of their synced version,
/// each paired with that template
pub async fn list_tasks_behind_template(
    pool: &SqlitePool,
    user_id: Uuid,
    trackable_id: Option<Uuid>,
) -> Result<Vec<(UserTask, TaskTemplate)>> {
    let sql = format!(
        r#"
        SELECT u.*,
               t.guid AS t_guid, t.version AS t_version, t.state AS t_state,
               t.created_at AS t_created_at, t.updated_at AS t_updated_at,
               {}
        FROM user_tasks u
        JOIN task_templates t ON t.guid = u.source_template_id
        WHERE u.user_id = ?
          AND u.archived = 0
          AND (? IS NULL OR u.trackable_id = ?)
          AND t.state = 'VERIFIED'
          AND t.version > u.source_template_version
        ORDER BY u.created_at, u.guid
        "#,
        aliased_content_columns("t", TEMPLATE_PREFIX)
    );

    let rows = sqlx::query(&sql)
        .bind(user_id.to_string())
        .bind(trackable_id.map(|id| id.to_string()))
        .bind(trackable_id.map(|id| id.to_string()))
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| -> Result<(UserTask, TaskTemplate)> {
            Ok((task_from_row(row)?, template_from_prefixed_row(row, TEMPLATE_PREFIX)?))
        })
        .collect()
}

/// Write back a task's mutable state: content, overrides, synced version, archive flag
///
/// No version check is made; the last writer wins.
pub async fn update_task<'e, E>(executor: E, task: &UserTask) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "UPDATE user_tasks SET {}, source_template_version = ?, overridden_fields = ?, \
         archived = ?, updated_at = ? WHERE guid = ? AND user_id = ?",
        CONTENT_ASSIGNMENTS
    );

    bind_content(sqlx::query(&sql), &task.content)?
        .bind(task.source_template_version)
        .bind(encode_overrides(&task.overridden_fields)?)
        .bind(task.archived)
        .bind(task.updated_at)
        .bind(task.id.to_string())
        .bind(task.user_id.to_string())
        .execute(executor)
        .await?;

    Ok(())
}
