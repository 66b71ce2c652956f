//! Task template database operations
//!
//! Templates are authored here and only read by reconciliation.

use chrono::{DateTime, Utc};
use hmt_common::models::{TaskContent, TaskTemplate, TemplateState};
use hmt_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{
    bind_content, column, content_from_prefixed_row, parse_uuid, placeholders, CONTENT_ASSIGNMENTS,
    CONTENT_COLUMNS,
};

fn template_from_row(row: &SqliteRow) -> Result<TaskTemplate> {
    template_from_prefixed_row(row, "")
}

/// Decode a template whose columns were selected as `{prefix}{column}`
pub(crate) fn template_from_prefixed_row(row: &SqliteRow, prefix: &str) -> Result<TaskTemplate> {
    let id: String = column(row, prefix, "guid")?;
    let state: String = column(row, prefix, "state")?;

    Ok(TaskTemplate {
        id: parse_uuid(&id)?,
        version: column(row, prefix, "version")?,
        state: state.parse()?,
        content: content_from_prefixed_row(row, prefix)?,
        created_at: column::<DateTime<Utc>>(row, prefix, "created_at")?,
        updated_at: column::<DateTime<Utc>>(row, prefix, "updated_at")?,
    })
}

/// Save a new template
pub async fn insert_template(pool: &SqlitePool, template: &TaskTemplate) -> Result<()> {
    let sql = format!(
        "INSERT INTO task_templates (guid, version, state, {}, created_at, updated_at) \
         VALUES ({})",
        CONTENT_COLUMNS,
        placeholders(20)
    );

    let query = sqlx::query(&sql)
        .bind(template.id.to_string())
        .bind(template.version)
        .bind(template.state.as_str());
    bind_content(query, &template.content)?
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(pool)
        .await?;

    Ok(())
}

/// Load a template by id
pub async fn find_template<'e, E>(executor: E, template_id: Uuid) -> Result<Option<TaskTemplate>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM task_templates WHERE guid = ?")
        .bind(template_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(template_from_row).transpose()
}

/// List templates, optionally restricted to one lifecycle state
pub async fn list_templates(
    pool: &SqlitePool,
    state: Option<TemplateState>,
) -> Result<Vec<TaskTemplate>> {
    let rows = match state {
        Some(state) => {
            sqlx::query("SELECT * FROM task_templates WHERE state = ? ORDER BY title, guid")
                .bind(state.as_str())
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query("SELECT * FROM task_templates ORDER BY title, guid")
                .fetch_all(pool)
                .await?
        }
    };

    rows.iter().map(template_from_row).collect()
}

/// Replace a template's content and bump its version
///
/// Returns the updated template, or `None` if it does not exist.
pub async fn update_template_content(
    pool: &SqlitePool,
    template_id: Uuid,
    content: &TaskContent,
) -> Result<Option<TaskTemplate>> {
    let sql = format!(
        "UPDATE task_templates SET {}, version = version + 1, updated_at = ? WHERE guid = ?",
        CONTENT_ASSIGNMENTS
    );

    let result = bind_content(sqlx::query(&sql), content)?
        .bind(hmt_common::time::now())
        .bind(template_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    find_template(pool, template_id).await
}

/// Move a template to another lifecycle state
///
/// Returns the updated template, or `None` if it does not exist.
pub async fn set_template_state(
    pool: &SqlitePool,
    template_id: Uuid,
    state: TemplateState,
) -> Result<Option<TaskTemplate>> {
    let result = sqlx::query("UPDATE task_templates SET state = ?, updated_at = ? WHERE guid = ?")
        .bind(state.as_str())
        .bind(hmt_common::time::now())
        .bind(template_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    find_template(pool, template_id).await
}
