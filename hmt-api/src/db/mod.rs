//! Database access layer for hmt-api
//!
//! One module per table. Functions that take part in a per-item transaction
//! accept any SQLite executor so they run on either the pool or `&mut *tx`.

use hmt_common::models::{Criticality, TaskContent};
use hmt_common::{Error, Result};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Decode, Row, Sqlite, Type};
use uuid::Uuid;

pub mod sync_history;
pub mod tasks;
pub mod templates;
pub mod users;

/// Content columns shared by `task_templates` and `user_tasks`, in bind order
pub(crate) const CONTENT_COLUMNS: &str = "title, description, recurrence_interval, criticality, \
     estimated_time_minutes, estimated_cost, can_be_outsourced, can_defer, defer_limit_days, \
     category, icon, image_url, steps, equipment_needed, resources";

/// `col = ?` assignments for [`CONTENT_COLUMNS`], in the same order
pub(crate) const CONTENT_ASSIGNMENTS: &str = "title = ?, description = ?, \
     recurrence_interval = ?, criticality = ?, estimated_time_minutes = ?, estimated_cost = ?, \
     can_be_outsourced = ?, can_defer = ?, defer_limit_days = ?, category = ?, icon = ?, \
     image_url = ?, steps = ?, equipment_needed = ?, resources = ?";

pub(crate) type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Bind the 15 content values in [`CONTENT_COLUMNS`] order
pub(crate) fn bind_content<'q>(query: SqliteQuery<'q>, content: &TaskContent) -> Result<SqliteQuery<'q>> {
    let steps = serde_json::to_string(&content.steps)?;
    let equipment = serde_json::to_string(&content.equipment_needed)?;
    let resources = serde_json::to_string(&content.resources)?;

    Ok(query
        .bind(content.title.clone())
        .bind(content.description.clone())
        .bind(content.recurrence_interval.clone())
        .bind(content.criticality.as_str())
        .bind(content.estimated_time_minutes)
        .bind(content.estimated_cost)
        .bind(content.can_be_outsourced)
        .bind(content.can_defer)
        .bind(content.defer_limit_days)
        .bind(content.category.clone())
        .bind(content.icon.clone())
        .bind(content.image_url.clone())
        .bind(steps)
        .bind(equipment)
        .bind(resources))
}

/// Decode the content columns of a template or task row
pub(crate) fn content_from_row(row: &SqliteRow) -> Result<TaskContent> {
    content_from_prefixed_row(row, "")
}

/// Decode content columns selected as `{prefix}{column}`
pub(crate) fn content_from_prefixed_row(row: &SqliteRow, prefix: &str) -> Result<TaskContent> {
    let criticality: String = column(row, prefix, "criticality")?;
    let steps: String = column(row, prefix, "steps")?;
    let equipment: String = column(row, prefix, "equipment_needed")?;
    let resources: String = column(row, prefix, "resources")?;

    Ok(TaskContent {
        title: column(row, prefix, "title")?,
        description: column(row, prefix, "description")?,
        recurrence_interval: column(row, prefix, "recurrence_interval")?,
        criticality: criticality.parse::<Criticality>()?,
        estimated_time_minutes: column(row, prefix, "estimated_time_minutes")?,
        estimated_cost: column(row, prefix, "estimated_cost")?,
        can_be_outsourced: column(row, prefix, "can_be_outsourced")?,
        can_defer: column(row, prefix, "can_defer")?,
        defer_limit_days: column(row, prefix, "defer_limit_days")?,
        category: column(row, prefix, "category")?,
        icon: column(row, prefix, "icon")?,
        image_url: column(row, prefix, "image_url")?,
        steps: serde_json::from_str(&steps)?,
        equipment_needed: serde_json::from_str(&equipment)?,
        resources: serde_json::from_str(&resources)?,
    })
}

/// Read `{prefix}{name}` from a row
pub(crate) fn column<'r, T>(row: &'r SqliteRow, prefix: &str, name: &str) -> Result<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    Ok(row.try_get(format!("{}{}", prefix, name).as_str())?)
}

/// `{table}.col AS {prefix}col` for every content column
pub(crate) fn aliased_content_columns(table: &str, prefix: &str) -> String {
    CONTENT_COLUMNS
        .split(',')
        .map(str::trim)
        .map(|col| format!("{}.{} AS {}{}", table, col, prefix, col))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `?, ?, ...` with `count` placeholders
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Parse a TEXT uuid column
pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid uuid '{}': {}", value, e)))
}
