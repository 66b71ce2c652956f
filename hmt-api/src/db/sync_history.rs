//! Template sync audit trail

use chrono::{DateTime, Utc};
use hmt_common::models::TemplateSyncRecord;
use hmt_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

fn record_from_row(row: &SqliteRow) -> Result<TemplateSyncRecord> {
    let id: String = row.try_get("guid")?;
    let user_task_id: String = row.try_get("user_task_id")?;
    let user_id: String = row.try_get("user_id")?;
    let fields_changed: String = row.try_get("fields_changed")?;
    let before: String = row.try_get("before_snapshot")?;
    let after: String = row.try_get("after_snapshot")?;

    Ok(TemplateSyncRecord {
        id: parse_uuid(&id)?,
        user_task_id: parse_uuid(&user_task_id)?,
        user_id: parse_uuid(&user_id)?,
        from_version: row.try_get("from_version")?,
        to_version: row.try_get("to_version")?,
        fields_changed: serde_json::from_str(&fields_changed)?,
        before: serde_json::from_str(&before)?,
        after: serde_json::from_str(&after)?,
        applied_at: row.try_get::<DateTime<Utc>, _>("applied_at")?,
    })
}

/// Append a sync record
pub async fn insert_sync_record<'e, E>(executor: E, record: &TemplateSyncRecord) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO task_template_sync_history
            (guid, user_task_id, user_id, from_version, to_version,
             fields_changed, before_snapshot, after_snapshot, applied_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.user_task_id.to_string())
    .bind(record.user_id.to_string())
    .bind(record.from_version)
    .bind(record.to_version)
    .bind(serde_json::to_string(&record.fields_changed)?)
    .bind(serde_json::to_string(&record.before)?)
    .bind(serde_json::to_string(&record.after)?)
    .bind(record.applied_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Sync records for one task, newest first
pub async fn list_for_task(pool: &SqlitePool, user_task_id: Uuid) -> Result<Vec<TemplateSyncRecord>> {
    let rows = sqlx::query(
        "SELECT * FROM task_template_sync_history WHERE user_task_id = ? \
         ORDER BY applied_at DESC, rowid DESC",
    )
    .bind(user_task_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{tasks, users};
    use hmt_common::db::init_memory_database;
    use hmt_common::models::{TaskContent, UserTask};
    use hmt_common::TaskField;
    use serde_json::{Map, Value};
    use std::collections::BTreeSet;

    async fn seed_task(pool: &SqlitePool) -> UserTask {
        let (user, _) = users::create_user(pool, "dana", false).await.unwrap();
        let now = hmt_common::time::now();
        let task = UserTask {
            id: Uuid::new_v4(),
            user_id: user.id,
            trackable_id: None,
            source_template_id: None,
            source_template_version: 0,
            overridden_fields: BTreeSet::new(),
            content: TaskContent::titled("Test smoke alarms"),
            archived: false,
            created_at: now,
            updated_at: now,
        };
        tasks::insert_task(pool, &task).await.unwrap();
        task
    }

    fn record(task: &UserTask, from: i64, to: i64) -> TemplateSyncRecord {
        let mut before = Map::new();
        before.insert("title".to_string(), Value::from("Old"));
        let mut after = Map::new();
        after.insert("title".to_string(), Value::from("New"));
        TemplateSyncRecord {
            id: Uuid::new_v4(),
            user_task_id: task.id,
            user_id: task.user_id,
            from_version: from,
            to_version: to,
            fields_changed: vec![TaskField::Title],
            before,
            after,
            applied_at: hmt_common::time::now(),
        }
    }

    #[tokio::test]
    async fn test_records_listed_newest_first() {
        let pool = init_memory_database().await.unwrap();
        let task = seed_task(&pool).await;

        insert_sync_record(&pool, &record(&task, 0, 1)).await.unwrap();
        insert_sync_record(&pool, &record(&task, 1, 2)).await.unwrap();

        let history = list_for_task(&pool, task.id).await.unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].to_version, 2);
        assert_eq!(history[1].to_version, 1);
        assert_eq!(history[0].fields_changed, vec![TaskField::Title]);
        assert_eq!(history[0].before["title"], "Old");
    }

    #[tokio::test]
    async fn test_history_for_unknown_task_is_empty() {
        let pool = init_memory_database().await.unwrap();
        assert!(list_for_task(&pool, Uuid::new_v4()).await.unwrap().is_empty());
    }
}
