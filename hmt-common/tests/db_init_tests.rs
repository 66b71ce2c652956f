//! Integration tests for on-disk database initialization

use hmt_common::db::init::init_database;
use hmt_common::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_created_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("hmt.db");

    let pool = init_database(&db_path).await.unwrap();

    assert!(db_path.exists(), "database file was not created");
    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_existing_database_reopens() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("hmt.db");

    let first = init_database(&db_path).await.unwrap();
    sqlx::query(
        "INSERT INTO users (guid, username, token_hash, is_admin, created_at) \
         VALUES ('u1', 'dana', 'hash', 0, '2024-01-01T00:00:00Z')",
    )
    .execute(&first)
    .await
    .unwrap();
    first.close().await;

    let second = init_database(&db_path).await.unwrap();
    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&second)
        .await
        .unwrap();

    assert_eq!(users, 1);
}

#[tokio::test]
async fn test_wal_and_foreign_keys_enabled() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("hmt.db")).await.unwrap();

    let journal: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(journal.to_lowercase(), "wal");
    assert_eq!(foreign_keys, 1);
}

#[tokio::test]
async fn test_task_rows_require_existing_user() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("hmt.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO user_tasks (guid, user_id, title, created_at, updated_at) \
         VALUES ('t1', 'nobody', 'Orphan', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "foreign key on user_id was not enforced");
}
