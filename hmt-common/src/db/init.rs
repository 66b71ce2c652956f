//! Database initialization
//!
//! Creates the database file on first run, applies connection pragmas,
//! creates every table idempotently, then runs versioned migrations.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

const POOL_SIZE: u32 = 10;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the tracker database and bring its schema up to date
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas set here apply to every pooled connection
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(POOL_SIZE)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// Each SQLite `:memory:` connection is a separate database, so the pool is
/// capped at one connection that is never retired.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and run migrations (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_users_table(pool).await?;
    create_task_templates_table(pool).await?;
    create_user_tasks_table(pool).await?;
    create_sync_history_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the users table
///
/// Only the SHA-256 digest of each API token is stored.
pub async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            token_hash TEXT NOT NULL UNIQUE,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the task_templates table
///
/// Compound content fields (steps, equipment_needed, resources) are JSON arrays.
pub async fn create_task_templates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task_templates (
            guid TEXT PRIMARY KEY,
            version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
            state TEXT NOT NULL DEFAULT 'DRAFT'
                CHECK (state IN ('DRAFT', 'VERIFIED', 'DEPRECATED')),
            title TEXT NOT NULL,
            description TEXT,
            recurrence_interval TEXT,
            criticality TEXT NOT NULL DEFAULT 'medium',
            estimated_time_minutes INTEGER,
            estimated_cost REAL,
            can_be_outsourced INTEGER NOT NULL DEFAULT 0,
            can_defer INTEGER NOT NULL DEFAULT 0,
            defer_limit_days INTEGER,
            category TEXT,
            icon TEXT,
            image_url TEXT,
            steps TEXT NOT NULL DEFAULT '[]',
            equipment_needed TEXT NOT NULL DEFAULT '[]',
            resources TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the user_tasks table
///
/// `source_template_version` 0 means never synced or not template-derived.
/// `overridden_fields` is a JSON array of field wire names.
pub async fn create_user_tasks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_tasks (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            trackable_id TEXT,
            source_template_id TEXT REFERENCES task_templates(guid) ON DELETE SET NULL,
            source_template_version INTEGER NOT NULL DEFAULT 0,
            overridden_fields TEXT NOT NULL DEFAULT '[]',
            title TEXT NOT NULL,
            description TEXT,
            recurrence_interval TEXT,
            criticality TEXT NOT NULL DEFAULT 'medium',
            estimated_time_minutes INTEGER,
            estimated_cost REAL,
            can_be_outsourced INTEGER NOT NULL DEFAULT 0,
            can_defer INTEGER NOT NULL DEFAULT 0,
            defer_limit_days INTEGER,
            category TEXT,
            icon TEXT,
            image_url TEXT,
            steps TEXT NOT NULL DEFAULT '[]',
            equipment_needed TEXT NOT NULL DEFAULT '[]',
            resources TEXT NOT NULL DEFAULT '[]',
            archived INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the task_template_sync_history table
///
/// Insert-only audit trail of template updates applied to user tasks.
pub async fn create_sync_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task_template_sync_history (
            guid TEXT PRIMARY KEY,
            user_task_id TEXT NOT NULL REFERENCES user_tasks(guid) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            from_version INTEGER NOT NULL,
            to_version INTEGER NOT NULL,
            fields_changed TEXT NOT NULL,
            before_snapshot TEXT NOT NULL,
            after_snapshot TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
