//! User account database operations

use chrono::{DateTime, Utc};
use hmt_common::auth::{generate_token, hash_token};
use hmt_common::models::User;
use hmt_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::parse_uuid;

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let id: String = row.try_get("guid")?;

    Ok(User {
        id: parse_uuid(&id)?,
        username: row.try_get("username")?,
        is_admin: row.try_get("is_admin")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

/// Create a user and return it with its plain API token
///
/// The token is not recoverable afterwards; only its hash is stored.
pub async fn create_user(pool: &SqlitePool, username: &str, is_admin: bool) -> Result<(User, String)> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::InvalidInput("username cannot be empty".to_string()));
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
        .bind(username)
        .fetch_one(pool)
        .await?;
    if exists {
        return Err(Error::InvalidInput(format!("username '{}' is taken", username)));
    }

    let token = generate_token();
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        is_admin,
        created_at: hmt_common::time::now(),
    };

    sqlx::query(
        "INSERT INTO users (guid, username, token_hash, is_admin, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user.id.to_string())
    .bind(&user.username)
    .bind(hash_token(&token))
    .bind(user.is_admin)
    .bind(user.created_at)
    .execute(pool)
    .await?;

    info!("Created user '{}' (admin: {})", user.username, user.is_admin);

    Ok((user, token))
}

/// Look up the user owning a plain API token
pub async fn find_by_token(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT guid, username, is_admin, created_at FROM users WHERE token_hash = ?")
        .bind(hash_token(token))
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}
