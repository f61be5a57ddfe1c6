use sqlx::SqlitePool;

use crate::error::AppError;
use crate::middleware::auth::{generate_token, hash_token};
use crate::models::admin::Admin;
use crate::models::format_timestamp;

/// Bearer tokens expire this many days after issue.
const TOKEN_TTL_DAYS: i64 = 30;

pub async fn get_admin(pool: &SqlitePool, admin_id: &str) -> Result<Admin, AppError> {
    let row = sqlx::query_as::<_, (String, String, String)>(
        "SELECT id, username, created_at FROM admins WHERE id = ?",
    )
    .bind(admin_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("admin not found".to_string()))?;

    Ok(Admin {
        id: row.0,
        username: row.1,
        created_at: row.2,
    })
}

pub async fn create_admin(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
) -> Result<Admin, AppError> {
    let id = uuid::Uuid::new_v4().to_string();

    let result = sqlx::query("INSERT INTO admins (id, username, password_hash) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(username)
        .bind(password_hash)
        .execute(pool)
        .await;

    match result {
        Ok(_) => {}
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(AppError::Conflict("username already taken".to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(admin_id = %id, username, "admin registered");
    get_admin(pool, &id).await
}

/// Admin id and stored password hash for a username.
pub async fn get_credentials(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<(String, String)>, AppError> {
    let row = sqlx::query_as::<_, (String, String)>(
        "SELECT id, password_hash FROM admins WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Issue a bearer token. Only its hash is stored.
pub async fn create_token(pool: &SqlitePool, admin_id: &str) -> Result<String, AppError> {
    let token = generate_token();
    let expires_at = format_timestamp(chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS));

    sqlx::query("INSERT INTO admin_tokens (token_hash, admin_id, expires_at) VALUES (?, ?, ?)")
        .bind(hash_token(&token))
        .bind(admin_id)
        .bind(&expires_at)
        .execute(pool)
        .await?;

    Ok(token)
}

pub async fn revoke_token(pool: &SqlitePool, token: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM admin_tokens WHERE token_hash = ?")
        .bind(hash_token(token))
        .execute(pool)
        .await?;
    Ok(())
}

/// Owner of an unexpired bearer token.
pub async fn resolve_token(pool: &SqlitePool, token: &str) -> Result<Option<Admin>, AppError> {
    let now = format_timestamp(chrono::Utc::now());
    let row = sqlx::query_as::<_, (String, String, String)>(
        "SELECT a.id, a.username, a.created_at FROM admin_tokens t \
         JOIN admins a ON a.id = t.admin_id \
         WHERE t.token_hash = ? AND t.expires_at > ?",
    )
    .bind(hash_token(token))
    .bind(&now)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id, username, created_at)| Admin {
        id,
        username,
        created_at,
    }))
}
