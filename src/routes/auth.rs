use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::{hash_password, verify_password, AdminUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.allow_registration {
        return Err(AppError::Forbidden("registration is disabled".to_string()));
    }

    let username = input.username.trim();
    if username.is_empty() || username.chars().count() > 32 {
        return Err(AppError::BadRequest(
            "username must be between 1 and 32 characters".to_string(),
        ));
    }

    if input.password.len() < 8 || input.password.len() > 128 {
        return Err(AppError::BadRequest(
            "password must be between 8 and 128 characters".to_string(),
        ));
    }

    let password_hash = hash_password(&input.password)?;
    let admin = db::admins::create_admin(&state.db, username, &password_hash).await?;
    let token = db::admins::create_token(&state.db, &admin.id).await?;

    Ok(Json(serde_json::json!({
        "data": {
            "admin": admin,
            "token": token
        }
    })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let credentials = db::admins::get_credentials(&state.db, input.username.trim()).await?;

    let (admin_id, stored_hash) = match credentials {
        Some(c) => c,
        None => {
            return Err(AppError::Unauthorized("invalid credentials".to_string()));
        }
    };

    if !verify_password(&input.password, &stored_hash)? {
        tracing::warn!(admin_id = %admin_id, "failed admin login");
        return Err(AppError::Unauthorized("invalid credentials".to_string()));
    }

    let admin = db::admins::get_admin(&state.db, &admin_id).await?;
    let token = db::admins::create_token(&state.db, &admin_id).await?;

    Ok(Json(serde_json::json!({
        "data": {
            "admin": admin,
            "token": token
        }
    })))
}

/// Revokes only the presented token.
pub async fn logout(
    State(state): State<AppState>,
    auth: AdminUser,
) -> Result<Json<serde_json::Value>, AppError> {
    db::admins::revoke_token(&state.db, &auth.token).await?;

    Ok(Json(serde_json::json!({
        "data": { "ok": true }
    })))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AdminUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let admin = db::admins::get_admin(&state.db, &auth.admin_id).await?;
    Ok(Json(serde_json::json!({ "data": admin })))
}
