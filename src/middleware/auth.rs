use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::db;
use crate::error::AppError;
use crate::models::guest::Guest;
use crate::state::AppState;

pub const GUEST_TOKEN_HEADER: &str = "X-Guest-Token";

const TOKEN_LENGTH: usize = 32;

/// Admin authenticated by a bearer token.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub admin_id: String,
    pub username: String,
    /// Raw token as presented, for revocation on logout.
    pub token: String,
}

/// Guest identified by the capability token issued at admission.
#[derive(Debug, Clone)]
pub struct GuestAuth(pub Guest);

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Random 32-character alphanumeric token.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::Internal(format!("stored hash parse failed: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let pool = state.db.clone();
        let token = header_value(parts, "Authorization")
            .and_then(|h| h.strip_prefix("Bearer ").map(|t| t.trim().to_string()));

        async move {
            let token =
                token.ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;
            let admin = db::admins::resolve_token(&pool, &token)
                .await?
                .ok_or_else(|| AppError::Unauthorized("invalid or expired token".to_string()))?;

            Ok(AdminUser {
                admin_id: admin.id,
                username: admin.username,
                token,
            })
        }
    }
}

impl FromRequestParts<AppState> for GuestAuth {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let pool = state.db.clone();
        let token = header_value(parts, GUEST_TOKEN_HEADER);

        async move {
            let token =
                token.ok_or_else(|| AppError::Unauthorized("missing guest token".to_string()))?;
            let guest = db::guests::resolve_guest_token(&pool, &token)
                .await?
                .ok_or_else(|| AppError::Unauthorized("invalid guest token".to_string()))?;

            Ok(GuestAuth(guest))
        }
    }
}
