use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Prefix of the message raised by the selection capacity triggers.
pub const CAPACITY_EXCEEDED_MARKER: &str = "capacity_exceeded";
/// Prefix of the message raised by the item type capacity floor trigger.
pub const CAPACITY_CONFLICT_MARKER: &str = "capacity_conflict";

/// Shown to a guest whose claim lost to a full item type, whether the
/// application check or the storage trigger caught it.
pub const ITEM_TYPE_FULL: &str = "this item type just filled up, please choose another option";

/// Whether a storage error was raised by a trigger whose message starts
/// with `marker`.
pub fn is_trigger_rejection(e: &sqlx::Error, marker: &str) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.message().starts_with(marker))
}

#[derive(Debug)]
pub enum AppError {
    Database(sqlx::Error),
    Internal(String),
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    CapacityExceeded(String),
    Gone(String),
    RateLimited { retry_after: u64 },
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "internal_error",
            AppError::Internal(_) => "internal_error",
            AppError::BadRequest(_) => "invalid_request",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Conflict(_) => "already_exists",
            AppError::CapacityExceeded(_) => "capacity_exceeded",
            AppError::Gone(_) => "gone",
            AppError::RateLimited { .. } => "rate_limited",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::CapacityExceeded(_) => StatusCode::CONFLICT,
            AppError::Gone(_) => StatusCode::GONE,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Database(e) => {
                tracing::error!("database error: {e}");
                "internal database error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {e}");
                "internal server error".to_string()
            }
            AppError::BadRequest(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::CapacityExceeded(msg) => msg.clone(),
            AppError::Gone(msg) => msg.clone(),
            AppError::RateLimited { retry_after } => {
                format!("rate limited, retry after {retry_after}s")
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "database error: {e}"),
            AppError::Internal(e) => write!(f, "internal error: {e}"),
            other => write!(f, "{}: {}", other.code(), other.message()),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.message()
            }
        });

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimited { retry_after } = &self {
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from(*retry_after));
        }
        response
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => AppError::NotFound("resource not found".to_string()),
            _ if is_trigger_rejection(&e, CAPACITY_EXCEEDED_MARKER) => {
                tracing::warn!("capacity trigger rejected a selection write");
                AppError::CapacityExceeded(ITEM_TYPE_FULL.to_string())
            }
            _ if is_trigger_rejection(&e, CAPACITY_CONFLICT_MARKER) => {
                AppError::BadRequest(
                    "cannot reduce capacity below the number of guests who already selected this type"
                        .to_string(),
                )
            }
            _ => AppError::Database(e),
        }
    }
}
