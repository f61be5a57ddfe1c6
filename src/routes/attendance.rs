use axum::extract::{Path, State};
use axum::Json;

use crate::changes::{ChangeAction, ChangeTable};
use crate::db;
use crate::error::AppError;
use crate::middleware::auth::GuestAuth;
use crate::middleware::permissions::require_guest_of_party;
use crate::models::attendance::{AttendanceStatus, SetAttendance};
use crate::state::AppState;

pub async fn set_attendance(
    state: State<AppState>,
    Path(party_id): Path<String>,
    guest: GuestAuth,
    Json(input): Json<SetAttendance>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_guest_of_party(&guest, &party_id)?;

    let status: AttendanceStatus = input
        .status
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("status is required".to_string()))?
        .parse()
        .map_err(AppError::BadRequest)?;

    let (attendance, changed) =
        db::attendance::set_status(&state.db, &party_id, &guest.0.id, status).await?;
    if changed {
        state.publish(&party_id, ChangeTable::Attendance, ChangeAction::Update);
    }
    Ok(Json(serde_json::json!({ "data": attendance })))
}
