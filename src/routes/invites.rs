use axum::extract::{Path, State};
use axum::Json;

use crate::changes::{ChangeAction, ChangeTable};
use crate::db;
use crate::error::AppError;
use crate::middleware::auth::AdminUser;
use crate::middleware::permissions::require_party_owner;
use crate::models::invite::{ResolveInvite, ResolvedInvite, UpdateInvite};
use crate::state::AppState;

/// Public lookup of a typed invite code.
pub async fn resolve_invite(
    state: State<AppState>,
    Json(input): Json<ResolveInvite>,
) -> Result<Json<serde_json::Value>, AppError> {
    let code = input
        .code
        .ok_or_else(|| AppError::BadRequest("code is required".to_string()))?;
    let (party, invite_code) = db::invites::resolve_invite(&state.db, &code).await?;
    Ok(Json(serde_json::json!({
        "data": ResolvedInvite { party, invite_code }
    })))
}

pub async fn update_invite(
    state: State<AppState>,
    Path(party_id): Path<String>,
    auth: AdminUser,
    Json(input): Json<UpdateInvite>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_party_owner(&state.db, &party_id, &auth).await?;
    let invite = db::invites::update_invite(&state.db, &party_id, &input).await?;
    state.publish(&party_id, ChangeTable::InviteCodes, ChangeAction::Update);
    Ok(Json(serde_json::json!({ "data": invite })))
}

pub async fn rotate_invite(
    state: State<AppState>,
    Path(party_id): Path<String>,
    auth: AdminUser,
) -> Result<Json<serde_json::Value>, AppError> {
    require_party_owner(&state.db, &party_id, &auth).await?;
    let invite = db::invites::rotate_invite(&state.db, &party_id).await?;
    state.publish(&party_id, ChangeTable::InviteCodes, ChangeAction::Insert);
    Ok(Json(serde_json::json!({ "data": invite })))
}
