use axum::extract::{Path, State};
use axum::Json;

use crate::changes::{ChangeAction, ChangeTable};
use crate::db;
use crate::error::AppError;
use crate::middleware::auth::AdminUser;
use crate::middleware::permissions::require_party_owner;
use crate::models::party::{CreateParty, UpdateParty};
use crate::state::AppState;

/// Guest-facing snapshot. Contact details of other guests are stripped.
pub async fn get_party(
    state: State<AppState>,
    Path(party_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let snapshot = db::snapshot::get_snapshot(&state.db, &party_id).await?;
    Ok(Json(serde_json::json!({ "data": snapshot.redacted() })))
}

pub async fn list_parties(
    state: State<AppState>,
    auth: AdminUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let parties = db::parties::list_parties_for_admin(&state.db, &auth.admin_id).await?;
    Ok(Json(serde_json::json!({ "data": parties })))
}

pub async fn create_party(
    state: State<AppState>,
    auth: AdminUser,
    Json(input): Json<CreateParty>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (party, invite_code) = db::parties::create_party(&state.db, &auth.admin_id, &input).await?;
    state.publish(&party.id, ChangeTable::Parties, ChangeAction::Insert);
    state.publish(&party.id, ChangeTable::InviteCodes, ChangeAction::Insert);
    Ok(Json(serde_json::json!({
        "data": {
            "party": party,
            "invite_code": invite_code
        }
    })))
}

pub async fn get_admin_party(
    state: State<AppState>,
    Path(party_id): Path<String>,
    auth: AdminUser,
) -> Result<Json<serde_json::Value>, AppError> {
    require_party_owner(&state.db, &party_id, &auth).await?;
    let snapshot = db::snapshot::get_admin_snapshot(&state.db, &party_id).await?;
    Ok(Json(serde_json::json!({ "data": snapshot })))
}

pub async fn update_party(
    state: State<AppState>,
    Path(party_id): Path<String>,
    auth: AdminUser,
    Json(input): Json<UpdateParty>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_party_owner(&state.db, &party_id, &auth).await?;
    let party = db::parties::update_party(&state.db, &party_id, &input).await?;
    state.publish(&party_id, ChangeTable::Parties, ChangeAction::Update);
    Ok(Json(serde_json::json!({ "data": party })))
}

pub async fn delete_party(
    state: State<AppState>,
    Path(party_id): Path<String>,
    auth: AdminUser,
) -> Result<Json<serde_json::Value>, AppError> {
    require_party_owner(&state.db, &party_id, &auth).await?;
    db::parties::delete_party(&state.db, &party_id).await?;
    state.publish(&party_id, ChangeTable::Parties, ChangeAction::Delete);
    Ok(Json(serde_json::json!({ "data": null })))
}
