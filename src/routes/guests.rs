use axum::extract::{Path, State};
use axum::Json;

use crate::changes::{ChangeAction, ChangeTable};
use crate::db;
use crate::error::AppError;
use crate::middleware::auth::{AdminUser, GuestAuth};
use crate::middleware::permissions::{require_guest_of_party, require_party_owner};
use crate::models::guest::JoinParty;
use crate::state::AppState;

pub async fn join_party(
    state: State<AppState>,
    Path(party_id): Path<String>,
    Json(input): Json<JoinParty>,
) -> Result<Json<serde_json::Value>, AppError> {
    let joined = db::guests::admit_guest(&state.db, &party_id, &input).await?;
    state.publish(&party_id, ChangeTable::Guests, ChangeAction::Insert);
    state.publish(&party_id, ChangeTable::InviteCodes, ChangeAction::Update);
    Ok(Json(serde_json::json!({ "data": joined })))
}

/// The calling guest with their attendance and selection.
pub async fn get_me(
    state: State<AppState>,
    Path(party_id): Path<String>,
    guest: GuestAuth,
) -> Result<Json<serde_json::Value>, AppError> {
    require_guest_of_party(&guest, &party_id)?;
    let attendance = db::attendance::get_for_guest(&state.db, &party_id, &guest.0.id).await?;
    let selection =
        db::selections::get_selection_for_guest(&state.db, &party_id, &guest.0.id).await?;
    Ok(Json(serde_json::json!({
        "data": {
            "guest": guest.0,
            "attendance": attendance,
            "selection": selection
        }
    })))
}

pub async fn remove_guest(
    state: State<AppState>,
    Path((party_id, guest_id)): Path<(String, String)>,
    auth: AdminUser,
) -> Result<Json<serde_json::Value>, AppError> {
    require_party_owner(&state.db, &party_id, &auth).await?;
    db::guests::remove_guest(&state.db, &party_id, &guest_id).await?;
    state.publish(&party_id, ChangeTable::Guests, ChangeAction::Delete);
    Ok(Json(serde_json::json!({ "data": null })))
}
