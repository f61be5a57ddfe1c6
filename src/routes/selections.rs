use axum::extract::{Path, State};
use axum::Json;

use crate::changes::{ChangeAction, ChangeTable};
use crate::db;
use crate::error::AppError;
use crate::middleware::auth::GuestAuth;
use crate::middleware::permissions::require_guest_of_party;
use crate::models::selection::SelectItemType;
use crate::state::AppState;

pub async fn select_item_type(
    state: State<AppState>,
    Path(party_id): Path<String>,
    guest: GuestAuth,
    Json(input): Json<SelectItemType>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_guest_of_party(&guest, &party_id)?;
    let selection =
        db::selections::select_item_type(&state.db, &party_id, &guest.0.id, &input).await?;
    state.publish(&party_id, ChangeTable::Selections, ChangeAction::Update);
    Ok(Json(serde_json::json!({ "data": selection })))
}

pub async fn release_selection(
    state: State<AppState>,
    Path(party_id): Path<String>,
    guest: GuestAuth,
) -> Result<Json<serde_json::Value>, AppError> {
    require_guest_of_party(&guest, &party_id)?;
    let released = db::selections::release_selection(&state.db, &party_id, &guest.0.id).await?;
    if released {
        state.publish(&party_id, ChangeTable::Selections, ChangeAction::Delete);
    }
    Ok(Json(serde_json::json!({ "data": { "released": released } })))
}
