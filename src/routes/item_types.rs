use axum::extract::{Path, State};
use axum::Json;

use crate::changes::{ChangeAction, ChangeTable};
use crate::db;
use crate::error::AppError;
use crate::middleware::auth::AdminUser;
use crate::middleware::permissions::require_party_owner;
use crate::models::item_type::{CreateItemType, UpdateItemType};
use crate::state::AppState;

pub async fn list_item_types(
    state: State<AppState>,
    Path(party_id): Path<String>,
    auth: AdminUser,
) -> Result<Json<serde_json::Value>, AppError> {
    require_party_owner(&state.db, &party_id, &auth).await?;
    let mut conn = state.db.acquire().await?;
    let item_types = db::item_types::list_with_stats(&mut *conn, &party_id).await?;
    Ok(Json(serde_json::json!({ "data": item_types })))
}

pub async fn create_item_type(
    state: State<AppState>,
    Path(party_id): Path<String>,
    auth: AdminUser,
    Json(input): Json<CreateItemType>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_party_owner(&state.db, &party_id, &auth).await?;
    let item_type = db::item_types::define_item_type(&state.db, &party_id, &input).await?;
    state.publish(&party_id, ChangeTable::ItemTypes, ChangeAction::Insert);
    Ok(Json(serde_json::json!({ "data": item_type })))
}

pub async fn update_item_type(
    state: State<AppState>,
    Path((party_id, item_type_id)): Path<(String, String)>,
    auth: AdminUser,
    Json(input): Json<UpdateItemType>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_party_owner(&state.db, &party_id, &auth).await?;
    let item_type =
        db::item_types::update_item_type(&state.db, &party_id, &item_type_id, &input).await?;
    state.publish(&party_id, ChangeTable::ItemTypes, ChangeAction::Update);
    Ok(Json(serde_json::json!({ "data": item_type })))
}

pub async fn delete_item_type(
    state: State<AppState>,
    Path((party_id, item_type_id)): Path<(String, String)>,
    auth: AdminUser,
) -> Result<Json<serde_json::Value>, AppError> {
    require_party_owner(&state.db, &party_id, &auth).await?;
    db::item_types::delete_item_type(&state.db, &party_id, &item_type_id).await?;
    state.publish(&party_id, ChangeTable::ItemTypes, ChangeAction::Delete);
    state.publish(&party_id, ChangeTable::Selections, ChangeAction::Delete);
    Ok(Json(serde_json::json!({ "data": null })))
}
