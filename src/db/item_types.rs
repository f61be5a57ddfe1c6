use std::collections::HashMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqliteConnection, SqlitePool};

use crate::db::{parties, selections};
use crate::error::{is_trigger_rejection, AppError, CAPACITY_CONFLICT_MARKER};
use crate::models::item_type::{CreateItemType, ItemType, ItemTypeWithStats, UpdateItemType};
use crate::models::selection::SelectionWithGuest;

const MAX_NAME_LEN: usize = 100;

const ITEM_TYPE_COLUMNS: &str = "id, party_id, name, capacity, sort_order, created_at";

fn row_to_item_type(row: SqliteRow) -> ItemType {
    ItemType {
        id: row.get("id"),
        party_id: row.get("party_id"),
        name: row.get("name"),
        capacity: row.get("capacity"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
    }
}

fn validate_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "name must be between 1 and {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_capacity(capacity: i64) -> Result<i64, AppError> {
    if capacity < 1 {
        return Err(AppError::BadRequest("capacity must be at least 1".to_string()));
    }
    Ok(capacity)
}

pub async fn get_item_type_in_party<'e, E>(
    executor: E,
    party_id: &str,
    item_type_id: &str,
) -> Result<ItemType, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {ITEM_TYPE_COLUMNS} FROM item_types WHERE id = ? AND party_id = ?"
    ))
    .bind(item_type_id)
    .bind(party_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::NotFound("item type not found for this party".to_string()))?;

    Ok(row_to_item_type(row))
}

/// Add an item type. Without an explicit sort order it goes after the
/// party's current last one.
pub async fn define_item_type(
    pool: &SqlitePool,
    party_id: &str,
    input: &CreateItemType,
) -> Result<ItemType, AppError> {
    let name = validate_name(input.name.as_deref().unwrap_or(""))?;
    let capacity = match input.capacity {
        Some(capacity) => validate_capacity(capacity)?,
        None => return Err(AppError::BadRequest("capacity is required".to_string())),
    };

    parties::get_party(pool, party_id).await?;

    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO item_types (id, party_id, name, capacity, sort_order) VALUES (?, ?, ?, ?, \
         COALESCE(?, (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM item_types WHERE party_id = ?)))",
    )
    .bind(&id)
    .bind(party_id)
    .bind(&name)
    .bind(capacity)
    .bind(input.sort_order)
    .bind(party_id)
    .execute(pool)
    .await?;

    tracing::info!(party_id, item_type_id = %id, capacity, "item type defined");
    get_item_type_in_party(pool, party_id, &id).await
}

/// Change an item type's name, capacity or sort order in one statement.
/// Capacity can never drop below the number of guests holding the type.
pub async fn update_item_type(
    pool: &SqlitePool,
    party_id: &str,
    item_type_id: &str,
    input: &UpdateItemType,
) -> Result<ItemType, AppError> {
    let current = get_item_type_in_party(pool, party_id, item_type_id).await?;

    let name = match input.name.as_deref() {
        Some(raw) => validate_name(raw)?,
        None => current.name.clone(),
    };
    let capacity = match input.capacity {
        Some(capacity) => validate_capacity(capacity)?,
        None => current.capacity,
    };
    let sort_order = input.sort_order.unwrap_or(current.sort_order);

    let result = sqlx::query(
        "UPDATE item_types SET name = ?, capacity = ?, sort_order = ? \
         WHERE id = ? AND party_id = ? \
           AND (SELECT COUNT(*) FROM selections WHERE item_type_id = ?) <= ?",
    )
    .bind(&name)
    .bind(capacity)
    .bind(sort_order)
    .bind(item_type_id)
    .bind(party_id)
    .bind(item_type_id)
    .bind(capacity)
    .execute(pool)
    .await;

    // The guard and the capacity floor trigger reject with the same message.
    let rejected = match result {
        Ok(done) => done.rows_affected() == 0,
        Err(e) if is_trigger_rejection(&e, CAPACITY_CONFLICT_MARKER) => true,
        Err(e) => return Err(e.into()),
    };
    if rejected {
        let taken = selections::occupancy(pool, item_type_id).await?;
        tracing::warn!(party_id, item_type_id, capacity, taken, "capacity reduction rejected");
        return Err(AppError::BadRequest(format!(
            "cannot reduce capacity to {capacity}: {taken} guests have already selected this type"
        )));
    }

    tracing::info!(party_id, item_type_id, capacity, "item type updated");
    get_item_type_in_party(pool, party_id, item_type_id).await
}

/// Delete an item type. Selections referencing it cascade.
pub async fn delete_item_type(
    pool: &SqlitePool,
    party_id: &str,
    item_type_id: &str,
) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM item_types WHERE id = ? AND party_id = ?")
        .bind(item_type_id)
        .bind(party_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("item type not found for this party".to_string()));
    }

    tracing::info!(party_id, item_type_id, "item type deleted");
    Ok(())
}

/// Item types of a party with their current holders. Both queries run on the
/// given connection, so inside a transaction they see the same data.
pub async fn list_with_stats(
    conn: &mut SqliteConnection,
    party_id: &str,
) -> Result<Vec<ItemTypeWithStats>, AppError> {
    let types: Vec<ItemType> = sqlx::query(&format!(
        "SELECT {ITEM_TYPE_COLUMNS} FROM item_types WHERE party_id = ? ORDER BY sort_order, created_at, rowid"
    ))
    .bind(party_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(row_to_item_type)
    .collect();

    let holders: Vec<SelectionWithGuest> = sqlx::query(
        "SELECT s.id, s.party_id, s.guest_id, s.item_type_id, s.note, s.created_at, s.updated_at, \
                g.display_name AS guest_display_name \
         FROM selections s JOIN guests g ON g.id = s.guest_id \
         WHERE s.party_id = ? ORDER BY s.created_at, s.rowid",
    )
    .bind(party_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|row| SelectionWithGuest {
        selection: selections::row_to_selection(&row),
        guest_display_name: row.get("guest_display_name"),
    })
    .collect();

    Ok(attach_selections(types, holders))
}

/// Group selections under their item type and derive the counts from them.
pub fn attach_selections(
    types: Vec<ItemType>,
    holders: Vec<SelectionWithGuest>,
) -> Vec<ItemTypeWithStats> {
    let mut by_type: HashMap<String, Vec<SelectionWithGuest>> = HashMap::new();
    for holder in holders {
        by_type
            .entry(holder.selection.item_type_id.clone())
            .or_default()
            .push(holder);
    }

    types
        .into_iter()
        .map(|item_type| {
            let selections = by_type.remove(&item_type.id).unwrap_or_default();
            let selections_count = selections.len() as i64;
            ItemTypeWithStats {
                remaining: (item_type.capacity - selections_count).max(0),
                selections_count,
                selections,
                item_type,
            }
        })
        .collect()
}
