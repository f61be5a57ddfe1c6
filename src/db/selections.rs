use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};

use crate::db::{guests, item_types};
use crate::error::{AppError, ITEM_TYPE_FULL};
use crate::models::selection::{SelectItemType, Selection};
use crate::models::trim_optional;

const MAX_NOTE_LEN: usize = 200;

const SELECTION_COLUMNS: &str =
    "id, party_id, guest_id, item_type_id, note, created_at, updated_at";

pub(crate) fn row_to_selection(row: &SqliteRow) -> Selection {
    Selection {
        id: row.get("id"),
        party_id: row.get("party_id"),
        guest_id: row.get("guest_id"),
        item_type_id: row.get("item_type_id"),
        note: row.get("note"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn normalize_note(note: Option<&str>) -> Result<Option<String>, AppError> {
    let note = trim_optional(note);
    if matches!(note, Some(ref n) if n.chars().count() > MAX_NOTE_LEN) {
        return Err(AppError::BadRequest(format!(
            "note must be at most {MAX_NOTE_LEN} characters"
        )));
    }
    Ok(note)
}

/// Number of guests currently holding an item type.
pub async fn occupancy<'e, E>(executor: E, item_type_id: &str) -> Result<i64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM selections WHERE item_type_id = ?")
        .bind(item_type_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

pub async fn get_selection_for_guest<'e, E>(
    executor: E,
    party_id: &str,
    guest_id: &str,
) -> Result<Option<Selection>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {SELECTION_COLUMNS} FROM selections WHERE party_id = ? AND guest_id = ?"
    ))
    .bind(party_id)
    .bind(guest_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.as_ref().map(row_to_selection))
}

/// Write a guest's selection in one statement. A guest with no selection
/// gets a new row; otherwise the existing row switches type and note in
/// place, so the guest never holds two types or none mid-switch.
///
/// The capacity triggers still apply; callers normally go through
/// [`select_item_type`], which checks occupancy first.
pub async fn upsert_selection<'e, E>(
    executor: E,
    party_id: &str,
    guest_id: &str,
    item_type_id: &str,
    note: Option<&str>,
) -> Result<Selection, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = uuid::Uuid::new_v4().to_string();
    let row = sqlx::query(&format!(
        "INSERT INTO selections (id, party_id, guest_id, item_type_id, note) VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(party_id, guest_id) DO UPDATE SET \
           item_type_id = excluded.item_type_id, \
           note = excluded.note, \
           updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
         RETURNING {SELECTION_COLUMNS}"
    ))
    .bind(&id)
    .bind(party_id)
    .bind(guest_id)
    .bind(item_type_id)
    .bind(note)
    .fetch_one(executor)
    .await?;

    Ok(row_to_selection(&row))
}

/// Claim an item type for a guest, releasing any other type they held.
pub async fn select_item_type(
    pool: &SqlitePool,
    party_id: &str,
    guest_id: &str,
    input: &SelectItemType,
) -> Result<Selection, AppError> {
    let item_type_id = input
        .item_type_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("item_type_id is required".to_string()))?;
    let note = normalize_note(input.note.as_deref())?;

    guests::get_guest_in_party(pool, party_id, guest_id).await?;
    let item_type = item_types::get_item_type_in_party(pool, party_id, item_type_id).await?;

    let current = get_selection_for_guest(pool, party_id, guest_id).await?;
    let same_type = matches!(current, Some(ref s) if s.item_type_id == item_type.id);

    // A note-only update keeps the guest's slot and needs no free capacity.
    // Both this check and the storage trigger reject with ITEM_TYPE_FULL.
    if !same_type {
        let taken = occupancy(pool, &item_type.id).await?;
        if taken >= item_type.capacity {
            tracing::warn!(
                party_id,
                guest_id,
                item_type_id = %item_type.id,
                taken,
                capacity = item_type.capacity,
                "selection rejected: item type full"
            );
            return Err(AppError::CapacityExceeded(ITEM_TYPE_FULL.to_string()));
        }
    }

    let selection =
        upsert_selection(pool, party_id, guest_id, &item_type.id, note.as_deref()).await?;

    match current {
        Some(previous) if previous.item_type_id != selection.item_type_id => {
            tracing::info!(
                party_id,
                guest_id,
                from = %previous.item_type_id,
                to = %selection.item_type_id,
                "selection switched"
            );
        }
        Some(_) => tracing::debug!(party_id, guest_id, "selection note updated"),
        None => {
            tracing::info!(party_id, guest_id, item_type_id = %selection.item_type_id, "item type selected")
        }
    }

    Ok(selection)
}

/// Drop a guest's selection. Returns whether there was one.
pub async fn release_selection(
    pool: &SqlitePool,
    party_id: &str,
    guest_id: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM selections WHERE party_id = ? AND guest_id = ?")
        .bind(party_id)
        .bind(guest_id)
        .execute(pool)
        .await?;

    let released = result.rows_affected() > 0;
    if released {
        tracing::info!(party_id, guest_id, "selection released");
    }
    Ok(released)
}
