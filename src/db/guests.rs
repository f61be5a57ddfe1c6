use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};

use crate::db::{invites, parties};
use crate::error::AppError;
use crate::middleware::auth::{generate_token, hash_token};
use crate::models::guest::{Guest, JoinParty, JoinedParty};
use crate::models::trim_optional;

const MAX_DISPLAY_NAME_LEN: usize = 50;
const MAX_PARTY_SIZE: i64 = 20;

const GUEST_COLUMNS: &str =
    "id, party_id, display_name, phone, party_size, device_fingerprint, created_at, last_seen_at";

fn row_to_guest(row: SqliteRow) -> Guest {
    Guest {
        id: row.get("id"),
        party_id: row.get("party_id"),
        display_name: row.get("display_name"),
        phone: row.get("phone"),
        party_size: row.get("party_size"),
        device_fingerprint: row.get("device_fingerprint"),
        created_at: row.get("created_at"),
        last_seen_at: row.get("last_seen_at"),
    }
}

#[derive(Debug, PartialEq)]
struct NewGuest {
    display_name: String,
    phone: Option<String>,
    party_size: i64,
    device_fingerprint: Option<String>,
}

fn validate_join(input: &JoinParty) -> Result<NewGuest, AppError> {
    let display_name: String = input
        .display_name
        .as_deref()
        .unwrap_or("")
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .collect();
    let display_name = display_name.trim().to_string();

    let name_len = display_name.chars().count();
    if name_len == 0 || name_len > MAX_DISPLAY_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "display_name must be between 1 and {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }

    let party_size = input.party_size.unwrap_or(1);
    if !(1..=MAX_PARTY_SIZE).contains(&party_size) {
        return Err(AppError::BadRequest(format!(
            "party_size must be between 1 and {MAX_PARTY_SIZE}"
        )));
    }

    Ok(NewGuest {
        display_name,
        phone: trim_optional(input.phone.as_deref()),
        party_size,
        device_fingerprint: trim_optional(input.device_fingerprint.as_deref()),
    })
}

pub async fn get_guest<'e, E>(executor: E, guest_id: &str) -> Result<Guest, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {GUEST_COLUMNS} FROM guests WHERE id = ?"))
        .bind(guest_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("guest not found".to_string()))?;

    Ok(row_to_guest(row))
}

pub async fn get_guest_in_party<'e, E>(
    executor: E,
    party_id: &str,
    guest_id: &str,
) -> Result<Guest, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {GUEST_COLUMNS} FROM guests WHERE id = ? AND party_id = ?"
    ))
    .bind(guest_id)
    .bind(party_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::NotFound("guest not found for this party".to_string()))?;

    Ok(row_to_guest(row))
}

/// Guests of a party in join order.
pub async fn list_guests<'e, E>(executor: E, party_id: &str) -> Result<Vec<Guest>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!(
        "SELECT {GUEST_COLUMNS} FROM guests WHERE party_id = ? ORDER BY created_at, rowid"
    ))
    .bind(party_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(row_to_guest).collect())
}

/// Admit a new guest to a party. Every call creates a new guest row; the
/// invite use and the insert commit together.
pub async fn admit_guest(
    pool: &SqlitePool,
    party_id: &str,
    input: &JoinParty,
) -> Result<JoinedParty, AppError> {
    let new_guest = validate_join(input)?;

    let party = parties::get_party(pool, party_id).await?;
    if party.is_archived {
        return Err(AppError::Gone("this party has been archived".to_string()));
    }

    let mut tx = pool.begin().await?;

    if !invites::record_use(&mut *tx, party_id).await? {
        let reason = invites::unusable_reason(&mut *tx, party_id).await;
        tracing::warn!(party_id, "admission refused: no usable invite code");
        return Err(reason);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let token = generate_token();

    sqlx::query(
        "INSERT INTO guests (id, party_id, display_name, phone, party_size, device_fingerprint, token_hash) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(party_id)
    .bind(&new_guest.display_name)
    .bind(&new_guest.phone)
    .bind(new_guest.party_size)
    .bind(&new_guest.device_fingerprint)
    .bind(hash_token(&token))
    .execute(&mut *tx)
    .await?;

    let guest = get_guest(&mut *tx, &id).await?;
    tx.commit().await?;

    tracing::info!(party_id, guest_id = %guest.id, party_size = guest.party_size, "guest admitted");
    Ok(JoinedParty { guest, token })
}

/// Remove a guest. Their attendance and selection rows cascade.
pub async fn remove_guest(pool: &SqlitePool, party_id: &str, guest_id: &str) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM guests WHERE id = ? AND party_id = ?")
        .bind(guest_id)
        .bind(party_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("guest not found for this party".to_string()));
    }

    tracing::info!(party_id, guest_id, "guest removed");
    Ok(())
}

/// Look up the guest holding a token and mark them as seen.
pub async fn resolve_guest_token(pool: &SqlitePool, token: &str) -> Result<Option<Guest>, AppError> {
    let row = sqlx::query(&format!(
        "UPDATE guests SET last_seen_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
         WHERE token_hash = ? RETURNING {GUEST_COLUMNS}"
    ))
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_guest))
}
