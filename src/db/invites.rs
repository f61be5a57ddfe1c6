use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqliteConnection, SqlitePool};

use crate::error::AppError;
use crate::models::invite::{InviteCode, UpdateInvite};
use crate::models::party::Party;
use crate::models::{format_timestamp, normalize_timestamp, parse_timestamp};

/// Invite code alphabet: digits and uppercase letters without the visually
/// ambiguous `0 O 1 I L`.
pub const CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
pub const CODE_LENGTH: usize = 10;

/// Attempts at finding an unused code before giving up.
const ISSUE_ATTEMPTS: usize = 3;

const SELECT_INVITES: &str =
    "SELECT id, party_id, code, is_active, expires_at, max_uses, uses, created_at FROM invite_codes";

fn row_to_invite(row: SqliteRow) -> InviteCode {
    InviteCode {
        id: row.get("id"),
        party_id: row.get("party_id"),
        code: row.get("code"),
        is_active: row.get("is_active"),
        expires_at: row.get("expires_at"),
        max_uses: row.get("max_uses"),
        uses: row.get("uses"),
        created_at: row.get("created_at"),
    }
}

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Uppercase and validate a code typed by a guest.
pub fn normalize_code(raw: &str) -> Result<String, AppError> {
    let code = raw.trim().to_ascii_uppercase();
    let well_formed =
        code.len() == CODE_LENGTH && code.bytes().all(|b| CODE_ALPHABET.contains(&b));
    if !well_formed {
        return Err(AppError::BadRequest("invalid invite code format".to_string()));
    }
    Ok(code)
}

/// Whether a code can still admit guests at `now`.
pub fn ensure_usable(invite: &InviteCode, now: DateTime<Utc>) -> Result<(), AppError> {
    if !invite.is_active {
        return Err(AppError::Gone(
            "this invite code has been deactivated".to_string(),
        ));
    }

    if let Some(ref expires_at) = invite.expires_at {
        // Stored values are normalized; an unparsable one is treated as expired.
        let expired = parse_timestamp(expires_at).map_or(true, |ts| ts < now);
        if expired {
            return Err(AppError::Gone("this invite code has expired".to_string()));
        }
    }

    if let Some(max_uses) = invite.max_uses {
        if invite.uses >= max_uses {
            return Err(AppError::Gone(
                "this invite code has reached its maximum uses".to_string(),
            ));
        }
    }

    Ok(())
}

pub async fn get_invite<'e, E>(executor: E, invite_id: &str) -> Result<InviteCode, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("{SELECT_INVITES} WHERE id = ?"))
        .bind(invite_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("invite code not found".to_string()))?;

    Ok(row_to_invite(row))
}

pub async fn get_invite_by_code<'e, E>(executor: E, code: &str) -> Result<InviteCode, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("{SELECT_INVITES} WHERE code = ?"))
        .bind(code)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("party not found".to_string()))?;

    Ok(row_to_invite(row))
}

/// Newest active code for a party, if any.
pub async fn active_invite<'e, E>(executor: E, party_id: &str) -> Result<Option<InviteCode>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "{SELECT_INVITES} WHERE party_id = ? AND is_active = 1 ORDER BY created_at DESC, rowid DESC LIMIT 1"
    ))
    .bind(party_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(row_to_invite))
}

/// Newest code for a party regardless of state.
pub async fn current_invite<'e, E>(executor: E, party_id: &str) -> Result<InviteCode, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "{SELECT_INVITES} WHERE party_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1"
    ))
    .bind(party_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::NotFound("party has no invite code".to_string()))?;

    Ok(row_to_invite(row))
}

/// Persist a fresh active code for the party. Retries on a code collision.
pub async fn issue_invite(conn: &mut SqliteConnection, party_id: &str) -> Result<InviteCode, AppError> {
    for attempt in 1..=ISSUE_ATTEMPTS {
        let id = uuid::Uuid::new_v4().to_string();
        let code = generate_code();

        let result = sqlx::query("INSERT INTO invite_codes (id, party_id, code) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(party_id)
            .bind(&code)
            .execute(&mut *conn)
            .await;

        match result {
            Ok(_) => return get_invite(&mut *conn, &id).await,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tracing::warn!(party_id, attempt, "invite code collision, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::Internal(format!(
        "could not issue a unique invite code for party {party_id}"
    )))
}

/// Look up a code typed by a guest and return its party.
pub async fn resolve_invite(pool: &SqlitePool, raw_code: &str) -> Result<(Party, InviteCode), AppError> {
    let code = normalize_code(raw_code)?;
    let invite = get_invite_by_code(pool, &code).await?;
    ensure_usable(&invite, Utc::now())?;

    let party = match crate::db::parties::get_party(pool, &invite.party_id).await {
        Ok(party) if !party.is_archived => party,
        Ok(_) | Err(AppError::NotFound(_)) => {
            return Err(AppError::NotFound(
                "party not found or has been archived".to_string(),
            ))
        }
        Err(e) => return Err(e),
    };

    Ok((party, invite))
}

/// Count one admission against the party's active code. The guard and the
/// increment are one statement, so concurrent joins can never push `uses`
/// past `max_uses`. Returns false when no usable code was found.
pub async fn record_use(conn: &mut SqliteConnection, party_id: &str) -> Result<bool, AppError> {
    let now = format_timestamp(Utc::now());
    let result = sqlx::query(
        "UPDATE invite_codes SET uses = uses + 1 WHERE id = (
            SELECT id FROM invite_codes
            WHERE party_id = ? AND is_active = 1
              AND (expires_at IS NULL OR expires_at > ?)
              AND (max_uses IS NULL OR uses < max_uses)
            ORDER BY created_at DESC, rowid DESC LIMIT 1
        )",
    )
    .bind(party_id)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Explain why `record_use` found nothing to count against.
pub async fn unusable_reason(conn: &mut SqliteConnection, party_id: &str) -> AppError {
    match current_invite(&mut *conn, party_id).await {
        Ok(invite) => match ensure_usable(&invite, Utc::now()) {
            Err(e) => e,
            Ok(()) => AppError::Gone("this party is not accepting new guests".to_string()),
        },
        Err(AppError::NotFound(_)) => {
            AppError::Gone("this party is not accepting new guests".to_string())
        }
        Err(e) => e,
    }
}

pub async fn update_invite(
    pool: &SqlitePool,
    party_id: &str,
    input: &UpdateInvite,
) -> Result<InviteCode, AppError> {
    let current = current_invite(pool, party_id).await?;

    let is_active = input.is_active.unwrap_or(current.is_active);
    let expires_at = match &input.expires_at {
        Some(Some(raw)) => Some(normalize_timestamp("expires_at", raw)?),
        Some(None) => None,
        None => current.expires_at.clone(),
    };
    let max_uses = match input.max_uses {
        Some(Some(n)) if n < 1 => {
            return Err(AppError::BadRequest("max_uses must be at least 1".to_string()))
        }
        Some(value) => value,
        None => current.max_uses,
    };

    // The uses guard is re-checked in the statement so a join that lands
    // between the read above and this write cannot break `uses <= max_uses`.
    let result = sqlx::query(
        "UPDATE invite_codes SET is_active = ?, expires_at = ?, max_uses = ?
         WHERE id = ? AND (? IS NULL OR uses <= ?)",
    )
    .bind(is_active)
    .bind(&expires_at)
    .bind(max_uses)
    .bind(&current.id)
    .bind(max_uses)
    .bind(max_uses)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let uses: i64 = sqlx::query_scalar("SELECT uses FROM invite_codes WHERE id = ?")
            .bind(&current.id)
            .fetch_one(pool)
            .await?;
        return Err(AppError::BadRequest(format!(
            "max_uses cannot be lower than the {uses} uses already recorded"
        )));
    }

    tracing::info!(party_id, invite_id = %current.id, is_active, "invite code updated");
    get_invite(pool, &current.id).await
}

/// Deactivate every code of the party and issue a new one.
pub async fn rotate_invite(pool: &SqlitePool, party_id: &str) -> Result<InviteCode, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE invite_codes SET is_active = 0 WHERE party_id = ?")
        .bind(party_id)
        .execute(&mut *tx)
        .await?;

    let invite = issue_invite(&mut *tx, party_id).await?;
    tx.commit().await?;

    tracing::info!(party_id, invite_id = %invite.id, "invite code rotated");
    Ok(invite)
}
