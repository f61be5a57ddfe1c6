use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};

use crate::db::invites;
use crate::error::AppError;
use crate::models::invite::InviteCode;
use crate::models::party::{CreateParty, Party, PartySummary, UpdateParty, DEFAULT_TIMEZONE};
use crate::models::{normalize_timestamp, trim_optional};

const MAX_TITLE_LEN: usize = 200;

const PARTY_COLUMNS: &str = "id, title, description, starts_at, ends_at, location_address, timezone, \
     is_potluck, rsvp_deadline, max_capacity, dress_code, party_type, special_instructions, \
     created_by, is_archived, created_at, updated_at";

fn row_to_party(row: &SqliteRow) -> Party {
    Party {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        starts_at: row.get("starts_at"),
        ends_at: row.get("ends_at"),
        location_address: row.get("location_address"),
        timezone: row.get("timezone"),
        is_potluck: row.get("is_potluck"),
        rsvp_deadline: row.get("rsvp_deadline"),
        max_capacity: row.get("max_capacity"),
        dress_code: row.get("dress_code"),
        party_type: row.get("party_type"),
        special_instructions: row.get("special_instructions"),
        created_by: row.get("created_by"),
        is_archived: row.get("is_archived"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Editable party columns after validation and normalization.
#[derive(Debug, Clone, PartialEq)]
struct PartyFields {
    title: String,
    description: Option<String>,
    starts_at: String,
    ends_at: Option<String>,
    location_address: Option<String>,
    timezone: String,
    is_potluck: bool,
    rsvp_deadline: Option<String>,
    max_capacity: Option<i64>,
    dress_code: Option<String>,
    party_type: Option<String>,
    special_instructions: Option<String>,
}

impl PartyFields {
    fn from_party(party: &Party) -> Self {
        Self {
            title: party.title.clone(),
            description: party.description.clone(),
            starts_at: party.starts_at.clone(),
            ends_at: party.ends_at.clone(),
            location_address: party.location_address.clone(),
            timezone: party.timezone.clone(),
            is_potluck: party.is_potluck,
            rsvp_deadline: party.rsvp_deadline.clone(),
            max_capacity: party.max_capacity,
            dress_code: party.dress_code.clone(),
            party_type: party.party_type.clone(),
            special_instructions: party.special_instructions.clone(),
        }
    }

    fn from_create(input: &CreateParty) -> Result<Self, AppError> {
        let starts_at = match input.starts_at.as_deref() {
            Some(raw) if !raw.trim().is_empty() => normalize_timestamp("starts_at", raw)?,
            _ => return Err(AppError::BadRequest("starts_at is required".to_string())),
        };

        let fields = Self {
            title: input.title.as_deref().unwrap_or("").trim().to_string(),
            description: trim_optional(input.description.as_deref()),
            starts_at,
            ends_at: optional_timestamp("ends_at", input.ends_at.as_deref())?,
            location_address: trim_optional(input.location_address.as_deref()),
            timezone: trim_optional(input.timezone.as_deref())
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            is_potluck: input.is_potluck.unwrap_or(false),
            rsvp_deadline: optional_timestamp("rsvp_deadline", input.rsvp_deadline.as_deref())?,
            max_capacity: input.max_capacity,
            dress_code: trim_optional(input.dress_code.as_deref()),
            party_type: trim_optional(input.party_type.as_deref()),
            special_instructions: trim_optional(input.special_instructions.as_deref()),
        };
        fields.validate()?;
        Ok(fields)
    }

    /// Apply a partial update on top of the stored values.
    fn merge(mut self, input: &UpdateParty) -> Result<Self, AppError> {
        if let Some(ref title) = input.title {
            self.title = title.trim().to_string();
        }
        if let Some(ref description) = input.description {
            self.description = trim_optional(description.as_deref());
        }
        if let Some(ref starts_at) = input.starts_at {
            self.starts_at = normalize_timestamp("starts_at", starts_at)?;
        }
        if let Some(ref ends_at) = input.ends_at {
            self.ends_at = optional_timestamp("ends_at", ends_at.as_deref())?;
        }
        if let Some(ref location) = input.location_address {
            self.location_address = trim_optional(location.as_deref());
        }
        if let Some(ref timezone) = input.timezone {
            self.timezone =
                trim_optional(Some(timezone.as_str())).unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        }
        if let Some(is_potluck) = input.is_potluck {
            self.is_potluck = is_potluck;
        }
        if let Some(ref deadline) = input.rsvp_deadline {
            self.rsvp_deadline = optional_timestamp("rsvp_deadline", deadline.as_deref())?;
        }
        if let Some(max_capacity) = input.max_capacity {
            self.max_capacity = max_capacity;
        }
        if let Some(ref dress_code) = input.dress_code {
            self.dress_code = trim_optional(dress_code.as_deref());
        }
        if let Some(ref party_type) = input.party_type {
            self.party_type = trim_optional(party_type.as_deref());
        }
        if let Some(ref instructions) = input.special_instructions {
            self.special_instructions = trim_optional(instructions.as_deref());
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), AppError> {
        let title_len = self.title.chars().count();
        if title_len == 0 || title_len > MAX_TITLE_LEN {
            return Err(AppError::BadRequest(format!(
                "title must be between 1 and {MAX_TITLE_LEN} characters"
            )));
        }

        // Normalized timestamps compare correctly as strings.
        if let Some(ref ends_at) = self.ends_at {
            if *ends_at < self.starts_at {
                return Err(AppError::BadRequest(
                    "ends_at must not be before starts_at".to_string(),
                ));
            }
        }

        if matches!(self.max_capacity, Some(n) if n < 1) {
            return Err(AppError::BadRequest(
                "max_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn optional_timestamp(field: &str, raw: Option<&str>) -> Result<Option<String>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => normalize_timestamp(field, raw).map(Some),
        None => Ok(None),
    }
}

pub async fn get_party<'e, E>(executor: E, party_id: &str) -> Result<Party, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {PARTY_COLUMNS} FROM parties WHERE id = ?"))
        .bind(party_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("party not found".to_string()))?;

    Ok(row_to_party(&row))
}

/// Create a party and its first invite code. Either both rows exist
/// afterwards or neither does.
pub async fn create_party(
    pool: &SqlitePool,
    admin_id: &str,
    input: &CreateParty,
) -> Result<(Party, InviteCode), AppError> {
    let fields = PartyFields::from_create(input)?;
    let id = uuid::Uuid::new_v4().to_string();

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO parties (id, title, description, starts_at, ends_at, location_address, timezone, \
         is_potluck, rsvp_deadline, max_capacity, dress_code, party_type, special_instructions, created_by) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(&fields.starts_at)
    .bind(&fields.ends_at)
    .bind(&fields.location_address)
    .bind(&fields.timezone)
    .bind(fields.is_potluck)
    .bind(&fields.rsvp_deadline)
    .bind(fields.max_capacity)
    .bind(&fields.dress_code)
    .bind(&fields.party_type)
    .bind(&fields.special_instructions)
    .bind(admin_id)
    .execute(&mut *tx)
    .await?;

    let invite = invites::issue_invite(&mut *tx, &id).await?;
    let party = get_party(&mut *tx, &id).await?;

    tx.commit().await?;

    tracing::info!(party_id = %party.id, admin_id, "party created");
    Ok((party, invite))
}

pub async fn update_party(
    pool: &SqlitePool,
    party_id: &str,
    input: &UpdateParty,
) -> Result<Party, AppError> {
    let current = get_party(pool, party_id).await?;
    let fields = PartyFields::from_party(&current).merge(input)?;
    let is_archived = input.is_archived.unwrap_or(current.is_archived);

    sqlx::query(
        "UPDATE parties SET title = ?, description = ?, starts_at = ?, ends_at = ?, location_address = ?, \
         timezone = ?, is_potluck = ?, rsvp_deadline = ?, max_capacity = ?, dress_code = ?, party_type = ?, \
         special_instructions = ?, is_archived = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
         WHERE id = ?",
    )
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(&fields.starts_at)
    .bind(&fields.ends_at)
    .bind(&fields.location_address)
    .bind(&fields.timezone)
    .bind(fields.is_potluck)
    .bind(&fields.rsvp_deadline)
    .bind(fields.max_capacity)
    .bind(&fields.dress_code)
    .bind(&fields.party_type)
    .bind(&fields.special_instructions)
    .bind(is_archived)
    .bind(party_id)
    .execute(pool)
    .await?;

    if is_archived != current.is_archived {
        tracing::info!(party_id, is_archived, "party archive state changed");
    }

    get_party(pool, party_id).await
}

/// Delete a party. Invite codes, guests, attendance, item types and
/// selections go with it through the foreign key cascades.
pub async fn delete_party(pool: &SqlitePool, party_id: &str) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM parties WHERE id = ?")
        .bind(party_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("party not found".to_string()));
    }

    tracing::info!(party_id, "party deleted");
    Ok(())
}

/// Parties owned by an admin, newest `starts_at` first.
pub async fn list_parties_for_admin(
    pool: &SqlitePool,
    admin_id: &str,
) -> Result<Vec<PartySummary>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {PARTY_COLUMNS}, \
           (SELECT COUNT(*) FROM guests g WHERE g.party_id = parties.id) AS guest_count, \
           (SELECT COALESCE(SUM(g.party_size), 0) FROM guests g WHERE g.party_id = parties.id) AS total_headcount \
         FROM parties WHERE created_by = ? ORDER BY starts_at DESC, created_at DESC"
    ))
    .bind(admin_id)
    .fetch_all(pool)
    .await?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in &rows {
        let party = row_to_party(row);
        let invite_code = invites::active_invite(pool, &party.id).await?;
        summaries.push(PartySummary {
            guest_count: row.get("guest_count"),
            total_headcount: row.get("total_headcount"),
            invite_code,
            party,
        });
    }

    Ok(summaries)
}
