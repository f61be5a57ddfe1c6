use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};

use crate::db::guests;
use crate::error::AppError;
use crate::models::attendance::{Attendance, AttendanceStatus};

const SELECT_ATTENDANCE: &str = "SELECT id, party_id, guest_id, status, updated_at FROM attendance";

fn row_to_attendance(row: SqliteRow) -> Result<Attendance, AppError> {
    let status: String = row.get("status");
    Ok(Attendance {
        id: row.get("id"),
        party_id: row.get("party_id"),
        guest_id: row.get("guest_id"),
        status: status.parse().map_err(AppError::Internal)?,
        updated_at: row.get("updated_at"),
    })
}

/// Record a guest's attendance intent. Returns the stored row and whether it
/// changed; repeating the current status is a no-op.
pub async fn set_status(
    pool: &SqlitePool,
    party_id: &str,
    guest_id: &str,
    status: AttendanceStatus,
) -> Result<(Attendance, bool), AppError> {
    guests::get_guest_in_party(pool, party_id, guest_id).await?;

    let id = uuid::Uuid::new_v4().to_string();
    let result = sqlx::query(
        "INSERT INTO attendance (id, party_id, guest_id, status) VALUES (?, ?, ?, ?) \
         ON CONFLICT(party_id, guest_id) DO UPDATE SET \
           status = excluded.status, \
           updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
         WHERE attendance.status <> excluded.status",
    )
    .bind(&id)
    .bind(party_id)
    .bind(guest_id)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    let changed = result.rows_affected() > 0;
    if changed {
        tracing::info!(party_id, guest_id, status = status.as_str(), "attendance updated");
    }

    let row = sqlx::query(&format!(
        "{SELECT_ATTENDANCE} WHERE party_id = ? AND guest_id = ?"
    ))
    .bind(party_id)
    .bind(guest_id)
    .fetch_one(pool)
    .await?;

    Ok((row_to_attendance(row)?, changed))
}

pub async fn get_for_guest<'e, E>(
    executor: E,
    party_id: &str,
    guest_id: &str,
) -> Result<Option<Attendance>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "{SELECT_ATTENDANCE} WHERE party_id = ? AND guest_id = ?"
    ))
    .bind(party_id)
    .bind(guest_id)
    .fetch_optional(executor)
    .await?;

    row.map(row_to_attendance).transpose()
}

pub async fn list_for_party<'e, E>(executor: E, party_id: &str) -> Result<Vec<Attendance>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!("{SELECT_ATTENDANCE} WHERE party_id = ?"))
        .bind(party_id)
        .fetch_all(executor)
        .await?;

    rows.into_iter().map(row_to_attendance).collect()
}
