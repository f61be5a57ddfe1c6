use std::collections::HashMap;

use sqlx::{SqliteConnection, SqlitePool};

use crate::db::{attendance, guests, invites, item_types, parties};
use crate::error::AppError;
use crate::models::attendance::{Attendance, AttendanceCounts, AttendanceStatus};
use crate::models::guest::{Guest, GuestWithAttendance};
use crate::models::invite::InviteCode;
use crate::models::item_type::ItemTypeWithStats;
use crate::models::party::Party;
use crate::models::snapshot::PartySnapshot;

/// Snapshot of a live party. Archived parties are hidden.
pub async fn get_snapshot(pool: &SqlitePool, party_id: &str) -> Result<PartySnapshot, AppError> {
    read_snapshot(pool, party_id, false).await
}

/// Snapshot for the owning admin, archived parties included.
pub async fn get_admin_snapshot(pool: &SqlitePool, party_id: &str) -> Result<PartySnapshot, AppError> {
    read_snapshot(pool, party_id, true).await
}

async fn read_snapshot(
    pool: &SqlitePool,
    party_id: &str,
    include_archived: bool,
) -> Result<PartySnapshot, AppError> {
    // Every read below sees the same WAL snapshot.
    let mut tx = pool.begin().await?;

    let party = parties::get_party(&mut *tx, party_id).await?;
    if party.is_archived && !include_archived {
        return Err(AppError::NotFound("party not found".to_string()));
    }

    let snapshot = assemble(&mut *tx, party).await?;
    tx.commit().await?;
    Ok(snapshot)
}

async fn assemble(conn: &mut SqliteConnection, party: Party) -> Result<PartySnapshot, AppError> {
    let guests = guests::list_guests(&mut *conn, &party.id).await?;
    let attendance = attendance::list_for_party(&mut *conn, &party.id).await?;
    let item_types = item_types::list_with_stats(&mut *conn, &party.id).await?;
    let invite_code = invites::active_invite(&mut *conn, &party.id).await?;

    Ok(build_snapshot(party, guests, attendance, item_types, invite_code))
}

fn build_snapshot(
    party: Party,
    guests: Vec<Guest>,
    attendance: Vec<Attendance>,
    item_types: Vec<ItemTypeWithStats>,
    invite_code: Option<InviteCode>,
) -> PartySnapshot {
    let mut by_guest: HashMap<String, Attendance> = attendance
        .into_iter()
        .map(|a| (a.guest_id.clone(), a))
        .collect();

    let mut attendance_counts = AttendanceCounts::default();
    let mut headcount = 0;

    let guests: Vec<GuestWithAttendance> = guests
        .into_iter()
        .map(|guest| {
            let attendance = by_guest.remove(&guest.id);
            if let Some(ref a) = attendance {
                attendance_counts.record(a.status);
                if a.status == AttendanceStatus::Going {
                    headcount += guest.party_size;
                }
            }
            GuestWithAttendance { guest, attendance }
        })
        .collect();

    PartySnapshot {
        party,
        guests,
        attendance_counts,
        headcount,
        item_types,
        invite_code,
    }
}
