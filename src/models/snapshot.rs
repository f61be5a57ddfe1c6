use serde::Serialize;

use super::attendance::AttendanceCounts;
use super::guest::GuestWithAttendance;
use super::invite::InviteCode;
use super::item_type::ItemTypeWithStats;
use super::party::Party;

#[derive(Debug, Clone, Serialize)]
pub struct PartySnapshot {
    pub party: Party,
    pub guests: Vec<GuestWithAttendance>,
    pub attendance_counts: AttendanceCounts,
    /// Sum of `party_size` over guests marked as going.
    pub headcount: i64,
    pub item_types: Vec<ItemTypeWithStats>,
    pub invite_code: Option<InviteCode>,
}

impl PartySnapshot {
    /// Strip contact details before handing the snapshot to guests.
    pub fn redacted(mut self) -> Self {
        for entry in &mut self.guests {
            entry.guest.phone = None;
            entry.guest.device_fingerprint = None;
        }
        self
    }
}
