use serde::{Deserialize, Serialize};

use super::attendance::Attendance;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guest {
    pub id: String,
    pub party_id: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub party_size: i64,
    pub device_fingerprint: Option<String>,
    pub created_at: String,
    pub last_seen_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinParty {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub party_size: Option<i64>,
    pub device_fingerprint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JoinedParty {
    pub guest: Guest,
    /// Sent once; the server keeps only its hash.
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuestWithAttendance {
    #[serde(flatten)]
    pub guest: Guest,
    pub attendance: Option<Attendance>,
}
