use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Going,
    Maybe,
    NotGoing,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Going => "going",
            AttendanceStatus::Maybe => "maybe",
            AttendanceStatus::NotGoing => "not_going",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "going" => Ok(AttendanceStatus::Going),
            "maybe" => Ok(AttendanceStatus::Maybe),
            "not_going" => Ok(AttendanceStatus::NotGoing),
            other => Err(format!("invalid attendance status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendance {
    pub id: String,
    pub party_id: String,
    pub guest_id: String,
    pub status: AttendanceStatus,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct SetAttendance {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceCounts {
    pub going: i64,
    pub maybe: i64,
    pub not_going: i64,
}

impl AttendanceCounts {
    pub fn record(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Going => self.going += 1,
            AttendanceStatus::Maybe => self.maybe += 1,
            AttendanceStatus::NotGoing => self.not_going += 1,
        }
    }
}
