use serde::{Deserialize, Serialize};

use super::double_option;
use super::invite::InviteCode;

pub const DEFAULT_TIMEZONE: &str = "America/Toronto";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: String,
    pub ends_at: Option<String>,
    pub location_address: Option<String>,
    pub timezone: String,
    pub is_potluck: bool,
    pub rsvp_deadline: Option<String>,
    pub max_capacity: Option<i64>,
    pub dress_code: Option<String>,
    pub party_type: Option<String>,
    pub special_instructions: Option<String>,
    pub created_by: String,
    pub is_archived: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Owner-scoped listing row for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct PartySummary {
    #[serde(flatten)]
    pub party: Party,
    pub invite_code: Option<InviteCode>,
    pub guest_count: i64,
    pub total_headcount: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateParty {
    pub title: Option<String>,
    pub description: Option<String>,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
    pub location_address: Option<String>,
    pub timezone: Option<String>,
    pub is_potluck: Option<bool>,
    pub rsvp_deadline: Option<String>,
    pub max_capacity: Option<i64>,
    pub dress_code: Option<String>,
    pub party_type: Option<String>,
    pub special_instructions: Option<String>,
}

/// Partial update. Nullable columns take `null` to clear them.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateParty {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub starts_at: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub ends_at: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location_address: Option<Option<String>>,
    pub timezone: Option<String>,
    pub is_potluck: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub rsvp_deadline: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_capacity: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub dress_code: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub party_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub special_instructions: Option<Option<String>>,
    pub is_archived: Option<bool>,
}
