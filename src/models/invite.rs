use serde::{Deserialize, Serialize};

use super::double_option;
use super::party::Party;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteCode {
    pub id: String,
    pub party_id: String,
    pub code: String,
    pub is_active: bool,
    pub expires_at: Option<String>,
    pub max_uses: Option<i64>,
    pub uses: i64,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveInvite {
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolvedInvite {
    pub party: Party,
    pub invite_code: InviteCode,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateInvite {
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub expires_at: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_uses: Option<Option<i64>>,
}
