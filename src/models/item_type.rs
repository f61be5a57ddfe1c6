use serde::{Deserialize, Serialize};

use super::selection::SelectionWithGuest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemType {
    pub id: String,
    pub party_id: String,
    pub name: String,
    pub capacity: i64,
    pub sort_order: i64,
    pub created_at: String,
}

/// Item type as shown to readers: occupancy is computed from the selection
/// rows at read time.
#[derive(Debug, Clone, Serialize)]
pub struct ItemTypeWithStats {
    #[serde(flatten)]
    pub item_type: ItemType,
    pub selections_count: i64,
    pub remaining: i64,
    pub selections: Vec<SelectionWithGuest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateItemType {
    pub name: Option<String>,
    pub capacity: Option<i64>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateItemType {
    pub name: Option<String>,
    pub capacity: Option<i64>,
    pub sort_order: Option<i64>,
}
