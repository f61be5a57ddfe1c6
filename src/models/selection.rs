use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub id: String,
    pub party_id: String,
    pub guest_id: String,
    pub item_type_id: String,
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionWithGuest {
    #[serde(flatten)]
    pub selection: Selection,
    pub guest_display_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SelectItemType {
    pub item_type_id: Option<String>,
    pub note: Option<String>,
}
