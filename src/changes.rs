//! Change feed for party data.
//!
//! Every committed write publishes a [`ChangeEvent`] naming the party and the
//! table that changed. Connected viewers are expected to re-fetch the party
//! snapshot when they see one; delivering events to them is the job of an
//! external bus that subscribes here.

use serde::Serialize;
use tokio::sync::broadcast;

const FEED_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Parties,
    InviteCodes,
    Guests,
    Attendance,
    ItemTypes,
    Selections,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub party_id: String,
    pub table: ChangeTable,
    pub action: ChangeAction,
}

pub fn channel() -> (broadcast::Sender<ChangeEvent>, broadcast::Receiver<ChangeEvent>) {
    broadcast::channel(FEED_CAPACITY)
}

pub fn publish(
    tx: &broadcast::Sender<ChangeEvent>,
    party_id: &str,
    table: ChangeTable,
    action: ChangeAction,
) {
    let event = ChangeEvent {
        party_id: party_id.to_string(),
        table,
        action,
    };
    tracing::debug!(party_id, ?table, ?action, "publishing change");
    // No subscribers is the normal case when no bus is attached.
    let _ = tx.send(event);
}
