use dashmap::DashMap;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::changes::{ChangeAction, ChangeEvent, ChangeTable};

/// Per-key token bucket for rate limiting.
#[derive(Clone)]
pub struct RateLimitBucket {
    pub remaining: u32,
    /// Start of the interval not yet credited as tokens.
    pub last_refill: Instant,
    pub last_seen: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub changes: broadcast::Sender<ChangeEvent>,
    pub rate_limits: Arc<DashMap<String, RateLimitBucket>>,
    pub rate_limit_per_minute: u32,
    pub allow_registration: bool,
}

impl AppState {
    pub fn new(db: SqlitePool, rate_limit_per_minute: u32, allow_registration: bool) -> Self {
        let (changes, _) = crate::changes::channel();
        Self {
            db,
            changes,
            rate_limits: Arc::new(DashMap::new()),
            rate_limit_per_minute,
            allow_registration,
        }
    }

    /// Announce a committed write to whoever is listening on the change feed.
    pub fn publish(&self, party_id: &str, table: ChangeTable, action: ChangeAction) {
        crate::changes::publish(&self.changes, party_id, table, action);
    }
}
