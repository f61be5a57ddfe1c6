use sqlx::SqlitePool;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::{AdminUser, GuestAuth};
use crate::models::party::Party;

/// Check that the admin owns the party. Returns the party on success.
pub async fn require_party_owner(
    pool: &SqlitePool,
    party_id: &str,
    admin: &AdminUser,
) -> Result<Party, AppError> {
    let party = db::parties::get_party(pool, party_id).await?;
    if party.created_by != admin.admin_id {
        tracing::warn!(party_id, admin_id = %admin.admin_id, "admin denied access to party");
        return Err(AppError::Forbidden(
            "you do not manage this party".to_string(),
        ));
    }
    Ok(party)
}

/// Guest tokens are scoped to the party that issued them.
pub fn require_guest_of_party(guest: &GuestAuth, party_id: &str) -> Result<(), AppError> {
    if guest.0.party_id != party_id {
        return Err(AppError::NotFound(
            "guest not found for this party".to_string(),
        ));
    }
    Ok(())
}
