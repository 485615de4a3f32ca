//! Guest session maintenance.

use stride_storefront::db::CartRepository;
use stride_storefront::services::CartService;

use super::{CommandError, connect};

/// Delete every guest session past its expiry.
///
/// Carts owned by those guests are removed with them.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the delete fails.
pub async fn purge() -> Result<(), CommandError> {
    let pool = connect().await?;

    let store = CartRepository::new(&pool);
    let removed = CartService::new(&store).purge_expired_guests().await?;

    tracing::info!(removed, "Expired guest sessions purged");
    Ok(())
}
