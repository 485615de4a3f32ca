//! Cart reconciliation engine.
//!
//! [`CartService`] turns a request [`Identity`] into a cart owner and runs
//! cart operations against a [`CartStore`]. Decisions (stock bounds,
//! totals, merge planning) come from [`stride_core::cart`]; the store only
//! persists them atomically.

mod error;
mod store;

pub use error::CartError;
pub use store::CartStore;

use chrono::{Duration, Utc};
use tracing::{info, instrument, warn};

use stride_core::cart::{
    self, Cart, CartOwner, CartSummary, Identity, MergeReport, QuantityUpdate,
};
use stride_core::{CartItemId, GuestToken, UserId, VariantId};

/// An owner able to hold a cart, plus the guest token issued to get it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedShopper {
    pub owner: CartOwner,
    /// Set when a new guest session was created and its cookie must be sent.
    pub issued_token: Option<GuestToken>,
}

/// Cart operations for one request.
pub struct CartService<'a, S> {
    store: &'a S,
}

impl<'a, S: CartStore> CartService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Map an identity onto a cart owner.
    ///
    /// Returns `None` for anonymous requests and for guest tokens that are
    /// unknown or expired.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the guest lookup fails.
    pub async fn resolve_owner(&self, identity: &Identity) -> Result<Option<CartOwner>, CartError> {
        match identity {
            Identity::User(user_id) => Ok(Some(CartOwner::User(*user_id))),
            Identity::Guest(token) => Ok(self
                .store
                .find_guest(token)
                .await?
                .map(CartOwner::Guest)),
            Identity::Anonymous => Ok(None),
        }
    }

    /// Create a guest session valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the guest can't be stored.
    #[instrument(skip(self))]
    pub async fn create_guest_session(
        &self,
        ttl: Duration,
    ) -> Result<(GuestToken, CartOwner), CartError> {
        let token = GuestToken::generate();
        let guest_id = self.store.create_guest(&token, Utc::now() + ttl).await?;
        info!(guest_id = %guest_id, "Created guest session");
        Ok((token, CartOwner::Guest(guest_id)))
    }

    /// Resolve the shopper, starting a guest session when there is none.
    ///
    /// An existing guest token is reused while it still resolves.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the lookup or insert fails.
    pub async fn ensure_owner(
        &self,
        identity: &Identity,
        ttl: Duration,
    ) -> Result<ResolvedShopper, CartError> {
        if let Some(owner) = self.resolve_owner(identity).await? {
            return Ok(ResolvedShopper {
                owner,
                issued_token: None,
            });
        }
        let (token, owner) = self.create_guest_session(ttl).await?;
        Ok(ResolvedShopper {
            owner,
            issued_token: Some(token),
        })
    }

    async fn require_owner(&self, identity: &Identity) -> Result<CartOwner, CartError> {
        self.resolve_owner(identity)
            .await?
            .ok_or(CartError::IdentityUnavailable)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Cart for the identity, created if it doesn't exist yet.
    ///
    /// # Errors
    ///
    /// Returns `CartError::IdentityUnavailable` when no owner can be resolved.
    pub async fn get_or_create_cart(&self, identity: &Identity) -> Result<Cart, CartError> {
        let owner = self.require_owner(identity).await?;
        self.store.get_or_create_cart(owner).await
    }

    /// Current cart contents priced from the variants.
    ///
    /// A shopper without a cart gets an empty summary.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the cart can't be read.
    #[instrument(skip(self, identity))]
    pub async fn get_cart(&self, identity: &Identity) -> Result<CartSummary, CartError> {
        let Some(owner) = self.resolve_owner(identity).await? else {
            return Ok(CartSummary::default());
        };
        self.summary_for(owner).await
    }

    /// Total units in the shopper's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the cart can't be read.
    pub async fn item_count(&self, identity: &Identity) -> Result<u32, CartError> {
        Ok(self.get_cart(identity).await?.item_count)
    }

    async fn summary_for(&self, owner: CartOwner) -> Result<CartSummary, CartError> {
        match self.store.find_cart(owner).await? {
            Some(cart) => Ok(CartSummary::from_lines(self.store.cart_lines(cart.id).await?)),
            None => Ok(CartSummary::default()),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add units of a variant to the shopper's cart.
    ///
    /// The stock check covers the whole line: units already in the cart
    /// plus `quantity`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for quantities below 1,
    /// `CartError::IdentityUnavailable` without an owner,
    /// `CartError::VariantNotFound` or `CartError::InsufficientStock`.
    #[instrument(skip(self, identity), fields(variant_id = %variant_id))]
    pub async fn add_item(
        &self,
        identity: &Identity,
        variant_id: VariantId,
        quantity: i64,
    ) -> Result<CartSummary, CartError> {
        let quantity = cart::add_quantity(quantity)?;
        let owner = self.require_owner(identity).await?;
        self.add_for_owner(owner, variant_id, quantity).await
    }

    /// Add units of a variant, starting a guest session for anonymous
    /// shoppers.
    ///
    /// A guest created by this call is deleted again when the add fails, so
    /// a rejected add leaves no guest, cart or cookie behind. On success the
    /// new guest token is returned alongside the summary.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_item`], minus `CartError::IdentityUnavailable`.
    #[instrument(skip(self, identity), fields(variant_id = %variant_id))]
    pub async fn add_item_for_shopper(
        &self,
        identity: &Identity,
        variant_id: VariantId,
        quantity: i64,
        ttl: Duration,
    ) -> Result<(CartSummary, Option<GuestToken>), CartError> {
        let quantity = cart::add_quantity(quantity)?;
        let shopper = self.ensure_owner(identity, ttl).await?;
        match self.add_for_owner(shopper.owner, variant_id, quantity).await {
            Ok(summary) => Ok((summary, shopper.issued_token)),
            Err(err) => {
                if let (Some(_), CartOwner::Guest(guest_id)) =
                    (&shopper.issued_token, shopper.owner)
                {
                    if let Err(cleanup) = self.store.delete_guest(guest_id).await {
                        warn!(
                            guest_id = %guest_id,
                            error = %cleanup,
                            "Failed to drop guest after rejected add"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    async fn add_for_owner(
        &self,
        owner: CartOwner,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<CartSummary, CartError> {
        let (cart_id, line_quantity) = self.store.add_item(owner, variant_id, quantity).await?;
        info!(cart_id = %cart_id, line_quantity, "Added item to cart");
        self.summary_for(owner).await
    }

    /// Change a line's quantity; 0 removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for negative quantities,
    /// `CartError::ItemNotFound`, `CartError::Unauthorized` when the line
    /// belongs to another shopper, or `CartError::InsufficientStock`.
    #[instrument(skip(self, identity), fields(item_id = %item_id))]
    pub async fn update_item(
        &self,
        identity: &Identity,
        item_id: CartItemId,
        quantity: i64,
    ) -> Result<CartSummary, CartError> {
        let update = cart::update_quantity(quantity)?;
        let owner = self.require_owner(identity).await?;
        match update {
            QuantityUpdate::Remove => self.store.remove_item(owner, item_id).await?,
            QuantityUpdate::Set(quantity) => {
                self.store
                    .set_item_quantity(owner, item_id, quantity)
                    .await?;
            }
        }
        self.summary_for(owner).await
    }

    /// Remove a line from the shopper's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` (also for lines already removed)
    /// or `CartError::Unauthorized`.
    #[instrument(skip(self, identity), fields(item_id = %item_id))]
    pub async fn remove_item(
        &self,
        identity: &Identity,
        item_id: CartItemId,
    ) -> Result<CartSummary, CartError> {
        let owner = self.require_owner(identity).await?;
        self.store.remove_item(owner, item_id).await?;
        self.summary_for(owner).await
    }

    /// Empty the shopper's cart. A shopper without a cart is left as is.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    #[instrument(skip(self, identity))]
    pub async fn clear_cart(&self, identity: &Identity) -> Result<CartSummary, CartError> {
        let Some(owner) = self.resolve_owner(identity).await? else {
            return Ok(CartSummary::default());
        };
        if let Some(cart) = self.store.find_cart(owner).await? {
            let removed = self.store.clear_cart(cart.id).await?;
            info!(cart_id = %cart.id, removed, "Cleared cart");
        }
        Ok(CartSummary::default())
    }

    /// Fold a guest's cart into the user's cart after sign-in or sign-up.
    ///
    /// Succeeds with an empty report when there's no guest token or the
    /// guest no longer exists.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the merge transaction fails; the
    /// guest cart is then left untouched.
    #[instrument(skip(self, guest_token), fields(user_id = %user_id))]
    pub async fn merge_guest_into_user(
        &self,
        guest_token: Option<&GuestToken>,
        user_id: UserId,
    ) -> Result<MergeReport, CartError> {
        let Some(token) = guest_token else {
            return Ok(MergeReport::default());
        };
        let Some(guest_id) = self.store.find_guest(token).await? else {
            return Ok(MergeReport::default());
        };

        let report = self.store.merge_guest_cart(guest_id, user_id).await?;
        for adjustment in &report.adjustments {
            warn!(
                variant_id = %adjustment.variant_id,
                requested = adjustment.requested,
                kept = adjustment.kept,
                "Merged cart line limited by stock"
            );
        }
        info!(
            guest_id = %guest_id,
            merged_lines = report.merged_lines,
            "Merged guest cart into user cart"
        );
        Ok(report)
    }

    /// Delete guests whose sessions have expired.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    pub async fn purge_expired_guests(&self) -> Result<u64, CartError> {
        let purged = self.store.delete_expired_guests(Utc::now()).await?;
        info!(purged, "Purged expired guest sessions");
        Ok(purged)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::memory::{MemoryCartStore, NewVariant};

    fn ttl() -> Duration {
        Duration::days(7)
    }

    async fn guest(service: &CartService<'_, MemoryCartStore>) -> Identity {
        let (token, _) = service.create_guest_session(ttl()).await.unwrap();
        Identity::Guest(token)
    }

    #[tokio::test]
    async fn test_empty_cart_for_unknown_shopper() {
        let store = MemoryCartStore::new();
        let service = CartService::new(&store);
        let summary = service.get_cart(&Identity::Anonymous).await.unwrap();
        assert!(summary.is_empty());
        assert_eq!(summary.item_count, 0);
    }

    #[tokio::test]
    async fn test_ensure_owner_reuses_live_guest() {
        let store = MemoryCartStore::new();
        let service = CartService::new(&store);

        let fresh = service.ensure_owner(&Identity::Anonymous, ttl()).await.unwrap();
        let token = fresh.issued_token.clone().unwrap();

        let again = service
            .ensure_owner(&Identity::Guest(token), ttl())
            .await
            .unwrap();
        assert_eq!(again.owner, fresh.owner);
        assert_eq!(again.issued_token, None);
    }

    #[tokio::test]
    async fn test_ensure_owner_replaces_expired_guest() {
        let store = MemoryCartStore::new();
        let service = CartService::new(&store);

        let (stale, _) = service
            .create_guest_session(Duration::seconds(-1))
            .await
            .unwrap();
        let resolved = service
            .ensure_owner(&Identity::Guest(stale), ttl())
            .await
            .unwrap();
        assert!(resolved.issued_token.is_some());
    }

    #[tokio::test]
    async fn test_add_requires_identity() {
        let store = MemoryCartStore::new();
        let variant = store.add_variant(NewVariant::new("Pegasus", Decimal::from(120), 5)).await;
        let service = CartService::new(&store);

        let err = service
            .add_item(&Identity::Anonymous, variant, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::IdentityUnavailable));
    }

    #[tokio::test]
    async fn test_add_rejects_bad_quantity_before_lookup() {
        let store = MemoryCartStore::new();
        let service = CartService::new(&store);
        let err = service
            .add_item(&Identity::Anonymous, VariantId::new(1), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::InvalidQuantity(_)));
    }

    #[tokio::test]
    async fn test_rejected_anonymous_add_leaves_no_guest() {
        let store = MemoryCartStore::new();
        let variant = store.add_variant(NewVariant::new("Pegasus", Decimal::from(120), 1)).await;
        let service = CartService::new(&store);

        let err = service
            .add_item_for_shopper(&Identity::Anonymous, VariantId::new(404), 1, ttl())
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::VariantNotFound));

        let err = service
            .add_item_for_shopper(&Identity::Anonymous, variant, 2, ttl())
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::InsufficientStock(_)));

        assert_eq!(store.guest_count().await, 0);
        assert_eq!(store.cart_count().await, 0);
    }

    #[tokio::test]
    async fn test_anonymous_add_issues_guest_token() {
        let store = MemoryCartStore::new();
        let variant = store.add_variant(NewVariant::new("Pegasus", Decimal::from(120), 5)).await;
        let service = CartService::new(&store);

        let (summary, token) = service
            .add_item_for_shopper(&Identity::Anonymous, variant, 2, ttl())
            .await
            .unwrap();
        assert_eq!(summary.item_count, 2);
        let token = token.unwrap();

        let (summary, again) = service
            .add_item_for_shopper(&Identity::Guest(token), variant, 1, ttl())
            .await
            .unwrap();
        assert_eq!(summary.item_count, 3);
        assert_eq!(again, None);
    }

    #[tokio::test]
    async fn test_rejected_add_keeps_existing_guest() {
        let store = MemoryCartStore::new();
        let service = CartService::new(&store);
        let shopper = guest(&service).await;

        let err = service
            .add_item_for_shopper(&shopper, VariantId::new(404), 1, ttl())
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::VariantNotFound));
        assert_eq!(store.guest_count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_adds_stay_within_stock() {
        let store = MemoryCartStore::new();
        let variant = store.add_variant(NewVariant::new("Pegasus", Decimal::from(120), 3)).await;
        let service = CartService::new(&store);
        let shopper = guest(&service).await;

        let (first, second) = tokio::join!(
            service.add_item(&shopper, variant, 2),
            service.add_item(&shopper, variant, 2),
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(CartError::InsufficientStock(_)))));

        let summary = service.get_cart(&shopper).await.unwrap();
        assert_eq!(summary.items.len(), 1);
        assert_eq!(summary.items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_add_same_variant_increments_line() {
        let store = MemoryCartStore::new();
        let variant = store.add_variant(NewVariant::new("Pegasus", Decimal::from(120), 5)).await;
        let service = CartService::new(&store);
        let shopper = guest(&service).await;

        service.add_item(&shopper, variant, 2).await.unwrap();
        let summary = service.add_item(&shopper, variant, 1).await.unwrap();

        assert_eq!(summary.items.len(), 1);
        assert_eq!(summary.items[0].quantity, 3);
        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.total, Decimal::from(360));
    }

    #[tokio::test]
    async fn test_update_to_zero_removes_line() {
        let store = MemoryCartStore::new();
        let variant = store.add_variant(NewVariant::new("Pegasus", Decimal::from(120), 5)).await;
        let service = CartService::new(&store);
        let shopper = guest(&service).await;

        let summary = service.add_item(&shopper, variant, 2).await.unwrap();
        let item = summary.items[0].id;
        let summary = service.update_item(&shopper, item, 0).await.unwrap();
        assert!(summary.is_empty());

        let err = service.remove_item(&shopper, item).await.unwrap_err();
        assert!(matches!(err, CartError::ItemNotFound));
    }

    #[tokio::test]
    async fn test_update_rechecks_stock() {
        let store = MemoryCartStore::new();
        let variant = store.add_variant(NewVariant::new("Pegasus", Decimal::from(120), 5)).await;
        let service = CartService::new(&store);
        let shopper = guest(&service).await;

        let item = service.add_item(&shopper, variant, 2).await.unwrap().items[0].id;
        store.set_stock(variant, 3).await;

        let err = service.update_item(&shopper, item, 4).await.unwrap_err();
        assert!(matches!(err, CartError::InsufficientStock(_)));
        let err = service.update_item(&shopper, item, -1).await.unwrap_err();
        assert!(matches!(err, CartError::InvalidQuantity(_)));

        let summary = service.update_item(&shopper, item, 3).await.unwrap();
        assert_eq!(summary.item_count, 3);
    }

    #[tokio::test]
    async fn test_clear_cart_without_cart_is_noop() {
        let store = MemoryCartStore::new();
        let service = CartService::new(&store);
        let shopper = guest(&service).await;
        assert!(service.clear_cart(&shopper).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merge_without_guest_succeeds() {
        let store = MemoryCartStore::new();
        let service = CartService::new(&store);
        let report = service
            .merge_guest_into_user(None, UserId::new(1))
            .await
            .unwrap();
        assert_eq!(report, MergeReport::default());

        let unknown = GuestToken::generate();
        let report = service
            .merge_guest_into_user(Some(&unknown), UserId::new(1))
            .await
            .unwrap();
        assert_eq!(report, MergeReport::default());
    }

    #[tokio::test]
    async fn test_purge_expired_guests() {
        let store = MemoryCartStore::new();
        let service = CartService::new(&store);
        service.create_guest_session(Duration::seconds(-5)).await.unwrap();
        service.create_guest_session(ttl()).await.unwrap();
        assert_eq!(service.purge_expired_guests().await.unwrap(), 1);
    }
}
