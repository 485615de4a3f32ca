//! Persistence seam for the cart engine.

use std::future::Future;

use chrono::{DateTime, Utc};

use stride_core::cart::{Cart, CartLine, CartOwner, MergeReport};
use stride_core::{CartId, CartItemId, GuestId, GuestToken, UserId, VariantId};

use super::CartError;

/// Storage for guests, carts and cart lines.
///
/// Each mutating method is one atomic unit: implementations must apply it
/// entirely or not at all, and must serialize the stock check with the
/// quantity write so concurrent requests can't overdraw a variant.
pub trait CartStore: Send + Sync {
    /// Guest id for a session token, or `None` if unknown or expired.
    ///
    /// Expired guests may be deleted as a side effect.
    fn find_guest(
        &self,
        token: &GuestToken,
    ) -> impl Future<Output = Result<Option<GuestId>, CartError>> + Send;

    /// Persist a new guest session.
    fn create_guest(
        &self,
        token: &GuestToken,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<GuestId, CartError>> + Send;

    /// Delete a guest and its cart. Returns whether a guest was removed.
    fn delete_guest(&self, guest_id: GuestId) -> impl Future<Output = Result<bool, CartError>> + Send;

    /// Delete guests (and their carts) that expired at or before `now`.
    fn delete_expired_guests(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, CartError>> + Send;

    fn find_cart(
        &self,
        owner: CartOwner,
    ) -> impl Future<Output = Result<Option<Cart>, CartError>> + Send;

    /// Return the owner's cart, creating it if absent.
    fn get_or_create_cart(
        &self,
        owner: CartOwner,
    ) -> impl Future<Output = Result<Cart, CartError>> + Send;

    /// Lines of a cart with prices and stock read from the variants.
    fn cart_lines(
        &self,
        cart_id: CartId,
    ) -> impl Future<Output = Result<Vec<CartLine>, CartError>> + Send;

    /// Add `quantity` units of a variant to the owner's cart, merging with
    /// an existing line.
    ///
    /// The cart is created only once the variant and stock checks pass, so a
    /// failed add leaves no cart behind. Returns the cart id and the line's
    /// new quantity.
    fn add_item(
        &self,
        owner: CartOwner,
        variant_id: VariantId,
        quantity: u32,
    ) -> impl Future<Output = Result<(CartId, u32), CartError>> + Send;

    /// Set a line's quantity after checking `owner` owns it.
    fn set_item_quantity(
        &self,
        owner: CartOwner,
        item_id: CartItemId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), CartError>> + Send;

    /// Delete a line after checking `owner` owns it.
    fn remove_item(
        &self,
        owner: CartOwner,
        item_id: CartItemId,
    ) -> impl Future<Output = Result<(), CartError>> + Send;

    /// Delete every line of a cart, returning how many were removed.
    fn clear_cart(&self, cart_id: CartId) -> impl Future<Output = Result<u64, CartError>> + Send;

    /// Fold the guest's cart into the user's cart and delete the guest.
    fn merge_guest_cart(
        &self,
        guest_id: GuestId,
        user_id: UserId,
    ) -> impl Future<Output = Result<MergeReport, CartError>> + Send;
}
