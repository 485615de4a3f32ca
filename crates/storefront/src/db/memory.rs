//! In-process cart store.
//!
//! Mirrors [`super::CartRepository`] with plain collections behind one
//! async mutex; each call holds the lock for its whole duration, which gives
//! the same all-or-nothing behavior as a transaction. Used by unit and
//! engine tests so cart rules can be exercised without a database.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use stride_core::cart::{self, Cart, CartLine, CartOwner, MergeAction, MergeReport, StockedLine};
use stride_core::{CartId, CartItemId, GuestId, GuestToken, ProductId, UserId, VariantId};

use crate::services::cart::{CartError, CartStore};

/// A variant to seed into the store.
#[derive(Debug, Clone)]
pub struct NewVariant {
    pub product_name: String,
    pub sku: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub in_stock: u32,
    pub image_url: Option<String>,
}

impl NewVariant {
    #[must_use]
    pub fn new(product_name: &str, price: Decimal, in_stock: u32) -> Self {
        Self {
            product_name: product_name.to_owned(),
            sku: product_name.to_uppercase().replace(' ', "-"),
            price,
            sale_price: None,
            in_stock,
            image_url: None,
        }
    }

    #[must_use]
    pub const fn with_sale_price(mut self, sale_price: Decimal) -> Self {
        self.sale_price = Some(sale_price);
        self
    }
}

#[derive(Debug)]
struct StoredVariant {
    product_id: ProductId,
    details: NewVariant,
}

#[derive(Debug)]
struct StoredGuest {
    token: GuestToken,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct StoredItem {
    cart_id: CartId,
    variant_id: VariantId,
    quantity: u32,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i32,
    variants: BTreeMap<VariantId, StoredVariant>,
    guests: BTreeMap<GuestId, StoredGuest>,
    carts: BTreeMap<CartId, Cart>,
    items: BTreeMap<CartItemId, StoredItem>,
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn cart_for(&self, owner: CartOwner) -> Option<&Cart> {
        self.carts.values().find(|c| c.is_owned_by(owner))
    }

    fn cart_or_insert(&mut self, owner: CartOwner) -> Cart {
        if let Some(cart) = self.cart_for(owner) {
            return cart.clone();
        }
        let cart = Cart {
            id: CartId::new(self.next_id()),
            owner,
            updated_at: Utc::now(),
        };
        self.carts.insert(cart.id, cart.clone());
        cart
    }

    fn touch(&mut self, cart_id: CartId) {
        if let Some(cart) = self.carts.get_mut(&cart_id) {
            cart.updated_at = Utc::now();
        }
    }

    fn stock(&self, variant_id: VariantId) -> Result<u32, CartError> {
        self.variants
            .get(&variant_id)
            .map(|v| v.details.in_stock)
            .ok_or(CartError::VariantNotFound)
    }

    fn line_for(&self, cart_id: CartId, variant_id: VariantId) -> Option<(CartItemId, StoredItem)> {
        self.items
            .iter()
            .find(|(_, item)| item.cart_id == cart_id && item.variant_id == variant_id)
            .map(|(id, item)| (*id, *item))
    }

    fn stocked_lines(&self, cart_id: CartId) -> Vec<StockedLine> {
        self.items
            .iter()
            .filter(|(_, item)| item.cart_id == cart_id)
            .map(|(id, item)| StockedLine {
                item_id: *id,
                variant_id: item.variant_id,
                quantity: item.quantity,
                in_stock: self.stock(item.variant_id).unwrap_or(0),
            })
            .collect()
    }

    fn owned_item(&self, owner: CartOwner, item_id: CartItemId) -> Result<StoredItem, CartError> {
        let item = *self.items.get(&item_id).ok_or(CartError::ItemNotFound)?;
        match self.carts.get(&item.cart_id) {
            Some(cart) if cart.is_owned_by(owner) => Ok(item),
            _ => Err(CartError::Unauthorized),
        }
    }

    fn delete_guest(&mut self, guest_id: GuestId) {
        self.guests.remove(&guest_id);
        let owner = CartOwner::Guest(guest_id);
        let carts: Vec<CartId> = self
            .carts
            .values()
            .filter(|c| c.is_owned_by(owner))
            .map(|c| c.id)
            .collect();
        for cart_id in carts {
            self.carts.remove(&cart_id);
            self.items.retain(|_, item| item.cart_id != cart_id);
        }
    }
}

/// Cart store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    inner: Mutex<Inner>,
}

impl MemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variant (of its own product) and return its id.
    pub async fn add_variant(&self, variant: NewVariant) -> VariantId {
        let mut inner = self.inner.lock().await;
        let product_id = ProductId::new(inner.next_id());
        let variant_id = VariantId::new(inner.next_id());
        inner.variants.insert(
            variant_id,
            StoredVariant {
                product_id,
                details: variant,
            },
        );
        variant_id
    }

    /// Change a variant's stock level.
    pub async fn set_stock(&self, variant_id: VariantId, in_stock: u32) {
        if let Some(variant) = self.inner.lock().await.variants.get_mut(&variant_id) {
            variant.details.in_stock = in_stock;
        }
    }

    /// Whether a guest row still exists.
    pub async fn has_guest(&self, guest_id: GuestId) -> bool {
        self.inner.lock().await.guests.contains_key(&guest_id)
    }

    /// Number of stored guests.
    pub async fn guest_count(&self) -> usize {
        self.inner.lock().await.guests.len()
    }

    /// Number of stored carts.
    pub async fn cart_count(&self) -> usize {
        self.inner.lock().await.carts.len()
    }
}

impl CartStore for MemoryCartStore {
    async fn find_guest(&self, token: &GuestToken) -> Result<Option<GuestId>, CartError> {
        let mut inner = self.inner.lock().await;
        let Some((id, expires_at)) = inner
            .guests
            .iter()
            .find(|(_, g)| &g.token == token)
            .map(|(id, g)| (*id, g.expires_at))
        else {
            return Ok(None);
        };
        if expires_at <= Utc::now() {
            inner.delete_guest(id);
            return Ok(None);
        }
        Ok(Some(id))
    }

    async fn create_guest(
        &self,
        token: &GuestToken,
        expires_at: DateTime<Utc>,
    ) -> Result<GuestId, CartError> {
        let mut inner = self.inner.lock().await;
        let id = GuestId::new(inner.next_id());
        inner.guests.insert(
            id,
            StoredGuest {
                token: token.clone(),
                expires_at,
            },
        );
        Ok(id)
    }

    async fn delete_guest(&self, guest_id: GuestId) -> Result<bool, CartError> {
        let mut inner = self.inner.lock().await;
        let existed = inner.guests.contains_key(&guest_id);
        inner.delete_guest(guest_id);
        Ok(existed)
    }

    async fn delete_expired_guests(&self, now: DateTime<Utc>) -> Result<u64, CartError> {
        let mut inner = self.inner.lock().await;
        let expired: Vec<GuestId> = inner
            .guests
            .iter()
            .filter(|(_, g)| g.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            inner.delete_guest(*id);
        }
        Ok(expired.len() as u64)
    }

    async fn find_cart(&self, owner: CartOwner) -> Result<Option<Cart>, CartError> {
        Ok(self.inner.lock().await.cart_for(owner).cloned())
    }

    async fn get_or_create_cart(&self, owner: CartOwner) -> Result<Cart, CartError> {
        Ok(self.inner.lock().await.cart_or_insert(owner))
    }

    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, CartError> {
        let inner = self.inner.lock().await;
        let lines = inner
            .items
            .iter()
            .filter(|(_, item)| item.cart_id == cart_id)
            .filter_map(|(id, item)| {
                let variant = inner.variants.get(&item.variant_id)?;
                Some(CartLine {
                    item_id: *id,
                    variant_id: item.variant_id,
                    product_id: variant.product_id,
                    product_name: variant.details.product_name.clone(),
                    sku: variant.details.sku.clone(),
                    quantity: item.quantity,
                    price: variant.details.price,
                    sale_price: variant.details.sale_price,
                    in_stock: variant.details.in_stock,
                    image_url: variant.details.image_url.clone(),
                })
            })
            .collect();
        Ok(lines)
    }

    async fn add_item(
        &self,
        owner: CartOwner,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<(CartId, u32), CartError> {
        let mut inner = self.inner.lock().await;
        let in_stock = inner.stock(variant_id)?;
        let existing = inner
            .cart_for(owner)
            .map(|cart| cart.id)
            .and_then(|cart_id| inner.line_for(cart_id, variant_id));
        let held = existing.map_or(0, |(_, item)| item.quantity);
        let total = cart::ensure_stock(in_stock, held, quantity)?;

        let cart_id = inner.cart_or_insert(owner).id;
        match existing {
            Some((item_id, _)) => {
                if let Some(item) = inner.items.get_mut(&item_id) {
                    item.quantity = total;
                }
            }
            None => {
                let item_id = CartItemId::new(inner.next_id());
                inner.items.insert(
                    item_id,
                    StoredItem {
                        cart_id,
                        variant_id,
                        quantity: total,
                    },
                );
            }
        }
        inner.touch(cart_id);
        Ok((cart_id, total))
    }

    async fn set_item_quantity(
        &self,
        owner: CartOwner,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<(), CartError> {
        let mut inner = self.inner.lock().await;
        let item = inner.owned_item(owner, item_id)?;
        cart::ensure_stock(inner.stock(item.variant_id)?, 0, quantity)?;

        if let Some(stored) = inner.items.get_mut(&item_id) {
            stored.quantity = quantity;
        }
        inner.touch(item.cart_id);
        Ok(())
    }

    async fn remove_item(&self, owner: CartOwner, item_id: CartItemId) -> Result<(), CartError> {
        let mut inner = self.inner.lock().await;
        let item = inner.owned_item(owner, item_id)?;
        inner.items.remove(&item_id);
        inner.touch(item.cart_id);
        Ok(())
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<u64, CartError> {
        let mut inner = self.inner.lock().await;
        let before = inner.items.len();
        inner.items.retain(|_, item| item.cart_id != cart_id);
        let removed = (before - inner.items.len()) as u64;
        if removed > 0 {
            inner.touch(cart_id);
        }
        Ok(removed)
    }

    async fn merge_guest_cart(
        &self,
        guest_id: GuestId,
        user_id: UserId,
    ) -> Result<MergeReport, CartError> {
        let mut inner = self.inner.lock().await;

        let report = match inner.cart_for(CartOwner::Guest(guest_id)).map(|c| c.id) {
            Some(guest_cart) => {
                let user_cart = inner.cart_or_insert(CartOwner::User(user_id)).id;
                let plan = cart::plan_merge(
                    &inner.stocked_lines(guest_cart),
                    &inner.stocked_lines(user_cart),
                );

                for action in &plan.actions {
                    match *action {
                        MergeAction::Increase { item_id, quantity } => {
                            if let Some(item) = inner.items.get_mut(&item_id) {
                                item.quantity = quantity;
                            }
                        }
                        MergeAction::Insert {
                            variant_id,
                            quantity,
                        } => {
                            let item_id = CartItemId::new(inner.next_id());
                            inner.items.insert(
                                item_id,
                                StoredItem {
                                    cart_id: user_cart,
                                    variant_id,
                                    quantity,
                                },
                            );
                        }
                    }
                }
                if !plan.actions.is_empty() {
                    inner.touch(user_cart);
                }
                plan.report()
            }
            None => MergeReport::default(),
        };

        inner.delete_guest(guest_id);
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[tokio::test]
    async fn test_deleting_guest_drops_its_cart() {
        let store = MemoryCartStore::new();
        let variant = store
            .add_variant(NewVariant::new("Cloudmonster", Decimal::from(170), 4))
            .await;
        let token = GuestToken::generate();
        let guest = store
            .create_guest(&token, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        let (cart_id, _) = store
            .add_item(CartOwner::Guest(guest), variant, 1)
            .await
            .unwrap();

        assert_eq!(store.delete_expired_guests(Utc::now() + Duration::days(2)).await.unwrap(), 1);
        assert!(!store.has_guest(guest).await);
        assert!(store.find_cart(CartOwner::Guest(guest)).await.unwrap().is_none());
        assert!(store.cart_lines(cart_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_add_leaves_line_unchanged() {
        let store = MemoryCartStore::new();
        let variant = store
            .add_variant(NewVariant::new("Cloudmonster", Decimal::from(170), 3))
            .await;
        let owner = CartOwner::User(UserId::new(1));

        let (cart_id, quantity) = store.add_item(owner, variant, 2).await.unwrap();
        assert_eq!(quantity, 2);
        let err = store.add_item(owner, variant, 2).await.unwrap_err();
        assert!(matches!(err, CartError::InsufficientStock(_)));

        let lines = store.cart_lines(cart_id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_failed_add_creates_no_cart() {
        let store = MemoryCartStore::new();
        let variant = store
            .add_variant(NewVariant::new("Cloudmonster", Decimal::from(170), 1))
            .await;
        let owner = CartOwner::User(UserId::new(1));

        let err = store.add_item(owner, VariantId::new(404), 1).await.unwrap_err();
        assert!(matches!(err, CartError::VariantNotFound));
        let err = store.add_item(owner, variant, 2).await.unwrap_err();
        assert!(matches!(err, CartError::InsufficientStock(_)));

        assert!(store.find_cart(owner).await.unwrap().is_none());
        assert_eq!(store.cart_count().await, 0);
    }

    #[tokio::test]
    async fn test_get_or_create_cart_is_stable() {
        let store = MemoryCartStore::new();
        let owner = CartOwner::User(UserId::new(1));
        let first = store.get_or_create_cart(owner).await.unwrap();
        let second = store.get_or_create_cart(owner).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_sale_price_is_carried() {
        let store = MemoryCartStore::new();
        let variant = store
            .add_variant(
                NewVariant::new("Cloudmonster", Decimal::from(170), 3)
                    .with_sale_price(Decimal::from(140)),
            )
            .await;
        let (cart_id, _) = store
            .add_item(CartOwner::User(UserId::new(1)), variant, 2)
            .await
            .unwrap();

        let lines = store.cart_lines(cart_id).await.unwrap();
        assert_eq!(lines[0].sale_price, Some(Decimal::from(140)));
        assert_eq!(lines[0].subtotal(), Decimal::from(280));
    }
}
