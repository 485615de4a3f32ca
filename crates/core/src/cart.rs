//! Cart identities, read model and reconciliation rules.
//!
//! Persistence lives in the storefront crate. Everything a cart store has
//! to *decide* is here: who owns a cart, whether a quantity fits the stock,
//! what a cart is worth right now, and how a guest cart folds into a user
//! cart at sign-in.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{CartId, CartItemId, GuestId, GuestToken, ProductId, UserId, VariantId};

// =============================================================================
// Identity and ownership
// =============================================================================

/// Who is making a cart request, as resolved from the session and cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// A signed-in user.
    User(UserId),
    /// An anonymous shopper holding a guest session cookie.
    Guest(GuestToken),
    /// Neither a user session nor a guest cookie is present.
    Anonymous,
}

impl Identity {
    /// Whether no identity could be established.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

/// The single owner of a cart.
///
/// A cart row carries exactly one of `user_id` or `guest_id`; this enum makes
/// the other two combinations unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    User(UserId),
    Guest(GuestId),
}

impl CartOwner {
    /// Build an owner from the two nullable owner columns.
    ///
    /// Returns `None` when both or neither are set.
    #[must_use]
    pub const fn from_columns(user_id: Option<UserId>, guest_id: Option<GuestId>) -> Option<Self> {
        match (user_id, guest_id) {
            (Some(user), None) => Some(Self::User(user)),
            (None, Some(guest)) => Some(Self::Guest(guest)),
            _ => None,
        }
    }

    #[must_use]
    pub const fn user_id(self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(id),
            Self::Guest(_) => None,
        }
    }

    #[must_use]
    pub const fn guest_id(self) -> Option<GuestId> {
        match self {
            Self::Guest(id) => Some(id),
            Self::User(_) => None,
        }
    }
}

/// A cart header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub owner: CartOwner,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Whether `owner` may read or change this cart.
    #[must_use]
    pub fn is_owned_by(&self, owner: CartOwner) -> bool {
        self.owner == owner
    }
}

// =============================================================================
// Quantities and stock
// =============================================================================

/// Rejected quantity: negative, zero where a positive value is needed, or
/// not a whole number.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("quantity must be a whole number of at least {min}")]
pub struct InvalidQuantity {
    pub min: u32,
}

/// The requested line total exceeds what the variant has in stock.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("only {available} left in stock, {requested} requested")]
pub struct InsufficientStock {
    pub available: u32,
    pub requested: u32,
}

/// What an update request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityUpdate {
    /// Quantity 0: drop the line.
    Remove,
    /// Set the line to this many units.
    Set(u32),
}

/// Quantity for an add request; must be at least 1.
///
/// # Errors
///
/// Returns [`InvalidQuantity`] for zero, negative or out-of-range values.
pub fn add_quantity(raw: i64) -> Result<u32, InvalidQuantity> {
    u32::try_from(raw)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or(InvalidQuantity { min: 1 })
}

/// Classify an update request's quantity.
///
/// # Errors
///
/// Returns [`InvalidQuantity`] for negative or out-of-range values.
pub fn update_quantity(raw: i64) -> Result<QuantityUpdate, InvalidQuantity> {
    match u32::try_from(raw) {
        Ok(0) => Ok(QuantityUpdate::Remove),
        Ok(quantity) => Ok(QuantityUpdate::Set(quantity)),
        Err(_) => Err(InvalidQuantity { min: 0 }),
    }
}

/// Check that `existing + additional` units fit in `in_stock`.
///
/// `existing` is what the cart already holds for the variant, so repeated
/// adds are bounded by the line total and not just the delta. Returns the
/// new line total.
///
/// # Errors
///
/// Returns [`InsufficientStock`] when the total would exceed the stock.
pub fn ensure_stock(in_stock: u32, existing: u32, additional: u32) -> Result<u32, InsufficientStock> {
    let requested = existing.saturating_add(additional);
    if requested > in_stock {
        return Err(InsufficientStock {
            available: in_stock,
            requested,
        });
    }
    Ok(requested)
}

/// Stock as stored (`INTEGER`), floored at zero.
#[must_use]
pub fn stock_level(in_stock: i32) -> u32 {
    u32::try_from(in_stock).unwrap_or(0)
}

// =============================================================================
// Read model
// =============================================================================

/// A cart line joined with its variant and product, prices read fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub item_id: CartItemId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub quantity: u32,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub in_stock: u32,
    pub image_url: Option<String>,
}

impl CartLine {
    /// Sale price when there is one, otherwise the list price.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        self.sale_price.unwrap_or(self.price)
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.effective_price() * Decimal::from(self.quantity)
    }
}

/// One line as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub id: CartItemId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub quantity: u32,
    pub price: Decimal,
    pub original_price: Decimal,
    pub sale_price: Option<Decimal>,
    pub in_stock: u32,
    pub image_url: Option<String>,
    pub subtotal: Decimal,
}

impl From<CartLine> for CartItemView {
    fn from(line: CartLine) -> Self {
        Self {
            price: line.effective_price(),
            subtotal: line.subtotal(),
            id: line.item_id,
            variant_id: line.variant_id,
            product_id: line.product_id,
            name: line.product_name,
            sku: line.sku,
            quantity: line.quantity,
            original_price: line.price,
            sale_price: line.sale_price,
            in_stock: line.in_stock,
            image_url: line.image_url,
        }
    }
}

/// Cart contents with totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub items: Vec<CartItemView>,
    pub total: Decimal,
    pub item_count: u32,
}

impl CartSummary {
    /// Price every line and add up the totals.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let total = lines.iter().map(CartLine::subtotal).sum();
        let item_count = lines
            .iter()
            .fold(0_u32, |count, line| count.saturating_add(line.quantity));
        Self {
            items: lines.into_iter().map(CartItemView::from).collect(),
            total,
            item_count,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Guest to user merge
// =============================================================================

/// A line considered during a merge, with its variant's current stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockedLine {
    pub item_id: CartItemId,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub in_stock: u32,
}

/// A write the store must apply to the user cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// Raise an existing user line to `quantity`.
    Increase { item_id: CartItemId, quantity: u32 },
    /// Add a line for a variant the user cart doesn't hold yet.
    Insert { variant_id: VariantId, quantity: u32 },
}

/// A guest line that didn't fully fit in stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeAdjustment {
    pub variant_id: VariantId,
    /// Combined quantity of the guest and user lines.
    pub requested: u32,
    /// Quantity the user line ends up with; 0 means the line was dropped.
    pub kept: u32,
}

/// Result of planning a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    pub actions: Vec<MergeAction>,
    pub adjustments: Vec<MergeAdjustment>,
}

impl MergePlan {
    /// Report describing this plan once applied.
    #[must_use]
    pub fn report(&self) -> MergeReport {
        MergeReport {
            merged_lines: self.actions.len(),
            adjustments: self.adjustments.clone(),
        }
    }
}

/// Summary of an applied merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// Guest lines that changed the user cart.
    pub merged_lines: usize,
    pub adjustments: Vec<MergeAdjustment>,
}

/// Work out how a guest cart folds into a user cart.
///
/// Quantities for the same variant are summed and the sum is capped at the
/// variant's current stock. A line the user already had is never lowered by
/// the merge. Guest lines for variants with no stock are dropped.
#[must_use]
pub fn plan_merge(guest_lines: &[StockedLine], user_lines: &[StockedLine]) -> MergePlan {
    let mut plan = MergePlan::default();

    for guest in guest_lines {
        let existing = user_lines.iter().find(|u| u.variant_id == guest.variant_id);
        let held = existing.map_or(0, |u| u.quantity);
        let requested = held.saturating_add(guest.quantity);
        let kept = requested.min(guest.in_stock).max(held);

        if kept < requested {
            plan.adjustments.push(MergeAdjustment {
                variant_id: guest.variant_id,
                requested,
                kept,
            });
        }

        match existing {
            Some(user) if kept > user.quantity => plan.actions.push(MergeAction::Increase {
                item_id: user.item_id,
                quantity: kept,
            }),
            None if kept > 0 => plan.actions.push(MergeAction::Insert {
                variant_id: guest.variant_id,
                quantity: kept,
            }),
            _ => {}
        }
    }

    plan
}
