//! Cart route handlers.
//!
//! JSON endpoints over [`CartService`]. Mutations answer
//! `{"success": true, "message", "cart"}`; failures go through
//! [`AppError`] and carry the error kind.

use axum::{
    Json,
    extract::State,
    http::header,
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use tracing::instrument;

use stride_core::cart::{CartSummary, InvalidQuantity};
use stride_core::{CartItemId, VariantId};

use crate::db::CartRepository;
use crate::error::Result;
use crate::middleware::{ShopperIdentity, guest_cookie};
use crate::services::cart::{CartError, CartService};
use crate::state::AppState;

/// Add to cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub variant_id: VariantId,
    pub quantity: Option<Number>,
}

/// Update cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    pub cart_item_id: CartItemId,
    pub quantity: Number,
}

/// Remove from cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartRequest {
    pub cart_item_id: CartItemId,
}

/// Successful cart mutation.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub success: bool,
    pub message: &'static str,
    pub cart: CartSummary,
}

impl CartResponse {
    const fn ok(message: &'static str, cart: CartSummary) -> Self {
        Self {
            success: true,
            message,
            cart,
        }
    }
}

/// Cart count badge.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartCountResponse {
    pub item_count: u32,
}

/// Read a JSON number as a whole quantity; fractions are rejected.
fn whole_quantity(value: &Number, min: u32) -> std::result::Result<i64, CartError> {
    value
        .as_i64()
        .ok_or(CartError::InvalidQuantity(InvalidQuantity { min }))
}

/// Show the cart with fresh prices.
#[instrument(skip(state, identity))]
pub async fn show(
    State(state): State<AppState>,
    ShopperIdentity(identity): ShopperIdentity,
) -> Result<Json<CartSummary>> {
    let store = CartRepository::new(state.pool());
    let summary = CartService::new(&store).get_cart(&identity).await?;
    Ok(Json(summary))
}

/// Number of units in the cart.
#[instrument(skip(state, identity))]
pub async fn count(
    State(state): State<AppState>,
    ShopperIdentity(identity): ShopperIdentity,
) -> Result<Json<CartCountResponse>> {
    let store = CartRepository::new(state.pool());
    let item_count = CartService::new(&store).item_count(&identity).await?;
    Ok(Json(CartCountResponse { item_count }))
}

/// Add a variant to the cart.
///
/// Anonymous shoppers get a guest session here; its cookie is set only
/// when the add succeeds.
#[instrument(skip(state, identity), fields(variant_id = %body.variant_id))]
pub async fn add(
    State(state): State<AppState>,
    ShopperIdentity(identity): ShopperIdentity,
    Json(body): Json<AddToCartRequest>,
) -> Result<Response> {
    let quantity = match &body.quantity {
        Some(value) => whole_quantity(value, 1)?,
        None => 1,
    };

    let config = state.config();
    let store = CartRepository::new(state.pool());
    let (summary, issued_token) = CartService::new(&store)
        .add_item_for_shopper(
            &identity,
            body.variant_id,
            quantity,
            config.guest_session_ttl(),
        )
        .await?;

    let cookie = issued_token.map(|token| {
        let cookie = guest_cookie(&token, config.guest_session_days, config.secure_cookies());
        (header::SET_COOKIE, cookie.to_string())
    });

    Ok((
        AppendHeaders(cookie),
        Json(CartResponse::ok("Item added to cart", summary)),
    )
        .into_response())
}

/// Change a line's quantity; 0 removes it.
#[instrument(skip(state, identity), fields(item_id = %body.cart_item_id))]
pub async fn update(
    State(state): State<AppState>,
    ShopperIdentity(identity): ShopperIdentity,
    Json(body): Json<UpdateCartRequest>,
) -> Result<Json<CartResponse>> {
    let quantity = whole_quantity(&body.quantity, 0)?;

    let store = CartRepository::new(state.pool());
    let summary = CartService::new(&store)
        .update_item(&identity, body.cart_item_id, quantity)
        .await?;

    let message = if quantity == 0 {
        "Item removed from cart"
    } else {
        "Cart updated"
    };
    Ok(Json(CartResponse::ok(message, summary)))
}

/// Remove a line from the cart.
#[instrument(skip(state, identity), fields(item_id = %body.cart_item_id))]
pub async fn remove(
    State(state): State<AppState>,
    ShopperIdentity(identity): ShopperIdentity,
    Json(body): Json<RemoveFromCartRequest>,
) -> Result<Json<CartResponse>> {
    let store = CartRepository::new(state.pool());
    let summary = CartService::new(&store)
        .remove_item(&identity, body.cart_item_id)
        .await?;
    Ok(Json(CartResponse::ok("Item removed from cart", summary)))
}

/// Empty the cart.
#[instrument(skip(state, identity))]
pub async fn clear(
    State(state): State<AppState>,
    ShopperIdentity(identity): ShopperIdentity,
) -> Result<Json<CartResponse>> {
    let store = CartRepository::new(state.pool());
    let summary = CartService::new(&store).clear_cart(&identity).await?;
    Ok(Json(CartResponse::ok("Cart cleared", summary)))
}
