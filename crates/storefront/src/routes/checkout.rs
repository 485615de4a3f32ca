//! Simulated checkout.
//!
//! Validates the form, prices the cart and empties it. No payment is taken.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use stride_core::checkout::{CheckoutForm, OrderTotals};

use crate::db::CartRepository;
use crate::error::{AppError, Result};
use crate::middleware::ShopperIdentity;
use crate::services::cart::CartService;
use crate::state::AppState;

/// Successful checkout.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub message: &'static str,
    pub order: OrderTotals,
}

/// Place an order for the current cart.
#[instrument(skip(state, identity, form))]
pub async fn submit(
    State(state): State<AppState>,
    ShopperIdentity(identity): ShopperIdentity,
    Json(form): Json<CheckoutForm>,
) -> Result<Json<CheckoutResponse>> {
    form.validate()?;

    let store = CartRepository::new(state.pool());
    let service = CartService::new(&store);

    let cart = service.get_cart(&identity).await?;
    if cart.is_empty() {
        return Err(AppError::BadRequest("Your cart is empty".to_owned()));
    }

    let order = OrderTotals::new(cart.total, cart.item_count);
    service.clear_cart(&identity).await?;

    tracing::info!(
        total = %order.total,
        item_count = order.item_count,
        "Checkout completed"
    );
    Ok(Json(CheckoutResponse {
        success: true,
        message: "Order placed successfully",
        order,
    }))
}
