//! Integration tests for Stride.
//!
//! # Running Tests
//!
//! ```bash
//! # Engine tests run against the in-memory cart store
//! cargo test -p stride-integration-tests
//!
//! # HTTP tests need a migrated database and a running storefront
//! stride migrate
//! cargo run -p stride-storefront &
//! cargo test -p stride-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_engine` - Cart rules through `CartService` and `MemoryCartStore`
//! - `cart_repository` - The same rules against `PostgreSQL` (ignored by default)
//! - `listing_filters` - Query string to criteria to badges and back
//! - `storefront_api` - JSON API over HTTP (ignored by default)

use chrono::Duration;
use rust_decimal::Decimal;

use stride_core::VariantId;
use stride_core::cart::{CartOwner, Identity};
use stride_storefront::db::memory::{MemoryCartStore, NewVariant};
use stride_storefront::services::CartService;

/// Base URL for the storefront API (configurable via environment).
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// HTTP client that keeps cookies between requests, like a browser tab.
///
/// # Panics
///
/// Panics if the client can't be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn cookie_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Guest session lifetime used by the tests.
#[must_use]
pub fn guest_ttl() -> Duration {
    Duration::days(7)
}

/// Seed a variant with a whole-unit price.
pub async fn seed_variant(store: &MemoryCartStore, name: &str, price: i64, in_stock: u32) -> VariantId {
    store
        .add_variant(NewVariant::new(name, Decimal::from(price), in_stock))
        .await
}

/// Start a guest session and return its identity and owner.
///
/// # Panics
///
/// Panics if the in-memory store rejects the guest.
#[allow(clippy::expect_used)]
pub async fn new_guest(service: &CartService<'_, MemoryCartStore>) -> (Identity, CartOwner) {
    let (token, owner) = service
        .create_guest_session(guest_ttl())
        .await
        .expect("guest session");
    (Identity::Guest(token), owner)
}
