//! JSON API tests against a running storefront.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database with at least one product in stock
//! - The storefront running (`cargo run -p stride-storefront`)
//!
//! Run with: cargo test -p stride-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

use stride_integration_tests::{cookie_client, storefront_base_url};

/// Variant to put in carts; defaults to the first seeded variant.
fn test_variant_id() -> i64 {
    std::env::var("STRIDE_TEST_VARIANT_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1)
}

#[tokio::test]
#[ignore = "Requires running storefront and PostgreSQL"]
async fn test_health() {
    let base_url = storefront_base_url();
    let client = cookie_client();

    let resp = client.get(format!("{base_url}/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{base_url}/health/ready"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront and PostgreSQL"]
async fn test_listing_normalizes_query() {
    let base_url = storefront_base_url();
    let resp = cookie_client()
        .get(format!("{base_url}/products?page=-5&limit=999&size=8,8,9"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["criteria"]["page"], 1);
    assert_eq!(body["criteria"]["limit"], 60);
    assert_eq!(body["activeFilterCount"], 2);
}

#[tokio::test]
#[ignore = "Requires running storefront and PostgreSQL"]
async fn test_anonymous_add_starts_guest_session() {
    let base_url = storefront_base_url();
    let client = cookie_client();
    let variant_id = test_variant_id();

    let resp = client
        .post(format!("{base_url}/cart/add"))
        .json(&json!({ "variantId": variant_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()
            .get_all("set-cookie")
            .iter()
            .any(|v| v.to_str().unwrap_or_default().starts_with("guest_session="))
    );

    let count: Value = client
        .get(format!("{base_url}/cart/count"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(count["itemCount"], 1);
}

#[tokio::test]
#[ignore = "Requires running storefront and PostgreSQL"]
async fn test_rejected_anonymous_add_sets_no_cookie() {
    let base_url = storefront_base_url();
    let client = cookie_client();

    let resp = client
        .post(format!("{base_url}/cart/add"))
        .json(&json!({ "variantId": i32::MAX }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(resp.headers().get("set-cookie").is_none());

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "NotFound");
}

#[tokio::test]
#[ignore = "Requires running storefront and PostgreSQL"]
async fn test_product_detail_lists_variants() {
    let base_url = storefront_base_url();
    let client = cookie_client();

    let listing: Value = client
        .get(format!("{base_url}/products"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let product_id = listing["products"][0]["id"].as_i64().unwrap();

    let resp = client
        .get(format!("{base_url}/products/{product_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let product: Value = resp.json().await.unwrap();
    assert_eq!(product["id"], product_id);
    assert!(product["variants"][0]["id"].is_i64());

    let resp = client
        .get(format!("{base_url}/products/{}", i32::MAX))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "NotFound");
}

#[tokio::test]
#[ignore = "Requires running storefront and PostgreSQL"]
async fn test_fractional_quantity_rejected() {
    let base_url = storefront_base_url();
    let resp = cookie_client()
        .post(format!("{base_url}/cart/add"))
        .json(&json!({ "variantId": test_variant_id(), "quantity": 1.5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "InvalidQuantity");
}

#[tokio::test]
#[ignore = "Requires running storefront and PostgreSQL"]
async fn test_register_merges_guest_cart() {
    let base_url = storefront_base_url();
    let client = cookie_client();
    let variant_id = test_variant_id();

    client
        .post(format!("{base_url}/cart/add"))
        .json(&json!({ "variantId": variant_id, "quantity": 1 }))
        .send()
        .await
        .unwrap();

    let email = format!("shopper-{}@example.com", Uuid::new_v4());
    let resp = client
        .post(format!("{base_url}/auth/register"))
        .json(&json!({ "email": email, "password": "correct horse battery", "name": "Test Shopper" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["merge"]["mergedLines"], 1);

    let cart: Value = client
        .get(format!("{base_url}/cart"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["itemCount"], 1);
}

#[tokio::test]
#[ignore = "Requires running storefront and PostgreSQL"]
async fn test_checkout_empty_cart_rejected() {
    let base_url = storefront_base_url();
    let resp = cookie_client()
        .post(format!("{base_url}/checkout"))
        .json(&json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "address": "1 Analytical St",
            "city": "London",
            "state": "LDN",
            "postalCode": "N1 9GU",
            "cardNumber": "4532 0151 1283 0366",
            "expiryDate": "12/99",
            "cvv": "123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
