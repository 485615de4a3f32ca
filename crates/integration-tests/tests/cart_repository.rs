//! Cart rules against the `PostgreSQL` cart repository.
//!
//! These tests require a migrated database reachable through
//! `STRIDE_TEST_DATABASE_URL` (or `DATABASE_URL`). Each test seeds its own
//! products, guests and users.
//!
//! Run with: cargo test -p stride-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use stride_core::cart::{CartOwner, Identity};
use stride_core::{GuestId, UserId, VariantId};
use stride_storefront::db::{CartRepository, create_pool};
use stride_storefront::services::CartService;
use stride_storefront::services::cart::{CartError, CartStore};

use stride_integration_tests::guest_ttl;

async fn pool() -> PgPool {
    let url = std::env::var("STRIDE_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .unwrap_or_else(|_| "postgres://localhost/stride".to_string());
    create_pool(&SecretString::from(url)).await.unwrap()
}

/// Insert an unpublished product with one variant.
async fn insert_variant(pool: &PgPool, in_stock: i32) -> VariantId {
    let (product_id,): (i32,) = sqlx::query_as(
        "INSERT INTO storefront.products (name, is_published) VALUES ($1, FALSE) RETURNING id",
    )
    .bind("Repository Test Trainer")
    .fetch_one(pool)
    .await
    .unwrap();

    let (variant_id,): (i32,) = sqlx::query_as(
        r"
        INSERT INTO storefront.product_variants (product_id, sku, price, in_stock)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        ",
    )
    .bind(product_id)
    .bind(format!("TEST-{}", Uuid::new_v4()))
    .bind(Decimal::from(100))
    .bind(in_stock)
    .fetch_one(pool)
    .await
    .unwrap();

    VariantId::new(variant_id)
}

async fn insert_user(pool: &PgPool) -> UserId {
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO storefront.user (email, name) VALUES ($1, $2) RETURNING id",
    )
    .bind(format!("repo-{}@example.com", Uuid::new_v4()))
    .bind("Repository Tester")
    .fetch_one(pool)
    .await
    .unwrap();
    UserId::new(id)
}

async fn guest_exists(pool: &PgPool, guest_id: GuestId) -> bool {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM storefront.guests WHERE id = $1)")
            .bind(guest_id)
            .fetch_one(pool)
            .await
            .unwrap();
    exists
}

async fn guest_cart_exists(pool: &PgPool, guest_id: GuestId) -> bool {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM storefront.carts WHERE guest_id = $1)")
            .bind(guest_id)
            .fetch_one(pool)
            .await
            .unwrap();
    exists
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_concurrent_adds_never_overdraw_stock() {
    let pool = pool().await;
    let variant = insert_variant(&pool, 3).await;
    let store = CartRepository::new(&pool);
    let service = CartService::new(&store);

    let (token, _) = service.create_guest_session(guest_ttl()).await.unwrap();
    let shopper = Identity::Guest(token);

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
#[ignore = "Requires running PostgreSQL"]
async fn test_rejected_add_creates_no_cart() {
    let pool = pool().await;
    let variant = insert_variant(&pool, 1).await;
    let store = CartRepository::new(&pool);
    let service = CartService::new(&store);

    let (token, guest_owner) = service.create_guest_session(guest_ttl()).await.unwrap();
    let CartOwner::Guest(guest_id) = guest_owner else {
        panic!("guest session should own a guest cart");
    };
    let shopper = Identity::Guest(token);

    let err = service
        .add_item(&shopper, VariantId::new(i32::MAX), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::VariantNotFound));
    let err = service.add_item(&shopper, variant, 2).await.unwrap_err();
    assert!(matches!(err, CartError::InsufficientStock(_)));

    assert!(guest_exists(&pool, guest_id).await);
    assert!(!guest_cart_exists(&pool, guest_id).await);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_deleting_guest_drops_its_cart() {
    let pool = pool().await;
    let variant = insert_variant(&pool, 5).await;
    let store = CartRepository::new(&pool);
    let service = CartService::new(&store);

    let (token, guest_owner) = service.create_guest_session(guest_ttl()).await.unwrap();
    let CartOwner::Guest(guest_id) = guest_owner else {
        panic!("guest session should own a guest cart");
    };
    service
        .add_item(&Identity::Guest(token), variant, 1)
        .await
        .unwrap();
    assert!(guest_cart_exists(&pool, guest_id).await);

    assert!(store.delete_guest(guest_id).await.unwrap());
    assert!(!guest_exists(&pool, guest_id).await);
    assert!(!guest_cart_exists(&pool, guest_id).await);
    assert!(!store.delete_guest(guest_id).await.unwrap());
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_merge_sums_lines_and_drops_guest() {
    let pool = pool().await;
    let shoe = insert_variant(&pool, 10).await;
    let sock = insert_variant(&pool, 10).await;
    let user_id = insert_user(&pool).await;
    let store = CartRepository::new(&pool);
    let service = CartService::new(&store);

    let (token, guest_owner) = service.create_guest_session(guest_ttl()).await.unwrap();
    let CartOwner::Guest(guest_id) = guest_owner else {
        panic!("guest session should own a guest cart");
    };
    let guest = Identity::Guest(token.clone());
    let user = Identity::User(user_id);

    service.add_item(&guest, shoe, 2).await.unwrap();
    service.add_item(&guest, sock, 1).await.unwrap();
    service.add_item(&user, shoe, 3).await.unwrap();

    let report = service
        .merge_guest_into_user(Some(&token), user_id)
        .await
        .unwrap();
    assert_eq!(report.merged_lines, 2);
    assert!(report.adjustments.is_empty());

    let summary = service.get_cart(&user).await.unwrap();
    assert_eq!(summary.item_count, 6);
    let shoe_line = summary.items.iter().find(|i| i.variant_id == shoe).unwrap();
    assert_eq!(shoe_line.quantity, 5);

    assert!(!guest_exists(&pool, guest_id).await);
    assert!(!guest_cart_exists(&pool, guest_id).await);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_merge_clamps_to_stock_in_database() {
    let pool = pool().await;
    let variant = insert_variant(&pool, 4).await;
    let user_id = insert_user(&pool).await;
    let store = CartRepository::new(&pool);
    let service = CartService::new(&store);

    let (token, _) = service.create_guest_session(guest_ttl()).await.unwrap();
    let guest = Identity::Guest(token.clone());
    let user = Identity::User(user_id);

    service.add_item(&guest, variant, 3).await.unwrap();
    service.add_item(&user, variant, 3).await.unwrap();

    let report = service
        .merge_guest_into_user(Some(&token), user_id)
        .await
        .unwrap();
    assert_eq!(report.adjustments.len(), 1);
    assert_eq!(service.item_count(&user).await.unwrap(), 4);
}
