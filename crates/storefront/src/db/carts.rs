//! Cart repository backed by `PostgreSQL`.
//!
//! Every mutation runs in one transaction. Stock checks lock the variant
//! row (`FOR UPDATE`) before the line is written, so two requests adding
//! the same variant are serialized on the variant and can't overdraw it.
//! Locks are always taken variant first, then cart line.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor, PgPool};

use stride_core::cart::{
    self, Cart, CartLine, CartOwner, InvalidQuantity, MergeAction, MergeReport, StockedLine,
};
use stride_core::{CartId, CartItemId, GuestId, GuestToken, ProductId, UserId, VariantId};

use super::guests::{self, GuestRepository};
use super::RepositoryError;
use crate::services::cart::{CartError, CartStore};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: Option<UserId>,
    guest_id: Option<GuestId>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for Cart {
    type Error = RepositoryError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        let owner = CartOwner::from_columns(row.user_id, row.guest_id).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("cart {} has no single owner", row.id))
        })?;

        Ok(Self {
            id: row.id,
            owner,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    item_id: CartItemId,
    variant_id: VariantId,
    product_id: ProductId,
    product_name: String,
    sku: String,
    quantity: i32,
    price: Decimal,
    sale_price: Option<Decimal>,
    in_stock: i32,
    image_url: Option<String>,
}

impl TryFrom<LineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let quantity = line_quantity(row.item_id, row.quantity)?;

        Ok(Self {
            item_id: row.item_id,
            variant_id: row.variant_id,
            product_id: row.product_id,
            product_name: row.product_name,
            sku: row.sku,
            quantity,
            price: row.price,
            sale_price: row.sale_price,
            in_stock: cart::stock_level(row.in_stock),
            image_url: row.image_url,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockedLineRow {
    item_id: CartItemId,
    variant_id: VariantId,
    quantity: i32,
    in_stock: i32,
}

impl TryFrom<StockedLineRow> for StockedLine {
    type Error = RepositoryError;

    fn try_from(row: StockedLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            item_id: row.item_id,
            variant_id: row.variant_id,
            quantity: line_quantity(row.item_id, row.quantity)?,
            in_stock: cart::stock_level(row.in_stock),
        })
    }
}

/// Ownership of a cart line, read before it is changed.
#[derive(Debug, sqlx::FromRow)]
struct ItemOwnerRow {
    cart_id: CartId,
    variant_id: VariantId,
    user_id: Option<UserId>,
    guest_id: Option<GuestId>,
}

fn line_quantity(item_id: CartItemId, quantity: i32) -> Result<u32, RepositoryError> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "cart item {item_id} has quantity {quantity}"
            ))
        })
}

fn db_quantity(quantity: u32) -> Result<i32, CartError> {
    i32::try_from(quantity).map_err(|_| CartError::InvalidQuantity(InvalidQuantity { min: 1 }))
}

// =============================================================================
// Queries
// =============================================================================

const SELECT_CART_BY_USER: &str = r"
    SELECT id, user_id, guest_id, updated_at
    FROM storefront.carts
    WHERE user_id = $1
";

const SELECT_CART_BY_GUEST: &str = r"
    SELECT id, user_id, guest_id, updated_at
    FROM storefront.carts
    WHERE guest_id = $1
";

/// Image: the variant's own first, then the product's.
const SELECT_CART_LINES: &str = r"
    SELECT
        ci.id AS item_id,
        ci.product_variant_id AS variant_id,
        v.product_id,
        p.name AS product_name,
        v.sku,
        ci.quantity,
        v.price,
        v.sale_price,
        v.in_stock,
        COALESCE(
            (SELECT i.url FROM storefront.product_images i
             WHERE i.variant_id = v.id
             ORDER BY i.is_primary DESC, i.sort_order, i.id
             LIMIT 1),
            (SELECT i.url FROM storefront.product_images i
             WHERE i.product_id = p.id
             ORDER BY i.is_primary DESC, i.sort_order, i.id
             LIMIT 1)
        ) AS image_url
    FROM storefront.cart_items ci
    JOIN storefront.product_variants v ON v.id = ci.product_variant_id
    JOIN storefront.products p ON p.id = v.product_id
    WHERE ci.cart_id = $1
    ORDER BY ci.created_at, ci.id
";

const SELECT_STOCKED_LINES: &str = r"
    SELECT
        ci.id AS item_id,
        ci.product_variant_id AS variant_id,
        ci.quantity,
        v.in_stock
    FROM storefront.cart_items ci
    JOIN storefront.product_variants v ON v.id = ci.product_variant_id
    WHERE ci.cart_id = $1
    ORDER BY v.id
    FOR UPDATE OF v
";

const UPSERT_LINE: &str = r"
    INSERT INTO storefront.cart_items (cart_id, product_variant_id, quantity)
    VALUES ($1, $2, $3)
    ON CONFLICT (cart_id, product_variant_id)
    DO UPDATE SET quantity = EXCLUDED.quantity
";

async fn select_cart<'e>(
    executor: impl PgExecutor<'e>,
    owner: CartOwner,
) -> Result<Option<Cart>, RepositoryError> {
    let (sql, id) = match owner {
        CartOwner::User(id) => (SELECT_CART_BY_USER, id.as_i32()),
        CartOwner::Guest(id) => (SELECT_CART_BY_GUEST, id.as_i32()),
    };

    let row = sqlx::query_as::<_, CartRow>(sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    row.map(TryInto::try_into).transpose()
}

async fn insert_cart(conn: &mut PgConnection, owner: CartOwner) -> Result<Cart, RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO storefront.carts (user_id, guest_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(owner.user_id())
    .bind(owner.guest_id())
    .execute(&mut *conn)
    .await?;

    select_cart(&mut *conn, owner)
        .await?
        .ok_or(RepositoryError::NotFound)
}

/// Lock a variant row and return its stock level.
async fn lock_variant_stock(
    conn: &mut PgConnection,
    variant_id: VariantId,
) -> Result<u32, CartError> {
    let in_stock: Option<i32> = sqlx::query_scalar(
        "SELECT in_stock FROM storefront.product_variants WHERE id = $1 FOR UPDATE",
    )
    .bind(variant_id)
    .fetch_optional(&mut *conn)
    .await?;

    in_stock
        .map(cart::stock_level)
        .ok_or(CartError::VariantNotFound)
}

/// Fetch a line's cart and variant after checking `owner` holds it.
async fn owned_item(
    conn: &mut PgConnection,
    owner: CartOwner,
    item_id: CartItemId,
) -> Result<ItemOwnerRow, CartError> {
    let row = sqlx::query_as::<_, ItemOwnerRow>(
        r"
        SELECT ci.cart_id, ci.product_variant_id AS variant_id, c.user_id, c.guest_id
        FROM storefront.cart_items ci
        JOIN storefront.carts c ON c.id = ci.cart_id
        WHERE ci.id = $1
        ",
    )
    .bind(item_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(CartError::ItemNotFound)?;

    if CartOwner::from_columns(row.user_id, row.guest_id) != Some(owner) {
        return Err(CartError::Unauthorized);
    }
    Ok(row)
}

async fn touch_cart(conn: &mut PgConnection, cart_id: CartId) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE storefront.carts SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn stocked_lines(
    conn: &mut PgConnection,
    cart_id: CartId,
) -> Result<Vec<StockedLine>, RepositoryError> {
    let rows = sqlx::query_as::<_, StockedLineRow>(SELECT_STOCKED_LINES)
        .bind(cart_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

// =============================================================================
// Repository
// =============================================================================

/// `PostgreSQL` implementation of [`CartStore`].
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

impl CartStore for CartRepository<'_> {
    async fn find_guest(&self, token: &GuestToken) -> Result<Option<GuestId>, CartError> {
        let repo = GuestRepository::new(self.pool);
        let Some(guest) = repo.find_by_token(token).await? else {
            return Ok(None);
        };
        if guest.is_expired(Utc::now()) {
            repo.delete(guest.id).await?;
            tracing::debug!(guest_id = %guest.id, "Deleted expired guest session");
            return Ok(None);
        }
        Ok(Some(guest.id))
    }

    async fn create_guest(
        &self,
        token: &GuestToken,
        expires_at: DateTime<Utc>,
    ) -> Result<GuestId, CartError> {
        let guest = GuestRepository::new(self.pool)
            .create(token, expires_at)
            .await?;
        Ok(guest.id)
    }

    async fn delete_guest(&self, guest_id: GuestId) -> Result<bool, CartError> {
        Ok(GuestRepository::new(self.pool).delete(guest_id).await?)
    }

    async fn delete_expired_guests(&self, now: DateTime<Utc>) -> Result<u64, CartError> {
        Ok(GuestRepository::new(self.pool)
            .delete_expired(now)
            .await?)
    }

    async fn find_cart(&self, owner: CartOwner) -> Result<Option<Cart>, CartError> {
        Ok(select_cart(self.pool, owner).await?)
    }

    async fn get_or_create_cart(&self, owner: CartOwner) -> Result<Cart, CartError> {
        if let Some(cart) = select_cart(self.pool, owner).await? {
            return Ok(cart);
        }
        let mut conn = self.pool.acquire().await?;
        Ok(insert_cart(&mut conn, owner).await?)
    }

    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, CartError> {
        let rows = sqlx::query_as::<_, LineRow>(SELECT_CART_LINES)
            .bind(cart_id)
            .fetch_all(self.pool)
            .await?;

        let lines = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<CartLine>, RepositoryError>>()?;
        Ok(lines)
    }

    #[tracing::instrument(skip(self))]
    async fn add_item(
        &self,
        owner: CartOwner,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<(CartId, u32), CartError> {
        let mut tx = self.pool.begin().await?;

        let in_stock = lock_variant_stock(&mut tx, variant_id).await?;
        let cart = select_cart(&mut *tx, owner).await?;

        let existing: Option<i32> = match &cart {
            Some(cart) => {
                sqlx::query_scalar(
                    r"
                    SELECT quantity FROM storefront.cart_items
                    WHERE cart_id = $1 AND product_variant_id = $2
                    ",
                )
                .bind(cart.id)
                .bind(variant_id)
                .fetch_optional(&mut *tx)
                .await?
            }
            None => None,
        };

        let existing = existing.map_or(0, cart::stock_level);
        let total = cart::ensure_stock(in_stock, existing, quantity)?;

        let cart_id = match cart {
            Some(cart) => cart.id,
            None => insert_cart(&mut tx, owner).await?.id,
        };

        sqlx::query(UPSERT_LINE)
            .bind(cart_id)
            .bind(variant_id)
            .bind(db_quantity(total)?)
            .execute(&mut *tx)
            .await?;
        touch_cart(&mut tx, cart_id).await?;

        tx.commit().await?;
        Ok((cart_id, total))
    }

    #[tracing::instrument(skip(self))]
    async fn set_item_quantity(
        &self,
        owner: CartOwner,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<(), CartError> {
        let mut tx = self.pool.begin().await?;

        let item = owned_item(&mut tx, owner, item_id).await?;
        let in_stock = lock_variant_stock(&mut tx, item.variant_id).await?;
        cart::ensure_stock(in_stock, 0, quantity)?;

        let updated = sqlx::query("UPDATE storefront.cart_items SET quantity = $2 WHERE id = $1")
            .bind(item_id)
            .bind(db_quantity(quantity)?)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(CartError::ItemNotFound);
        }
        touch_cart(&mut tx, item.cart_id).await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn remove_item(&self, owner: CartOwner, item_id: CartItemId) -> Result<(), CartError> {
        let mut tx = self.pool.begin().await?;

        let item = owned_item(&mut tx, owner, item_id).await?;
        let deleted = sqlx::query("DELETE FROM storefront.cart_items WHERE id = $1")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(CartError::ItemNotFound);
        }
        touch_cart(&mut tx, item.cart_id).await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn clear_cart(&self, cart_id: CartId) -> Result<u64, CartError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM storefront.cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted > 0 {
            touch_cart(&mut tx, cart_id).await?;
        }

        tx.commit().await?;
        Ok(deleted)
    }

    #[tracing::instrument(skip(self))]
    async fn merge_guest_cart(
        &self,
        guest_id: GuestId,
        user_id: UserId,
    ) -> Result<MergeReport, CartError> {
        let mut tx = self.pool.begin().await?;

        let guest_cart: Option<CartId> =
            sqlx::query_scalar("SELECT id FROM storefront.carts WHERE guest_id = $1 FOR UPDATE")
                .bind(guest_id)
                .fetch_optional(&mut *tx)
                .await?;

        let report = match guest_cart {
            Some(guest_cart) => {
                let user_cart = insert_cart(&mut tx, CartOwner::User(user_id)).await?;
                let guest_lines = stocked_lines(&mut tx, guest_cart).await?;
                let user_lines = stocked_lines(&mut tx, user_cart.id).await?;
                let plan = cart::plan_merge(&guest_lines, &user_lines);

                for action in &plan.actions {
                    match *action {
                        MergeAction::Increase { item_id, quantity } => {
                            sqlx::query(
                                "UPDATE storefront.cart_items SET quantity = $2 WHERE id = $1",
                            )
                            .bind(item_id)
                            .bind(db_quantity(quantity)?)
                            .execute(&mut *tx)
                            .await?;
                        }
                        MergeAction::Insert {
                            variant_id,
                            quantity,
                        } => {
                            sqlx::query(UPSERT_LINE)
                                .bind(user_cart.id)
                                .bind(variant_id)
                                .bind(db_quantity(quantity)?)
                                .execute(&mut *tx)
                                .await?;
                        }
                    }
                }
                if !plan.actions.is_empty() {
                    touch_cart(&mut tx, user_cart.id).await?;
                }
                plan.report()
            }
            None => MergeReport::default(),
        };

        // Cascades to the guest cart and its lines.
        guests::delete(&mut *tx, guest_id).await?;

        tx.commit().await?;
        Ok(report)
    }
}
