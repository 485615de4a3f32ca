//! Product listing and detail queries.
//!
//! One static CTE applies every [`FilterCriteria`] filter; empty slug sets
//! and missing bounds are passed as empty arrays / NULLs and switch their
//! clause off. Prices compare against a product's cheapest effective
//! variant price.

use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::QueryAs;

use stride_core::cart;
use stride_core::filter::FilterCriteria;
use stride_core::{ProductId, VariantId};

use super::RepositoryError;
use crate::models::{
    ProductDetail, ProductImage, ProductPage, ProductSummary, VariantDetail,
};

/// Filtered products with their minimum effective price.
///
/// Parameters: `$1` search, `$2`..`$6` gender/brand/category/size/color
/// slugs, `$7`/`$8` min/max price, `$9`..`$11` price bands as parallel
/// arrays of lower bound, upper bound and upper-bound inclusiveness.
macro_rules! filtered_cte {
    () => {
        r"
        WITH priced AS (
            SELECT p.id, p.name, p.created_at, b.name AS brand,
                   MIN(COALESCE(v.sale_price, v.price)) AS min_price
            FROM storefront.products p
            JOIN storefront.product_variants v ON v.product_id = p.id
            LEFT JOIN storefront.brands b ON b.id = p.brand_id
            LEFT JOIN storefront.categories c ON c.id = p.category_id
            LEFT JOIN storefront.genders g ON g.id = p.gender_id
            WHERE p.is_published
              AND ($1::text IS NULL OR strpos(lower(p.name), lower($1)) > 0)
              AND (cardinality($2::text[]) = 0 OR g.slug = ANY($2))
              AND (cardinality($3::text[]) = 0 OR b.slug = ANY($3))
              AND (cardinality($4::text[]) = 0 OR c.slug = ANY($4))
              AND (cardinality($5::text[]) = 0 OR EXISTS (
                    SELECT 1 FROM storefront.product_variants sv
                    JOIN storefront.sizes s ON s.id = sv.size_id
                    WHERE sv.product_id = p.id AND s.slug = ANY($5)))
              AND (cardinality($6::text[]) = 0 OR EXISTS (
                    SELECT 1 FROM storefront.product_variants cv
                    JOIN storefront.colors co ON co.id = cv.color_id
                    WHERE cv.product_id = p.id AND co.slug = ANY($6)))
            GROUP BY p.id, p.name, p.created_at, b.name
        ),
        filtered AS (
            SELECT * FROM priced
            WHERE ($7::numeric IS NULL OR min_price >= $7)
              AND ($8::numeric IS NULL OR min_price <= $8)
              AND (cardinality($9::numeric[]) = 0 OR EXISTS (
                    SELECT 1
                    FROM unnest($9::numeric[], $10::numeric[], $11::bool[]) AS r(lo, hi, hi_inclusive)
                    WHERE (r.lo IS NULL OR min_price >= r.lo)
                      AND (r.hi IS NULL OR min_price < r.hi
                           OR (r.hi_inclusive AND min_price = r.hi))))
        )
        "
    };
}

const LIST_PRODUCTS: &str = concat!(
    filtered_cte!(),
    r"
    SELECT f.id, f.name, f.brand, f.min_price,
           (SELECT i.url FROM storefront.product_images i
            WHERE i.product_id = f.id
            ORDER BY i.is_primary DESC, i.sort_order, i.id
            LIMIT 1) AS image_url
    FROM filtered f
    ORDER BY
        CASE WHEN $12::text = 'price_asc' THEN f.min_price END ASC,
        CASE WHEN $12::text = 'price_desc' THEN f.min_price END DESC,
        f.created_at DESC,
        f.id DESC
    LIMIT $13 OFFSET $14
    "
);

const COUNT_PRODUCTS: &str = concat!(filtered_cte!(), "SELECT COUNT(*) FROM filtered");

#[derive(Debug, sqlx::FromRow)]
struct ProductSummaryRow {
    id: ProductId,
    name: String,
    brand: Option<String>,
    min_price: Decimal,
    image_url: Option<String>,
}

impl From<ProductSummaryRow> for ProductSummary {
    fn from(row: ProductSummaryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            brand: row.brand,
            min_price: row.min_price,
            image_url: row.image_url,
        }
    }
}

const SELECT_PRODUCT: &str = r"
    SELECT p.id, p.name, p.description,
           b.name AS brand, c.name AS category, g.name AS gender
    FROM storefront.products p
    LEFT JOIN storefront.brands b ON b.id = p.brand_id
    LEFT JOIN storefront.categories c ON c.id = p.category_id
    LEFT JOIN storefront.genders g ON g.id = p.gender_id
    WHERE p.id = $1 AND p.is_published
";

const SELECT_VARIANTS: &str = r"
    SELECT v.id, v.sku, s.name AS size, co.name AS color, co.hex_code AS color_hex,
           v.price, v.sale_price, v.in_stock
    FROM storefront.product_variants v
    LEFT JOIN storefront.sizes s ON s.id = v.size_id
    LEFT JOIN storefront.colors co ON co.id = v.color_id
    WHERE v.product_id = $1
    ORDER BY s.sort_order NULLS LAST, v.id
";

const SELECT_IMAGES: &str = r"
    SELECT url, variant_id, is_primary
    FROM storefront.product_images
    WHERE product_id = $1
    ORDER BY is_primary DESC, sort_order, id
";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: String,
    brand: Option<String>,
    category: Option<String>,
    gender: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: VariantId,
    sku: String,
    size: Option<String>,
    color: Option<String>,
    color_hex: Option<String>,
    price: Decimal,
    sale_price: Option<Decimal>,
    in_stock: i32,
}

impl From<VariantRow> for VariantDetail {
    fn from(row: VariantRow) -> Self {
        Self {
            id: row.id,
            sku: row.sku,
            size: row.size,
            color: row.color,
            color_hex: row.color_hex,
            price: row.price,
            sale_price: row.sale_price,
            in_stock: cart::stock_level(row.in_stock),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    url: String,
    variant_id: Option<VariantId>,
    is_primary: bool,
}

impl From<ImageRow> for ProductImage {
    fn from(row: ImageRow) -> Self {
        Self {
            url: row.url,
            variant_id: row.variant_id,
            is_primary: row.is_primary,
        }
    }
}

/// Bind values for the filter CTE, in parameter order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FilterBinds {
    search: Option<String>,
    genders: Vec<String>,
    brands: Vec<String>,
    categories: Vec<String>,
    sizes: Vec<String>,
    colors: Vec<String>,
    price_min: Option<Decimal>,
    price_max: Option<Decimal>,
    range_lo: Vec<Option<Decimal>>,
    range_hi: Vec<Option<Decimal>>,
    range_hi_inclusive: Vec<bool>,
}

impl From<&FilterCriteria> for FilterBinds {
    fn from(criteria: &FilterCriteria) -> Self {
        Self {
            search: criteria.search.clone(),
            genders: criteria.gender_slugs.iter().cloned().collect(),
            brands: criteria.brand_slugs.iter().cloned().collect(),
            categories: criteria.category_slugs.iter().cloned().collect(),
            sizes: criteria.size_slugs.iter().cloned().collect(),
            colors: criteria.color_slugs.iter().cloned().collect(),
            price_min: criteria.price_min,
            price_max: criteria.price_max,
            range_lo: criteria.price_ranges.iter().map(|r| r.min).collect(),
            range_hi: criteria.price_ranges.iter().map(|r| r.max).collect(),
            range_hi_inclusive: criteria
                .price_ranges
                .iter()
                .map(|r| r.max_inclusive)
                .collect(),
        }
    }
}

impl FilterBinds {
    fn bind<'q, O>(
        self,
        query: QueryAs<'q, Postgres, O, PgArguments>,
    ) -> QueryAs<'q, Postgres, O, PgArguments> {
        query
            .bind(self.search)
            .bind(self.genders)
            .bind(self.brands)
            .bind(self.categories)
            .bind(self.sizes)
            .bind(self.colors)
            .bind(self.price_min)
            .bind(self.price_max)
            .bind(self.range_lo)
            .bind(self.range_hi)
            .bind(self.range_hi_inclusive)
    }
}

/// Repository for the product catalog.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of published products matching `criteria`, plus the total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self, criteria), fields(page = criteria.page, limit = criteria.limit))]
    pub async fn list(&self, criteria: &FilterCriteria) -> Result<ProductPage, RepositoryError> {
        let binds = FilterBinds::from(criteria);
        let limit = i64::from(criteria.limit);
        let offset = i64::try_from(criteria.offset()).unwrap_or(i64::MAX);

        let rows = binds
            .clone()
            .bind(sqlx::query_as::<_, ProductSummaryRow>(LIST_PRODUCTS))
            .bind(criteria.sort.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

        let (total,) = binds
            .bind(sqlx::query_as::<_, (i64,)>(COUNT_PRODUCTS))
            .fetch_one(self.pool)
            .await?;

        Ok(ProductPage {
            products: rows.into_iter().map(ProductSummary::from).collect(),
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    /// A published product with its variants and images.
    ///
    /// Returns `None` for unknown or unpublished products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: ProductId) -> Result<Option<ProductDetail>, RepositoryError> {
        let Some(product) = sqlx::query_as::<_, ProductRow>(SELECT_PRODUCT)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };

        let variants = sqlx::query_as::<_, VariantRow>(SELECT_VARIANTS)
            .bind(id)
            .fetch_all(self.pool)
            .await?;
        let images = sqlx::query_as::<_, ImageRow>(SELECT_IMAGES)
            .bind(id)
            .fetch_all(self.pool)
            .await?;

        Ok(Some(ProductDetail {
            id: product.id,
            name: product.name,
            description: product.description,
            brand: product.brand,
            category: product.category,
            gender: product.gender,
            variants: variants.into_iter().map(VariantDetail::from).collect(),
            images: images.into_iter().map(ProductImage::from).collect(),
        }))
    }
}
