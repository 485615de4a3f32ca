//! Product listing and product pages.
//!
//! The raw query string is normalized into [`FilterCriteria`] before it
//! reaches the database, so hand-edited URLs degrade to defaults instead
//! of failing.

use axum::{
    Json,
    extract::{Path, RawQuery, State},
};
use serde::Serialize;
use tracing::instrument;

use stride_core::filter::{FilterBadge, FilterCriteria, active_badges};
use stride_core::{ProductId, query};

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::models::{ProductDetail, ProductSummary};
use crate::state::AppState;

/// Listing page payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListResponse {
    pub criteria: FilterCriteria,
    /// Canonical query string for these criteria.
    pub query: String,
    pub products: Vec<ProductSummary>,
    pub total: u64,
    pub total_pages: u64,
    pub badges: Vec<FilterBadge>,
    pub active_filter_count: usize,
}

/// List products matching the query string filters.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<ProductListResponse>> {
    let search = raw.unwrap_or_default();
    let criteria = FilterCriteria::from_query(&search);

    let page = ProductRepository::new(state.pool()).list(&criteria).await?;

    Ok(Json(ProductListResponse {
        query: query::stringify(&criteria.to_params()),
        total_pages: page.total_pages(criteria.limit),
        total: page.total,
        products: page.products,
        badges: active_badges(&search),
        active_filter_count: query::count_active(&search),
        criteria,
    }))
}

/// A product with its variants and images.
///
/// Variant ids from this payload are what `/cart/add` takes.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))
}
