//! Listing filters from raw query string to UI state.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use stride_core::filter::{FilterCriteria, SortOrder, active_badges};
use stride_core::query;

#[test]
fn test_hand_edited_url_normalizes() {
    let criteria = FilterCriteria::from_query("page=-5&limit=999&sort=bogus&size=8,8,9&size=9");
    assert_eq!(criteria.page, 1);
    assert_eq!(criteria.limit, 60);
    assert_eq!(criteria.sort, SortOrder::default());
    assert_eq!(criteria.size_slugs.len(), 2);
}

#[test]
fn test_canonical_query_is_stable() {
    let search = "color=red&brand=nike,asics&priceRange=0-100&sort=price_asc&page=2";
    let criteria = FilterCriteria::from_query(search);
    let canonical = query::stringify(&criteria.to_params());

    assert_eq!(FilterCriteria::from_query(&canonical), criteria);
    assert_eq!(query::stringify(&query::parse(&canonical)), canonical);
}

#[test]
fn test_badge_remove_links_drop_one_value() {
    let search = "brand=nike,asics&color=red";
    let badges = active_badges(search);
    assert_eq!(badges.len(), 3);
    assert_eq!(query::count_active(search), 3);

    let red = badges
        .iter()
        .find(|b| b.key == "color")
        .unwrap();
    let without_red = FilterCriteria::from_query(&red.remove_href);
    assert!(without_red.color_slugs.is_empty());
    assert_eq!(without_red.brand_slugs.len(), 2);
}

#[test]
fn test_price_band_filtering() {
    let criteria = FilterCriteria::from_query("priceRange=0-100,200%2B");
    assert!(criteria.accepts_price(Decimal::from(99)));
    assert!(!criteria.accepts_price(Decimal::from(150)));
    assert!(criteria.accepts_price(Decimal::from(250)));
}
