//! Normalization of raw query params into typed listing criteria.
//!
//! [`normalize`] never fails. Unknown sort values fall back to
//! [`SortOrder::Latest`], bad numbers fall back to defaults, and price
//! range tokens it can't read are skipped.

use std::collections::BTreeSet;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::query::{self, RawParams, keys};

/// Products per page when `limit` is absent or unusable.
pub const DEFAULT_LIMIT: u32 = 12;

/// Largest page size a client may request.
pub const MAX_LIMIT: u32 = 60;

/// Listing sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Cheapest effective price first.
    PriceAsc,
    /// Most expensive effective price first.
    PriceDesc,
    /// Newest products first.
    #[default]
    Latest,
}

impl SortOrder {
    /// Read a sort value, accepting `newest` as an alias of `latest`.
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("price_asc") => Self::PriceAsc,
            Some("price_desc") => Self::PriceDesc,
            Some("latest" | "newest") => Self::Latest,
            _ => Self::Latest,
        }
    }

    /// Canonical query value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Latest => "latest",
        }
    }
}

/// A price band selected in the listing sidebar.
///
/// `min` is inclusive. `max` is inclusive unless `max_inclusive` is false;
/// only the "Under $100" band uses an exclusive upper bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceRange {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
    pub max_inclusive: bool,
}

impl PriceRange {
    /// Read a `priceRange` token.
    ///
    /// The sidebar's own tokens map through a fixed table; any other
    /// `<a>-<b>` or `<a>+` token is read generically.
    #[must_use]
    pub fn parse_token(token: &str) -> Option<Self> {
        let token = token.trim();
        match token {
            "0-100" => return Some(Self::bounded(Decimal::ZERO, Decimal::ONE_HUNDRED, false)),
            "100-150" => return Some(Self::bounded(Decimal::ONE_HUNDRED, Decimal::from(150), true)),
            "150-200" => return Some(Self::bounded(Decimal::from(150), Decimal::from(200), true)),
            "200+" => return Some(Self::open(Decimal::from(200))),
            _ => {}
        }

        if let Some(min) = token.strip_suffix('+') {
            return parse_amount(min).map(Self::open);
        }

        let (min, max) = token.split_once('-')?;
        let (min, max) = (parse_amount(min)?, parse_amount(max)?);
        (min <= max).then(|| Self::bounded(min, max, true))
    }

    const fn bounded(min: Decimal, max: Decimal, max_inclusive: bool) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            max_inclusive,
        }
    }

    const fn open(min: Decimal) -> Self {
        Self {
            min: Some(min),
            max: None,
            max_inclusive: true,
        }
    }

    /// Whether `price` falls inside the band.
    #[must_use]
    pub fn contains(&self, price: Decimal) -> bool {
        let above_min = self.min.is_none_or(|min| price >= min);
        let below_max = self.max.is_none_or(|max| {
            if self.max_inclusive {
                price <= max
            } else {
                price < max
            }
        });
        above_min && below_max
    }

    /// Query token that reads back into this band.
    #[must_use]
    pub fn token(&self) -> String {
        let min = self.min.unwrap_or(Decimal::ZERO).normalize();
        match self.max {
            Some(max) => format!("{min}-{}", max.normalize()),
            None => format!("{min}+"),
        }
    }
}

/// Non-negative decimal amount, or `None`.
fn parse_amount(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim())
        .ok()
        .filter(|amount| !amount.is_sign_negative())
}

/// Typed, normalized product listing criteria.
///
/// Every multi-value field is a set; `page` is at least 1 and `limit` is
/// within `1..=MAX_LIMIT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    pub search: Option<String>,
    pub gender_slugs: BTreeSet<String>,
    pub brand_slugs: BTreeSet<String>,
    pub category_slugs: BTreeSet<String>,
    pub size_slugs: BTreeSet<String>,
    pub color_slugs: BTreeSet<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub price_ranges: Vec<PriceRange>,
    pub sort: SortOrder,
    pub page: u32,
    pub limit: u32,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            search: None,
            gender_slugs: BTreeSet::new(),
            brand_slugs: BTreeSet::new(),
            category_slugs: BTreeSet::new(),
            size_slugs: BTreeSet::new(),
            color_slugs: BTreeSet::new(),
            price_min: None,
            price_max: None,
            price_ranges: Vec::new(),
            sort: SortOrder::Latest,
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl FilterCriteria {
    /// Parse and normalize a raw query string.
    #[must_use]
    pub fn from_query(search: &str) -> Self {
        normalize(&query::parse(search))
    }

    /// Row offset of the first product on the current page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Whether an effective product price passes the price filters.
    ///
    /// `minPrice`/`maxPrice` must both hold; when bands are selected the
    /// price must fall in at least one of them.
    #[must_use]
    pub fn accepts_price(&self, price: Decimal) -> bool {
        let within_bounds = self.price_min.is_none_or(|min| price >= min)
            && self.price_max.is_none_or(|max| price <= max);
        let within_bands =
            self.price_ranges.is_empty() || self.price_ranges.iter().any(|r| r.contains(price));
        within_bounds && within_bands
    }

    /// Canonical params for these criteria; defaults are left out.
    #[must_use]
    pub fn to_params(&self) -> RawParams {
        let mut params = RawParams::new();
        params.set(keys::SEARCH, self.search.iter());
        params.set(keys::GENDER, &self.gender_slugs);
        params.set(keys::BRAND, &self.brand_slugs);
        params.set(keys::CATEGORY, &self.category_slugs);
        params.set(keys::SIZE, &self.size_slugs);
        params.set(keys::COLOR, &self.color_slugs);
        params.set(keys::MIN_PRICE, self.price_min.map(|p| p.normalize().to_string()));
        params.set(keys::MAX_PRICE, self.price_max.map(|p| p.normalize().to_string()));
        params.set(keys::PRICE_RANGE, self.price_ranges.iter().map(PriceRange::token));
        if self.sort != SortOrder::Latest {
            params.set(keys::SORT, [self.sort.as_str()]);
        }
        if self.page != 1 {
            params.set(keys::PAGE, [self.page.to_string()]);
        }
        if self.limit != DEFAULT_LIMIT {
            params.set(keys::LIMIT, [self.limit.to_string()]);
        }
        params
    }
}

/// Map raw params onto [`FilterCriteria`].
#[must_use]
pub fn normalize(params: &RawParams) -> FilterCriteria {
    let mut price_ranges: Vec<PriceRange> = Vec::new();
    for range in params
        .values(keys::PRICE_RANGE)
        .iter()
        .filter_map(|token| PriceRange::parse_token(token))
    {
        if !price_ranges.contains(&range) {
            price_ranges.push(range);
        }
    }

    FilterCriteria {
        search: params.first(keys::SEARCH).map(str::to_owned),
        gender_slugs: params.values(keys::GENDER),
        brand_slugs: params.values(keys::BRAND),
        category_slugs: params.values(keys::CATEGORY),
        size_slugs: params.values(keys::SIZE),
        color_slugs: params.values(keys::COLOR),
        price_min: params.first(keys::MIN_PRICE).and_then(parse_plain_number),
        price_max: params.first(keys::MAX_PRICE).and_then(parse_plain_number),
        price_ranges,
        sort: SortOrder::parse(params.first(keys::SORT)),
        page: normalize_page(params.first(keys::PAGE)),
        limit: normalize_limit(params.first(keys::LIMIT)),
    }
}

fn parse_plain_number(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim()).ok()
}

/// Finite numeric value of a query token, floored.
fn parse_floored(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|r| r.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(f64::floor)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to u32 range first
fn to_u32(value: f64) -> u32 {
    value.clamp(0.0, f64::from(u32::MAX)) as u32
}

fn normalize_page(raw: Option<&str>) -> u32 {
    parse_floored(raw).map_or(1, |page| to_u32(page.max(1.0)))
}

fn normalize_limit(raw: Option<&str>) -> u32 {
    match parse_floored(raw) {
        Some(limit) if limit >= 1.0 => to_u32(limit).min(MAX_LIMIT),
        _ => DEFAULT_LIMIT,
    }
}

// =============================================================================
// Active filter badges
// =============================================================================

/// Keys shown as removable badges above the product grid, in display order.
const BADGE_KEYS: [&str; 6] = [
    keys::GENDER,
    keys::BRAND,
    keys::CATEGORY,
    keys::SIZE,
    keys::COLOR,
    keys::PRICE_RANGE,
];

/// One active filter value with a human label and the query that removes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterBadge {
    pub key: &'static str,
    pub value: String,
    pub label: String,
    pub remove_href: String,
}

/// Badges for every active filter value in `search`.
#[must_use]
pub fn active_badges(search: &str) -> Vec<FilterBadge> {
    let params = query::parse(search);
    let canonical = query::stringify(&params);

    BADGE_KEYS
        .iter()
        .flat_map(|&key| {
            let canonical = &canonical;
            params.values(key).into_iter().map(move |value| FilterBadge {
                key,
                label: badge_label(key, &value),
                remove_href: query::toggle(canonical, key, &value),
                value,
            })
        })
        .collect()
}

/// Human label for a filter value.
#[must_use]
pub fn badge_label(key: &str, value: &str) -> String {
    match key {
        keys::GENDER | keys::COLOR => capitalize(value),
        keys::BRAND | keys::CATEGORY => value
            .split('-')
            .filter(|word| !word.is_empty())
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" "),
        keys::SIZE => format!("Size {value}"),
        keys::PRICE_RANGE => match value {
            "0-100" => "Under $100".to_owned(),
            "100-150" => "$100-$150".to_owned(),
            "150-200" => "$150-$200".to_owned(),
            "200+" => "Over $200".to_owned(),
            other => other.to_owned(),
        },
        _ => value.to_owned(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
