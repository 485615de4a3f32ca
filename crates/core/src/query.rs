//! URL query string codec for product listing filters.
//!
//! Filter state lives in the URL so listings are shareable and survive a
//! reload. This module turns a query string into [`RawParams`] and back,
//! and implements the small edits the filter UI needs (toggle a value,
//! clear everything, change the sort).
//!
//! # Canonical form
//!
//! - Multi-values may be comma-delimited (`size=8,9`) or repeated
//!   (`size=8&size=9`); both parse to the same set.
//! - Values are trimmed; empty and whitespace-only tokens are dropped.
//! - Values are deduplicated. One remaining value is a scalar
//!   ([`ParamValue::One`]), two or more are a set ([`ParamValue::Many`]).
//! - Keys and multi-values are kept sorted, so the output of [`stringify`]
//!   is stable and `parse(stringify(parse(s))) == parse(s)`.
//!
//! Nothing here returns an error: a hand-edited URL degrades to fewer
//! filters, never to a failed page.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

/// Query keys understood by the product listing.
pub mod keys {
    pub const SEARCH: &str = "search";
    pub const GENDER: &str = "gender";
    pub const BRAND: &str = "brand";
    pub const CATEGORY: &str = "category";
    pub const SIZE: &str = "size";
    pub const COLOR: &str = "color";
    pub const PRICE_RANGE: &str = "priceRange";
    pub const MIN_PRICE: &str = "minPrice";
    pub const MAX_PRICE: &str = "maxPrice";
    pub const SORT: &str = "sort";
    pub const PAGE: &str = "page";
    pub const LIMIT: &str = "limit";
}

/// Keys that shape the listing without filtering it.
const NON_FILTER_KEYS: [&str; 3] = [keys::SORT, keys::PAGE, keys::LIMIT];

/// Value(s) of a single query key after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Exactly one value.
    One(String),
    /// Two or more distinct values.
    Many(BTreeSet<String>),
}

impl ParamValue {
    /// Collapse a set into a value; `None` when the set is empty.
    fn from_set(mut set: BTreeSet<String>) -> Option<Self> {
        match set.len() {
            0 => None,
            1 => set.pop_first().map(Self::One),
            _ => Some(Self::Many(set)),
        }
    }

    /// Iterate over the values in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let (one, many) = match self {
            Self::One(value) => (Some(value.as_str()), None),
            Self::Many(values) => (None, Some(values.iter().map(String::as_str))),
        };
        one.into_iter().chain(many.into_iter().flatten())
    }

    /// The first value in canonical order.
    #[must_use]
    pub fn first(&self) -> &str {
        self.iter().next().unwrap_or_default()
    }

    /// Whether `value` is one of the values.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::One(v) => v == value,
            Self::Many(values) => values.contains(value),
        }
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(values) => values.len(),
        }
    }

    /// Always false; a `ParamValue` is never empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    fn to_set(&self) -> BTreeSet<String> {
        self.iter().map(str::to_owned).collect()
    }
}

/// Normalized key → value(s) map parsed from a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParams(BTreeMap<String, ParamValue>);

impl RawParams {
    /// An empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value(s) for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// First value for `key`, if present.
    #[must_use]
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).map(ParamValue::first)
    }

    /// All values for `key` as a set (empty when absent).
    #[must_use]
    pub fn values(&self, key: &str) -> BTreeSet<String> {
        self.get(key).map(ParamValue::to_set).unwrap_or_default()
    }

    /// Replace the values for `key`.
    ///
    /// Values are trimmed, empties dropped and duplicates collapsed; if
    /// nothing remains the key is removed.
    pub fn set<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = values
            .into_iter()
            .filter_map(|v| clean_token(v.as_ref()))
            .collect();
        match ParamValue::from_set(set) {
            Some(value) => {
                self.0.insert(key.to_owned(), value);
            }
            None => {
                self.0.remove(key);
            }
        }
    }

    /// Remove `key` entirely.
    pub fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }

    /// Iterate over keys and values in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether no keys are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn clean_token(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Percent-decode a query component, treating `+` as a space.
///
/// Invalid UTF-8 is replaced rather than rejected.
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => {
            let bytes = urlencoding::decode_binary(spaced.as_bytes());
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }
}

fn encode_component(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// Parse a query string (with or without the leading `?`).
#[must_use]
pub fn parse(search: &str) -> RawParams {
    let search = search.strip_prefix('?').unwrap_or(search);
    let mut collected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for pair in search.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(raw_key);
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let values = raw_value
            .split(',')
            .filter_map(|token| clean_token(&decode_component(token)));
        collected.entry(key.to_owned()).or_default().extend(values);
    }

    RawParams(
        collected
            .into_iter()
            .filter_map(|(key, set)| ParamValue::from_set(set).map(|value| (key, value)))
            .collect(),
    )
}

/// Serialize params back into a query string (without the leading `?`).
///
/// Each value is percent-encoded on its own and multi-values are joined
/// with a literal comma, so a value containing a comma survives as `%2C`.
#[must_use]
pub fn stringify(params: &RawParams) -> String {
    params
        .iter()
        .map(|(key, value)| {
            let joined = value
                .iter()
                .map(encode_component)
                .collect::<Vec<_>>()
                .join(",");
            format!("{}={joined}", encode_component(key))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Add `value` to `key` if absent, remove it if present.
///
/// Removing the last value drops the key.
#[must_use]
pub fn toggle(search: &str, key: &str, value: &str) -> String {
    let mut params = parse(search);
    let Some(value) = clean_token(value) else {
        return stringify(&params);
    };

    let mut current = params.values(key);
    if !current.remove(&value) {
        current.insert(value);
    }
    params.set(key, current);
    stringify(&params)
}

/// Whether `value` is currently selected for `key`.
#[must_use]
pub fn is_active(search: &str, key: &str, value: &str) -> bool {
    parse(search)
        .get(key)
        .is_some_and(|current| current.contains(value.trim()))
}

/// All selected values for `key`.
#[must_use]
pub fn active_values(search: &str, key: &str) -> BTreeSet<String> {
    parse(search).values(key)
}

/// Drop every filter, keeping only the sort order.
#[must_use]
pub fn clear_all(search: &str) -> String {
    let parsed = parse(search);
    let mut kept = RawParams::new();
    if let Some(sort) = parsed.get(keys::SORT) {
        kept.set(keys::SORT, sort.iter());
    }
    stringify(&kept)
}

/// Count selected filter values, ignoring sort and pagination keys.
#[must_use]
pub fn count_active(search: &str) -> usize {
    parse(search)
        .iter()
        .filter(|(key, _)| !NON_FILTER_KEYS.contains(key))
        .map(|(_, value)| value.len())
        .sum()
}

/// Replace the values of `key`.
#[must_use]
pub fn set_param<I, S>(search: &str, key: &str, values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut params = parse(search);
    params.set(key, values);
    stringify(&params)
}

/// Remove `key` entirely.
#[must_use]
pub fn remove_param(search: &str, key: &str) -> String {
    let mut params = parse(search);
    params.remove(key);
    stringify(&params)
}

/// Change the sort order and go back to the first page.
#[must_use]
pub fn update_sort(search: &str, sort: &str) -> String {
    let mut params = parse(search);
    params.set(keys::SORT, [sort]);
    params.set(keys::PAGE, ["1"]);
    stringify(&params)
}
