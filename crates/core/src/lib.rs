//! Stride Core - Domain types and pure storefront rules.
//!
//! This crate is shared by every Stride component:
//! - `storefront` - Public-facing e-commerce service
//! - `cli` - Command-line tools for migrations and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP. Everything here can be unit tested without a
//! runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails and guest tokens
//! - [`query`] - URL query string codec for product filters
//! - [`filter`] - Normalization of raw query params into [`filter::FilterCriteria`]
//! - [`cart`] - Cart identities, read models and reconciliation rules
//! - [`checkout`] - Checkout field formatting and validation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod filter;
pub mod query;
pub mod types;

pub use types::*;
