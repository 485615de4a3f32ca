//! Domain models for the storefront.
//!
//! Row types stay private to `crate::db`; these are what handlers and
//! services work with.

pub mod product;
pub mod session;
pub mod user;

pub use product::{ProductDetail, ProductImage, ProductPage, ProductSummary, VariantDetail};
pub use session::CurrentUser;
pub use user::User;
