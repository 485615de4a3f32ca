//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Sign-up and sign-in with Argon2 password hashes
//! - `cart` - Cart reconciliation engine over a [`cart::CartStore`]

pub mod auth;
pub mod cart;

pub use auth::{AuthError, AuthService};
pub use cart::{CartError, CartService, CartStore};
