//! Cart error types.

use thiserror::Error;

use stride_core::cart::{InsufficientStock, InvalidQuantity};

use crate::db::RepositoryError;

/// Errors returned by cart operations.
///
/// Every variant is recoverable and maps to a user-facing message; only
/// [`CartError::Repository`] indicates a server-side fault.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product variant doesn't exist.
    #[error("product variant not found")]
    VariantNotFound,

    /// The cart item doesn't exist (or was already removed).
    #[error("cart item not found")]
    ItemNotFound,

    #[error(transparent)]
    InvalidQuantity(#[from] InvalidQuantity),

    #[error(transparent)]
    InsufficientStock(#[from] InsufficientStock),

    /// The item belongs to a cart owned by someone else.
    #[error("cart item belongs to another shopper")]
    Unauthorized,

    /// Neither a user session nor a guest session could be established.
    #[error("no user or guest session available")]
    IdentityUnavailable,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl CartError {
    /// Stable error kind reported to clients.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::VariantNotFound | Self::ItemNotFound => "NotFound",
            Self::InvalidQuantity(_) => "InvalidQuantity",
            Self::InsufficientStock(_) => "InsufficientStock",
            Self::Unauthorized => "Unauthorized",
            Self::IdentityUnavailable => "IdentityUnavailable",
            Self::Repository(_) => "Internal",
        }
    }
}

impl From<sqlx::Error> for CartError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}
