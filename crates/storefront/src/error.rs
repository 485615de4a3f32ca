//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Errors are answered as JSON:
//!
//! ```json
//! { "success": false, "error": "Only 2 left in stock", "kind": "InsufficientStock" }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use stride_core::checkout::CheckoutError;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout form rejected.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Cart(CartError::Repository(_))
                | Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash)
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cart(err) => match err {
                CartError::VariantNotFound | CartError::ItemNotFound => StatusCode::NOT_FOUND,
                CartError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
                CartError::InsufficientStock(_) => StatusCode::CONFLICT,
                CartError::Unauthorized => StatusCode::FORBIDDEN,
                CartError::IdentityUnavailable => StatusCode::UNAUTHORIZED,
                CartError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidName { .. } => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Stable machine-readable kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal",
            Self::Cart(err) => err.kind(),
            Self::Checkout(_) => "ValidationError",
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Unauthorized",
                AuthError::UserAlreadyExists => "Conflict",
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidName { .. } => "ValidationError",
                AuthError::Repository(_) | AuthError::PasswordHash => "Internal",
            },
            Self::NotFound(_) => "NotFound",
            Self::Unauthorized(_) => "Unauthorized",
            Self::BadRequest(_) => "BadRequest",
        }
    }

    /// Message safe to show to the shopper.
    fn public_message(&self) -> String {
        if self.is_server_error() {
            return "Internal server error".to_owned();
        }
        match self {
            Self::Cart(err) => match err {
                CartError::VariantNotFound => "Product variant not found".to_owned(),
                CartError::ItemNotFound => "Cart item not found".to_owned(),
                CartError::InvalidQuantity(_) => "Invalid quantity".to_owned(),
                CartError::InsufficientStock(stock) => {
                    format!("Only {} left in stock", stock.available)
                }
                CartError::Unauthorized => "Unauthorized".to_owned(),
                CartError::IdentityUnavailable => {
                    "Unable to create session. Please enable cookies.".to_owned()
                }
                CartError::Repository(_) => "Internal server error".to_owned(),
            },
            Self::Checkout(err) => err.to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_owned(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_owned()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_owned(),
                other => other.to_string(),
            },
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::BadRequest(msg) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_owned(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let mut body = json!({
            "success": false,
            "error": self.public_message(),
            "kind": self.kind(),
        });
        if let Self::Checkout(err) = &self {
            body["field"] = json!(err.field());
        }

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stride_core::cart::{InsufficientStock, InvalidQuantity};

    use super::*;

    fn status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body(err: AppError) -> serde_json::Value {
        let bytes = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_cart_error_status_codes() {
        assert_eq!(status(CartError::VariantNotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(status(CartError::ItemNotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status(CartError::InvalidQuantity(InvalidQuantity { min: 1 }).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(
                CartError::InsufficientStock(InsufficientStock {
                    available: 2,
                    requested: 3
                })
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(status(CartError::Unauthorized.into()), StatusCode::FORBIDDEN);
        assert_eq!(
            status(CartError::IdentityUnavailable.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(CartError::Repository(RepositoryError::NotFound).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(AppError::Auth(AuthError::UserAlreadyExists)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let json = body(
            CartError::InsufficientStock(InsufficientStock {
                available: 2,
                requested: 5,
            })
            .into(),
        )
        .await;
        assert_eq!(json["success"], false);
        assert_eq!(json["kind"], "InsufficientStock");
        assert_eq!(json["error"], "Only 2 left in stock");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let json = body(AppError::Internal("pool exhausted at 10.0.0.3".to_string())).await;
        assert_eq!(json["error"], "Internal server error");
        assert_eq!(json["kind"], "Internal");
    }

    #[tokio::test]
    async fn test_checkout_error_names_field() {
        let err = stride_core::checkout::CheckoutForm::default()
            .validate()
            .unwrap_err();
        let json = body(err.into()).await;
        assert_eq!(json["kind"], "ValidationError");
        assert_eq!(json["field"], "firstName");
    }
}
