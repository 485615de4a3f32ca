//! Shopper identity resolution.
//!
//! Every cart route resolves who is shopping the same way: a signed-in user
//! from the session wins, then a guest cookie, otherwise the request is
//! anonymous.

use axum::{extract::FromRequestParts, http::request::Parts};

use stride_core::GuestToken;
use stride_core::cart::Identity;

use super::auth::OptionalAuth;
use super::guest::read_guest_token;

/// The resolved [`Identity`] of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopperIdentity(pub Identity);

/// Resolve an identity from the session user and guest cookie.
#[must_use]
pub fn resolve_identity(user: Option<stride_core::UserId>, guest: Option<GuestToken>) -> Identity {
    match (user, guest) {
        (Some(user_id), _) => Identity::User(user_id),
        (None, Some(token)) => Identity::Guest(token),
        (None, None) => Identity::Anonymous,
    }
}

impl<S> FromRequestParts<S> for ShopperIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let OptionalAuth(user) = OptionalAuth::from_request_parts(parts, state).await?;
        let guest = read_guest_token(&parts.headers);
        Ok(Self(resolve_identity(user.map(|u| u.id), guest)))
    }
}

/// The guest token sent with the request, if any.
///
/// Used at sign-in to find the guest cart to merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestCookie(pub Option<GuestToken>);

impl<S> FromRequestParts<S> for GuestCookie
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(read_guest_token(&parts.headers)))
    }
}
