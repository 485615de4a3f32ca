//! Guest session cookie.
//!
//! Anonymous shoppers are identified by a random token in the
//! `guest_session` cookie. The cookie is HTTP-only, `SameSite=Strict` and
//! scoped to the whole site; it is cleared once the guest's cart has been
//! merged into a user account.

use axum::http::{HeaderMap, header};
use tower_sessions::cookie::{Cookie, SameSite, time::Duration};

use stride_core::GuestToken;

/// Guest cookie name.
pub const GUEST_COOKIE_NAME: &str = "guest_session";

/// Read the guest token from the request's `Cookie` headers.
///
/// Malformed values are ignored, as if no cookie was sent.
#[must_use]
pub fn read_guest_token(headers: &HeaderMap) -> Option<GuestToken> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value.to_owned()))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == GUEST_COOKIE_NAME)
        .and_then(|cookie| GuestToken::parse(cookie.value()).ok())
}

/// Cookie carrying a newly issued guest token.
#[must_use]
pub fn guest_cookie(token: &GuestToken, days: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((GUEST_COOKIE_NAME, token.as_str().to_owned()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::days(days))
        .secure(secure)
        .build()
}

/// Cookie that removes the guest token from the browser.
#[must_use]
pub fn clear_guest_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((GUEST_COOKIE_NAME, ""))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::ZERO)
        .secure(secure)
        .build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_read_guest_token_among_other_cookies() {
        let token = GuestToken::generate();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("stride_session=abc; guest_session={token}; theme=dark"))
                .unwrap(),
        );
        assert_eq!(read_guest_token(&headers), Some(token));
    }

    #[test]
    fn test_malformed_guest_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("guest_session=oops"));
        assert_eq!(read_guest_token(&headers), None);
        assert_eq!(read_guest_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_guest_cookie_attributes() {
        let token = GuestToken::generate();
        let rendered = guest_cookie(&token, 7, true).to_string();
        assert!(rendered.starts_with(&format!("guest_session={token}")));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("SameSite=Strict"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=604800"));
        assert!(rendered.contains("Secure"));

        assert!(!guest_cookie(&token, 7, false).to_string().contains("Secure"));
    }

    #[test]
    fn test_clear_guest_cookie_expires_immediately() {
        let rendered = clear_guest_cookie(false).to_string();
        assert!(rendered.starts_with("guest_session=;"));
        assert!(rendered.contains("Max-Age=0"));
    }
}
