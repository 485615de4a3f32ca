//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! Identity is resolved per handler by the [`ShopperIdentity`] extractor.

pub mod auth;
pub mod guest;
pub mod identity;
pub mod request_id;
pub mod session;

pub use auth::{OptionalAuth, RequireAuth, clear_current_user, set_current_user};
pub use guest::{GUEST_COOKIE_NAME, clear_guest_cookie, guest_cookie, read_guest_token};
pub use identity::{GuestCookie, ShopperIdentity};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
