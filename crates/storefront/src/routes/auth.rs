//! Authentication route handlers.
//!
//! Sign-up and sign-in both fold the guest cart into the account before the
//! user is written to the session. A failed merge aborts the sign-in so
//! the guest cart is never half-moved; the shopper can simply retry.

use axum::{
    Json,
    extract::State,
    http::header,
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use stride_core::GuestToken;
use stride_core::cart::MergeReport;

use crate::db::CartRepository;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    GuestCookie, RequireAuth, clear_current_user, clear_guest_cookie, set_current_user,
};
use crate::models::{CurrentUser, User};
use crate::services::{AuthService, CartService};
use crate::state::AppState;

/// Sign-up request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Sign-in request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful sign-in or sign-up.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: User,
    pub merge: MergeReport,
}

/// Create an account and sign in.
#[instrument(skip(state, session, guest, body))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    GuestCookie(guest): GuestCookie,
    Json(body): Json<RegisterRequest>,
) -> Result<Response> {
    let user = AuthService::new(state.pool())
        .sign_up(&body.email, &body.password, &body.name)
        .await?;
    complete_sign_in(&state, &session, guest, user).await
}

/// Sign in with email and password.
#[instrument(skip(state, session, guest, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    GuestCookie(guest): GuestCookie,
    Json(body): Json<LoginRequest>,
) -> Result<Response> {
    let user = AuthService::new(state.pool())
        .sign_in(&body.email, &body.password)
        .await?;
    complete_sign_in(&state, &session, guest, user).await
}

/// Sign out.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Json<serde_json::Value>> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("failed to clear session: {e}")))?;
    clear_sentry_user();
    Ok(Json(serde_json::json!({ "success": true })))
}

/// The signed-in user.
pub async fn me(RequireAuth(user): RequireAuth) -> Json<CurrentUser> {
    Json(user)
}

/// Merge the guest cart, start the user session and drop the guest cookie.
async fn complete_sign_in(
    state: &AppState,
    session: &Session,
    guest: Option<GuestToken>,
    user: User,
) -> Result<Response> {
    let store = CartRepository::new(state.pool());
    let merge = CartService::new(&store)
        .merge_guest_into_user(guest.as_ref(), user.id)
        .await?;

    set_current_user(session, &CurrentUser::from(&user))
        .await
        .map_err(|e| AppError::Internal(format!("failed to write session: {e}")))?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "User signed in");

    let secure = state.config().secure_cookies();
    let cookie = guest.map(|_| (header::SET_COOKIE, clear_guest_cookie(secure).to_string()));

    Ok((
        AppendHeaders(cookie),
        Json(AuthResponse {
            success: true,
            user,
            merge,
        }),
    )
        .into_response())
}
