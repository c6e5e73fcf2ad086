pub mod auth;
pub mod health;
pub mod user;

use axum::Router;

use crate::state::AppState;

/// Build the versioned API route tree, mounted at `/api/v{VERSION}`.
///
/// ```text
/// /auth/signup           create account + session (public)
/// /auth/login            session for existing account (public)
/// /auth/refresh          new access token from refresh cookie (public)
/// /auth/logout           delete session, clear cookies (public)
/// /auth/verify/status    pending-verification status (public)
///
/// /user/profile          current user's profile (auth required)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/user", user::router())
}
