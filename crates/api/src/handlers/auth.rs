//! Handlers for the `/auth` resource (signup, login, refresh, logout).
//!
//! Credentials travel only in cookies: a successful signup or login sets both
//! `refresh_token` and `access_token`, refresh replaces `access_token`, and
//! logout expires both.

use axum::extract::State;
use axum::http::header::{SET_COOKIE, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{AppendHeaders, IntoResponse};
use axum::Json;
use keystone_core::error::CoreError;
use keystone_db::models::user::CreateUser;
use keystone_db::repositories::UserRepo;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::auth::cookies::{
    access_cookie, expired_cookie, get_cookie, refresh_cookie, ACCESS_COOKIE, REFRESH_COOKIE,
};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::session::IssuedSession;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::PendingUser;
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;

/// `Path` attribute of the `access_token` cookie.
const ACCESS_COOKIE_PATH: &str = "/";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/signup`.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(
        length(min = 1, max = 32),
        custom(function = "alphanumeric_display_name")
    )]
    pub display_name: String,
    #[validate(email, length(max = 320))]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email, length(max = 320))]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Body of `GET /auth/verify/status`.
#[derive(Debug, Serialize)]
pub struct VerificationStatus {
    pub pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Display names are letters and digits from any script.
fn alphanumeric_display_name(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(char::is_alphanumeric) {
        Ok(())
    } else {
        Err(ValidationError::new("alphanumeric"))
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v{VERSION}/auth/signup
///
/// Create an account and sign it in. Email and display name must be unused.
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<SignupRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    if UserRepo::find_by_email(&state.pool, &input.email).await?.is_some() {
        return Err(AppError::Core(CoreError::Conflict(
            "Email is already in use".into(),
        )));
    }
    if UserRepo::find_by_display_name(&state.pool, &input.display_name)
        .await?
        .is_some()
    {
        return Err(AppError::Core(CoreError::Conflict(
            "Display name is already in use".into(),
        )));
    }

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            id: state.ids.next_id(),
            display_name: input.display_name,
            email: input.email,
            password_hash,
        },
    )
    .await?;
    tracing::info!(user_id = user.id, "User signed up");

    let issued = state
        .sessions
        .issue_session(user.id, user_agent(&headers))
        .await?;

    Ok((
        AppendHeaders(session_cookies(&state, &issued)?),
        Json(MessageResponse {
            message: "Signup successful",
        }),
    ))
}

/// POST /api/v{VERSION}/auth/login
///
/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let invalid = || AppError::Core(CoreError::Unauthorized("Invalid email or password".into()));

    let user = UserRepo::find_by_email(&state.pool, &input.email)
        .await?
        .ok_or_else(invalid)?;

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        tracing::debug!(user_id = user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    let issued = state
        .sessions
        .issue_session(user.id, user_agent(&headers))
        .await?;

    Ok((
        AppendHeaders(session_cookies(&state, &issued)?),
        Json(MessageResponse {
            message: "Login successful",
        }),
    ))
}

/// POST /api/v{VERSION}/auth/refresh
///
/// Exchange the `refresh_token` cookie for a new `access_token` cookie.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let secret = get_cookie(&headers, REFRESH_COOKIE)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Refresh token missing".into())))?;

    let issued = state.sessions.refresh_access(&secret).await?;
    let cookie = access_cookie(
        &issued.access_token,
        state.config.jwt.access_token_expiry_mins,
        ACCESS_COOKIE_PATH,
    )
    .map_err(cookie_error)?;

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(MessageResponse {
            message: "Access token refreshed",
        }),
    ))
}

/// POST /api/v{VERSION}/auth/logout
///
/// Delete the session behind the `refresh_token` cookie (if any) and expire
/// both cookies. Always 204.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    if let Some(secret) = get_cookie(&headers, REFRESH_COOKIE).filter(|s| !s.is_empty()) {
        state.sessions.revoke(&secret).await?;
    }

    let cookies = [
        (SET_COOKIE, expired_cookie(REFRESH_COOKIE, None).map_err(cookie_error)?),
        (
            SET_COOKIE,
            expired_cookie(ACCESS_COOKIE, Some(ACCESS_COOKIE_PATH)).map_err(cookie_error)?,
        ),
    ];
    Ok((StatusCode::NO_CONTENT, AppendHeaders(cookies)))
}

/// GET /api/v{VERSION}/auth/verify/status
pub async fn verification_status(PendingUser(pending): PendingUser) -> impl IntoResponse {
    Json(DataResponse {
        data: VerificationStatus {
            pending: pending.is_some(),
            user_id: pending.map(|id| id.to_string()),
        },
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers.get(USER_AGENT).and_then(|v| v.to_str().ok())
}

/// Both `Set-Cookie` headers for a freshly issued session.
fn session_cookies(
    state: &AppState,
    issued: &IssuedSession,
) -> AppResult<[(HeaderName, HeaderValue); 2]> {
    let jwt = &state.config.jwt;
    let refresh = refresh_cookie(
        &issued.refresh_secret,
        jwt.refresh_token_expiry_days,
        state.config.secure_cookies(),
    )
    .map_err(cookie_error)?;
    let access = access_cookie(
        &issued.access_token,
        jwt.access_token_expiry_mins,
        ACCESS_COOKIE_PATH,
    )
    .map_err(cookie_error)?;

    Ok([(SET_COOKIE, refresh), (SET_COOKIE, access)])
}

fn cookie_error(err: axum::http::header::InvalidHeaderValue) -> AppError {
    AppError::InternalError(format!("Cookie encoding error: {err}"))
}
