//! Cookie-based authorization extractors for Axum handlers.
//!
//! Protected handlers take an [`AuthUser`] parameter. The extractor reads the
//! `access_token` cookie, verifies it, and either hands the user id to the
//! handler or short-circuits with 401 (403 while email verification is
//! pending).

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use keystone_core::error::CoreError;
use keystone_core::types::DbId;

use crate::auth::cookies::{get_cookie, ACCESS_COOKIE, PENDING_COOKIE};
use crate::auth::jwt::{TokenError, TokenSigner, PENDING_FLAG};
use crate::error::AppError;
use crate::state::AppState;

/// Why a request was turned away.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateRejection {
    #[error("access token cookie is missing or empty")]
    CredentialAbsent,

    #[error("access token rejected: {0}")]
    InvalidCredential(TokenError),

    #[error("access token subject is not a user id")]
    MalformedIdentity,

    #[error("email verification is pending")]
    VerificationRequired,
}

impl From<GateRejection> for AppError {
    fn from(rejection: GateRejection) -> Self {
        match rejection {
            GateRejection::VerificationRequired => AppError::Core(CoreError::Forbidden(
                "Email verification required".into(),
            )),
            _ => AppError::Core(CoreError::Unauthorized("Authentication required".into())),
        }
    }
}

/// Decide whether `token` grants access.
///
/// Pure over its inputs; the extractors below only add cookie lookup and logging.
pub fn authorize(token: Option<&str>, signer: &TokenSigner) -> Result<AuthUser, GateRejection> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or(GateRejection::CredentialAbsent)?;

    let claims = signer
        .verify(token)
        .map_err(GateRejection::InvalidCredential)?;

    let user_id = claims.subject().ok_or(GateRejection::MalformedIdentity)?;

    if claims.flag(PENDING_FLAG) {
        return Err(GateRejection::VerificationRequired);
    }

    Ok(AuthUser { user_id })
}

/// Identity carried by a pending-verification token, if any.
///
/// Never fails: anything short of a valid token with the pending flag is `None`.
pub fn pending_identity(token: Option<&str>, signer: &TokenSigner) -> Option<DbId> {
    let claims = signer.verify(token.filter(|t| !t.is_empty())?).ok()?;
    if !claims.flag(PENDING_FLAG) {
        return None;
    }
    claims.subject()
}

/// Authenticated user extracted from the `access_token` cookie.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    /// The user's internal database id (from the `sub` claim).
    pub user_id: DbId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookie = get_cookie(&parts.headers, ACCESS_COOKIE);

        authorize(cookie.as_deref(), &state.signer).map_err(|reason| {
            tracing::debug!(%reason, path = %parts.uri.path(), "Request rejected by auth gate");
            AppError::from(reason)
        })
    }
}

/// Optional pending-verification identity from the `verify_pedding` cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingUser(pub Option<DbId>);

impl FromRequestParts<AppState> for PendingUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookie = get_cookie(&parts.headers, PENDING_COOKIE);
        Ok(PendingUser(pending_identity(cookie.as_deref(), &state.signer)))
    }
}
