//! Session issuance, refresh, and revocation.
//!
//! A session is a pair of credentials: a long-lived opaque secret persisted in
//! the session store, and a short-lived access token that is never stored.
//! The secret is checked for collisions before the row is written, so a failed
//! issuance never leaves an orphan row behind.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use keystone_core::secret::{generate_secret, SecretError, SESSION_SECRET_LENGTH};
use keystone_core::snowflake::IdGenerator;
use keystone_core::types::{DbId, Timestamp};
use keystone_db::models::session::NewSession;
use keystone_db::store::SessionStore;

use crate::auth::jwt::{TokenError, TokenSigner};

/// Maximum stored length of a user agent string.
pub const MAX_USER_AGENT_LEN: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    RandomSource(#[from] SecretError),

    #[error("Session storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Session storage timed out after {0:?}")]
    StorageTimeout(Duration),

    #[error("Access token minting failed: {0}")]
    Token(#[from] TokenError),

    #[error("Refresh token is invalid or expired")]
    InvalidRefresh,

    #[error("Session lifetime is out of range")]
    LifetimeOverflow,
}

/// Lifetimes and deadlines applied to every issued session.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub refresh_token_expiry_days: i64,
    pub access_token_expiry_mins: i64,
    pub store_timeout: Duration,
}

/// Credentials produced by a successful login or signup.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session_id: DbId,
    pub refresh_secret: String,
    pub refresh_expires_at: Timestamp,
    pub access_token: String,
    pub access_expires_at: Timestamp,
}

/// A fresh access token minted from a refresh secret.
#[derive(Debug, Clone)]
pub struct IssuedAccess {
    pub user_id: DbId,
    pub access_token: String,
    pub access_expires_at: Timestamp,
}

/// Orchestrates secret generation, id allocation, storage, and token minting.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    ids: Arc<IdGenerator>,
    signer: Arc<TokenSigner>,
    policy: SessionPolicy,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        ids: Arc<IdGenerator>,
        signer: Arc<TokenSigner>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            store,
            ids,
            signer,
            policy,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Issue a new session for `user_id`.
    ///
    /// Regenerates the secret until the store reports it unused, persists the
    /// row, then mints an access token without flags. Any storage failure
    /// aborts the whole issuance.
    pub async fn issue_session(
        &self,
        user_id: DbId,
        user_agent: Option<&str>,
    ) -> Result<IssuedSession, SessionError> {
        let now = Utc::now();
        let refresh_expires_at =
            expiry_after(now, TimeDelta::try_days(self.policy.refresh_token_expiry_days))?;
        let access_expires_at =
            expiry_after(now, TimeDelta::try_minutes(self.policy.access_token_expiry_mins))?;

        let secret = loop {
            let candidate = generate_secret(SESSION_SECRET_LENGTH, true)?;
            let existing = self
                .bounded(self.store.find_by_secret(&candidate))
                .await?;
            match existing {
                None => break candidate,
                Some(_) => {
                    tracing::warn!(user_id, "Session secret collision, regenerating");
                }
            }
        };

        let session = NewSession {
            session_id: self.ids.next_id(),
            secret_key: secret,
            user_id,
            user_agent: user_agent.map(truncate_user_agent),
            expires_at: refresh_expires_at,
        };
        self.bounded(self.store.create(&session)).await?;

        let access_token = self.signer.mint(user_id, &[], access_expires_at)?;

        tracing::info!(user_id, session_id = session.session_id, "Session issued");

        Ok(IssuedSession {
            session_id: session.session_id,
            refresh_secret: session.secret_key,
            refresh_expires_at: session.expires_at,
            access_token,
            access_expires_at,
        })
    }

    /// Mint a new access token for the session identified by `secret`.
    ///
    /// Unknown and expired sessions are both [`SessionError::InvalidRefresh`].
    pub async fn refresh_access(&self, secret: &str) -> Result<IssuedAccess, SessionError> {
        let session = self
            .bounded(self.store.find_by_secret(secret))
            .await?
            .ok_or(SessionError::InvalidRefresh)?;

        let now = Utc::now();
        if session.is_expired_at(now) {
            tracing::debug!(session_id = session.session_id, "Refresh with expired session");
            return Err(SessionError::InvalidRefresh);
        }

        let access_expires_at =
            expiry_after(now, TimeDelta::try_minutes(self.policy.access_token_expiry_mins))?;
        let access_token = self.signer.mint(session.user_id, &[], access_expires_at)?;

        Ok(IssuedAccess {
            user_id: session.user_id,
            access_token,
            access_expires_at,
        })
    }

    /// Delete the session identified by `secret`. Returns `true` if it existed.
    pub async fn revoke(&self, secret: &str) -> Result<bool, SessionError> {
        let removed = self.bounded(self.store.delete_by_secret(secret)).await?;
        tracing::info!(removed, "Session revoked");
        Ok(removed)
    }

    /// Run a store call under the configured deadline.
    async fn bounded<T, F>(&self, call: F) -> Result<T, SessionError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.policy.store_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SessionError::StorageTimeout(self.policy.store_timeout)),
        }
    }
}

/// `now + delta`, or [`SessionError::LifetimeOverflow`] when either step leaves chrono's range.
fn expiry_after(now: Timestamp, delta: Option<TimeDelta>) -> Result<Timestamp, SessionError> {
    delta
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or(SessionError::LifetimeOverflow)
}

fn truncate_user_agent(agent: &str) -> String {
    agent.chars().take(MAX_USER_AGENT_LEN).collect()
}
