//! Session storage seam.
//!
//! The session manager only needs three operations on stored sessions, so it
//! talks to a [`SessionStore`] trait object instead of the pool directly.
//! [`PgSessionStore`] is the production implementation; [`MemorySessionStore`]
//! keeps rows in process for tests and database-less local runs.
//!
//! "Not found" is always `Ok(None)` / `Ok(false)`, never an error.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::session::{NewSession, Session};
use crate::repositories::SessionRepo;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session. Fails if the secret is already taken.
    async fn create(&self, session: &NewSession) -> Result<Session, sqlx::Error>;

    /// Look a session up by its secret.
    async fn find_by_secret(&self, secret: &str) -> Result<Option<Session>, sqlx::Error>;

    /// Remove a session by its secret. Returns `true` if one existed.
    async fn delete_by_secret(&self, secret: &str) -> Result<bool, sqlx::Error>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

/// [`SessionStore`] backed by the `sessions` table.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: &NewSession) -> Result<Session, sqlx::Error> {
        SessionRepo::create(&self.pool, session).await
    }

    async fn find_by_secret(&self, secret: &str) -> Result<Option<Session>, sqlx::Error> {
        SessionRepo::find_by_secret(&self.pool, secret).await
    }

    async fn delete_by_secret(&self, secret: &str) -> Result<bool, sqlx::Error> {
        SessionRepo::delete_by_secret(&self.pool, secret).await
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// [`SessionStore`] that keeps sessions in a process-local map keyed by secret.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of every stored session.
    pub fn all(&self) -> Vec<Session> {
        self.lock().values().cloned().collect()
    }

    /// Insert a fully-formed row, bypassing uniqueness checks on other fields.
    pub fn insert(&self, session: Session) {
        self.lock().insert(session.secret_key.clone(), session);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, input: &NewSession) -> Result<Session, sqlx::Error> {
        let mut sessions = self.lock();
        if sessions.contains_key(&input.secret_key) {
            return Err(sqlx::Error::Protocol(
                "duplicate key value violates unique constraint \"uq_sessions_secret_key\"".into(),
            ));
        }

        let session = Session {
            session_id: input.session_id,
            secret_key: input.secret_key.clone(),
            user_id: input.user_id,
            user_agent: input.user_agent.clone(),
            expires_at: input.expires_at,
            created_at: chrono::Utc::now(),
        };
        sessions.insert(session.secret_key.clone(), session.clone());
        Ok(session)
    }

    async fn find_by_secret(&self, secret: &str) -> Result<Option<Session>, sqlx::Error> {
        Ok(self.lock().get(secret).cloned())
    }

    async fn delete_by_secret(&self, secret: &str) -> Result<bool, sqlx::Error> {
        Ok(self.lock().remove(secret).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session(secret: &str) -> NewSession {
        NewSession {
            session_id: 1,
            secret_key: secret.to_string(),
            user_id: 42,
            user_agent: Some("test".into()),
            expires_at: chrono::Utc::now() + chrono::Duration::days(7),
        }
    }

    #[tokio::test]
    async fn create_then_find() {
        let store = MemorySessionStore::new();
        store.create(&new_session("abc")).await.unwrap();

        let found = store.find_by_secret("abc").await.unwrap().expect("session should exist");
        assert_eq!(found.user_id, 42);
        assert_eq!(found.user_agent.as_deref(), Some("test"));
        assert!(store.find_by_secret("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_secret_is_rejected() {
        let store = MemorySessionStore::new();
        store.create(&new_session("abc")).await.unwrap();
        assert!(store.create(&new_session("abc")).await.is_err());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = MemorySessionStore::new();
        store.create(&new_session("abc")).await.unwrap();

        assert!(store.delete_by_secret("abc").await.unwrap());
        assert!(!store.delete_by_secret("abc").await.unwrap());
        assert!(store.is_empty());
    }
}
