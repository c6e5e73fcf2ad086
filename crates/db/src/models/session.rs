//! Session model and DTOs.

use sqlx::FromRow;
use keystone_core::types::{DbId, Timestamp};

/// A session row from the `sessions` table.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub session_id: DbId,
    pub secret_key: String,
    pub user_id: DbId,
    pub user_agent: Option<String>,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
}

impl Session {
    /// A session is dead from its `expires_at` instant onwards.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// DTO for inserting a new session. The id is issued by the caller.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_id: DbId,
    pub secret_key: String,
    pub user_id: DbId,
    pub user_agent: Option<String>,
    pub expires_at: Timestamp,
}
