//! Repository for the `sessions` table.

use sqlx::PgPool;

use crate::models::session::{NewSession, Session};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "session_id, secret_key, user_id, user_agent, expires_at, created_at";

/// Provides CRUD operations for sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session, returning the created row.
    pub async fn create(pool: &PgPool, input: &NewSession) -> Result<Session, sqlx::Error> {
        let query = format!(
            "INSERT INTO sessions (session_id, secret_key, user_id, user_agent, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(input.session_id)
            .bind(&input.secret_key)
            .bind(input.user_id)
            .bind(&input.user_agent)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Find a session by its secret, expired or not.
    ///
    /// Expired rows still occupy their secret, so collision checks must see them.
    pub async fn find_by_secret(pool: &PgPool, secret: &str) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE secret_key = $1");
        sqlx::query_as::<_, Session>(&query)
            .bind(secret)
            .fetch_optional(pool)
            .await
    }

    /// Delete a session by its secret. Returns `true` if a row was removed.
    pub async fn delete_by_secret(pool: &PgPool, secret: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE secret_key = $1")
            .bind(secret)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete expired sessions. Returns the count of deleted rows.
    pub async fn cleanup_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
