//! User entity model and DTOs.

use sqlx::FromRow;
use keystone_core::types::{DbId, Timestamp};

/// Full user row from the `users` table.
///
/// Contains the password hash -- never serialize this to API responses.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub avatar: Option<String>,
    pub display_name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new user. The id is issued by the caller.
#[derive(Debug)]
pub struct CreateUser {
    pub id: DbId,
    pub display_name: String,
    pub email: String,
    pub password_hash: String,
}
