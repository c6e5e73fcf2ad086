//! Repository tests against a live database.
//!
//! Each test gets a fresh database from `#[sqlx::test]`; `DATABASE_URL` must
//! point at a Postgres server.

use chrono::{Duration, Utc};
use keystone_db::models::session::NewSession;
use keystone_db::models::user::{CreateUser, User};
use keystone_db::repositories::{SessionRepo, UserRepo};
use keystone_db::store::{PgSessionStore, SessionStore};
use sqlx::PgPool;

async fn create_user(pool: &PgPool, id: i64, name: &str) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            id,
            display_name: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "$argon2id$placeholder".to_string(),
        },
    )
    .await
    .expect("user creation should succeed")
}

fn new_session(session_id: i64, secret: &str, user_id: i64, expires_in: Duration) -> NewSession {
    NewSession {
        session_id,
        secret_key: secret.to_string(),
        user_id,
        user_agent: Some("test".to_string()),
        expires_at: Utc::now() + expires_in,
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn user_lookups(pool: PgPool) {
    let user = create_user(&pool, 1001, "alice").await;

    assert_eq!(UserRepo::find_by_id(&pool, 1001).await.unwrap().unwrap().email, user.email);
    assert!(UserRepo::find_by_email(&pool, "alice@example.com").await.unwrap().is_some());
    assert!(UserRepo::find_by_display_name(&pool, "alice").await.unwrap().is_some());
    assert!(UserRepo::find_by_email(&pool, "bob@example.com").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_email_violates_unique_constraint(pool: PgPool) {
    create_user(&pool, 1, "alice").await;
    let err = UserRepo::create(
        &pool,
        &CreateUser {
            id: 2,
            display_name: "other".into(),
            email: "alice@example.com".into(),
            password_hash: "x".into(),
        },
    )
    .await
    .unwrap_err();

    let db_err = err.as_database_error().expect("database error");
    assert_eq!(db_err.constraint(), Some("uq_users_email"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn session_store_round_trip(pool: PgPool) {
    create_user(&pool, 7, "carol").await;
    let store = PgSessionStore::new(pool.clone());

    store.create(&new_session(1, "secret-a", 7, Duration::days(7))).await.unwrap();
    let found = store.find_by_secret("secret-a").await.unwrap().unwrap();
    assert_eq!(found.user_id, 7);
    assert_eq!(found.user_agent.as_deref(), Some("test"));

    assert!(store.create(&new_session(2, "secret-a", 7, Duration::days(7))).await.is_err());

    assert!(store.delete_by_secret("secret-a").await.unwrap());
    assert!(store.find_by_secret("secret-a").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn cleanup_removes_only_expired_sessions(pool: PgPool) {
    create_user(&pool, 7, "dave").await;
    SessionRepo::create(&pool, &new_session(1, "live", 7, Duration::days(1))).await.unwrap();
    SessionRepo::create(&pool, &new_session(2, "stale", 7, -Duration::minutes(1))).await.unwrap();

    assert_eq!(SessionRepo::cleanup_expired(&pool).await.unwrap(), 1);
    assert!(SessionRepo::find_by_secret(&pool, "live").await.unwrap().is_some());
    assert!(SessionRepo::find_by_secret(&pool, "stale").await.unwrap().is_none());
}
