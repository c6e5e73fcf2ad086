//! HTTP-level tests for signup, login, and profile.
//!
//! Tests taking a `PgPool` run under `#[sqlx::test]` and need `DATABASE_URL`
//! pointing at a Postgres server.

mod common;

use axum::http::StatusCode;
use common::{body_json, cookie_value, get_with_cookie, post_json, set_cookies};
use serde_json::json;
use sqlx::PgPool;

fn signup_body(display_name: &str, email: &str) -> serde_json::Value {
    json!({
        "display_name": display_name,
        "email": email,
        "password": "correct-horse-battery",
    })
}

// ---------------------------------------------------------------------------
// Request validation (no database)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn signup_with_invalid_email_is_rejected() {
    let (app, _, store) = common::build_memory_app();
    let response = post_json(app, "/api/v1/auth/signup", signup_body("alice", "nope")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookies(&response).is_empty());
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert!(store.is_empty());
}

#[tokio::test]
async fn signup_with_short_password_is_rejected() {
    let (app, _, _) = common::build_memory_app();
    let body = json!({ "display_name": "alice", "email": "a@example.com", "password": "short" });
    let response = post_json(app, "/api/v1/auth/signup", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_with_invalid_email_is_rejected() {
    let (app, _, _) = common::build_memory_app();
    let body = json!({ "email": "not-an-email", "password": "password123" });
    let response = post_json(app, "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Database-backed flows
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn signup_sets_both_cookies_and_persists_session(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/auth/signup", signup_body("alice", "alice@example.com")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let refresh = cookie_value(&response, "refresh_token").expect("refresh cookie");
    let access = cookie_value(&response, "access_token").expect("access cookie");
    assert_eq!(refresh.len(), 1024);

    let claims = common::test_signer().verify(&access).unwrap();
    let user_id = claims.subject().unwrap();

    let session = keystone_db::repositories::SessionRepo::find_by_secret(&pool, &refresh)
        .await
        .unwrap()
        .expect("session row");
    assert_eq!(session.user_id, user_id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn signup_rejects_taken_email_and_display_name(pool: PgPool) {
    let app = common::build_test_app(pool);
    let first = post_json(app.clone(), "/api/v1/auth/signup", signup_body("alice", "alice@example.com")).await;
    assert_eq!(first.status(), StatusCode::OK);

    let same_email =
        post_json(app.clone(), "/api/v1/auth/signup", signup_body("bob", "alice@example.com")).await;
    assert_eq!(same_email.status(), StatusCode::CONFLICT);

    let same_name =
        post_json(app, "/api/v1/auth/signup", signup_body("alice", "other@example.com")).await;
    assert_eq!(same_name.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn login_then_profile(pool: PgPool) {
    let app = common::build_test_app(pool);
    let signup =
        post_json(app.clone(), "/api/v1/auth/signup", signup_body("carol", "carol@example.com")).await;
    assert_eq!(signup.status(), StatusCode::OK);

    let body = json!({ "email": "carol@example.com", "password": "correct-horse-battery" });
    let login = post_json(app.clone(), "/api/v1/auth/login", body).await;
    assert_eq!(login.status(), StatusCode::OK);
    let access = cookie_value(&login, "access_token").unwrap();

    let response =
        get_with_cookie(app, "/api/v1/user/profile", &format!("access_token={access}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["display_name"], "carol");
    assert_eq!(json["data"]["email"], "carol@example.com");
    assert!(json["data"]["id"].is_string());
    assert!(json["data"].get("password_hash").is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn login_failures_are_indistinguishable(pool: PgPool) {
    let app = common::build_test_app(pool);
    post_json(app.clone(), "/api/v1/auth/signup", signup_body("dave", "dave@example.com")).await;

    let wrong_password = post_json(
        app.clone(),
        "/api/v1/auth/login",
        json!({ "email": "dave@example.com", "password": "wrong-password" }),
    )
    .await;
    let unknown_email = post_json(
        app,
        "/api/v1/auth/login",
        json!({ "email": "ghost@example.com", "password": "wrong-password" }),
    )
    .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&wrong_password).is_empty());
    assert_eq!(body_json(wrong_password).await, body_json(unknown_email).await);
}
