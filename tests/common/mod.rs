//! Test utilities and fixtures for GoldStar integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use rusqlite::Connection;
use serde_json::Value;
use tower::ServiceExt;

// Re-export the main library crate
pub use goldstar::config::{RateLimitConfig, StripeSettings};
pub use goldstar::db::{AppState, DbPool, create_pool, init_db, queries};
pub use goldstar::email::EmailService;
pub use goldstar::handlers;
pub use goldstar::jwt::{SessionClaims, SessionKeys};
pub use goldstar::models::*;
pub use goldstar::payments::StripeClient;

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .expect("Failed to enable foreign keys");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a test business with a placeholder password hash
pub fn create_test_business(conn: &Connection, email: &str) -> Business {
    let input = CreateBusiness {
        email: email.to_string(),
        password_hash: "unused".to_string(),
        business_name: format!("Business {}", email),
        owner_name: Some("Test Owner".to_string()),
    };
    queries::create_business(conn, &input).expect("Failed to create test business")
}

/// Create a business referred by `referrer_id`
pub fn create_referred_business(conn: &Connection, email: &str, referrer_id: &str) -> Business {
    let business = create_test_business(conn, email);
    assert!(
        goldstar::referrals::register_referral(conn, referrer_id, &business.id)
            .expect("Failed to register referral"),
        "referral edge should be created"
    );
    business
}

/// Force a business into a status, bypassing the state tracker (fixture only)
pub fn set_business_status(conn: &Connection, business_id: &str, status: BusinessStatus) {
    conn.execute(
        "UPDATE businesses SET subscription_status = ?2 WHERE id = ?1",
        rusqlite::params![business_id, status.as_ref()],
    )
    .expect("Failed to set business status");
}

pub fn get_business(conn: &Connection, business_id: &str) -> Business {
    queries::get_business_by_id(conn, business_id)
        .expect("Failed to load business")
        .expect("Business should exist")
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .expect("Failed to count rows")
}

/// Get the current timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Get a future timestamp (days from now)
pub fn future_timestamp(days: i64) -> i64 {
    now() + (days * 86400)
}

/// Get a past timestamp (days ago)
pub fn past_timestamp(days: i64) -> i64 {
    now() - (days * 86400)
}

/// A unique on-disk database path for tests that need several real connections.
pub fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("goldstar_test_{}.db", uuid::Uuid::new_v4().simple()))
}

pub fn remove_db_files(path: &PathBuf) {
    let base = path.display().to_string();
    let _ = std::fs::remove_file(&base);
    let _ = std::fs::remove_file(format!("{}-wal", base));
    let _ = std::fs::remove_file(format!("{}-shm", base));
}

/// Stripe client pointed at a closed port: API calls fail fast, signature checks work.
pub fn test_stripe_client() -> StripeClient {
    let settings = StripeSettings {
        secret_key: "sk_test_xxx".to_string(),
        webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
        price_id: Some("price_test".to_string()),
    };
    StripeClient::with_api_base(&settings, "http://127.0.0.1:9")
}

/// Create an AppState backed by a shared-cache in-memory database
pub fn create_test_app_state() -> AppState {
    let uri = format!(
        "file:goldstar_test_{}?mode=memory&cache=shared",
        uuid::Uuid::new_v4().simple()
    );
    let pool = create_pool(&uri).expect("Failed to create pool");
    {
        let conn = pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize schema");
    }

    AppState {
        db: pool,
        session_keys: SessionKeys::from_secret(b"test-session-secret-at-least-32-bytes!"),
        stripe: Some(test_stripe_client()),
        email: Arc::new(EmailService::disabled()),
        frontend_url: "http://localhost:5173".to_string(),
        stripe_price_id: Some("price_test".to_string()),
    }
}

/// Url id of the business's default review page, issued on first call
pub fn review_page_id(state: &AppState, business_id: &str) -> String {
    let conn = state.db.get().expect("Failed to get connection");
    goldstar::qr_codes::get_or_create(&conn, business_id, goldstar::qr_codes::DEFAULT_QR_TYPE)
        .expect("Failed to issue review page")
        .url_id
}

/// Full router without rate limiting
pub fn test_app() -> (Router, AppState) {
    let state = create_test_app_state();
    let app = handlers::router(state.clone(), RateLimitConfig::disabled());
    (app, state)
}

pub fn session_token(state: &AppState, business: &Business) -> String {
    state
        .session_keys
        .issue(SessionClaims::from(business))
        .expect("Failed to issue session token")
}

/// Send a request and return the status with the raw body text.
pub async fn send_raw(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

/// Send a request and parse the response body as JSON (Null when empty).
pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, text) = send_raw(app, method, uri, token, body).await;
    let json = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    (status, json)
}

/// Build a `stripe-signature` header value for `payload` signed at `timestamp`.
pub fn stripe_signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signed_payload.as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

/// POST a signed Stripe event to the webhook endpoint.
pub async fn post_stripe_event(app: &Router, event: &Value, secret: &str) -> (StatusCode, String) {
    let payload = serde_json::to_vec(event).unwrap();
    let signature = stripe_signature_header(&payload, secret, now());

    let request = Request::builder()
        .method("POST")
        .uri("/webhook/stripe")
        .header("stripe-signature", signature)
        .header("content-type", "application/json")
        .body(Body::from(payload))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}
