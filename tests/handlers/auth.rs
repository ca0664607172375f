//! Signup, login, email verification and password reset

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::*;
use goldstar::crypto::{generate_token, hash_password, hash_token};

const PASSWORD: &str = "correct horse battery";

fn signup_body(email: &str, referral_code: Option<&str>) -> Value {
    json!({
        "email": email,
        "password": PASSWORD,
        "business_name": "Corner Bakery",
        "owner_name": "Sam",
        "referral_code": referral_code,
    })
}

/// Business with a real password hash so it can log in.
fn create_login_business(state: &AppState, email: &str) -> Business {
    let conn = state.db.get().unwrap();
    queries::create_business(
        &conn,
        &CreateBusiness {
            email: email.to_string(),
            password_hash: hash_password(PASSWORD).unwrap(),
            business_name: "Corner Bakery".to_string(),
            owner_name: None,
        },
    )
    .unwrap()
}

/// Store a token the way the email flows do and return the plaintext.
fn store_token(state: &AppState, business_id: &str, purpose: TokenPurpose) -> String {
    let conn = state.db.get().unwrap();
    let token = generate_token();
    queries::create_verification_token(&conn, &hash_token(&token), business_id, purpose).unwrap();
    token
}

#[tokio::test]
async fn test_signup_returns_session() {
    let (app, state) = test_app();

    let (status, body) =
        send_json(&app, "POST", "/auth/signup", None, Some(signup_body("Owner@Example.com", None))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["business"]["email"], "owner@example.com");
    assert_eq!(body["business"]["subscription_status"], "pending");
    assert!(body["business"].get("password_hash").is_none());

    let conn = state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "verification_tokens"), 1);
}

#[tokio::test]
async fn test_signup_with_referral_code_registers_referrer() {
    let (app, state) = test_app();
    let (referrer, code) = {
        let conn = state.db.get().unwrap();
        let referrer = create_test_business(&conn, "referrer@example.com");
        let code = goldstar::referrals::get_or_create_referral_code(&conn, &referrer.id).unwrap();
        (referrer, code)
    };

    let (status, body) =
        send_json(&app, "POST", "/auth/signup", None, Some(signup_body("new@example.com", Some(&code)))).await;
    assert_eq!(status, StatusCode::CREATED);

    let id = body["business"]["id"].as_str().unwrap();
    let conn = state.db.get().unwrap();
    let referral = queries::get_referral_by_referred(&conn, id).unwrap().unwrap();
    assert_eq!(referral.referrer_id, referrer.id);
    assert_eq!(referral.status, ReferralStatus::Pending);
}

#[tokio::test]
async fn test_signup_with_unknown_referral_code_creates_nothing() {
    let (app, state) = test_app();

    let (status, _) =
        send_json(&app, "POST", "/auth/signup", None, Some(signup_body("new@example.com", Some("NOPE1234")))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let conn = state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "businesses"), 0);
    assert_eq!(count_rows(&conn, "referrals"), 0);
}

#[tokio::test]
async fn test_signup_rejects_duplicate_email_and_bad_input() {
    let (app, _state) = test_app();

    let (status, _) =
        send_json(&app, "POST", "/auth/signup", None, Some(signup_body("owner@example.com", None))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) =
        send_json(&app, "POST", "/auth/signup", None, Some(signup_body("OWNER@example.com", None))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) =
        send_json(&app, "POST", "/auth/signup", None, Some(signup_body("not-an-email", None))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut short = signup_body("short@example.com", None);
    short["password"] = json!("short");
    let (status, _) = send_json(&app, "POST", "/auth/signup", None, Some(short)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login() {
    let (app, state) = test_app();
    create_login_business(&state, "owner@example.com");

    let (status, body) = send_json(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "owner@example.com", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, me) = send_json(&app, "GET", "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "owner@example.com");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let (app, state) = test_app();
    create_login_business(&state, "owner@example.com");

    let (wrong_password, body_a) = send_json(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "owner@example.com", "password": "wrong password" })),
    )
    .await;
    let (unknown_email, body_b) = send_json(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": PASSWORD })),
    )
    .await;

    assert_eq!(wrong_password, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email, StatusCode::UNAUTHORIZED);
    assert_eq!(body_a, body_b);
}

#[tokio::test]
async fn test_session_routes_require_valid_token() {
    let (app, _state) = test_app();

    let (status, _) = send_json(&app, "GET", "/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_json(&app, "GET", "/me", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Token signed with a different key
    let other = SessionKeys::from_secret(b"some-other-secret-of-sufficient-length");
    let conn_state = create_test_app_state();
    let business = {
        let conn = conn_state.db.get().unwrap();
        create_test_business(&conn, "owner@example.com")
    };
    let forged = other.issue(SessionClaims::from(&business)).unwrap();
    let (status, _) = send_json(&app, "GET", "/me", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_email_verification_token_is_single_use() {
    let (app, state) = test_app();
    let business = {
        let conn = state.db.get().unwrap();
        create_test_business(&conn, "owner@example.com")
    };
    let token = store_token(&state, &business.id, TokenPurpose::EmailVerification);

    let (status, _) =
        send_json(&app, "POST", "/auth/verify-email", None, Some(json!({ "token": token }))).await;
    assert_eq!(status, StatusCode::OK);
    {
        let conn = state.db.get().unwrap();
        assert!(get_business(&conn, &business.id).email_verified);
    }

    let (status, _) =
        send_json(&app, "POST", "/auth/verify-email", None, Some(json!({ "token": token }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_for_another_purpose_is_rejected() {
    let (app, state) = test_app();
    let business = {
        let conn = state.db.get().unwrap();
        create_test_business(&conn, "owner@example.com")
    };
    let token = store_token(&state, &business.id, TokenPurpose::PasswordReset);

    let (status, _) =
        send_json(&app, "POST", "/auth/verify-email", None, Some(json!({ "token": token }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let (app, state) = test_app();
    let business = create_login_business(&state, "owner@example.com");

    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/forgot-password",
        None,
        Some(json!({ "email": "nobody@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "unknown emails must not be revealed");

    let token = store_token(&state, &business.id, TokenPurpose::PasswordReset);
    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/reset-password",
        None,
        Some(json!({ "token": token, "password": "a brand new password" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "owner@example.com", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "owner@example.com", "password": "a brand new password" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
