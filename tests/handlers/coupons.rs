//! Coupon administration, validation and redemption

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::*;

struct Fixture {
    app: axum::Router,
    state: AppState,
    admin_token: String,
    owner: Business,
    owner_token: String,
}

fn fixture() -> Fixture {
    let (app, state) = test_app();
    let (admin, owner) = {
        let conn = state.db.get().unwrap();
        let admin = create_test_business(&conn, "admin@example.com");
        assert!(queries::set_admin_by_email(&conn, "ADMIN@example.com").unwrap());
        let owner = create_test_business(&conn, "owner@example.com");
        (admin, owner)
    };
    let admin_token = session_token(&state, &admin);
    let owner_token = session_token(&state, &owner);
    Fixture {
        app,
        state,
        admin_token,
        owner,
        owner_token,
    }
}

async fn create_coupon(f: &Fixture, code: &str, coupon_type: &str, value: i64, max_uses: Option<i64>) -> String {
    let (status, body) = send_json(
        &f.app,
        "POST",
        "/admin/coupons",
        Some(&f.admin_token),
        Some(json!({ "code": code, "coupon_type": coupon_type, "value": value, "max_uses": max_uses })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create coupon failed: {}", body);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let f = fixture();

    let (status, _) = send_json(&f.app, "GET", "/admin/coupons", Some(&f.owner_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send_json(&f.app, "GET", "/admin/coupons", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_json(&f.app, "GET", "/admin/coupons", Some(&f.admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_coupon_codes_are_normalized_and_unique() {
    let f = fixture();
    create_coupon(&f, "welcome10", "trial", 10, None).await;

    let (status, _) = send_json(
        &f.app,
        "POST",
        "/admin/coupons",
        Some(&f.admin_token),
        Some(json!({ "code": "WELCOME10", "coupon_type": "discount", "value": 20 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send_json(
        &f.app,
        "POST",
        "/admin/coupons",
        Some(&f.admin_token),
        Some(json!({ "code": "HALFOFF", "coupon_type": "discount", "value": 150 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_trial_coupon_grants_reviews_once() {
    let f = fixture();
    create_coupon(&f, "FREEREVIEWS", "trial", 25, None).await;

    let (status, body) = send_json(
        &f.app,
        "POST",
        "/coupons/validate",
        Some(&f.owner_token),
        Some(json!({ "code": "freereviews" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let (status, body) = send_json(
        &f.app,
        "POST",
        "/coupons/redeem",
        Some(&f.owner_token),
        Some(json!({ "code": "FREEREVIEWS" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["business"]["subscription_status"], "trial");
    assert_eq!(body["business"]["trial_reviews_remaining"], 25);
    assert_eq!(body["coupon"]["times_used"], 1);

    let (status, _) = send_json(
        &f.app,
        "POST",
        "/coupons/redeem",
        Some(&f.owner_token),
        Some(json!({ "code": "FREEREVIEWS" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send_json(
        &f.app,
        "POST",
        "/coupons/validate",
        Some(&f.owner_token),
        Some(json!({ "code": "FREEREVIEWS" })),
    )
    .await;
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn test_exhausted_coupon_is_refused() {
    let f = fixture();
    create_coupon(&f, "ONLYONE", "trial", 5, Some(1)).await;

    let second_owner = {
        let conn = f.state.db.get().unwrap();
        create_test_business(&conn, "second@example.com")
    };
    let second_token = session_token(&f.state, &second_owner);

    let (status, _) = send_json(
        &f.app,
        "POST",
        "/coupons/redeem",
        Some(&f.owner_token),
        Some(json!({ "code": "ONLYONE" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(
        &f.app,
        "POST",
        "/coupons/redeem",
        Some(&second_token),
        Some(json!({ "code": "ONLYONE" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let conn = f.state.db.get().unwrap();
    assert_eq!(get_business(&conn, &second_owner.id).trial_reviews_remaining, 0);
    assert_eq!(count_rows(&conn, "coupon_redemptions"), 1);
}

#[tokio::test]
async fn test_deactivated_coupon_cannot_be_redeemed() {
    let f = fixture();
    let id = create_coupon(&f, "SPRING", "trial", 5, None).await;

    let (status, body) = send_json(
        &f.app,
        "POST",
        &format!("/admin/coupons/{}/deactivate", id),
        Some(&f.admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (status, _) = send_json(
        &f.app,
        "POST",
        "/admin/coupons/SPRING/deactivate",
        Some(&f.admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(
        &f.app,
        "POST",
        "/coupons/redeem",
        Some(&f.owner_token),
        Some(json!({ "code": "SPRING" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let conn = f.state.db.get().unwrap();
    assert_eq!(get_business(&conn, &f.owner.id).subscription_status, BusinessStatus::Pending);
}

#[tokio::test]
async fn test_trial_coupon_refused_on_paid_plan() {
    let f = fixture();
    create_coupon(&f, "MORETRIAL", "trial", 5, None).await;
    {
        let conn = f.state.db.get().unwrap();
        set_business_status(&conn, &f.owner.id, BusinessStatus::Active);
    }

    let (status, _) = send_json(
        &f.app,
        "POST",
        "/coupons/redeem",
        Some(&f.owner_token),
        Some(json!({ "code": "MORETRIAL" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let conn = f.state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "coupon_redemptions"), 0, "refused redemption must roll back");
}

#[tokio::test]
async fn test_discount_coupon_is_not_redeemed_directly() {
    let f = fixture();
    create_coupon(&f, "SAVE20", "discount", 20, None).await;

    let (status, body) = send_json(
        &f.app,
        "POST",
        "/coupons/redeem",
        Some(&f.owner_token),
        Some(json!({ "code": "SAVE20" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], "Discount coupons are applied at checkout");

    // Still usable for the checkout it belongs to
    let (status, body) = send_json(
        &f.app,
        "POST",
        "/coupons/validate",
        Some(&f.owner_token),
        Some(json!({ "code": "SAVE20" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["coupon_type"], "discount");

    let conn = f.state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "coupon_redemptions"), 0);
    let coupon = queries::get_coupon_by_code(&conn, "SAVE20").unwrap().unwrap();
    assert_eq!(coupon.times_used, 0);
}
