//! Profile, dashboard, referral endpoints, payout details and admin suspension

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::*;
use goldstar::commission::record_commission;

fn seed(state: &AppState, email: &str) -> (Business, String) {
    let conn = state.db.get().unwrap();
    let business = create_test_business(&conn, email);
    let token = session_token(state, &business);
    (business, token)
}

#[tokio::test]
async fn test_health() {
    let (app, _state) = test_app();
    let (status, body) = send_json(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_profile_update_and_onboarding() {
    let (app, state) = test_app();
    let (_business, token) = seed(&state, "owner@example.com");

    let (status, body) = send_json(
        &app,
        "PUT",
        "/me",
        Some(&token),
        Some(json!({ "phone": "555-0100", "google_review_link": "https://g.page/r/abc/review" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone"], "555-0100");
    assert_eq!(body["google_review_link"], "https://g.page/r/abc/review");

    let (status, _) = send_json(
        &app,
        "PUT",
        "/me",
        Some(&token),
        Some(json!({ "google_review_link": "http://insecure.example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_json(&app, "PUT", "/me", Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone"], "555-0100");

    let (status, body) = send_json(&app, "POST", "/me/onboarding/complete", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["onboarding_completed"], true);
}

#[tokio::test]
async fn test_dashboard_counts_reviews() {
    let (app, state) = test_app();
    let (business, token) = seed(&state, "owner@example.com");
    {
        let conn = state.db.get().unwrap();
        set_business_status(&conn, &business.id, BusinessStatus::Active);
    }
    for rating in [5, 5, 2] {
        send_json(
            &app,
            "POST",
            &format!("/public/review/{}/reviews", review_page_id(&state, &business.id)),
            None,
            Some(json!({ "rating": rating })),
        )
        .await;
    }

    let (status, body) = send_json(&app, "GET", "/me/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total"], 3);
    assert_eq!(body["stats"]["positive"], 2);
    assert_eq!(body["stats"]["negative"], 1);
    assert_eq!(body["recent_reviews"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_referral_endpoints() {
    let (app, state) = test_app();
    let (referrer, token) = seed(&state, "referrer@example.com");

    let (status, body) = send_json(&app, "GET", "/referrals/link", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let code = body["code"].as_str().unwrap().to_string();
    assert_eq!(
        body["link"].as_str().unwrap(),
        format!("http://localhost:5173/signup?ref={}", code)
    );

    let (_, body) = send_json(&app, "GET", "/referrals/code", Some(&token), None).await;
    assert_eq!(body["code"], code.as_str());

    {
        let mut conn = state.db.get().unwrap();
        let referred = create_referred_business(&conn, "referred@example.com", &referrer.id);
        record_commission(&mut conn, &referred.id, 4900, now()).unwrap();
    }

    let (status, body) = send_json(&app, "GET", "/referrals", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total_referrals"], 1);
    assert_eq!(body["stats"]["total_earnings_cents"], 980);

    let (status, body) = send_json(&app, "GET", "/referrals/earnings?limit=10", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["amount_cents"], 980);
    assert_eq!(body["items"][0]["status"], "pending");
}

#[tokio::test]
async fn test_bank_details_are_validated_and_masked() {
    let (app, state) = test_app();
    let (_business, token) = seed(&state, "owner@example.com");

    let (status, body) = send_json(&app, "GET", "/bank-details", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());

    let (status, _) = send_json(
        &app,
        "PUT",
        "/bank-details",
        Some(&token),
        Some(json!({
            "account_holder": "Corner Bakery Inc.",
            "transit_number": "1234",
            "institution_number": "001",
            "account_number": "1234567",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_json(
        &app,
        "PUT",
        "/bank-details",
        Some(&token),
        Some(json!({
            "account_holder": "Corner Bakery Inc.",
            "transit_number": "12345",
            "institution_number": "001",
            "account_number": "123456789",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account_number"], "*****6789");

    let (_, body) = send_json(&app, "GET", "/bank-details", Some(&token), None).await;
    assert_eq!(body["transit_number"], "12345");
    assert_eq!(body["account_number"], "*****6789");
}

#[tokio::test]
async fn test_admin_suspension_ends_access() {
    let (app, state) = test_app();
    let admin_token = {
        let conn = state.db.get().unwrap();
        let admin = create_test_business(&conn, "admin@example.com");
        queries::set_admin_by_email(&conn, &admin.email).unwrap();
        session_token(&state, &admin)
    };
    let (owner, owner_token) = seed(&state, "owner@example.com");
    {
        let conn = state.db.get().unwrap();
        set_business_status(&conn, &owner.id, BusinessStatus::Active);
    }

    let (status, body) = send_json(&app, "GET", "/admin/businesses", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/admin/businesses/{}/suspend", owner.id),
        Some(&owner_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send_json(
        &app,
        "POST",
        "/admin/businesses/gs_biz_not-a-business/suspend",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["details"], "Business not found");

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/admin/businesses/{}/suspend", owner.id),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscription_status"], "cancelled");

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/public/review/{}/reviews", review_page_id(&state, &owner.id)),
        None,
        Some(json!({ "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["subscription_ended"], true);
}
