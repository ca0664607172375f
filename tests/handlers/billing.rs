//! Billing status, trial start and local checks before any Stripe call

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::*;
use goldstar::subscription_state::{self, CheckoutCompleted, TRIAL_REVIEWS};

fn seed(state: &AppState) -> (Business, String) {
    let conn = state.db.get().unwrap();
    let business = create_test_business(&conn, "owner@example.com");
    let token = session_token(state, &business);
    (business, token)
}

#[tokio::test]
async fn test_new_business_has_no_access() {
    let (app, state) = test_app();
    let (_business, token) = seed(&state);

    let (status, body) = send_json(&app, "GET", "/billing/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["is_subscribed"], false);
    assert_eq!(body["has_access"], false);
}

#[tokio::test]
async fn test_trial_starts_once() {
    let (app, state) = test_app();
    let (_business, token) = seed(&state);

    let (status, body) = send_json(&app, "POST", "/billing/trial", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "trial");
    assert_eq!(body["has_access"], true);
    assert_eq!(body["trial_reviews_left"], TRIAL_REVIEWS);
    assert!(body["trial_ends_at"].as_i64().is_some());

    let (status, _) = send_json(&app, "POST", "/billing/trial", Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_status_reflects_paid_subscription() {
    let (app, state) = test_app();
    let (business, token) = seed(&state);
    {
        let mut conn = state.db.get().unwrap();
        let input = CheckoutCompleted {
            business_id: business.id.clone(),
            stripe_customer_id: Some("cus_1".into()),
            stripe_subscription_id: Some("sub_1".into()),
            amount_cents: Some(4900),
            current_period_end: Some(future_timestamp(30)),
            coupon_code: None,
        };
        subscription_state::apply_checkout_completed(&mut conn, None, &input, now()).unwrap();
    }

    let (status, body) = send_json(&app, "GET", "/billing/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");
    assert_eq!(body["is_subscribed"], true);
    assert_eq!(body["has_access"], true);
    assert_eq!(body["cancel_at_period_end"], false);
}

#[tokio::test]
async fn test_checkout_refused_when_already_subscribed() {
    let (app, state) = test_app();
    let (business, token) = seed(&state);
    {
        let conn = state.db.get().unwrap();
        set_business_status(&conn, &business.id, BusinessStatus::Active);
    }

    let (status, _) = send_json(&app, "POST", "/billing/checkout", Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_requires_active_subscription() {
    let (app, state) = test_app();
    let (_business, token) = seed(&state);

    let (status, _) = send_json(&app, "POST", "/billing/cancel", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_refused_once_already_cancelling() {
    let (app, state) = test_app();
    let (business, token) = seed(&state);
    {
        let mut conn = state.db.get().unwrap();
        let input = CheckoutCompleted {
            business_id: business.id.clone(),
            stripe_customer_id: Some("cus_1".into()),
            stripe_subscription_id: Some("sub_1".into()),
            amount_cents: Some(4900),
            current_period_end: Some(future_timestamp(30)),
            coupon_code: None,
        };
        subscription_state::apply_checkout_completed(&mut conn, None, &input, now()).unwrap();
        subscription_state::mark_cancelling(&mut conn, &business.id, None, now()).unwrap();
    }

    let (status, _) = send_json(&app, "POST", "/billing/cancel", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
