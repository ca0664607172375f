//! Public review submission behind the access gate, and the owner's inbox

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::*;
use goldstar::subscription_state::{self, TRIAL_REVIEWS};

fn review_uri(state: &AppState, business_id: &str) -> String {
    format!("/public/review/{}/reviews", review_page_id(state, business_id))
}

fn seed_business(state: &AppState, status: Option<BusinessStatus>) -> Business {
    let conn = state.db.get().unwrap();
    let business = create_test_business(&conn, "owner@example.com");
    conn.execute(
        "UPDATE businesses SET google_review_link = 'https://g.page/r/corner-bakery/review' WHERE id = ?1",
        [&business.id],
    )
    .unwrap();
    match status {
        Some(BusinessStatus::Trial) => {
            assert!(subscription_state::start_trial(&conn, &business.id, now()).unwrap());
        }
        Some(status) => set_business_status(&conn, &business.id, status),
        None => {}
    }
    get_business(&conn, &business.id)
}

#[tokio::test]
async fn test_public_page_shows_only_public_fields() {
    let (app, state) = test_app();
    let business = seed_business(&state, None);

    let url_id = review_page_id(&state, &business.id);

    let (status, body) =
        send_json(&app, "GET", &format!("/public/review/{}", url_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["business_name"], business.business_name);
    assert!(body.get("id").is_none());
    assert!(body.get("email").is_none());
    assert!(body.get("referral_code").is_none());
}

#[tokio::test]
async fn test_raw_business_id_is_not_a_review_page() {
    let (app, state) = test_app();
    let business = seed_business(&state, Some(BusinessStatus::Active));

    let (status, body) =
        send_json(&app, "GET", &format!("/public/review/{}", business.id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["details"], "Review page not found");

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/public/review/{}/reviews", business.id),
        None,
        Some(json!({ "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let conn = state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "reviews"), 0);
}

#[tokio::test]
async fn test_owner_issues_qr_codes() {
    let (app, state) = test_app();
    let business = seed_business(&state, Some(BusinessStatus::Active));
    let token = session_token(&state, &business);

    let (status, first) = send_json(&app, "POST", "/qr-codes", Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["qr_type"], "review");
    let url_id = first["url_id"].as_str().unwrap().to_string();
    assert_eq!(url_id.len(), 15);
    assert_eq!(first["review_url"], format!("http://localhost:5173/review/{}", url_id));
    assert!(first.get("business_id").is_none());

    // Reprinting returns the same code
    let (_, again) = send_json(
        &app,
        "POST",
        "/qr-codes",
        Some(&token),
        Some(json!({ "qr_type": "review" })),
    )
    .await;
    assert_eq!(again["url_id"], url_id.as_str());

    let (status, _) = send_json(
        &app,
        "POST",
        "/qr-codes",
        Some(&token),
        Some(json!({ "qr_type": "front door!" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    send_json(&app, "POST", "/qr-codes", Some(&token), Some(json!({ "qr_type": "counter" }))).await;
    let (status, body) = send_json(&app, "GET", "/qr-codes", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_review_refused_without_subscription() {
    let (app, state) = test_app();
    let business = seed_business(&state, None);

    let (status, body) =
        send_json(&app, "POST", &review_uri(&state, &business.id), None, Some(json!({ "rating": 5 }))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["subscription_ended"], true);
    let conn = state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "reviews"), 0);
}

#[tokio::test]
async fn test_positive_review_gets_google_link() {
    let (app, state) = test_app();
    let business = seed_business(&state, Some(BusinessStatus::Active));

    let (status, body) = send_json(
        &app,
        "POST",
        &review_uri(&state, &business.id),
        None,
        Some(json!({ "rating": 5, "comment": "Great croissants", "customer_name": "Alex" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["review_id"].as_str().is_some());
    assert_eq!(body["google_review_link"], "https://g.page/r/corner-bakery/review");

    let (status, body) =
        send_json(&app, "POST", &review_uri(&state, &business.id), None, Some(json!({ "rating": 2 }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["google_review_link"].is_null());
}

#[tokio::test]
async fn test_rating_out_of_range_is_rejected() {
    let (app, state) = test_app();
    let business = seed_business(&state, Some(BusinessStatus::Active));

    for rating in [0, 6] {
        let (status, _) =
            send_json(&app, "POST", &review_uri(&state, &business.id), None, Some(json!({ "rating": rating }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "rating {}", rating);
    }
}

#[tokio::test]
async fn test_trial_reviews_run_out() {
    let (app, state) = test_app();
    let business = seed_business(&state, Some(BusinessStatus::Trial));

    for _ in 0..TRIAL_REVIEWS {
        let (status, _) =
            send_json(&app, "POST", &review_uri(&state, &business.id), None, Some(json!({ "rating": 4 }))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) =
        send_json(&app, "POST", &review_uri(&state, &business.id), None, Some(json!({ "rating": 4 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["subscription_ended"], true);

    let conn = state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "reviews"), TRIAL_REVIEWS);
    assert_eq!(get_business(&conn, &business.id).trial_reviews_remaining, 0);
}

#[tokio::test]
async fn test_survey_follows_negative_review() {
    let (app, state) = test_app();
    let business = seed_business(&state, Some(BusinessStatus::Active));

    let (_, body) =
        send_json(&app, "POST", &review_uri(&state, &business.id), None, Some(json!({ "rating": 2 }))).await;
    let review_id = body["review_id"].as_str().unwrap().to_string();

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("{}/{}/survey", review_uri(&state, &business.id), review_id),
        None,
        Some(json!({ "improvement_areas": ["service", " wait time "], "feedback": "Slow on weekends" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("{}/{}/survey", review_uri(&state, &business.id), "gs_rev_00000000000000000000000000000000"),
        None,
        Some(json!({ "feedback": "nothing" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Malformed review id never reaches the database
    let (status, body) = send_json(
        &app,
        "POST",
        &format!("{}/{}/survey", review_uri(&state, &business.id), "not-a-review"),
        None,
        Some(json!({ "feedback": "nothing" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["details"], "Review not found");
}

#[tokio::test]
async fn test_owner_lists_and_replies_to_reviews() {
    let (app, state) = test_app();
    let business = seed_business(&state, Some(BusinessStatus::Active));
    let token = session_token(&state, &business);

    for rating in [5, 4, 1] {
        send_json(&app, "POST", &review_uri(&state, &business.id), None, Some(json!({ "rating": rating }))).await;
    }

    let (status, body) = send_json(&app, "GET", "/reviews", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);

    let (status, body) = send_json(&app, "GET", "/reviews?filter=negative", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    let review_id = body["items"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/reviews/{}/reply", review_id),
        Some(&token),
        Some(json!({ "reply": "Sorry to hear that, please come back" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Sorry to hear that, please come back");
}

#[tokio::test]
async fn test_inbox_is_gated_but_reading_spends_nothing() {
    let (app, state) = test_app();
    let business = seed_business(&state, Some(BusinessStatus::Trial));
    let token = session_token(&state, &business);

    let (status, _) = send_json(&app, "GET", "/reviews", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    {
        let conn = state.db.get().unwrap();
        assert_eq!(get_business(&conn, &business.id).trial_reviews_remaining, TRIAL_REVIEWS);
        set_business_status(&conn, &business.id, BusinessStatus::Cancelled);
    }

    let (status, _) = send_json(&app, "GET", "/reviews", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
