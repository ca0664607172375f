//! Salesperson workspace and the admin views over salespeople

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::*;
use goldstar::commission::record_commission;

struct Fixture {
    app: axum::Router,
    state: AppState,
    admin_token: String,
    seller: Business,
    seller_token: String,
}

fn fixture() -> Fixture {
    let (app, state) = test_app();
    let (admin, seller) = {
        let conn = state.db.get().unwrap();
        let admin = create_test_business(&conn, "admin@example.com");
        assert!(queries::set_admin_by_email(&conn, "admin@example.com").unwrap());
        let seller = create_test_business(&conn, "seller@example.com");
        (admin, seller)
    };
    let admin_token = session_token(&state, &admin);
    let seller_token = session_token(&state, &seller);
    Fixture {
        app,
        state,
        admin_token,
        seller,
        seller_token,
    }
}

async fn grant(f: &Fixture, business_id: &str, is_salesperson: bool) -> StatusCode {
    let (status, _) = send_json(
        &f.app,
        "POST",
        &format!("/admin/businesses/{}/salesperson", business_id),
        Some(&f.admin_token),
        Some(json!({ "is_salesperson": is_salesperson })),
    )
    .await;
    status
}

/// Two referrals for the seller; the first one converted and paid commission.
fn seed_referrals(f: &Fixture) -> (Business, Business) {
    let mut conn = f.state.db.get().unwrap();
    let paying = create_referred_business(&conn, "paying@example.com", &f.seller.id);
    let pending = create_referred_business(&conn, "pending@example.com", &f.seller.id);
    set_business_status(&conn, &paying.id, BusinessStatus::Active);
    record_commission(&mut conn, &paying.id, 4900, now()).unwrap();
    (paying, pending)
}

#[tokio::test]
async fn test_seller_routes_require_flag() {
    let f = fixture();

    let (status, body) = send_json(&f.app, "GET", "/seller/dashboard", Some(&f.seller_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["details"], "Salesperson access required");

    let (status, _) = send_json(&f.app, "GET", "/seller/dashboard", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The flag is read per request, so the existing token picks it up
    assert_eq!(grant(&f, &f.seller.id, true).await, StatusCode::OK);
    let (status, _) = send_json(&f.app, "GET", "/seller/dashboard", Some(&f.seller_token), None).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(grant(&f, &f.seller.id, false).await, StatusCode::OK);
    let (status, _) = send_json(&f.app, "GET", "/seller/payments", Some(&f.seller_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_only_admins_grant_the_flag() {
    let f = fixture();

    let (status, _) = send_json(
        &f.app,
        "POST",
        &format!("/admin/businesses/{}/salesperson", f.seller.id),
        Some(&f.seller_token),
        Some(json!({ "is_salesperson": true })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(
        grant(&f, "gs_biz_00000000000000000000000000000000", true).await,
        StatusCode::NOT_FOUND
    );
    assert_eq!(grant(&f, "not-an-id", true).await, StatusCode::NOT_FOUND);

    let conn = f.state.db.get().unwrap();
    assert!(!get_business(&conn, &f.seller.id).is_salesperson);
}

#[tokio::test]
async fn test_seller_workspace() {
    let f = fixture();
    grant(&f, &f.seller.id, true).await;
    let (paying, _) = seed_referrals(&f);

    let (status, body) = send_json(&f.app, "POST", "/seller/code", Some(&f.seller_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let code = body["code"].as_str().unwrap().to_string();
    let (_, again) = send_json(&f.app, "POST", "/seller/code", Some(&f.seller_token), None).await;
    assert_eq!(again["code"], code.as_str());

    let (status, body) = send_json(&f.app, "GET", "/seller/dashboard", Some(&f.seller_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["referral_code"], code.as_str());
    assert_eq!(body["stats"]["total_referrals"], 2);
    assert_eq!(body["stats"]["active_referrals"], 1);
    assert_eq!(body["stats"]["total_earnings_cents"], 980);
    assert_eq!(body["stats"]["pending_earnings_cents"], 980);

    let (status, body) = send_json(&f.app, "GET", "/seller/referrals", Some(&f.seller_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send_json(&f.app, "GET", "/seller/payments", Some(&f.seller_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["business_id"], paying.id.as_str());
    assert_eq!(body["items"][0]["business_name"], paying.business_name.as_str());
    assert_eq!(body["items"][0]["amount_cents"], 980);
}

#[tokio::test]
async fn test_admin_salespeople_views() {
    let f = fixture();
    grant(&f, &f.seller.id, true).await;
    seed_referrals(&f);
    let quiet = {
        let conn = f.state.db.get().unwrap();
        create_test_business(&conn, "quiet@example.com")
    };
    grant(&f, &quiet.id, true).await;

    let (status, body) = send_json(&f.app, "GET", "/admin/salespeople", Some(&f.admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    // Highest commission first
    assert_eq!(list[0]["id"], f.seller.id.as_str());
    assert_eq!(list[0]["total_referrals"], 2);
    assert_eq!(list[0]["active_referrals"], 1);
    assert_eq!(list[0]["total_commission_cents"], 980);
    assert_eq!(list[1]["id"], quiet.id.as_str());
    assert_eq!(list[1]["total_commission_cents"], 0);

    let (status, body) = send_json(
        &f.app,
        "GET",
        &format!("/admin/salespeople/{}", f.seller.id),
        Some(&f.admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "seller@example.com");

    let (status, body) = send_json(
        &f.app,
        "GET",
        &format!("/admin/salespeople/{}/referrals", f.seller.id),
        Some(&f.admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send_json(
        &f.app,
        "GET",
        &format!("/admin/salespeople/{}/payments", f.seller.id),
        Some(&f.admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, _) = send_json(&f.app, "GET", "/admin/salespeople", Some(&f.seller_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_non_salesperson_is_not_found_in_admin_views() {
    let f = fixture();

    for uri in [
        format!("/admin/salespeople/{}", f.seller.id),
        format!("/admin/salespeople/{}/referrals", f.seller.id),
        format!("/admin/salespeople/{}/payments", f.seller.id),
        "/admin/salespeople/garbage".to_string(),
    ] {
        let (status, body) = send_json(&f.app, "GET", &uri, Some(&f.admin_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["details"], "Salesperson not found");
    }
}
