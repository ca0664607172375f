pub mod admin;
pub mod auth;
pub mod bank_details;
pub mod billing;
pub mod business;
pub mod coupons;
pub mod qr_codes;
pub mod referrals;
pub mod reviews;
pub mod seller;
pub mod webhooks;

use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::middleware::{admin_auth, salesperson_auth, session_auth};
use crate::rate_limit::maybe_limit;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Unauthenticated account endpoints, strict rate tier.
fn auth_routes(rate_limit: RateLimitConfig) -> Router<AppState> {
    let routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify-email", post(auth::verify_email))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password));
    maybe_limit(routes, rate_limit.strict_rpm)
}

/// Review pages behind QR codes, standard rate tier.
fn public_routes(rate_limit: RateLimitConfig) -> Router<AppState> {
    let routes = Router::new()
        .route("/public/review/{url_id}", get(qr_codes::review_page))
        .route("/public/review/{url_id}/reviews", post(reviews::submit_review))
        .route(
            "/public/review/{url_id}/reviews/{review_id}/survey",
            post(reviews::submit_survey),
        );
    maybe_limit(routes, rate_limit.standard_rpm)
}

fn session_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/resend-verification", post(auth::resend_verification))
        // Profile
        .route("/me", get(business::get_me).put(business::update_me))
        .route("/me/onboarding/complete", post(business::complete_onboarding))
        .route("/me/dashboard", get(business::dashboard))
        // Billing
        .route("/billing/status", get(billing::billing_status))
        .route("/billing/trial", post(billing::start_trial))
        .route("/billing/checkout", post(billing::create_checkout))
        .route("/billing/portal", post(billing::create_portal))
        .route("/billing/cancel", post(billing::cancel_subscription))
        // Coupons
        .route("/coupons/validate", post(coupons::validate_coupon))
        .route("/coupons/redeem", post(coupons::redeem_coupon))
        // Referrals
        .route("/referrals", get(referrals::referral_dashboard))
        .route("/referrals/code", get(referrals::get_referral_code))
        .route("/referrals/link", get(referrals::get_referral_link))
        .route("/referrals/earnings", get(referrals::list_earnings))
        // QR codes
        .route(
            "/qr-codes",
            get(qr_codes::list_qr_codes).post(qr_codes::create_qr_code),
        )
        // Reviews
        .route("/reviews", get(reviews::list_reviews))
        .route("/reviews/{id}/reply", post(reviews::reply_to_review))
        // Payout details
        .route(
            "/bank-details",
            get(bank_details::get_bank_details).put(bank_details::put_bank_details),
        )
        .layer(middleware::from_fn_with_state(state, session_auth))
}

fn seller_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/seller/dashboard", get(seller::dashboard))
        .route("/seller/referrals", get(seller::list_referrals))
        .route("/seller/code", post(seller::generate_code))
        .route("/seller/payments", get(seller::list_payments))
        .layer(middleware::from_fn(salesperson_auth))
        .layer(middleware::from_fn_with_state(state, session_auth))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/businesses", get(admin::list_businesses))
        .route("/admin/businesses/{id}/suspend", post(admin::suspend_business))
        .route("/admin/businesses/{id}/salesperson", post(admin::set_salesperson))
        .route("/admin/salespeople", get(admin::list_salespeople))
        .route("/admin/salespeople/{id}", get(admin::get_salesperson))
        .route("/admin/salespeople/{id}/referrals", get(admin::salesperson_referrals))
        .route("/admin/salespeople/{id}/payments", get(admin::salesperson_payments))
        .route(
            "/admin/coupons",
            get(coupons::admin_list_coupons).post(coupons::admin_create_coupon),
        )
        .route("/admin/coupons/{id}/deactivate", post(coupons::admin_deactivate_coupon))
        // session_auth (outer) runs first and provides the context admin_auth checks
        .layer(middleware::from_fn(admin_auth))
        .layer(middleware::from_fn_with_state(state, session_auth))
}

/// The full HTTP surface.
pub fn router(state: AppState, rate_limit: RateLimitConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(auth_routes(rate_limit))
        .merge(public_routes(rate_limit))
        .merge(session_routes(state.clone()))
        .merge(seller_routes(state.clone()))
        .merge(admin_routes(state.clone()))
        .merge(webhooks::router())
        .with_state(state)
}
