use axum::{Extension, extract::State};
use serde::{Deserialize, Serialize};

use crate::access;
use crate::coupons;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::middleware::BusinessContext;
use crate::models::{BusinessStatus, CouponType, PaymentMethod};
use crate::payments::{CheckoutRequest, StripeClient};
use crate::subscription_state::{self, TRIAL_DURATION_SECS};

#[derive(Debug, Serialize)]
pub struct BillingStatus {
    pub status: BusinessStatus,
    pub is_subscribed: bool,
    pub has_access: bool,
    pub trial_reviews_left: i64,
    pub trial_ends_at: Option<i64>,
    pub subscription_ends_at: Option<i64>,
    pub cancel_at_period_end: bool,
    pub total_referral_earnings_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
}

fn stripe(state: &AppState) -> Result<&StripeClient> {
    state
        .stripe
        .as_ref()
        .ok_or_else(|| AppError::Internal(msg::STRIPE_NOT_CONFIGURED.into()))
}

pub async fn billing_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<BillingStatus>> {
    let conn = state.db.get()?;
    let business = &ctx.business;
    let subscription = queries::get_subscription_by_business(&conn, &business.id)?;
    let now = chrono::Utc::now().timestamp();
    let access = access::evaluate_access(business, subscription.as_ref(), now);

    Ok(Json(BillingStatus {
        status: business.subscription_status,
        is_subscribed: matches!(
            business.subscription_status,
            BusinessStatus::Active | BusinessStatus::Cancelling
        ),
        has_access: access.is_granted(),
        trial_reviews_left: business.trial_reviews_remaining,
        trial_ends_at: business.trial_started_at.map(|t| t + TRIAL_DURATION_SECS),
        subscription_ends_at: subscription.as_ref().and_then(|s| s.current_period_end),
        cancel_at_period_end: subscription.as_ref().is_some_and(|s| s.cancel_at_period_end),
        total_referral_earnings_cents: business.total_referral_earnings_cents,
        payment_method: subscription.as_ref().and_then(|s| s.payment_method()),
    }))
}

pub async fn start_trial(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<BillingStatus>> {
    {
        let conn = state.db.get()?;
        let now = chrono::Utc::now().timestamp();
        if !subscription_state::start_trial(&conn, ctx.id(), now)? {
            return Err(AppError::Conflict(msg::TRIAL_UNAVAILABLE.into()));
        }
    }
    tracing::info!(business_id = %ctx.id(), "Trial started");

    let business = {
        let conn = state.db.get()?;
        queries::get_business_by_id(&conn, ctx.id())?
            .ok_or_else(|| AppError::NotFound(msg::BUSINESS_NOT_FOUND.into()))?
    };
    billing_status(State(state), Extension(BusinessContext { business })).await
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutBody {
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub url: String,
}

pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
    Json(input): Json<CheckoutBody>,
) -> Result<Json<UrlResponse>> {
    let client = stripe(&state)?;
    let price_id = state
        .stripe_price_id
        .as_deref()
        .ok_or_else(|| AppError::Internal(msg::STRIPE_NOT_CONFIGURED.into()))?;

    if ctx.business.subscription_status == BusinessStatus::Active {
        return Err(AppError::Conflict("Already subscribed".into()));
    }

    // Only discount coupons apply at checkout; validate before leaving for Stripe
    let coupon_code = match input.coupon_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => {
            let conn = state.db.get()?;
            let validation = coupons::validate_coupon(&conn, code, ctx.id())?;
            if !validation.valid {
                return Err(AppError::BadRequest(
                    validation.reason.unwrap_or(msg::COUPON_INACTIVE).into(),
                ));
            }
            if validation.coupon_type != CouponType::Discount {
                return Err(AppError::BadRequest(
                    "Trial coupons are redeemed, not applied at checkout".into(),
                ));
            }
            Some(validation.code)
        }
        _ => None,
    };

    let base = state.frontend_url.trim_end_matches('/');
    let success_url = format!("{}/billing?checkout=success", base);
    let cancel_url = format!("{}/billing?checkout=cancelled", base);

    let (session_id, url) = client
        .create_checkout_session(&CheckoutRequest {
            business_id: ctx.id(),
            customer_email: &ctx.business.email,
            price_id,
            coupon_code: coupon_code.as_deref(),
            success_url: &success_url,
            cancel_url: &cancel_url,
        })
        .await?;

    tracing::info!(business_id = %ctx.id(), session_id = %session_id, "Checkout session created");
    Ok(Json(UrlResponse { url }))
}

pub async fn create_portal(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<UrlResponse>> {
    let client = stripe(&state)?;
    let customer_id = {
        let conn = state.db.get()?;
        queries::get_subscription_by_business(&conn, ctx.id())?
            .and_then(|s| s.stripe_customer_id)
            .ok_or_else(|| AppError::NotFound(msg::SUBSCRIPTION_NOT_FOUND.into()))?
    };

    let return_url = format!("{}/billing", state.frontend_url.trim_end_matches('/'));
    let url = client.create_billing_portal_session(&customer_id, &return_url).await?;
    Ok(Json(UrlResponse { url }))
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<BillingStatus>> {
    let client = stripe(&state)?;
    let subscription_id = {
        let conn = state.db.get()?;
        let subscription = queries::get_subscription_by_business(&conn, ctx.id())?
            .ok_or_else(|| AppError::NotFound(msg::SUBSCRIPTION_NOT_FOUND.into()))?;
        if ctx.business.subscription_status != BusinessStatus::Active {
            return Err(AppError::BadRequest("No active subscription to cancel".into()));
        }
        subscription
            .stripe_subscription_id
            .ok_or_else(|| AppError::NotFound(msg::SUBSCRIPTION_NOT_FOUND.into()))?
    };

    let remote = client.cancel_at_period_end(&subscription_id).await?;

    let business = {
        let mut conn = state.db.get()?;
        let now = chrono::Utc::now().timestamp();
        subscription_state::mark_cancelling(&mut conn, ctx.id(), remote.period_end(), now)?;
        queries::get_business_by_id(&conn, ctx.id())?
            .ok_or_else(|| AppError::NotFound(msg::BUSINESS_NOT_FOUND.into()))?
    };
    billing_status(State(state), Extension(BusinessContext { business })).await
}
