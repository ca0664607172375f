//! Coupon validation and redemption.

use std::sync::LazyLock;

use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::error::{AppError, Result, msg};
use crate::models::{Coupon, CouponType, CreateCoupon};
use crate::subscription_state;

static COUPON_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{4,16}$").expect("valid coupon regex"));

/// Upper-case and trim a user-entered code, rejecting anything malformed.
pub fn normalize_coupon_code(code: &str) -> Result<String> {
    let code = code.trim().to_uppercase();
    if !COUPON_CODE.is_match(&code) {
        return Err(AppError::BadRequest(msg::INVALID_COUPON_CODE.into()));
    }
    Ok(code)
}

#[derive(Debug, Clone, Serialize)]
pub struct CouponValidation {
    pub valid: bool,
    pub code: String,
    pub coupon_type: CouponType,
    pub value: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// Whether `business_id` could redeem `code` right now. Read-only.
pub fn validate_coupon(conn: &Connection, code: &str, business_id: &str) -> Result<CouponValidation> {
    let code = normalize_coupon_code(code)?;
    let coupon = queries::get_coupon_by_code(conn, &code)?
        .ok_or_else(|| AppError::NotFound(msg::COUPON_NOT_FOUND.into()))?;

    let reason = if !coupon.is_active {
        Some(msg::COUPON_INACTIVE)
    } else if coupon.is_exhausted() {
        Some(msg::COUPON_EXHAUSTED)
    } else if queries::has_redeemed_coupon(conn, &coupon.id, business_id)? {
        Some(msg::COUPON_ALREADY_REDEEMED)
    } else {
        None
    };

    Ok(CouponValidation {
        valid: reason.is_none(),
        code: coupon.code,
        coupon_type: coupon.coupon_type,
        value: coupon.value,
        reason,
    })
}

/// Redeem a trial coupon for a business in one transaction: the business moves
/// onto (or extends) a trial with `value` extra reviews.
///
/// Discount coupons are refused here. They are passed to checkout and counted
/// when the provider reports the checkout completed.
pub fn redeem_coupon(conn: &mut Connection, code: &str, business_id: &str, now: i64) -> Result<Coupon> {
    let code = normalize_coupon_code(code)?;
    let tx = conn.transaction()?;

    let coupon = queries::get_coupon_by_code(&tx, &code)?
        .ok_or_else(|| AppError::NotFound(msg::COUPON_NOT_FOUND.into()))?;
    if coupon.coupon_type == CouponType::Discount {
        return Err(AppError::BadRequest(msg::DISCOUNT_AT_CHECKOUT.into()));
    }
    if !coupon.is_active {
        return Err(AppError::BadRequest(msg::COUPON_INACTIVE.into()));
    }

    if !queries::try_record_coupon_redemption(&tx, &coupon.id, business_id)? {
        return Err(AppError::Conflict(msg::COUPON_ALREADY_REDEEMED.into()));
    }
    if !queries::try_increment_coupon_use(&tx, &coupon.id)? {
        return Err(AppError::BadRequest(msg::COUPON_EXHAUSTED.into()));
    }

    if !subscription_state::grant_trial_reviews(&tx, business_id, coupon.value, now)? {
        return Err(AppError::Conflict(
            "Trial coupons cannot be used on an active subscription".into(),
        ));
    }

    tx.commit()?;
    tracing::info!(
        business_id = %business_id,
        coupon = %coupon.code,
        "Coupon redeemed"
    );

    Ok(Coupon {
        times_used: coupon.times_used + 1,
        ..coupon
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutDiscount {
    /// Redemption row written and one use counted
    Recorded,
    /// This business's redemption was already on file
    AlreadyRecorded,
    /// Redemption written, but the coupon hit `max_uses` or was deactivated
    /// after the checkout session was created
    OverLimit,
    /// Metadata named no discount coupon we know
    Unknown,
}

/// Count a discount coupon applied to a completed checkout.
///
/// Runs on the checkout transaction. The provider has already charged the
/// discounted price, so a coupon that ran out in the meantime is still
/// recorded against the business (blocking reuse) and logged.
pub fn record_checkout_discount(
    conn: &Connection,
    code: &str,
    business_id: &str,
) -> Result<CheckoutDiscount> {
    let Ok(code) = normalize_coupon_code(code) else {
        tracing::warn!(business_id = %business_id, "Checkout metadata carries a malformed coupon code");
        return Ok(CheckoutDiscount::Unknown);
    };
    let coupon = match queries::get_coupon_by_code(conn, &code)? {
        Some(c) if c.coupon_type == CouponType::Discount => c,
        _ => {
            tracing::warn!(business_id = %business_id, coupon = %code, "Checkout used an unknown discount coupon");
            return Ok(CheckoutDiscount::Unknown);
        }
    };

    if !queries::try_record_coupon_redemption(conn, &coupon.id, business_id)? {
        return Ok(CheckoutDiscount::AlreadyRecorded);
    }
    if !queries::try_increment_coupon_use(conn, &coupon.id)? {
        tracing::warn!(
            business_id = %business_id,
            coupon = %coupon.code,
            "Discount coupon applied past its limit"
        );
        return Ok(CheckoutDiscount::OverLimit);
    }

    tracing::info!(business_id = %business_id, coupon = %coupon.code, "Discount coupon redeemed at checkout");
    Ok(CheckoutDiscount::Recorded)
}

/// Admin: create a coupon after validating its code and value.
pub fn create_coupon(conn: &Connection, input: CreateCoupon) -> Result<Coupon> {
    let code = normalize_coupon_code(&input.code)?;

    if input.value <= 0 {
        return Err(AppError::BadRequest("value must be positive".into()));
    }
    if input.coupon_type == CouponType::Discount && input.value > 100 {
        return Err(AppError::BadRequest(
            "discount value is a percentage (1-100)".into(),
        ));
    }
    if input.max_uses.is_some_and(|m| m <= 0) {
        return Err(AppError::BadRequest("max_uses must be positive".into()));
    }
    if queries::get_coupon_by_code(conn, &code)?.is_some() {
        return Err(AppError::Conflict(format!("Coupon {} already exists", code)));
    }

    queries::create_coupon(conn, &CreateCoupon { code, ..input })
}
