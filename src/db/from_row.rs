//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! Models implement `FromRow` against the column order of their `*_COLS`
//! constant, and queries go through `query_one` / `query_all`.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors
/// instead of panicking on an unexpected value.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const BUSINESS_COLS: &str = "id, email, password_hash, business_name, owner_name, phone, address, google_review_link, subscription_status, trial_reviews_remaining, trial_started_at, referral_code, total_referral_earnings_cents, onboarding_completed, email_verified, is_admin, is_salesperson, created_at, updated_at";

pub const SUBSCRIPTION_COLS: &str = "id, business_id, stripe_customer_id, stripe_subscription_id, status, amount_cents, current_period_end, cancel_at_period_end, cancelled_at, ended_at, card_brand, card_last4, created_at, updated_at";

pub const REFERRAL_COLS: &str =
    "id, referrer_id, referred_business_id, status, created_at, updated_at";

pub const EARNING_COLS: &str = "id, seller_id, business_id, amount_cents, status, created_at";

pub const COUPON_COLS: &str =
    "id, code, coupon_type, value, max_uses, times_used, is_active, created_at";

pub const REVIEW_COLS: &str = "id, business_id, rating, comment, customer_name, reply, replied_at, improvement_areas, feedback, created_at";

pub const BANK_DETAILS_COLS: &str =
    "business_id, account_holder, transit_number, institution_number, account_number, updated_at";

pub const QR_CODE_COLS: &str = "url_id, business_id, qr_type, created_at";

pub const VERIFICATION_TOKEN_COLS: &str =
    "token_hash, business_id, purpose, expires_at, created_at";

// ============ FromRow Implementations ============

impl FromRow for Business {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Business {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            business_name: row.get(3)?,
            owner_name: row.get(4)?,
            phone: row.get(5)?,
            address: row.get(6)?,
            google_review_link: row.get(7)?,
            subscription_status: parse_enum(row, 8, "subscription_status")?,
            trial_reviews_remaining: row.get(9)?,
            trial_started_at: row.get(10)?,
            referral_code: row.get(11)?,
            total_referral_earnings_cents: row.get(12)?,
            onboarding_completed: row.get::<_, i32>(13)? != 0,
            email_verified: row.get::<_, i32>(14)? != 0,
            is_admin: row.get::<_, i32>(15)? != 0,
            is_salesperson: row.get::<_, i32>(16)? != 0,
            created_at: row.get(17)?,
            updated_at: row.get(18)?,
        })
    }
}

impl FromRow for Subscription {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Subscription {
            id: row.get(0)?,
            business_id: row.get(1)?,
            stripe_customer_id: row.get(2)?,
            stripe_subscription_id: row.get(3)?,
            status: row.get(4)?,
            amount_cents: row.get(5)?,
            current_period_end: row.get(6)?,
            cancel_at_period_end: row.get::<_, i32>(7)? != 0,
            cancelled_at: row.get(8)?,
            ended_at: row.get(9)?,
            card_brand: row.get(10)?,
            card_last4: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

impl FromRow for Referral {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Referral {
            id: row.get(0)?,
            referrer_id: row.get(1)?,
            referred_business_id: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for ReferralEarning {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ReferralEarning {
            id: row.get(0)?,
            seller_id: row.get(1)?,
            business_id: row.get(2)?,
            amount_cents: row.get(3)?,
            status: parse_enum(row, 4, "status")?,
            created_at: row.get(5)?,
        })
    }
}

impl FromRow for Coupon {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Coupon {
            id: row.get(0)?,
            code: row.get(1)?,
            coupon_type: parse_enum(row, 2, "coupon_type")?,
            value: row.get(3)?,
            max_uses: row.get(4)?,
            times_used: row.get(5)?,
            is_active: row.get::<_, i32>(6)? != 0,
            created_at: row.get(7)?,
        })
    }
}

impl FromRow for Review {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Review {
            id: row.get(0)?,
            business_id: row.get(1)?,
            rating: row.get(2)?,
            comment: row.get(3)?,
            customer_name: row.get(4)?,
            reply: row.get(5)?,
            replied_at: row.get(6)?,
            improvement_areas: row.get(7)?,
            feedback: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

impl FromRow for BankDetails {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(BankDetails {
            business_id: row.get(0)?,
            account_holder: row.get(1)?,
            transit_number: row.get(2)?,
            institution_number: row.get(3)?,
            account_number: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for VerificationToken {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(VerificationToken {
            token_hash: row.get(0)?,
            business_id: row.get(1)?,
            purpose: parse_enum(row, 2, "purpose")?,
            expires_at: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for QrCode {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(QrCode {
            url_id: row.get(0)?,
            business_id: row.get(1)?,
            qr_type: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl FromRow for SalespersonSummary {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SalespersonSummary {
            id: row.get(0)?,
            business_name: row.get(1)?,
            email: row.get(2)?,
            referral_code: row.get(3)?,
            total_referrals: row.get(4)?,
            active_referrals: row.get(5)?,
            total_commission_cents: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl FromRow for SellerPayment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SellerPayment {
            id: row.get(0)?,
            business_id: row.get(1)?,
            business_name: row.get(2)?,
            amount_cents: row.get(3)?,
            status: parse_enum(row, 4, "status")?,
            created_at: row.get(5)?,
        })
    }
}
