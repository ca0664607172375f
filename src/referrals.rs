//! Referral registry: referral codes, referral edges and the referrer dashboard.

use chrono::{Datelike, TimeZone, Utc};
use rand::Rng;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::error::{AppError, Result, msg};
use crate::models::{Business, BusinessStatus, ReferralDisplayStatus, ReferralStatus, ReferralSummary};

pub const REFERRAL_CODE_LEN: usize = 8;
const REFERRAL_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_CODE_ATTEMPTS: usize = 5;

pub fn generate_referral_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERRAL_CODE_LEN)
        .map(|_| REFERRAL_CODE_CHARSET[rng.gen_range(0..REFERRAL_CODE_CHARSET.len())] as char)
        .collect()
}

/// Resolve a code to its owner. Exact match after trimming whitespace.
pub fn resolve_referral_code(conn: &Connection, code: &str) -> Result<Option<Business>> {
    let code = code.trim();
    if code.is_empty() {
        return Ok(None);
    }
    queries::get_business_by_referral_code(conn, code)
}

/// Create the pending edge `referrer -> referred`.
/// Returns false for a self-referral or when the business already has a referrer.
pub fn register_referral(conn: &Connection, referrer_id: &str, referred_business_id: &str) -> Result<bool> {
    if referrer_id == referred_business_id {
        tracing::warn!(business_id = %referred_business_id, "Ignoring self-referral");
        return Ok(false);
    }
    let created = queries::try_create_referral(conn, referrer_id, referred_business_id)?;
    if created {
        tracing::info!(
            referrer_id = %referrer_id,
            referred_business_id = %referred_business_id,
            "Referral registered"
        );
    }
    Ok(created)
}

/// Return the business's referral code, issuing one on first call.
///
/// The code is stored with a conditional UPDATE, so concurrent first calls
/// converge on whichever code landed first.
pub fn get_or_create_referral_code(conn: &Connection, business_id: &str) -> Result<String> {
    let business = queries::get_business_by_id(conn, business_id)?
        .ok_or_else(|| AppError::NotFound(msg::BUSINESS_NOT_FOUND.into()))?;
    if let Some(code) = business.referral_code {
        return Ok(code);
    }

    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = generate_referral_code();
        match queries::try_set_referral_code(conn, business_id, &code) {
            Ok(true) => {
                tracing::info!(business_id = %business_id, "Referral code issued");
                return Ok(code);
            }
            Ok(false) => {
                // lost the race to another request
                return queries::get_referral_code(conn, business_id)?
                    .ok_or_else(|| AppError::Internal("referral code vanished".into()));
            }
            Err(e) if e.is_unique_violation() => {
                tracing::debug!("Referral code collision, retrying");
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::Internal(
        "could not generate a unique referral code".into(),
    ))
}

pub fn referral_link(frontend_url: &str, code: &str) -> String {
    format!("{}/signup?ref={}", frontend_url.trim_end_matches('/'), code)
}

/// Dashboard status of a referred business.
pub fn derive_display_status(
    referral_status: ReferralStatus,
    subscription_status: BusinessStatus,
    onboarding_completed: bool,
) -> ReferralDisplayStatus {
    if referral_status == ReferralStatus::Active || subscription_status == BusinessStatus::Active {
        ReferralDisplayStatus::Active
    } else if onboarding_completed {
        ReferralDisplayStatus::PendingSubscription
    } else {
        ReferralDisplayStatus::PendingOnboarding
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferralStats {
    pub total_referrals: i64,
    pub active_referrals: i64,
    pub total_earnings_cents: i64,
    pub pending_earnings_cents: i64,
    /// Payouts run on the first of each month (UTC)
    pub next_payout_date: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferralDashboard {
    pub stats: ReferralStats,
    pub referrals: Vec<ReferralSummary>,
}

/// Midnight UTC on the first day of the month after `now`.
pub fn next_payout_date(now: i64) -> i64 {
    let today = Utc
        .timestamp_opt(now, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .map(|d| d.timestamp())
        .unwrap_or(now)
}

pub fn dashboard(conn: &Connection, referrer_id: &str, now: i64) -> Result<ReferralDashboard> {
    let rows = queries::list_referral_rows(conn, referrer_id)?;
    let (total_earnings_cents, pending_earnings_cents) =
        queries::get_seller_earning_totals(conn, referrer_id)?;

    let referrals: Vec<ReferralSummary> = rows
        .into_iter()
        .map(|row| ReferralSummary {
            status: derive_display_status(
                row.referral.status,
                row.subscription_status,
                row.onboarding_completed,
            ),
            id: row.referral.id,
            referred_business_id: row.referral.referred_business_id,
            business_name: row.business_name,
            email: row.email,
            created_at: row.referral.created_at,
            earnings_cents: row.earnings_cents,
        })
        .collect();

    let active_referrals = referrals
        .iter()
        .filter(|r| r.status == ReferralDisplayStatus::Active)
        .count() as i64;

    Ok(ReferralDashboard {
        stats: ReferralStats {
            total_referrals: referrals.len() as i64,
            active_referrals,
            total_earnings_cents,
            pending_earnings_cents,
            next_payout_date: next_payout_date(now),
        },
        referrals,
    })
}
