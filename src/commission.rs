//! Referral commission calculator.
//!
//! A referrer earns 20% of the first qualifying payment made by a business it
//! referred. The `UNIQUE(seller_id, business_id)` constraint on
//! `referral_earnings` is the idempotency guard: the earning is inserted with
//! `INSERT OR IGNORE` and an ignored insert means the pair was already credited,
//! so duplicate webhook deliveries and later invoices never pay twice.
//!
//! Crediting inserts the earning, bumps the referrer's running total and marks
//! the referral edge active. Those three writes always happen together.

use rusqlite::{Connection, Transaction, params};

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::models::ReferralStatus;

/// Share of the referred business's payment owed to the referrer.
pub const COMMISSION_RATE_PERCENT: i64 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommissionOutcome {
    /// The business signed up without a referral code.
    NotReferred,
    /// An earning for this (seller, business) pair already exists.
    AlreadyCredited,
    /// The payment was zero (full discount); the pair stays eligible.
    NoPayment,
    Credited { seller_id: String, amount_cents: i64 },
}

/// Commission owed on a payment, floored to whole cents.
pub fn commission_for(payment_cents: i64) -> i64 {
    if payment_cents <= 0 {
        return 0;
    }
    payment_cents.saturating_mul(COMMISSION_RATE_PERCENT) / 100
}

/// Credit the referrer of `referred_business_id`, if any.
///
/// Runs on the caller's connection without opening a transaction; callers
/// must hold one so that the three writes commit or roll back together.
pub fn credit_referral_commission(
    conn: &Connection,
    referred_business_id: &str,
    payment_cents: i64,
    now: i64,
) -> Result<CommissionOutcome> {
    let Some(referral) = queries::get_referral_by_referred(conn, referred_business_id)? else {
        return Ok(CommissionOutcome::NotReferred);
    };

    let amount_cents = commission_for(payment_cents);
    if amount_cents <= 0 {
        return Ok(CommissionOutcome::NoPayment);
    }

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO referral_earnings (id, seller_id, business_id, amount_cents, status, created_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
        params![
            EntityType::Earning.gen_id(),
            referral.referrer_id,
            referred_business_id,
            amount_cents,
            now
        ],
    )?;
    if inserted == 0 {
        return Ok(CommissionOutcome::AlreadyCredited);
    }

    let updated = conn.execute(
        "UPDATE businesses
         SET total_referral_earnings_cents = total_referral_earnings_cents + ?2, updated_at = ?3
         WHERE id = ?1",
        params![referral.referrer_id, amount_cents, now],
    )?;
    if updated == 0 {
        return Err(AppError::Internal(format!(
            "Referrer {} of {} does not exist",
            referral.referrer_id, referred_business_id
        )));
    }

    if referral.status != ReferralStatus::Active {
        conn.execute(
            "UPDATE referrals SET status = 'active', updated_at = ?2 WHERE id = ?1",
            params![referral.id, now],
        )?;
    }

    Ok(CommissionOutcome::Credited {
        seller_id: referral.referrer_id,
        amount_cents,
    })
}

/// Credit a commission inside a savepoint of an enclosing webhook transaction.
///
/// A failure rolls back only the commission writes and is logged; the
/// enclosing subscription update still commits. Returns None on failure.
pub fn credit_in_savepoint(
    tx: &mut Transaction,
    referred_business_id: &str,
    payment_cents: i64,
    now: i64,
) -> Option<CommissionOutcome> {
    let result = tx.savepoint().map_err(AppError::from).and_then(|sp| {
        let outcome = credit_referral_commission(&sp, referred_business_id, payment_cents, now)?;
        sp.commit()?;
        Ok(outcome)
    });

    match result {
        Ok(outcome) => {
            if let CommissionOutcome::Credited { seller_id, amount_cents } = &outcome {
                tracing::info!(
                    seller_id = %seller_id,
                    business_id = %referred_business_id,
                    amount_cents,
                    "Referral commission credited"
                );
            }
            Some(outcome)
        }
        Err(e) => {
            tracing::error!(
                business_id = %referred_business_id,
                "Referral commission failed, subscription update continues: {}",
                e
            );
            None
        }
    }
}

/// Credit a commission in its own transaction.
pub fn record_commission(
    conn: &mut Connection,
    referred_business_id: &str,
    payment_cents: i64,
    now: i64,
) -> Result<CommissionOutcome> {
    let tx = conn.transaction()?;
    let outcome = credit_referral_commission(&tx, referred_business_id, payment_cents, now)?;
    tx.commit()?;
    Ok(outcome)
}
