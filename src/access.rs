//! Access gate for premium actions.
//!
//! `evaluate_access` is a pure decision over the business row, its
//! subscription row and the current time. `consume_review_credit` is the only
//! mutating path: on trial it decrements `trial_reviews_remaining` with a
//! guarded UPDATE inside an IMMEDIATE transaction, so concurrent submissions
//! can never spend more credits than the trial granted.

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::Serialize;

use crate::db::queries;
use crate::error::{AppError, Result, msg};
use crate::models::{Business, BusinessStatus, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessGrant {
    Subscribed,
    /// Cancelled at period end, still inside the paid period.
    PaidThroughPeriodEnd { period_end: i64 },
    Trial { reviews_remaining: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    SubscriptionEnded,
    TrialEnded,
}

impl DenyReason {
    pub fn message(&self) -> &'static str {
        match self {
            Self::SubscriptionEnded => msg::SUBSCRIPTION_ENDED,
            Self::TrialEnded => msg::TRIAL_ENDED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted(AccessGrant),
    Denied(DenyReason),
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted(_))
    }

    /// Convert a denial into `AppError::SubscriptionEnded`.
    pub fn require(self) -> Result<AccessGrant> {
        match self {
            Access::Granted(grant) => Ok(grant),
            Access::Denied(reason) => Err(AppError::SubscriptionEnded(reason.message().into())),
        }
    }
}

pub fn evaluate_access(
    business: &Business,
    subscription: Option<&Subscription>,
    now: i64,
) -> Access {
    match business.subscription_status {
        BusinessStatus::Active => Access::Granted(AccessGrant::Subscribed),
        BusinessStatus::Cancelling => match subscription.and_then(|s| s.current_period_end) {
            Some(period_end) if period_end > now => {
                Access::Granted(AccessGrant::PaidThroughPeriodEnd { period_end })
            }
            _ => Access::Denied(DenyReason::SubscriptionEnded),
        },
        BusinessStatus::Trial if business.trial_reviews_remaining > 0 => {
            Access::Granted(AccessGrant::Trial {
                reviews_remaining: business.trial_reviews_remaining,
            })
        }
        BusinessStatus::Trial => Access::Denied(DenyReason::TrialEnded),
        BusinessStatus::Pending | BusinessStatus::Cancelled => {
            Access::Denied(DenyReason::SubscriptionEnded)
        }
    }
}

/// Load the current state and evaluate it. Read-only.
pub fn check_access(conn: &Connection, business_id: &str, now: i64) -> Result<Access> {
    let business = queries::get_business_by_id(conn, business_id)?
        .ok_or_else(|| AppError::NotFound(msg::BUSINESS_NOT_FOUND.into()))?;
    let subscription = queries::get_subscription_by_business(conn, business_id)?;
    Ok(evaluate_access(&business, subscription.as_ref(), now))
}

/// Check access and spend one trial review credit if the business is on trial.
///
/// Must run inside a write transaction held by the caller (BEGIN IMMEDIATE),
/// so the check and the decrement see the same state.
pub fn consume_review_credit_in(conn: &Connection, business_id: &str, now: i64) -> Result<Access> {
    let access = check_access(conn, business_id, now)?;

    let Access::Granted(AccessGrant::Trial { .. }) = access else {
        return Ok(access);
    };

    let remaining: Option<i64> = conn
        .query_row(
            "UPDATE businesses
             SET trial_reviews_remaining = trial_reviews_remaining - 1, updated_at = ?2
             WHERE id = ?1 AND subscription_status = 'trial' AND trial_reviews_remaining > 0
             RETURNING trial_reviews_remaining",
            params![business_id, now],
            |row| row.get(0),
        )
        .optional()?;

    Ok(match remaining {
        Some(reviews_remaining) => Access::Granted(AccessGrant::Trial { reviews_remaining }),
        None => Access::Denied(DenyReason::TrialEnded),
    })
}

/// Atomic check-and-spend in its own IMMEDIATE transaction.
pub fn consume_review_credit(conn: &mut Connection, business_id: &str, now: i64) -> Result<Access> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let access = consume_review_credit_in(&tx, business_id, now)?;
    tx.commit()?;
    Ok(access)
}
