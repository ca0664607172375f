//! Subscription state tracker.
//!
//! The only module that writes `businesses.subscription_status` and
//! `subscriptions.status`. Every transition writes both inside one
//! transaction so the access gate never observes them disagreeing.
//!
//! Webhook-driven transitions optionally carry the provider event id, which is
//! recorded in the same transaction; a replayed id returns
//! `Transition::AlreadyProcessed` without touching anything.

use rusqlite::{Connection, Transaction, params};

use crate::commission::{self, CommissionOutcome};
use crate::coupons;
use crate::db::queries;
use crate::error::{AppError, Result, msg};
use crate::id::EntityType;
use crate::models::BusinessStatus;

/// Reviews granted by a self-serve trial.
pub const TRIAL_REVIEWS: i64 = 10;

/// Self-serve trials last this long for display purposes.
pub const TRIAL_DURATION_SECS: i64 = 14 * 86400;

/// Local subscription-row statuses that are not provider-native.
pub const STATUS_CANCELLING: &str = "cancelling";
pub const STATUS_CANCELLED: &str = "cancelled";
pub const STATUS_SUSPENDED: &str = "suspended";

/// Identifies a provider event for replay rejection.
#[derive(Debug, Clone, Copy)]
pub struct EventKey<'a> {
    pub provider: &'a str,
    pub event_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// State written. Carries the commission outcome for payment events
    /// (None when the commission step failed and was rolled back).
    Applied { commission: Option<CommissionOutcome> },
    AlreadyProcessed,
}

impl Transition {
    fn applied() -> Self {
        Transition::Applied { commission: None }
    }
}

/// Map a subscription-row status (provider-native or local) to the business enum.
pub fn map_provider_status(status: &str) -> BusinessStatus {
    match status {
        "active" | "trialing" => BusinessStatus::Active,
        STATUS_CANCELLING => BusinessStatus::Cancelling,
        "canceled" | STATUS_CANCELLED | "incomplete_expired" | "unpaid" | STATUS_SUSPENDED => {
            BusinessStatus::Cancelled
        }
        other => {
            tracing::warn!("Unmapped provider subscription status '{}', treating as pending", other);
            BusinessStatus::Pending
        }
    }
}

fn write_business_status(
    conn: &Connection,
    business_id: &str,
    status: BusinessStatus,
    now: i64,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE businesses SET subscription_status = ?2, updated_at = ?3 WHERE id = ?1",
        params![business_id, status.as_ref(), now],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound(msg::BUSINESS_NOT_FOUND.into()));
    }
    Ok(())
}

/// Returns false if the event was already recorded.
fn record_event(tx: &Transaction, event: Option<EventKey>) -> Result<bool> {
    match event {
        Some(key) => queries::try_record_webhook_event(tx, key.provider, key.event_id),
        None => Ok(true),
    }
}

// ============ Provider events ============

#[derive(Debug, Clone)]
pub struct CheckoutCompleted {
    pub business_id: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    /// Amount charged at checkout, in cents
    pub amount_cents: Option<i64>,
    pub current_period_end: Option<i64>,
    /// Discount coupon the checkout session was created with
    pub coupon_code: Option<String>,
}

/// A checkout finished: the subscription is active, a discount coupon used for
/// it is counted, and the referrer (if any) earns.
pub fn apply_checkout_completed(
    conn: &mut Connection,
    event: Option<EventKey>,
    input: &CheckoutCompleted,
    now: i64,
) -> Result<Transition> {
    let mut tx = conn.transaction()?;
    if !record_event(&tx, event)? {
        return Ok(Transition::AlreadyProcessed);
    }

    write_business_status(&tx, &input.business_id, BusinessStatus::Active, now)?;
    tx.execute(
        "INSERT INTO subscriptions (id, business_id, stripe_customer_id, stripe_subscription_id, status,
                                    amount_cents, current_period_end, cancel_at_period_end, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?6, 0, ?7, ?7)
         ON CONFLICT(business_id) DO UPDATE SET
            stripe_customer_id = COALESCE(excluded.stripe_customer_id, stripe_customer_id),
            stripe_subscription_id = COALESCE(excluded.stripe_subscription_id, stripe_subscription_id),
            status = 'active',
            amount_cents = COALESCE(excluded.amount_cents, amount_cents),
            current_period_end = COALESCE(excluded.current_period_end, current_period_end),
            cancel_at_period_end = 0,
            cancelled_at = NULL,
            ended_at = NULL,
            updated_at = excluded.updated_at",
        params![
            EntityType::Subscription.gen_id(),
            input.business_id,
            input.stripe_customer_id,
            input.stripe_subscription_id,
            input.amount_cents,
            input.current_period_end,
            now
        ],
    )?;

    if let Some(code) = &input.coupon_code {
        coupons::record_checkout_discount(&tx, code, &input.business_id)?;
    }

    let commission = commission::credit_in_savepoint(
        &mut tx,
        &input.business_id,
        input.amount_cents.unwrap_or(0),
        now,
    );

    tx.commit()?;
    tracing::info!(business_id = %input.business_id, "Checkout completed, subscription active");
    Ok(Transition::Applied { commission })
}

#[derive(Debug, Clone)]
pub struct SubscriptionUpdate {
    pub business_id: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    /// Provider-native status (`active`, `past_due`, `canceled`, ...)
    pub provider_status: String,
    pub cancel_at_period_end: bool,
    pub current_period_end: Option<i64>,
    pub amount_cents: Option<i64>,
}

impl SubscriptionUpdate {
    /// Status stored on the subscription row: an active subscription set to
    /// cancel at period end is `cancelling`, anything else mirrors the provider.
    pub fn local_status(&self) -> &str {
        if self.cancel_at_period_end && self.provider_status == "active" {
            STATUS_CANCELLING
        } else {
            &self.provider_status
        }
    }
}

/// Provider created or updated a subscription.
pub fn apply_subscription_updated(
    conn: &mut Connection,
    event: Option<EventKey>,
    input: &SubscriptionUpdate,
    now: i64,
) -> Result<Transition> {
    let tx = conn.transaction()?;
    if !record_event(&tx, event)? {
        return Ok(Transition::AlreadyProcessed);
    }

    // A deleted provider subscription never comes back; a late update for it
    // must not resurrect the row. Resubscribing creates a new subscription id.
    if let Some(existing) = queries::get_subscription_by_business(&tx, &input.business_id)? {
        let same_subscription = input.stripe_subscription_id.is_some()
            && existing.stripe_subscription_id == input.stripe_subscription_id;
        if existing.ended_at.is_some() && same_subscription {
            tracing::warn!(
                business_id = %input.business_id,
                "Ignoring update for an already ended subscription"
            );
            tx.commit()?;
            return Ok(Transition::applied());
        }
    }

    let local_status = input.local_status();
    let cancelled_at = (local_status == STATUS_CANCELLING).then_some(now);

    write_business_status(&tx, &input.business_id, map_provider_status(local_status), now)?;
    tx.execute(
        "INSERT INTO subscriptions (id, business_id, stripe_customer_id, stripe_subscription_id, status,
                                    amount_cents, current_period_end, cancel_at_period_end, cancelled_at,
                                    created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
         ON CONFLICT(business_id) DO UPDATE SET
            stripe_customer_id = COALESCE(excluded.stripe_customer_id, stripe_customer_id),
            stripe_subscription_id = COALESCE(excluded.stripe_subscription_id, stripe_subscription_id),
            status = excluded.status,
            amount_cents = COALESCE(excluded.amount_cents, amount_cents),
            current_period_end = COALESCE(excluded.current_period_end, current_period_end),
            cancel_at_period_end = excluded.cancel_at_period_end,
            cancelled_at = CASE
                WHEN excluded.status IN ('active', 'trialing') THEN NULL
                ELSE COALESCE(cancelled_at, excluded.cancelled_at)
            END,
            updated_at = excluded.updated_at",
        params![
            EntityType::Subscription.gen_id(),
            input.business_id,
            input.stripe_customer_id,
            input.stripe_subscription_id,
            local_status,
            input.amount_cents,
            input.current_period_end,
            input.cancel_at_period_end,
            cancelled_at,
            now
        ],
    )?;

    tx.commit()?;
    tracing::info!(
        business_id = %input.business_id,
        status = %local_status,
        "Subscription updated"
    );
    Ok(Transition::applied())
}

/// Provider deleted the subscription: access ends now.
pub fn apply_subscription_deleted(
    conn: &mut Connection,
    event: Option<EventKey>,
    business_id: &str,
    now: i64,
) -> Result<Transition> {
    let tx = conn.transaction()?;
    if !record_event(&tx, event)? {
        return Ok(Transition::AlreadyProcessed);
    }

    write_business_status(&tx, business_id, BusinessStatus::Cancelled, now)?;
    tx.execute(
        "UPDATE subscriptions SET
            status = ?2,
            cancel_at_period_end = 0,
            cancelled_at = COALESCE(cancelled_at, ?3),
            ended_at = COALESCE(ended_at, ?3),
            updated_at = ?3
         WHERE business_id = ?1",
        params![business_id, STATUS_CANCELLED, now],
    )?;

    tx.commit()?;
    tracing::info!(business_id = %business_id, "Subscription deleted, business cancelled");
    Ok(Transition::applied())
}

#[derive(Debug, Clone)]
pub struct InvoicePaid {
    pub business_id: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub amount_paid_cents: i64,
    pub current_period_end: Option<i64>,
}

/// An invoice was paid: (re)activate and credit the referrer if this is the first payment.
pub fn apply_invoice_paid(
    conn: &mut Connection,
    event: Option<EventKey>,
    input: &InvoicePaid,
    now: i64,
) -> Result<Transition> {
    let mut tx = conn.transaction()?;
    if !record_event(&tx, event)? {
        return Ok(Transition::AlreadyProcessed);
    }

    let amount_cents = (input.amount_paid_cents > 0).then_some(input.amount_paid_cents);

    write_business_status(&tx, &input.business_id, BusinessStatus::Active, now)?;
    tx.execute(
        "INSERT INTO subscriptions (id, business_id, stripe_customer_id, stripe_subscription_id, status,
                                    amount_cents, current_period_end, cancel_at_period_end, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?6, 0, ?7, ?7)
         ON CONFLICT(business_id) DO UPDATE SET
            stripe_customer_id = COALESCE(excluded.stripe_customer_id, stripe_customer_id),
            stripe_subscription_id = COALESCE(excluded.stripe_subscription_id, stripe_subscription_id),
            status = 'active',
            amount_cents = COALESCE(excluded.amount_cents, amount_cents),
            current_period_end = COALESCE(excluded.current_period_end, current_period_end),
            ended_at = NULL,
            updated_at = excluded.updated_at",
        params![
            EntityType::Subscription.gen_id(),
            input.business_id,
            input.stripe_customer_id,
            input.stripe_subscription_id,
            amount_cents,
            input.current_period_end,
            now
        ],
    )?;

    let commission =
        commission::credit_in_savepoint(&mut tx, &input.business_id, input.amount_paid_cents, now);

    tx.commit()?;
    tracing::info!(business_id = %input.business_id, "Invoice paid, subscription active");
    Ok(Transition::Applied { commission })
}

// ============ Local transitions ============

/// Start the self-serve trial. Only from `pending`, and only once per business.
/// Returns false when the business is not eligible.
pub fn start_trial(conn: &Connection, business_id: &str, now: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE businesses
         SET subscription_status = 'trial', trial_reviews_remaining = ?2,
             trial_started_at = ?3, updated_at = ?3
         WHERE id = ?1 AND subscription_status = 'pending' AND trial_started_at IS NULL",
        params![business_id, TRIAL_REVIEWS, now],
    )?;
    Ok(updated > 0)
}

/// Add trial reviews from a coupon. Refused (false) while on a paid plan.
/// Runs on the caller's transaction.
pub fn grant_trial_reviews(conn: &Connection, business_id: &str, reviews: i64, now: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE businesses
         SET subscription_status = 'trial',
             trial_reviews_remaining = trial_reviews_remaining + ?2,
             trial_started_at = COALESCE(trial_started_at, ?3),
             updated_at = ?3
         WHERE id = ?1 AND subscription_status IN ('pending', 'trial', 'cancelled')",
        params![business_id, reviews, now],
    )?;
    Ok(updated > 0)
}

/// The business asked to cancel at period end and the provider accepted.
pub fn mark_cancelling(
    conn: &mut Connection,
    business_id: &str,
    current_period_end: Option<i64>,
    now: i64,
) -> Result<()> {
    let tx = conn.transaction()?;

    let updated = tx.execute(
        "UPDATE subscriptions SET
            status = ?2,
            cancel_at_period_end = 1,
            cancelled_at = COALESCE(cancelled_at, ?3),
            current_period_end = COALESCE(?4, current_period_end),
            updated_at = ?3
         WHERE business_id = ?1",
        params![business_id, STATUS_CANCELLING, now, current_period_end],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound(msg::SUBSCRIPTION_NOT_FOUND.into()));
    }
    write_business_status(&tx, business_id, BusinessStatus::Cancelling, now)?;

    tx.commit()?;
    tracing::info!(business_id = %business_id, "Subscription set to cancel at period end");
    Ok(())
}

/// Admin suspension: the subscription row is marked `suspended` and access ends.
pub fn suspend(conn: &mut Connection, business_id: &str, now: i64) -> Result<()> {
    let tx = conn.transaction()?;

    write_business_status(&tx, business_id, map_provider_status(STATUS_SUSPENDED), now)?;
    tx.execute(
        "UPDATE subscriptions SET status = ?2, updated_at = ?3 WHERE business_id = ?1",
        params![business_id, STATUS_SUSPENDED, now],
    )?;

    tx.commit()?;
    tracing::info!(business_id = %business_id, "Business suspended");
    Ok(())
}
