//! Provider-agnostic webhook processing.
//!
//! A provider supplies signature extraction, verification and payload parsing;
//! everything after that (business resolution, replay rejection, state
//! transitions, commission) is shared.

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
};
use rusqlite::Connection;

use crate::db::{AppState, queries};
use crate::error::AppError;
use crate::subscription_state::{
    self, CheckoutCompleted, EventKey, InvoicePaid, SubscriptionUpdate, Transition,
};

/// Result type for webhook operations.
pub type WebhookResult = (StatusCode, &'static str);

/// Identifiers a provider event carries for locating the business.
#[derive(Debug, Default, Clone)]
pub struct BusinessRef {
    /// Our business id, from metadata we attached at checkout
    pub business_id: Option<String>,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
}

#[derive(Debug)]
pub struct CheckoutData {
    pub session_id: String,
    pub business: BusinessRef,
    /// Amount charged, in cents
    pub amount_cents: Option<i64>,
    pub coupon_code: Option<String>,
}

#[derive(Debug)]
pub struct SubscriptionData {
    pub business: BusinessRef,
    pub provider_status: String,
    pub cancel_at_period_end: bool,
    pub period_end: Option<i64>,
    pub amount_cents: Option<i64>,
}

#[derive(Debug)]
pub struct InvoiceData {
    pub invoice_id: String,
    pub business: BusinessRef,
    pub amount_paid_cents: i64,
    pub period_end: Option<i64>,
}

/// Parsed webhook event with provider-agnostic data.
#[derive(Debug)]
pub enum WebhookEvent {
    /// Checkout finished - subscription starts, referrer may earn
    CheckoutCompleted(CheckoutData),
    /// Subscription created or updated (including cancel-at-period-end)
    SubscriptionChanged(SubscriptionData),
    /// Subscription ended at the provider
    SubscriptionDeleted(BusinessRef),
    /// Invoice paid - (re)activates, referrer may earn
    InvoicePaid(InvoiceData),
    /// Event type we don't act on
    Ignored,
}

/// Trait for payment provider webhook handling.
pub trait WebhookProvider: Send + Sync {
    /// Provider name for logging and replay records (e.g. "stripe")
    fn provider_name(&self) -> &'static str;

    /// Extract signature from request headers.
    fn extract_signature(&self, headers: &HeaderMap) -> Result<String, WebhookResult>;

    /// Verify the signature over the raw body. Called before anything is parsed.
    fn verify_signature(
        &self,
        state: &AppState,
        body: &Bytes,
        signature: &str,
    ) -> Result<bool, WebhookResult>;

    /// Parse the payload into the provider's event id and a provider-agnostic event.
    fn parse_event(&self, body: &Bytes) -> Result<(String, WebhookEvent), WebhookResult>;

    /// Spawn a background task to fill in details the webhook payload lacks.
    /// Runs after the checkout transaction has committed.
    fn spawn_enricher(&self, _state: AppState, _business_id: String, _subscription_id: Option<String>) {
        // Default: no-op
    }
}

/// Find the business an event belongs to: metadata id first, then the
/// provider subscription id, then the provider customer id.
pub fn resolve_business(conn: &Connection, business: &BusinessRef) -> Result<Option<String>, AppError> {
    if let Some(id) = &business.business_id {
        if queries::get_business_by_id(conn, id)?.is_some() {
            return Ok(Some(id.clone()));
        }
        tracing::warn!(business_id = %id, "Webhook metadata names an unknown business");
    }
    if let Some(sub_id) = &business.subscription_id {
        if let Some(sub) = queries::get_subscription_by_stripe_subscription(conn, sub_id)? {
            return Ok(Some(sub.business_id));
        }
    }
    if let Some(customer_id) = &business.customer_id {
        if let Some(sub) = queries::get_subscription_by_stripe_customer(conn, customer_id)? {
            return Ok(Some(sub.business_id));
        }
    }
    Ok(None)
}

fn transition_result(provider: &str, kind: &str, result: Result<Transition, AppError>) -> WebhookResult {
    match result {
        Ok(Transition::Applied { .. }) => (StatusCode::OK, "OK"),
        Ok(Transition::AlreadyProcessed) => (StatusCode::OK, "Already processed"),
        Err(AppError::NotFound(m)) => {
            tracing::warn!("{} {} dropped: {}", provider, kind, m);
            (StatusCode::OK, "Business not found")
        }
        Err(e) => {
            // Not committed; the provider will redeliver
            tracing::error!("{} {} failed: {}", provider, kind, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

/// Generic webhook handler that delegates to provider-specific implementations.
pub async fn handle_webhook<P: WebhookProvider>(
    provider: &P,
    state: &AppState,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    let signature = match provider.extract_signature(&headers) {
        Ok(s) => s,
        Err(e) => return e,
    };

    match provider.verify_signature(state, &body, &signature) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("{} webhook rejected: invalid signature", provider.provider_name());
            return (StatusCode::BAD_REQUEST, "Invalid signature");
        }
        Err(e) => return e,
    }

    let (event_id, event) = match provider.parse_event(&body) {
        Ok(parsed) => parsed,
        Err(e) => return e,
    };

    let business_ref = match &event {
        WebhookEvent::CheckoutCompleted(d) => d.business.clone(),
        WebhookEvent::SubscriptionChanged(d) => d.business.clone(),
        WebhookEvent::SubscriptionDeleted(b) => b.clone(),
        WebhookEvent::InvoicePaid(d) => d.business.clone(),
        WebhookEvent::Ignored => return (StatusCode::OK, "Event ignored"),
    };

    let mut conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let business_id = match resolve_business(&conn, &business_ref) {
        Ok(Some(id)) => id,
        Ok(None) => {
            tracing::warn!(
                "{} event {} could not be matched to a business (subscription={:?}, customer={:?})",
                provider.provider_name(),
                event_id,
                business_ref.subscription_id,
                business_ref.customer_id
            );
            return (StatusCode::OK, "Business not found");
        }
        Err(e) => {
            tracing::error!("DB error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let key = Some(EventKey {
        provider: provider.provider_name(),
        event_id: &event_id,
    });
    let now = chrono::Utc::now().timestamp();

    match event {
        WebhookEvent::CheckoutCompleted(data) => {
            let input = CheckoutCompleted {
                business_id: business_id.clone(),
                stripe_customer_id: data.business.customer_id,
                stripe_subscription_id: data.business.subscription_id.clone(),
                amount_cents: data.amount_cents,
                current_period_end: None,
                coupon_code: data.coupon_code.clone(),
            };
            let result = subscription_state::apply_checkout_completed(&mut conn, key, &input, now);
            let applied = matches!(result, Ok(Transition::Applied { .. }));
            let response = transition_result(provider.provider_name(), "checkout", result);

            if applied {
                tracing::info!(
                    "{} checkout completed: session={}, business_id={}, coupon={:?}",
                    provider.provider_name(),
                    data.session_id,
                    business_id,
                    data.coupon_code
                );
                provider.spawn_enricher(state.clone(), business_id, data.business.subscription_id);
            }
            response
        }
        WebhookEvent::SubscriptionChanged(data) => {
            let input = SubscriptionUpdate {
                business_id,
                stripe_customer_id: data.business.customer_id,
                stripe_subscription_id: data.business.subscription_id,
                provider_status: data.provider_status,
                cancel_at_period_end: data.cancel_at_period_end,
                current_period_end: data.period_end,
                amount_cents: data.amount_cents,
            };
            let result = subscription_state::apply_subscription_updated(&mut conn, key, &input, now);
            transition_result(provider.provider_name(), "subscription update", result)
        }
        WebhookEvent::SubscriptionDeleted(_) => {
            let result =
                subscription_state::apply_subscription_deleted(&mut conn, key, &business_id, now);
            transition_result(provider.provider_name(), "subscription deletion", result)
        }
        WebhookEvent::InvoicePaid(data) => {
            let input = InvoicePaid {
                business_id,
                stripe_customer_id: data.business.customer_id,
                stripe_subscription_id: data.business.subscription_id,
                amount_paid_cents: data.amount_paid_cents,
                current_period_end: data.period_end,
            };
            tracing::debug!("{} invoice {} paid", provider.provider_name(), data.invoice_id);
            let result = subscription_state::apply_invoice_paid(&mut conn, key, &input, now);
            transition_result(provider.provider_name(), "invoice", result)
        }
        WebhookEvent::Ignored => (StatusCode::OK, "Event ignored"),
    }
}
