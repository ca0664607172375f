use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::db::{AppState, queries};
use crate::error::msg;
use crate::payments::{StripeCheckoutSession, StripeInvoice, StripeSubscription, StripeWebhookEvent};

use super::common::{
    BusinessRef, CheckoutData, InvoiceData, SubscriptionData, WebhookEvent, WebhookProvider,
    WebhookResult, handle_webhook,
};

/// Pull card and period details that the checkout payload doesn't carry.
/// Runs as a background task after the webhook handler returns.
async fn enrich_stripe_subscription(state: &AppState, business_id: &str, subscription_id: &str) {
    let Some(client) = state.stripe.as_ref() else {
        return;
    };

    let subscription = match client.get_subscription(subscription_id).await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Stripe enricher: failed to fetch subscription {}: {}", subscription_id, e);
            return;
        }
    };

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Stripe enricher: failed to get DB connection: {}", e);
            return;
        }
    };

    let card = subscription.card();
    match queries::update_subscription_billing_details(
        &conn,
        subscription_id,
        subscription.period_end(),
        card.as_ref().map(|c| c.brand.as_str()),
        card.as_ref().map(|c| c.last4.as_str()),
    ) {
        Ok(true) => tracing::info!(
            "Stripe enricher: updated billing details for business {} (subscription: {})",
            business_id,
            subscription_id
        ),
        Ok(false) => tracing::warn!("Stripe enricher: no local row for subscription {}", subscription_id),
        Err(e) => tracing::warn!("Stripe enricher: failed to update subscription: {}", e),
    }
}

/// Stripe webhook provider implementation.
pub struct StripeWebhookProvider;

impl WebhookProvider for StripeWebhookProvider {
    fn provider_name(&self) -> &'static str {
        "stripe"
    }

    fn extract_signature(&self, headers: &HeaderMap) -> Result<String, WebhookResult> {
        headers
            .get("stripe-signature")
            .ok_or((StatusCode::BAD_REQUEST, "Missing stripe-signature header"))?
            .to_str()
            .map(|s| s.to_string())
            .map_err(|e| {
                tracing::debug!("Invalid UTF-8 in Stripe signature header: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid signature header")
            })
    }

    fn verify_signature(
        &self,
        state: &AppState,
        body: &Bytes,
        signature: &str,
    ) -> Result<bool, WebhookResult> {
        let client = state.stripe.as_ref().ok_or_else(|| {
            tracing::warn!("Stripe webhook received but Stripe is not configured");
            (StatusCode::BAD_REQUEST, msg::STRIPE_NOT_CONFIGURED)
        })?;

        client.verify_webhook_signature(body, signature).map_err(|e| {
            tracing::warn!("Signature verification error: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid signature")
        })
    }

    fn parse_event(&self, body: &Bytes) -> Result<(String, WebhookEvent), WebhookResult> {
        let event: StripeWebhookEvent = serde_json::from_slice(body).map_err(|e| {
            tracing::error!("Failed to parse Stripe webhook: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid JSON")
        })?;

        let parsed = match event.event_type.as_str() {
            "checkout.session.completed" => parse_checkout_completed(&event)?,
            "customer.subscription.created" | "customer.subscription.updated" => {
                parse_subscription_changed(&event)?
            }
            "customer.subscription.deleted" => parse_subscription_deleted(&event)?,
            "invoice.payment_succeeded" | "invoice.paid" => parse_invoice_paid(&event)?,
            other => {
                tracing::debug!("Ignoring Stripe event type {}", other);
                WebhookEvent::Ignored
            }
        };

        Ok((event.id, parsed))
    }

    fn spawn_enricher(&self, state: AppState, business_id: String, subscription_id: Option<String>) {
        let Some(subscription_id) = subscription_id else {
            tracing::debug!("Stripe enricher: checkout without subscription, skipping");
            return;
        };

        tokio::spawn(async move {
            enrich_stripe_subscription(&state, &business_id, &subscription_id).await;
        });
    }
}

fn parse_checkout_completed(event: &StripeWebhookEvent) -> Result<WebhookEvent, WebhookResult> {
    let session: StripeCheckoutSession = serde_json::from_value(event.data.object.clone())
        .map_err(|e| {
            tracing::error!("Failed to parse checkout session: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid checkout session")
        })?;

    if session.mode.as_deref().is_some_and(|m| m != "subscription") {
        return Ok(WebhookEvent::Ignored);
    }
    // Asynchronous payment methods complete the session before the money moves
    if session.payment_status.as_deref() == Some("unpaid") {
        tracing::info!("Stripe checkout {} completed unpaid, waiting for invoice", session.id);
        return Ok(WebhookEvent::Ignored);
    }

    Ok(WebhookEvent::CheckoutCompleted(CheckoutData {
        session_id: session.id,
        business: BusinessRef {
            business_id: session.metadata.business_id,
            subscription_id: session.subscription,
            customer_id: session.customer,
        },
        amount_cents: session.amount_total,
        coupon_code: session.metadata.coupon_code,
    }))
}

fn parse_subscription(event: &StripeWebhookEvent) -> Result<StripeSubscription, WebhookResult> {
    serde_json::from_value(event.data.object.clone()).map_err(|e| {
        tracing::error!("Failed to parse subscription: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid subscription")
    })
}

fn parse_subscription_changed(event: &StripeWebhookEvent) -> Result<WebhookEvent, WebhookResult> {
    let subscription = parse_subscription(event)?;
    let period_end = subscription.period_end();
    let amount_cents = subscription.amount_cents();

    Ok(WebhookEvent::SubscriptionChanged(SubscriptionData {
        business: BusinessRef {
            business_id: subscription.metadata.business_id,
            subscription_id: Some(subscription.id),
            customer_id: subscription.customer,
        },
        provider_status: subscription.status,
        cancel_at_period_end: subscription.cancel_at_period_end,
        period_end,
        amount_cents,
    }))
}

fn parse_subscription_deleted(event: &StripeWebhookEvent) -> Result<WebhookEvent, WebhookResult> {
    let subscription = parse_subscription(event)?;

    Ok(WebhookEvent::SubscriptionDeleted(BusinessRef {
        business_id: subscription.metadata.business_id,
        subscription_id: Some(subscription.id),
        customer_id: subscription.customer,
    }))
}

fn parse_invoice_paid(event: &StripeWebhookEvent) -> Result<WebhookEvent, WebhookResult> {
    let invoice: StripeInvoice =
        serde_json::from_value(event.data.object.clone()).map_err(|e| {
            tracing::error!("Failed to parse invoice: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid invoice")
        })?;

    // One-off invoices don't touch subscription state
    if invoice.subscription.is_none() {
        return Ok(WebhookEvent::Ignored);
    }

    let business_id = invoice.business_id();
    let period_end = invoice.period_end();
    tracing::debug!(
        "Stripe invoice {} billing_reason={:?}",
        invoice.id,
        invoice.billing_reason
    );

    Ok(WebhookEvent::InvoicePaid(InvoiceData {
        invoice_id: invoice.id,
        business: BusinessRef {
            business_id,
            subscription_id: invoice.subscription,
            customer_id: invoice.customer,
        },
        amount_paid_cents: invoice.amount_paid,
        period_end,
    }))
}

/// Axum handler for Stripe webhooks.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle_webhook(&StripeWebhookProvider, &state, headers, body).await
}
