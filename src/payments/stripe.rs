use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::StripeSettings;
use crate::error::{AppError, Result, msg};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    id: String,
    url: String,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: String,
    webhook_secret: String,
}

/// Parameters for a subscription checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub business_id: &'a str,
    pub customer_email: &'a str,
    pub price_id: &'a str,
    /// Stripe coupon id to apply (our discount coupons share their code with Stripe)
    pub coupon_code: Option<&'a str>,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

impl StripeClient {
    pub fn new(settings: &StripeSettings) -> Self {
        Self::with_api_base(settings, STRIPE_API_BASE)
    }

    /// Point the client at a different API host (stripe-mock, tests).
    pub fn with_api_base(settings: &StripeSettings, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: settings.secret_key.clone(),
            webhook_secret: settings.webhook_secret.clone(),
        }
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!("Stripe API error: {}", error_text)));
        }
        Ok(response)
    }

    /// Create a subscription checkout session. Returns (session id, redirect url).
    ///
    /// `business_id` is attached to both the session and the subscription
    /// metadata so every later event can be traced back to the business.
    pub async fn create_checkout_session(&self, req: &CheckoutRequest<'_>) -> Result<(String, String)> {
        let mut form = vec![
            ("mode", "subscription"),
            ("success_url", req.success_url),
            ("cancel_url", req.cancel_url),
            ("customer_email", req.customer_email),
            ("line_items[0][price]", req.price_id),
            ("line_items[0][quantity]", "1"),
            ("metadata[business_id]", req.business_id),
            ("subscription_data[metadata][business_id]", req.business_id),
        ];
        if let Some(code) = req.coupon_code {
            form.push(("metadata[coupon_code]", code));
            form.push(("discounts[0][coupon]", code));
        }

        let session: CreateSessionResponse = self
            .post_form("/v1/checkout/sessions", &form)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))?;

        Ok((session.id, session.url))
    }

    /// Create a billing portal session for updating the payment method. Returns the url.
    pub async fn create_billing_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String> {
        let session: CreateSessionResponse = self
            .post_form(
                "/v1/billing_portal/sessions",
                &[("customer", customer_id), ("return_url", return_url)],
            )
            .await?
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))?;

        Ok(session.url)
    }

    /// Ask Stripe to cancel the subscription when the current period ends.
    pub async fn cancel_at_period_end(&self, subscription_id: &str) -> Result<StripeSubscription> {
        self.post_form(
            &format!("/v1/subscriptions/{}", subscription_id),
            &[("cancel_at_period_end", "true")],
        )
        .await?
        .json()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))
    }

    /// Fetch a subscription with its default payment method expanded.
    pub async fn get_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        let response = self
            .client
            .get(format!("{}/v1/subscriptions/{}", self.api_base, subscription_id))
            .basic_auth(&self.secret_key, None::<&str>)
            .query(&[("expand[]", "default_payment_method")])
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!("Stripe API error: {}", error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))
    }

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    /// Maximum allowed clock skew for timestamps from the future.
    const WEBHOOK_FUTURE_SKEW_SECS: i64 = 60;

    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        self.verify_webhook_signature_at(payload, signature, chrono::Utc::now().timestamp())
    }

    /// Verify a `Stripe-Signature` header (`t=timestamp,v1=signature`) as of `now`.
    pub fn verify_webhook_signature_at(&self, payload: &[u8], signature: &str, now: i64) -> Result<bool> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in signature.split(',') {
            if let Some(t) = part.trim().strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.trim().strip_prefix("v1=") {
                signatures.push(s);
            }
        }

        let timestamp_str =
            timestamp.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;
        if signatures.is_empty() {
            return Err(AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()));
        }

        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| AppError::BadRequest(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

        let age = now - timestamp;
        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Ok(false);
        }
        if age < -Self::WEBHOOK_FUTURE_SKEW_SECS {
            tracing::warn!("Stripe webhook rejected: timestamp in the future (age={}s)", age);
            return Ok(false);
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;
        mac.update(timestamp_str.as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());
        let expected_bytes = expected.as_bytes();

        // Stripe may send several v1 signatures during secret rotation; any match is enough.
        // Signature length is not secret, so the length check need not be constant-time.
        Ok(signatures.iter().any(|provided| {
            let provided_bytes = provided.as_bytes();
            provided_bytes.len() == expected_bytes.len()
                && bool::from(expected_bytes.ct_eq(provided_bytes))
        }))
    }
}

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeMetadata {
    pub business_id: Option<String>,
    pub coupon_code: Option<String>,
}

// ============ checkout.session.completed ============

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub mode: Option<String>,
    pub payment_status: Option<String>,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    /// Total charged, in cents
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: StripeMetadata,
}

// ============ customer.subscription.* ============

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: Option<String>,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub metadata: StripeMetadata,
    pub items: Option<StripeList<StripeSubscriptionItem>>,
    /// Either an id or, when expanded, the payment method object.
    pub default_payment_method: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItem {
    pub current_period_end: Option<i64>,
    pub price: Option<StripePrice>,
}

#[derive(Debug, Deserialize)]
pub struct StripePrice {
    pub unit_amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripePaymentMethod {
    card: Option<StripeCard>,
}

#[derive(Debug, Deserialize)]
pub struct StripeCard {
    pub brand: String,
    pub last4: String,
}

impl StripeSubscription {
    fn first_item(&self) -> Option<&StripeSubscriptionItem> {
        self.items.as_ref().and_then(|items| items.data.first())
    }

    /// Newer API versions report the period end per item instead of on the subscription.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end
            .or_else(|| self.first_item().and_then(|item| item.current_period_end))
    }

    pub fn amount_cents(&self) -> Option<i64> {
        self.first_item()
            .and_then(|item| item.price.as_ref())
            .and_then(|price| price.unit_amount)
    }

    /// Card details, available only when `default_payment_method` was expanded.
    pub fn card(&self) -> Option<StripeCard> {
        let value = self.default_payment_method.as_ref()?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value::<StripePaymentMethod>(value.clone())
            .ok()
            .and_then(|pm| pm.card)
    }
}

// ============ invoice.payment_succeeded ============

#[derive(Debug, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
    pub billing_reason: Option<String>,
    pub subscription_details: Option<StripeSubscriptionDetails>,
    pub lines: Option<StripeList<StripeInvoiceLine>>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionDetails {
    #[serde(default)]
    pub metadata: StripeMetadata,
}

#[derive(Debug, Deserialize)]
pub struct StripeInvoiceLine {
    pub period: Option<StripePeriod>,
}

#[derive(Debug, Deserialize)]
pub struct StripePeriod {
    pub end: Option<i64>,
}

impl StripeInvoice {
    pub fn business_id(&self) -> Option<String> {
        self.subscription_details
            .as_ref()
            .and_then(|d| d.metadata.business_id.clone())
    }

    /// End of the billing period this invoice paid for.
    pub fn period_end(&self) -> Option<i64> {
        self.lines
            .as_ref()
            .and_then(|lines| lines.data.first())
            .and_then(|line| line.period.as_ref())
            .and_then(|period| period.end)
    }
}
