use serde::Serialize;

/// Provider-side subscription mirror, one row per business.
///
/// `status` keeps the provider's raw value (`active`, `past_due`, `canceled`, ...)
/// plus the local `cancelling` and `suspended` states.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: String,
    pub business_id: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub status: String,
    pub amount_cents: Option<i64>,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
    pub cancelled_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub card_brand: Option<String>,
    pub card_last4: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentMethod {
    pub brand: String,
    pub last4: String,
}

impl Subscription {
    pub fn payment_method(&self) -> Option<PaymentMethod> {
        match (&self.card_brand, &self.card_last4) {
            (Some(brand), Some(last4)) => Some(PaymentMethod {
                brand: brand.clone(),
                last4: last4.clone(),
            }),
            _ => None,
        }
    }
}
