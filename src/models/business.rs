use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Denormalized subscription state on the business row.
///
/// Only the subscription state tracker writes this column; the access gate
/// reads it without joining `subscriptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BusinessStatus {
    Pending,
    Trial,
    Active,
    Cancelling,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct Business {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub business_name: String,
    pub owner_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub google_review_link: Option<String>,
    pub subscription_status: BusinessStatus,
    pub trial_reviews_remaining: i64,
    pub trial_started_at: Option<i64>,
    pub referral_code: Option<String>,
    pub total_referral_earnings_cents: i64,
    pub onboarding_completed: bool,
    pub email_verified: bool,
    pub is_admin: bool,
    pub is_salesperson: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateBusiness {
    pub email: String,
    pub password_hash: String,
    pub business_name: String,
    pub owner_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBusinessProfile {
    pub business_name: Option<String>,
    pub owner_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub google_review_link: Option<String>,
}

/// What the public review page behind a QR code may see.
#[derive(Debug, Clone, Serialize)]
pub struct PublicBusiness {
    pub business_name: String,
    pub google_review_link: Option<String>,
}

impl From<&Business> for PublicBusiness {
    fn from(b: &Business) -> Self {
        Self {
            business_name: b.business_name.clone(),
            google_review_link: b.google_review_link.clone(),
        }
    }
}
