use serde::Serialize;
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReferralStatus {
    Pending,
    Active,
}

/// Edge from the referrer to the business that signed up with its code.
#[derive(Debug, Clone, Serialize)]
pub struct Referral {
    pub id: String,
    pub referrer_id: String,
    pub referred_business_id: String,
    pub status: ReferralStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Progress of a referred business as shown on the referrer's dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralDisplayStatus {
    PendingOnboarding,
    PendingSubscription,
    Active,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferralSummary {
    pub id: String,
    pub referred_business_id: String,
    pub business_name: String,
    pub email: String,
    pub status: ReferralDisplayStatus,
    pub created_at: i64,
    pub earnings_cents: i64,
}
