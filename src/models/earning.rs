use serde::Serialize;
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EarningStatus {
    Pending,
    Paid,
}

/// Commission ledger entry. At most one per (seller, referred business).
#[derive(Debug, Clone, Serialize)]
pub struct ReferralEarning {
    pub id: String,
    pub seller_id: String,
    pub business_id: String,
    pub amount_cents: i64,
    pub status: EarningStatus,
    pub created_at: i64,
}
