use serde::Serialize;

use super::EarningStatus;

/// Admin view of a business flagged as salesperson, with its referral totals.
#[derive(Debug, Clone, Serialize)]
pub struct SalespersonSummary {
    pub id: String,
    pub business_name: String,
    pub email: String,
    pub referral_code: Option<String>,
    pub total_referrals: i64,
    pub active_referrals: i64,
    pub total_commission_cents: i64,
    pub created_at: i64,
}

/// Commission entry labelled with the referred business's name.
#[derive(Debug, Clone, Serialize)]
pub struct SellerPayment {
    pub id: String,
    pub business_id: String,
    pub business_name: String,
    pub amount_cents: i64,
    pub status: EarningStatus,
    pub created_at: i64,
}
