use serde::Serialize;

/// Canadian direct-deposit details used to pay out referral commissions.
#[derive(Debug, Clone, Serialize)]
pub struct BankDetails {
    pub business_id: String,
    pub account_holder: String,
    pub transit_number: String,
    pub institution_number: String,
    pub account_number: String,
    pub updated_at: i64,
}

impl BankDetails {
    /// Copy safe to return over the API: account number reduced to its last 4 digits.
    pub fn masked(&self) -> Self {
        let visible = self
            .account_number
            .len()
            .saturating_sub(4);
        Self {
            account_number: format!(
                "{}{}",
                "*".repeat(visible),
                &self.account_number[visible..]
            ),
            ..self.clone()
        }
    }
}
