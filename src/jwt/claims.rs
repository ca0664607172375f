use serde::{Deserialize, Serialize};

use crate::models::{Business, BusinessStatus};

/// Custom claims carried by a session token.
/// Standard claims (iss, sub, iat, exp) are handled by jwt-simple.
///
/// `subscription_status` is a snapshot taken at login; access decisions
/// always reload the business row instead of trusting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub business_id: String,
    pub email: String,
    pub is_admin: bool,
    pub is_salesperson: bool,
    pub subscription_status: BusinessStatus,
}

impl From<&Business> for SessionClaims {
    fn from(b: &Business) -> Self {
        Self {
            business_id: b.id.clone(),
            email: b.email.clone(),
            is_admin: b.is_admin,
            is_salesperson: b.is_salesperson,
            subscription_status: b.subscription_status,
        }
    }
}
