//! Prefixed ID generation for GoldStar entities.
//!
//! All IDs carry a `gs_` brand prefix so they can never be confused with
//! Stripe's own ids (`cus_`, `sub_`, `cs_`, `in_`, `evt_`).
//!
//! Format: `gs_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

use crate::error::{AppError, Result};

/// Entity types that have prefixed IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Business,
    Subscription,
    Referral,
    Earning,
    Coupon,
    CouponRedemption,
    Review,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Business => "gs_biz",
            Self::Subscription => "gs_sub",
            Self::Referral => "gs_ref",
            Self::Earning => "gs_earn",
            Self::Coupon => "gs_cpn",
            Self::CouponRedemption => "gs_red",
            Self::Review => "gs_rev",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}

/// Cheap format check to reject garbage path parameters before hitting the database.
pub fn is_valid_id(entity: EntityType, s: &str) -> bool {
    let Some(hex_part) = s
        .strip_prefix(entity.prefix())
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };

    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Reject a malformed path id with the entity's not-found error.
pub fn require_valid_id(entity: EntityType, s: &str, not_found: &str) -> Result<()> {
    if is_valid_id(entity, s) {
        Ok(())
    } else {
        Err(AppError::NotFound(not_found.to_string()))
    }
}
