use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CouponType {
    /// `value` is the number of free trial reviews granted
    Trial,
    /// `value` is a percentage off, applied at checkout
    Discount,
}

#[derive(Debug, Clone, Serialize)]
pub struct Coupon {
    pub id: String,
    pub code: String,
    pub coupon_type: CouponType,
    pub value: i64,
    pub max_uses: Option<i64>,
    pub times_used: i64,
    pub is_active: bool,
    pub created_at: i64,
}

impl Coupon {
    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.times_used >= max)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCoupon {
    pub code: String,
    pub coupon_type: CouponType,
    pub value: i64,
    pub max_uses: Option<i64>,
}
