mod bank_details;
mod business;
mod coupon;
mod earning;
mod qr_code;
mod referral;
mod review;
mod salesperson;
mod subscription;
mod verification_token;

pub use bank_details::*;
pub use business::*;
pub use coupon::*;
pub use earning::*;
pub use qr_code::*;
pub use referral::*;
pub use review::*;
pub use salesperson::*;
pub use subscription::*;
pub use verification_token::*;
