//! GoldStar - review-reputation backend for local businesses
//!
//! Businesses subscribe through Stripe (or run a review-limited trial), collect
//! customer reviews behind QR codes, and earn a one-time commission for every
//! business they refer that converts to a paid plan.

pub mod access;
pub mod commission;
pub mod config;
pub mod coupons;
pub mod crypto;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod payments;
pub mod qr_codes;
pub mod rate_limit;
pub mod referrals;
pub mod subscription_state;
