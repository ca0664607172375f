use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// User-facing error messages shared between handlers and tests.
pub mod msg {
    pub const BUSINESS_NOT_FOUND: &str = "Business not found";
    pub const SUBSCRIPTION_NOT_FOUND: &str = "Subscription not found";
    pub const REVIEW_NOT_FOUND: &str = "Review not found";
    pub const COUPON_NOT_FOUND: &str = "Coupon not found";
    pub const SALESPERSON_NOT_FOUND: &str = "Salesperson not found";
    pub const REVIEW_PAGE_NOT_FOUND: &str = "Review page not found";

    pub const EMAIL_TAKEN: &str = "An account with this email already exists";
    pub const INVALID_REFERRAL_CODE: &str = "Invalid referral code";
    pub const INVALID_OR_EXPIRED_TOKEN: &str = "Invalid or expired token";
    pub const PASSWORD_TOO_SHORT: &str = "Password must be at least 8 characters";
    pub const INVALID_EMAIL: &str = "Invalid email address";

    pub const INVALID_COUPON_CODE: &str = "Coupon code must be 4-16 uppercase letters or digits";
    pub const COUPON_INACTIVE: &str = "Coupon is no longer active";
    pub const COUPON_EXHAUSTED: &str = "Coupon has reached its usage limit";
    pub const COUPON_ALREADY_REDEEMED: &str = "Coupon already redeemed";
    pub const DISCOUNT_AT_CHECKOUT: &str = "Discount coupons are applied at checkout";

    pub const TRIAL_UNAVAILABLE: &str = "Trial is only available once, before subscribing";
    pub const ADMIN_REQUIRED: &str = "Admin access required";
    pub const SALESPERSON_REQUIRED: &str = "Salesperson access required";

    pub const SUBSCRIPTION_ENDED: &str = "Your subscription has ended";
    pub const TRIAL_ENDED: &str = "Your free trial has ended";

    pub const STRIPE_NOT_CONFIGURED: &str = "Payments are not configured";
    pub const INVALID_SIGNATURE_FORMAT: &str = "Invalid signature format";
    pub const INVALID_TIMESTAMP_IN_SIGNATURE: &str = "Invalid timestamp in signature";
    pub const INVALID_WEBHOOK_SECRET: &str = "Invalid webhook secret";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Premium action attempted without paid or trial access.
    #[error("Subscription ended: {0}")]
    SubscriptionEnded(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// A UNIQUE or other constraint rejected the write.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            AppError::Database(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    subscription_ended: bool,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut subscription_ended = false;
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone())),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::SubscriptionEnded(reason) => {
                subscription_ended = true;
                (StatusCode::FORBIDDEN, "Subscription required", Some(reason.clone()))
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            subscription_ended,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
