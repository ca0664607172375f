use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

impl TokenPurpose {
    /// Lifetime in seconds.
    pub fn ttl_secs(&self) -> i64 {
        match self {
            Self::EmailVerification => 24 * 3600,
            Self::PasswordReset => 3600,
        }
    }
}

/// Single-use emailed token. Only the SHA-256 of the token is stored.
#[derive(Debug, Clone)]
pub struct VerificationToken {
    pub token_hash: String,
    pub business_id: String,
    pub purpose: TokenPurpose,
    pub expires_at: i64,
    pub created_at: i64,
}
