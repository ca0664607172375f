use jwt_simple::prelude::*;

use crate::error::{AppError, Result};
use super::SessionClaims;

const ISSUER: &str = "goldstar";

/// Session lifetime.
pub const SESSION_TTL_HOURS: u64 = 24;

/// HS256 key used to issue and verify session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    key: HS256Key,
}

impl SessionKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            key: HS256Key::from_bytes(secret),
        }
    }

    /// Sign a session token for the given claims.
    pub fn issue(&self, claims: SessionClaims) -> Result<String> {
        let subject = claims.business_id.clone();
        let jwt_claims = Claims::with_custom_claims(claims, Duration::from_hours(SESSION_TTL_HOURS))
            .with_issuer(ISSUER)
            .with_subject(subject);

        self.key
            .authenticate(jwt_claims)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify a session token and extract its claims.
    /// Any failure (bad signature, expired, wrong issuer) is `Unauthorized`.
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let options = VerificationOptions {
            allowed_issuers: Some(HashSet::from_strings(&[ISSUER])),
            ..Default::default()
        };

        self.key
            .verify_token::<SessionClaims>(token, Some(options))
            .map(|claims| claims.custom)
            .map_err(|e| {
                tracing::debug!("Session token rejected: {}", e);
                AppError::Unauthorized
            })
    }
}
