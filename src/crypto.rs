//! Password hashing and emailed-token helpers.

use rand::RngCore;
use rand::rngs::OsRng;
use scrypt::{Params, scrypt};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// scrypt cost: N = 2^14, r = 8, p = 1.
fn scrypt_params() -> Result<Params> {
    Params::new(14, 8, 1, KEY_LEN)
        .map_err(|e| AppError::Internal(format!("Invalid scrypt params: {}", e)))
}

fn derive_key(password: &str, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    let mut key = [0u8; KEY_LEN];
    scrypt(password.as_bytes(), salt, &scrypt_params()?, &mut key)
        .map_err(|e| AppError::Internal(format!("scrypt failed: {}", e)))?;
    Ok(key)
}

/// Hash a password. Output format: `hex(salt):hex(key)`.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let key = derive_key(password, &salt)?;
    Ok(format!("{}:{}", hex::encode(salt), hex::encode(key)))
}

/// Verify a password against a hash produced by `hash_password`.
/// A malformed stored hash never matches.
pub fn verify_password(stored: &str, password: &str) -> Result<bool> {
    let Some((salt_hex, key_hex)) = stored.split_once(':') else {
        return Ok(false);
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(key_hex)) else {
        return Ok(false);
    };
    if expected.len() != KEY_LEN {
        return Ok(false);
    }

    let derived = derive_key(password, &salt)?;
    Ok(derived.as_slice().ct_eq(expected.as_slice()).into())
}

/// Generate a random 32-byte token, hex encoded. Sent to the user, never stored.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash an emailed token for storage and lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"goldstar-token-v1:");
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
