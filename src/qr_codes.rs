//! Review-page ids behind printed QR codes.
//!
//! A QR code encodes `{frontend}/review/{url_id}`. The url id is random and
//! opaque, so a printed code never reveals the business id and can be mapped
//! to exactly one business per `qr_type`.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, Result, msg};
use crate::models::{Business, QrCode};

pub const URL_ID_LEN: usize = 15;
const URL_ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const MAX_URL_ID_ATTEMPTS: usize = 5;

pub const DEFAULT_QR_TYPE: &str = "review";

static QR_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]{1,32}$").expect("valid qr type regex"));

pub fn generate_url_id() -> String {
    let mut rng = rand::thread_rng();
    (0..URL_ID_LEN)
        .map(|_| URL_ID_CHARSET[rng.gen_range(0..URL_ID_CHARSET.len())] as char)
        .collect()
}

fn is_well_formed_url_id(url_id: &str) -> bool {
    url_id.len() == URL_ID_LEN && url_id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Lowercased qr type, defaulting to `review`.
pub fn normalize_qr_type(qr_type: Option<&str>) -> Result<String> {
    let qr_type = match qr_type.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_ascii_lowercase(),
        _ => return Ok(DEFAULT_QR_TYPE.to_string()),
    };
    if !QR_TYPE.is_match(&qr_type) {
        return Err(AppError::BadRequest(
            "qr_type must be 1-32 lowercase letters, digits, '-' or '_'".into(),
        ));
    }
    Ok(qr_type)
}

/// Return the business's url id for `qr_type`, issuing one on first call.
/// Concurrent first calls converge on whichever row landed first.
pub fn get_or_create(conn: &Connection, business_id: &str, qr_type: &str) -> Result<QrCode> {
    if let Some(existing) = queries::get_qr_code(conn, business_id, qr_type)? {
        return Ok(existing);
    }
    queries::get_business_by_id(conn, business_id)?
        .ok_or_else(|| AppError::NotFound(msg::BUSINESS_NOT_FOUND.into()))?;

    for _ in 0..MAX_URL_ID_ATTEMPTS {
        let url_id = generate_url_id();
        match queries::try_create_qr_code(conn, &url_id, business_id, qr_type) {
            Ok(created) => {
                if created {
                    tracing::info!(business_id = %business_id, qr_type = %qr_type, "QR code issued");
                }
                return queries::get_qr_code(conn, business_id, qr_type)?
                    .ok_or_else(|| AppError::Internal("qr code vanished".into()));
            }
            Err(e) if e.is_unique_violation() => {
                tracing::debug!("QR url id collision, retrying");
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::Internal("could not generate a unique qr url id".into()))
}

/// Business behind a public review page, or 404.
pub fn resolve(conn: &Connection, url_id: &str) -> Result<Business> {
    let not_found = || AppError::NotFound(msg::REVIEW_PAGE_NOT_FOUND.into());
    if !is_well_formed_url_id(url_id) {
        return Err(not_found());
    }
    let qr = queries::get_qr_code_by_url_id(conn, url_id)?.ok_or_else(not_found)?;
    queries::get_business_by_id(conn, &qr.business_id)?.ok_or_else(not_found)
}

pub fn review_url(frontend_url: &str, url_id: &str) -> String {
    format!("{}/review/{}", frontend_url.trim_end_matches('/'), url_id)
}
