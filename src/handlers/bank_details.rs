//! Payout bank details (Canadian transit / institution / account numbers).

use std::sync::LazyLock;

use axum::{Extension, extract::State};
use regex::Regex;
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::middleware::BusinessContext;
use crate::models::BankDetails;

static TRANSIT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}$").expect("valid transit regex"));
static INSTITUTION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3}$").expect("valid institution regex"));
static ACCOUNT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{7,12}$").expect("valid account regex"));

#[derive(Debug, Deserialize)]
pub struct BankDetailsRequest {
    pub account_holder: String,
    pub transit_number: String,
    pub institution_number: String,
    pub account_number: String,
}

impl BankDetailsRequest {
    fn validate(&self) -> Result<()> {
        if self.account_holder.trim().is_empty() {
            return Err(AppError::BadRequest("account_holder is required".into()));
        }
        if !TRANSIT_NUMBER.is_match(self.transit_number.trim()) {
            return Err(AppError::BadRequest("transit_number must be 5 digits".into()));
        }
        if !INSTITUTION_NUMBER.is_match(self.institution_number.trim()) {
            return Err(AppError::BadRequest("institution_number must be 3 digits".into()));
        }
        if !ACCOUNT_NUMBER.is_match(self.account_number.trim()) {
            return Err(AppError::BadRequest("account_number must be 7 to 12 digits".into()));
        }
        Ok(())
    }
}

pub async fn get_bank_details(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<Option<BankDetails>>> {
    let conn = state.db.get()?;
    let details = queries::get_bank_details(&conn, ctx.id())?;
    Ok(Json(details.map(|d| d.masked())))
}

pub async fn put_bank_details(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
    Json(input): Json<BankDetailsRequest>,
) -> Result<Json<BankDetails>> {
    input.validate()?;

    let conn = state.db.get()?;
    let details = queries::upsert_bank_details(
        &conn,
        ctx.id(),
        input.account_holder.trim(),
        input.transit_number.trim(),
        input.institution_number.trim(),
        input.account_number.trim(),
    )?;
    tracing::info!(business_id = %ctx.id(), "Bank details updated");
    Ok(Json(details.masked()))
}
