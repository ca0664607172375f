//! QR codes for review pages: owner issuance and the public page lookup.

use axum::{Extension, extract::State};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::middleware::BusinessContext;
use crate::models::{PublicBusiness, QrCode};
use crate::qr_codes;

#[derive(Debug, Default, Deserialize)]
pub struct CreateQrCodeRequest {
    pub qr_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QrCodeResponse {
    #[serde(flatten)]
    pub qr_code: QrCode,
    pub review_url: String,
}

fn with_url(state: &AppState, qr_code: QrCode) -> QrCodeResponse {
    QrCodeResponse {
        review_url: qr_codes::review_url(&state.frontend_url, &qr_code.url_id),
        qr_code,
    }
}

/// Get-or-create: printing the same QR twice yields the same url.
pub async fn create_qr_code(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
    Json(input): Json<CreateQrCodeRequest>,
) -> Result<Json<QrCodeResponse>> {
    let qr_type = qr_codes::normalize_qr_type(input.qr_type.as_deref())?;
    let conn = state.db.get()?;
    let qr_code = qr_codes::get_or_create(&conn, ctx.id(), &qr_type)?;
    Ok(Json(with_url(&state, qr_code)))
}

pub async fn list_qr_codes(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<Vec<QrCodeResponse>>> {
    let conn = state.db.get()?;
    let items = queries::list_qr_codes(&conn, ctx.id())?
        .into_iter()
        .map(|qr| with_url(&state, qr))
        .collect();
    Ok(Json(items))
}

/// What a customer sees after scanning.
pub async fn review_page(
    State(state): State<AppState>,
    Path(url_id): Path<String>,
) -> Result<Json<PublicBusiness>> {
    let conn = state.db.get()?;
    let business = qr_codes::resolve(&conn, &url_id)?;
    Ok(Json(PublicBusiness::from(&business)))
}
