use axum::{Extension, extract::State};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::middleware::BusinessContext;
use crate::models::ReferralEarning;
use crate::pagination::{Paginated, PaginationQuery};
use crate::referrals::{self, ReferralDashboard};

#[derive(Debug, Serialize)]
pub struct ReferralCodeResponse {
    pub code: String,
}

pub async fn get_referral_code(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<ReferralCodeResponse>> {
    let conn = state.db.get()?;
    let code = referrals::get_or_create_referral_code(&conn, ctx.id())?;
    Ok(Json(ReferralCodeResponse { code }))
}

#[derive(Debug, Serialize)]
pub struct ReferralLinkResponse {
    pub code: String,
    pub link: String,
}

pub async fn get_referral_link(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<ReferralLinkResponse>> {
    let conn = state.db.get()?;
    let code = referrals::get_or_create_referral_code(&conn, ctx.id())?;
    let link = referrals::referral_link(&state.frontend_url, &code);
    Ok(Json(ReferralLinkResponse { code, link }))
}

pub async fn referral_dashboard(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<ReferralDashboard>> {
    let conn = state.db.get()?;
    let now = chrono::Utc::now().timestamp();
    Ok(Json(referrals::dashboard(&conn, ctx.id(), now)?))
}

pub async fn list_earnings(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Paginated<ReferralEarning>>> {
    let conn = state.db.get()?;
    let (items, total) =
        queries::list_earnings_for_seller(&conn, ctx.id(), page.limit(), page.offset())?;
    Ok(Json(Paginated::new(items, total, &page)))
}
