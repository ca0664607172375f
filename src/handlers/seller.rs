//! Salesperson workspace: referral performance and commission payments.

use axum::{Extension, extract::State};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::middleware::BusinessContext;
use crate::models::{ReferralSummary, SellerPayment};
use crate::pagination::{Paginated, PaginationQuery};
use crate::referrals::{self, ReferralStats};

use super::referrals::ReferralLinkResponse;

#[derive(Debug, Serialize)]
pub struct SellerDashboard {
    pub stats: ReferralStats,
    /// None until the seller first asks for a code
    pub referral_code: Option<String>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<SellerDashboard>> {
    let conn = state.db.get()?;
    let now = chrono::Utc::now().timestamp();
    let stats = referrals::dashboard(&conn, ctx.id(), now)?.stats;
    Ok(Json(SellerDashboard {
        stats,
        referral_code: ctx.business.referral_code.clone(),
    }))
}

pub async fn list_referrals(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<Vec<ReferralSummary>>> {
    let conn = state.db.get()?;
    let now = chrono::Utc::now().timestamp();
    Ok(Json(referrals::dashboard(&conn, ctx.id(), now)?.referrals))
}

/// Get-or-create, so repeated calls keep the printed code valid.
pub async fn generate_code(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<ReferralLinkResponse>> {
    let conn = state.db.get()?;
    let code = referrals::get_or_create_referral_code(&conn, ctx.id())?;
    let link = referrals::referral_link(&state.frontend_url, &code);
    Ok(Json(ReferralLinkResponse { code, link }))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Paginated<SellerPayment>>> {
    let conn = state.db.get()?;
    let (items, total) =
        queries::list_seller_payments(&conn, ctx.id(), page.limit(), page.offset())?;
    Ok(Json(Paginated::new(items, total, &page)))
}
