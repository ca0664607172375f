use axum::{Extension, extract::State};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::middleware::BusinessContext;
use crate::models::{Business, Review, ReviewStats, UpdateBusinessProfile};

const DASHBOARD_RECENT_REVIEWS: i64 = 5;

pub async fn get_me(Extension(ctx): Extension<BusinessContext>) -> Json<Business> {
    Json(ctx.business)
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
    Json(input): Json<UpdateBusinessProfile>,
) -> Result<Json<Business>> {
    if input.business_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("business_name cannot be empty".into()));
    }
    if input
        .google_review_link
        .as_deref()
        .is_some_and(|link| !link.is_empty() && !link.starts_with("https://"))
    {
        return Err(AppError::BadRequest("google_review_link must be an https URL".into()));
    }

    let conn = state.db.get()?;
    // None: no fields given, nothing written
    let business = queries::update_business_profile(&conn, ctx.id(), &input)?.unwrap_or(ctx.business);
    Ok(Json(business))
}

pub async fn complete_onboarding(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<Business>> {
    let conn = state.db.get()?;
    queries::set_onboarding_completed(&conn, ctx.id())?;
    let business = queries::get_business_by_id(&conn, ctx.id())?
        .ok_or_else(|| AppError::NotFound(msg::BUSINESS_NOT_FOUND.into()))?;
    tracing::info!(business_id = %business.id, "Onboarding completed");
    Ok(Json(business))
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub stats: ReviewStats,
    pub recent_reviews: Vec<Review>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<DashboardResponse>> {
    let conn = state.db.get()?;
    let stats = queries::get_review_stats(&conn, ctx.id())?;
    let (recent_reviews, _) =
        queries::list_reviews(&conn, ctx.id(), None, DASHBOARD_RECENT_REVIEWS, 0)?;
    Ok(Json(DashboardResponse { stats, recent_reviews }))
}

