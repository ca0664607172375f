use axum::{Extension, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::coupons::{self, CouponValidation};
use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::{Json, Path};
use crate::id::{EntityType, require_valid_id};
use crate::middleware::BusinessContext;
use crate::models::{Business, Coupon, CreateCoupon};

#[derive(Debug, Deserialize)]
pub struct CouponCodeRequest {
    pub code: String,
}

pub async fn validate_coupon(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
    Json(input): Json<CouponCodeRequest>,
) -> Result<Json<CouponValidation>> {
    let conn = state.db.get()?;
    Ok(Json(coupons::validate_coupon(&conn, &input.code, ctx.id())?))
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub coupon: Coupon,
    pub business: Business,
}

pub async fn redeem_coupon(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
    Json(input): Json<CouponCodeRequest>,
) -> Result<Json<RedeemResponse>> {
    let mut conn = state.db.get()?;
    let now = chrono::Utc::now().timestamp();
    let coupon = coupons::redeem_coupon(&mut conn, &input.code, ctx.id(), now)?;
    let business = queries::get_business_by_id(&conn, ctx.id())?
        .ok_or_else(|| AppError::NotFound(msg::BUSINESS_NOT_FOUND.into()))?;
    Ok(Json(RedeemResponse { coupon, business }))
}

// ============ Admin ============

pub async fn admin_create_coupon(
    State(state): State<AppState>,
    Json(input): Json<CreateCoupon>,
) -> Result<(StatusCode, Json<Coupon>)> {
    let conn = state.db.get()?;
    let coupon = coupons::create_coupon(&conn, input)?;
    tracing::info!(coupon = %coupon.code, "Coupon created");
    Ok((StatusCode::CREATED, Json(coupon)))
}

pub async fn admin_list_coupons(State(state): State<AppState>) -> Result<Json<Vec<Coupon>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_coupons(&conn)?))
}

pub async fn admin_deactivate_coupon(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Coupon>> {
    require_valid_id(EntityType::Coupon, &id, msg::COUPON_NOT_FOUND)?;
    let conn = state.db.get()?;
    let coupon = queries::deactivate_coupon(&conn, &id)?
        .ok_or_else(|| AppError::NotFound(msg::COUPON_NOT_FOUND.into()))?;
    tracing::info!(coupon = %coupon.code, "Coupon deactivated");
    Ok(Json(coupon))
}
