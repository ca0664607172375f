use axum::extract::State;
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::email;
use crate::error::{AppError, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::id::{EntityType, require_valid_id};
use crate::models::{Business, ReferralSummary, SalespersonSummary, SellerPayment};
use crate::pagination::{Paginated, PaginationQuery};
use crate::referrals;
use crate::subscription_state;

pub async fn list_businesses(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Paginated<Business>>> {
    let conn = state.db.get()?;
    let (items, total) = queries::list_businesses(&conn, page.limit(), page.offset())?;
    Ok(Json(Paginated::new(items, total, &page)))
}

/// Stop a business's access. The provider subscription is left alone;
/// cancelling it there is a manual step.
pub async fn suspend_business(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Business>> {
    require_valid_id(EntityType::Business, &id, msg::BUSINESS_NOT_FOUND)?;
    let business = {
        let mut conn = state.db.get()?;
        let now = chrono::Utc::now().timestamp();
        subscription_state::suspend(&mut conn, &id, now)?;
        queries::get_business_by_id(&conn, &id)?
            .ok_or_else(|| AppError::NotFound(msg::BUSINESS_NOT_FOUND.into()))?
    };

    state
        .email
        .spawn_send(email::suspension_email(&business.email, &business.business_name));
    Ok(Json(business))
}

#[derive(Debug, Deserialize)]
pub struct SalespersonFlagRequest {
    pub is_salesperson: bool,
}

pub async fn set_salesperson(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<SalespersonFlagRequest>,
) -> Result<Json<Business>> {
    require_valid_id(EntityType::Business, &id, msg::BUSINESS_NOT_FOUND)?;
    let conn = state.db.get()?;
    let business = queries::set_salesperson(&conn, &id, input.is_salesperson)?
        .ok_or_else(|| AppError::NotFound(msg::BUSINESS_NOT_FOUND.into()))?;
    tracing::info!(
        business_id = %business.id,
        is_salesperson = business.is_salesperson,
        "Salesperson flag changed"
    );
    Ok(Json(business))
}

pub async fn list_salespeople(State(state): State<AppState>) -> Result<Json<Vec<SalespersonSummary>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_salespeople(&conn)?))
}

fn load_salesperson(conn: &Connection, id: &str) -> Result<SalespersonSummary> {
    require_valid_id(EntityType::Business, id, msg::SALESPERSON_NOT_FOUND)?;
    queries::get_salesperson(conn, id)?
        .ok_or_else(|| AppError::NotFound(msg::SALESPERSON_NOT_FOUND.into()))
}

pub async fn get_salesperson(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SalespersonSummary>> {
    let conn = state.db.get()?;
    Ok(Json(load_salesperson(&conn, &id)?))
}

pub async fn salesperson_referrals(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ReferralSummary>>> {
    let conn = state.db.get()?;
    let salesperson = load_salesperson(&conn, &id)?;
    let now = chrono::Utc::now().timestamp();
    Ok(Json(referrals::dashboard(&conn, &salesperson.id, now)?.referrals))
}

pub async fn salesperson_payments(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Paginated<SellerPayment>>> {
    let conn = state.db.get()?;
    let salesperson = load_salesperson(&conn, &id)?;
    let (items, total) =
        queries::list_seller_payments(&conn, &salesperson.id, page.limit(), page.offset())?;
    Ok(Json(Paginated::new(items, total, &page)))
}
