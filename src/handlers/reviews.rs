use axum::{Extension, extract::State, http::StatusCode};
use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};

use crate::access;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::id::{EntityType, require_valid_id};
use crate::middleware::BusinessContext;
use crate::models::{CreateReview, Review, ReviewFilter};
use crate::pagination::{Paginated, PaginationQuery};
use crate::qr_codes;

const MAX_COMMENT_LEN: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct SubmitReviewRequest {
    pub rating: i64,
    pub comment: Option<String>,
    pub customer_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitReviewResponse {
    pub review_id: String,
    /// Present for positive reviews so the page can send the customer on to Google
    pub google_review_link: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Public review submission through a QR url id. Spends one trial credit when
/// the business is on trial; the check, the spend and the insert commit together.
pub async fn submit_review(
    State(state): State<AppState>,
    Path(url_id): Path<String>,
    Json(input): Json<SubmitReviewRequest>,
) -> Result<(StatusCode, Json<SubmitReviewResponse>)> {
    if !(1..=5).contains(&input.rating) {
        return Err(AppError::BadRequest("rating must be between 1 and 5".into()));
    }
    let comment = non_empty(input.comment);
    if comment.as_ref().is_some_and(|c| c.len() > MAX_COMMENT_LEN) {
        return Err(AppError::BadRequest("comment is too long".into()));
    }

    let mut conn = state.db.get()?;
    let now = chrono::Utc::now().timestamp();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let business = qr_codes::resolve(&tx, &url_id)?;
    let grant = access::consume_review_credit_in(&tx, &business.id, now)?.require()?;
    let review = queries::create_review(
        &tx,
        &business.id,
        &CreateReview {
            rating: input.rating,
            comment,
            customer_name: non_empty(input.customer_name),
        },
    )?;
    tx.commit()?;

    tracing::info!(
        business_id = %business.id,
        review_id = %review.id,
        rating = review.rating,
        access = ?grant,
        "Review submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitReviewResponse {
            review_id: review.id,
            google_review_link: if review.rating >= 4 {
                business.google_review_link
            } else {
                None
            },
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SurveyRequest {
    #[serde(default)]
    pub improvement_areas: Vec<String>,
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewPath {
    pub url_id: String,
    pub review_id: String,
}

/// Follow-up survey after a negative review.
pub async fn submit_survey(
    State(state): State<AppState>,
    Path(path): Path<ReviewPath>,
    Json(input): Json<SurveyRequest>,
) -> Result<StatusCode> {
    let areas: Vec<&str> = input
        .improvement_areas
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();
    let areas = if areas.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&areas)?)
    };
    let feedback = non_empty(input.feedback);
    require_valid_id(EntityType::Review, &path.review_id, msg::REVIEW_NOT_FOUND)?;

    let conn = state.db.get()?;
    let business = qr_codes::resolve(&conn, &path.url_id)?;
    if !queries::submit_review_survey(
        &conn,
        &business.id,
        &path.review_id,
        areas.as_deref(),
        feedback.as_deref(),
    )? {
        return Err(AppError::NotFound(msg::REVIEW_NOT_FOUND.into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ListReviewsQuery {
    pub filter: Option<ReviewFilter>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// The owner's review inbox. Requires paid or trial access; reads never spend credits.
pub async fn list_reviews(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
    Query(query): Query<ListReviewsQuery>,
) -> Result<Json<Paginated<Review>>> {
    let conn = state.db.get()?;
    let now = chrono::Utc::now().timestamp();
    access::check_access(&conn, ctx.id(), now)?.require()?;

    let page = PaginationQuery {
        limit: query.limit,
        offset: query.offset,
    };
    let (items, total) =
        queries::list_reviews(&conn, ctx.id(), query.filter, page.limit(), page.offset())?;
    Ok(Json(Paginated::new(items, total, &page)))
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub reply: String,
}

pub async fn reply_to_review(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
    Path(review_id): Path<String>,
    Json(input): Json<ReplyRequest>,
) -> Result<Json<Review>> {
    require_valid_id(EntityType::Review, &review_id, msg::REVIEW_NOT_FOUND)?;
    let reply = input.reply.trim();
    if reply.is_empty() {
        return Err(AppError::BadRequest("reply cannot be empty".into()));
    }

    let conn = state.db.get()?;
    let review = queries::reply_to_review(&conn, ctx.id(), &review_id, reply)?
        .ok_or_else(|| AppError::NotFound(msg::REVIEW_NOT_FOUND.into()))?;
    Ok(Json(review))
}
