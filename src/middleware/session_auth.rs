use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::Business;

/// The authenticated business, inserted by [`session_auth`].
///
/// Loaded fresh from the database on every request, so status and role
/// changes take effect before the session token expires.
#[derive(Clone, Debug)]
pub struct BusinessContext {
    pub business: Business,
}

impl BusinessContext {
    pub fn id(&self) -> &str {
        &self.business.id
    }
}

/// `Authorization: Bearer <token>`
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn session_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = extract_bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;
    let claims = state.session_keys.verify(token)?;

    let business = {
        let conn = state.db.get()?;
        queries::get_business_by_id(&conn, &claims.business_id)?
    }
    .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(BusinessContext { business });
    Ok(next.run(request).await)
}
