use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::{AppError, Result, msg};

use super::BusinessContext;

/// Layered inside [`super::session_auth`]: only admins pass.
pub async fn admin_auth(request: Request, next: Next) -> Result<Response> {
    let is_admin = request
        .extensions()
        .get::<BusinessContext>()
        .map(|ctx| ctx.business.is_admin)
        .ok_or(AppError::Unauthorized)?;

    if !is_admin {
        return Err(AppError::Forbidden(msg::ADMIN_REQUIRED.into()));
    }
    Ok(next.run(request).await)
}
