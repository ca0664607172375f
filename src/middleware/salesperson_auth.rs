use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::{AppError, Result, msg};

use super::BusinessContext;

/// Layered inside [`super::session_auth`]: only businesses flagged as salespeople pass.
pub async fn salesperson_auth(request: Request, next: Next) -> Result<Response> {
    let is_salesperson = request
        .extensions()
        .get::<BusinessContext>()
        .map(|ctx| ctx.business.is_salesperson)
        .ok_or(AppError::Unauthorized)?;

    if !is_salesperson {
        return Err(AppError::Forbidden(msg::SALESPERSON_REQUIRED.into()));
    }
    Ok(next.run(request).await)
}
