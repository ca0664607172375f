//! Signup, login, email verification and password reset.

use std::sync::LazyLock;

use axum::{Extension, extract::State, http::StatusCode};
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::crypto::{generate_token, hash_password, hash_token, verify_password};
use crate::db::{AppState, queries};
use crate::email;
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::jwt::SessionClaims;
use crate::middleware::BusinessContext;
use crate::models::{Business, CreateBusiness, TokenPurpose};
use crate::referrals;

pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

fn validate_email(email: &str) -> Result<()> {
    if !EMAIL.is_match(email.trim()) {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL.into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(msg::PASSWORD_TOO_SHORT.into()));
    }
    Ok(())
}

/// Store a fresh single-use token and return the plaintext for the email link.
fn issue_token(conn: &Connection, business_id: &str, purpose: TokenPurpose) -> Result<String> {
    let token = generate_token();
    queries::create_verification_token(conn, &hash_token(&token), business_id, purpose)?;
    Ok(token)
}

fn frontend_link(state: &AppState, path: &str, token: &str) -> String {
    format!("{}/{}?token={}", state.frontend_url.trim_end_matches('/'), path, token)
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub business: Business,
}

fn session_response(state: &AppState, business: Business) -> Result<Json<SessionResponse>> {
    let token = state.session_keys.issue(SessionClaims::from(&business))?;
    Ok(Json(SessionResponse { token, business }))
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub business_name: String,
    pub owner_name: Option<String>,
    pub referral_code: Option<String>,
}

/// Create the business and, when a referral code was given, the pending
/// referral edge, together with an email verification token. One transaction.
/// Returns the business and the plaintext verification token.
pub fn signup_business(conn: &mut Connection, input: &SignupRequest) -> Result<(Business, String)> {
    validate_email(&input.email)?;
    validate_password(&input.password)?;
    let business_name = input.business_name.trim();
    if business_name.is_empty() {
        return Err(AppError::BadRequest("business_name is required".into()));
    }

    let password_hash = hash_password(&input.password)?;
    let tx = conn.transaction()?;

    if queries::email_exists(&tx, &input.email)? {
        return Err(AppError::Conflict(msg::EMAIL_TAKEN.into()));
    }

    let referrer = match input.referral_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Some(
            referrals::resolve_referral_code(&tx, code)?
                .ok_or_else(|| AppError::BadRequest(msg::INVALID_REFERRAL_CODE.into()))?,
        ),
        _ => None,
    };

    let business = queries::create_business(
        &tx,
        &CreateBusiness {
            email: input.email.clone(),
            password_hash,
            business_name: business_name.to_string(),
            owner_name: input.owner_name.clone(),
        },
    )
    .map_err(|e| {
        // Lost a race with a concurrent signup for the same email
        if e.is_unique_violation() {
            AppError::Conflict(msg::EMAIL_TAKEN.into())
        } else {
            e
        }
    })?;

    if let Some(referrer) = &referrer {
        referrals::register_referral(&tx, &referrer.id, &business.id)?;
    }

    let token = issue_token(&tx, &business.id, TokenPurpose::EmailVerification)?;
    tx.commit()?;

    tracing::info!(
        business_id = %business.id,
        referred_by = ?referrer.as_ref().map(|r| r.id.as_str()),
        "Business signed up"
    );
    Ok((business, token))
}

pub async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let (business, token) = {
        let mut conn = state.db.get()?;
        signup_business(&mut conn, &input)?
    };

    state.email.spawn_send(email::verification_email(
        &business.email,
        &business.business_name,
        &frontend_link(&state, "verify-email", &token),
    ));

    let response = session_response(&state, business)?;
    Ok((StatusCode::CREATED, response))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let conn = state.db.get()?;
    // Unknown email and wrong password are indistinguishable to the caller
    let Some(business) = queries::get_business_by_email(&conn, &input.email)? else {
        tracing::debug!("Login for unknown email");
        return Err(AppError::Unauthorized);
    };
    if !verify_password(&business.password_hash, &input.password)? {
        tracing::debug!(business_id = %business.id, "Login with wrong password");
        return Err(AppError::Unauthorized);
    }

    session_response(&state, business)
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub success: bool,
    pub message: &'static str,
}

impl OkResponse {
    fn new(message: &'static str) -> Json<Self> {
        Json(Self { success: true, message })
    }
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(input): Json<TokenRequest>,
) -> Result<Json<OkResponse>> {
    let conn = state.db.get()?;
    let business_id =
        queries::take_verification_token(&conn, &hash_token(input.token.trim()), TokenPurpose::EmailVerification)?
            .ok_or_else(|| AppError::BadRequest(msg::INVALID_OR_EXPIRED_TOKEN.into()))?;

    queries::set_email_verified(&conn, &business_id)?;
    tracing::info!(business_id = %business_id, "Email verified");
    Ok(OkResponse::new("Email verified"))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    Extension(ctx): Extension<BusinessContext>,
) -> Result<Json<OkResponse>> {
    if ctx.business.email_verified {
        return Err(AppError::BadRequest("Email already verified".into()));
    }

    let token = {
        let mut conn = state.db.get()?;
        let tx = conn.transaction()?;
        queries::delete_verification_tokens(&tx, ctx.id(), TokenPurpose::EmailVerification)?;
        let token = issue_token(&tx, ctx.id(), TokenPurpose::EmailVerification)?;
        tx.commit()?;
        token
    };

    state.email.spawn_send(email::verification_email(
        &ctx.business.email,
        &ctx.business.business_name,
        &frontend_link(&state, "verify-email", &token),
    ));
    Ok(OkResponse::new("Verification email sent"))
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Always succeeds so the response does not reveal whether an account exists.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(input): Json<ForgotPasswordRequest>,
) -> Result<Json<OkResponse>> {
    let issued = {
        let conn = state.db.get()?;
        match queries::get_business_by_email(&conn, &input.email)? {
            Some(business) => {
                let token = issue_token(&conn, &business.id, TokenPurpose::PasswordReset)?;
                Some((business.email, token))
            }
            None => None,
        }
    };

    if let Some((to, token)) = issued {
        state.email.spawn_send(email::password_reset_email(
            &to,
            &frontend_link(&state, "reset-password", &token),
        ));
    }
    Ok(OkResponse::new(
        "If an account exists for that email, a reset link has been sent",
    ))
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<ResetPasswordRequest>,
) -> Result<Json<OkResponse>> {
    validate_password(&input.password)?;
    let password_hash = hash_password(&input.password)?;

    let mut conn = state.db.get()?;
    let tx = conn.transaction()?;
    let business_id =
        queries::take_verification_token(&tx, &hash_token(input.token.trim()), TokenPurpose::PasswordReset)?
            .ok_or_else(|| AppError::BadRequest(msg::INVALID_OR_EXPIRED_TOKEN.into()))?;
    queries::set_password_hash(&tx, &business_id, &password_hash)?;
    // Any other outstanding reset links die with this one
    queries::delete_verification_tokens(&tx, &business_id, TokenPurpose::PasswordReset)?;
    tx.commit()?;

    tracing::info!(business_id = %business_id, "Password reset");
    Ok(OkResponse::new("Password updated"))
}
