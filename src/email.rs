//! Transactional email via the Resend API.
//!
//! Without an API key the service runs disabled: messages are logged and
//! dropped. Sending is always best-effort and happens after the triggering
//! transaction has committed, so a mail outage never fails a request.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Retry delays in seconds (exponential backoff: 1s, 4s, 16s)
const RETRY_DELAYS: &[u64] = &[1, 4, 16];

const RESEND_API_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    Sent,
    /// No API key configured
    Disabled,
}

/// A rendered message.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

fn html_page(heading: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">{}</h2>
{}
<hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">
<p style="color: #999; font-size: 12px;">If you didn't request this, you can ignore this email.</p>
</body>
</html>"#,
        heading, body
    )
}

fn button(url: &str, label: &str) -> String {
    format!(
        r#"<p style="margin: 24px 0;"><a href="{}" style="background: #f5b301; color: #222; padding: 12px 20px; border-radius: 6px; text-decoration: none; font-weight: bold;">{}</a></p>"#,
        url, label
    )
}

/// Email verification link, valid for 24 hours.
pub fn verification_email(to: &str, business_name: &str, link: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Verify your Goldstar account".into(),
        text: format!(
            "Welcome to Goldstar, {}!\n\nConfirm your email address by opening this link:\n\n{}\n\nThe link expires in 24 hours.",
            business_name, link
        ),
        html: html_page(
            &format!("Welcome to Goldstar, {}!", business_name),
            &format!(
                "<p>Confirm your email address to finish setting up your account.</p>{}<p style=\"color: #666;\">The link expires in 24 hours.</p>",
                button(link, "Verify email")
            ),
        ),
    }
}

/// Password reset link, valid for 1 hour.
pub fn password_reset_email(to: &str, link: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Reset your password".into(),
        text: format!(
            "Someone asked to reset the password for this Goldstar account.\n\nChoose a new password here:\n\n{}\n\nThe link expires in 1 hour.",
            link
        ),
        html: html_page(
            "Reset your password",
            &format!(
                "<p>Someone asked to reset the password for this Goldstar account.</p>{}<p style=\"color: #666;\">The link expires in 1 hour.</p>",
                button(link, "Choose a new password")
            ),
        ),
    }
}

pub fn suspension_email(to: &str, business_name: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Account suspended".into(),
        text: format!(
            "The Goldstar account for {} has been suspended and its subscription stopped.\n\nReply to this email if you think this is a mistake.",
            business_name
        ),
        html: html_page(
            "Account suspended",
            &format!(
                "<p>The Goldstar account for <strong>{}</strong> has been suspended and its subscription stopped.</p><p>Reply to this email if you think this is a mistake.</p>",
                business_name
            ),
        ),
    }
}

/// Email service using Resend API.
#[derive(Clone)]
pub struct EmailService {
    api_key: Option<String>,
    from_email: String,
    http_client: Client,
}

impl EmailService {
    pub fn new(api_key: Option<String>, from_email: String) -> Self {
        Self {
            api_key,
            from_email,
            http_client: Client::new(),
        }
    }

    /// A service that never sends (tests, local development).
    pub fn disabled() -> Self {
        Self::new(None, "noreply@localhost".into())
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<EmailSendResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!(to = %message.to, subject = %message.subject, "Email disabled, not sending");
            return Ok(EmailSendResult::Disabled);
        };

        let request = ResendEmailRequest {
            from: &self.from_email,
            to: vec![message.to.as_str()],
            subject: &message.subject,
            text: &message.text,
            html: &message.html,
        };
        self.send_request_with_retry(api_key, &request).await
    }

    /// Fire-and-forget send on a background task. Failures are logged.
    pub fn spawn_send(&self, message: EmailMessage) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.send(&message).await {
                tracing::warn!(to = %message.to, subject = %message.subject, "Email not delivered: {}", e);
            }
        });
    }

    /// Send a request to Resend API with exponential backoff retry.
    ///
    /// Retries on transient errors (network issues, 5xx, 429 rate limit).
    async fn send_request_with_retry(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
    ) -> Result<EmailSendResult> {
        let mut last_error: Option<AppError> = None;

        for (attempt, delay_secs) in std::iter::once(&0u64).chain(RETRY_DELAYS).enumerate() {
            if *delay_secs > 0 {
                tracing::warn!(attempt, delay_secs, "Retrying email send after transient failure");
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }

            match self.send_resend_request(api_key, request).await {
                Ok(()) => {
                    tracing::info!(attempt, to = ?request.to, subject = %request.subject, "Email sent via Resend");
                    return Ok(EmailSendResult::Sent);
                }
                Err((error, true)) => last_error = Some(error),
                Err((error, false)) => return Err(error),
            }
        }

        tracing::error!(
            to = ?request.to,
            attempts = RETRY_DELAYS.len() + 1,
            "Email send failed after all retries"
        );
        Err(last_error.unwrap_or_else(|| {
            AppError::Internal("Email service error: all retries exhausted".into())
        }))
    }

    /// Returns Ok(()) on success, or Err((AppError, is_transient)) on failure.
    async fn send_resend_request(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
    ) -> std::result::Result<(), (AppError, bool)> {
        let response = self
            .http_client
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send request to Resend API");
                (AppError::Internal(format!("Email service error: {}", e)), true)
            })?;

        let status = response.status();
        if status.is_success() {
            let _result: ResendEmailResponse = response.json().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to parse Resend API response");
                (AppError::Internal("Email service response error".into()), false)
            })?;
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let is_transient = status.as_u16() == 429 || status.is_server_error();
        if is_transient {
            tracing::warn!(status = %status, body = %body, "Resend API returned transient error");
        } else {
            tracing::error!(status = %status, body = %body, "Resend API returned non-transient error");
        }

        Err((
            AppError::Internal(format!("Email service error: {} - {}", status, body)),
            is_transient,
        ))
    }
}
