use std::env;

use rand::RngCore;

/// Per-IP rate limits for public endpoints, in requests per minute.
/// A value of 0 disables the tier.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Auth endpoints (signup, login, password reset)
    pub strict_rpm: u32,
    /// Public review endpoints behind QR codes
    pub standard_rpm: u32,
}

impl RateLimitConfig {
    pub fn disabled() -> Self {
        Self {
            strict_rpm: 0,
            standard_rpm: 0,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            strict_rpm: 10,
            standard_rpm: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
    pub price_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub frontend_url: String,
    pub jwt_secret: Vec<u8>,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_price_id: Option<String>,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub rate_limit: RateLimitConfig,
    pub webhook_event_retention_days: i64,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("GOLDSTAR_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(s) if s.len() >= 32 => s.into_bytes(),
            Ok(_) => return Err("JWT_SECRET must be at least 32 characters".into()),
            Err(_) if dev_mode => {
                tracing::warn!("JWT_SECRET not set, using a random per-process key (dev mode)");
                let mut key = vec![0u8; 32];
                rand::rngs::OsRng.fill_bytes(&mut key);
                key
            }
            Err(_) => return Err("JWT_SECRET is required outside dev mode".into()),
        };

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            strict_rpm: env_parse("RATE_LIMIT_STRICT_RPM").unwrap_or(defaults.strict_rpm),
            standard_rpm: env_parse("RATE_LIMIT_STANDARD_RPM").unwrap_or(defaults.standard_rpm),
        };

        Ok(Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "goldstar.db".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            jwt_secret,
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").ok(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").ok(),
            stripe_price_id: env::var("STRIPE_PRICE_ID").ok(),
            resend_api_key: env::var("RESEND_API_KEY").ok(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "GoldStar <noreply@goldstar.local>".to_string()),
            rate_limit,
            webhook_event_retention_days: env_parse("WEBHOOK_EVENT_RETENTION_DAYS").unwrap_or(30),
            dev_mode,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Stripe settings, present only when both the API key and webhook secret are set.
    pub fn stripe(&self) -> Option<StripeSettings> {
        match (&self.stripe_secret_key, &self.stripe_webhook_secret) {
            (Some(secret_key), Some(webhook_secret)) => Some(StripeSettings {
                secret_key: secret_key.clone(),
                webhook_secret: webhook_secret.clone(),
                price_id: self.stripe_price_id.clone(),
            }),
            _ => None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
