mod from_row;
mod schema;
pub mod queries;

pub use from_row::*;
pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::email::EmailService;
use crate::jwt::SessionKeys;
use crate::payments::StripeClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// HS256 key for session tokens
    pub session_keys: SessionKeys,
    /// None when Stripe is not configured (billing endpoints and webhooks refuse)
    pub stripe: Option<StripeClient>,
    pub email: Arc<EmailService>,
    /// Frontend origin, used for emailed links, referral links and checkout return URLs
    pub frontend_url: String,
    /// Subscription price used for checkout sessions
    pub stripe_price_id: Option<String>,
}

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });
    Pool::builder().max_size(10).build(manager)
}
