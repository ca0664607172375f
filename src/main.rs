use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use goldstar::config::Config;
use goldstar::db::{AppState, create_pool, init_db, queries};
use goldstar::email::EmailService;
use goldstar::handlers;
use goldstar::jwt::SessionKeys;
use goldstar::payments::StripeClient;

#[derive(Parser, Debug)]
#[command(name = "goldstar")]
#[command(about = "Review-reputation backend with referral commissions")]
struct Cli {
    /// Give an existing account admin rights, then start normally
    #[arg(long, value_name = "EMAIL")]
    grant_admin: Option<String>,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Spawns a background task that periodically purges expired emailed tokens
/// and webhook replay records past their retention window.
fn spawn_cleanup_task(state: AppState, webhook_retention_days: i64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(5 * 60);

        loop {
            tokio::time::sleep(interval).await;

            let conn = match state.db.get() {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Failed to get db connection for cleanup: {}", e);
                    continue;
                }
            };

            match queries::purge_expired_verification_tokens(&conn) {
                Ok(0) => {}
                Ok(count) => tracing::debug!("Purged {} expired verification tokens", count),
                Err(e) => tracing::warn!("Failed to purge verification tokens: {}", e),
            }
            match queries::purge_old_webhook_events(&conn, webhook_retention_days) {
                Ok(0) => {}
                Ok(count) => tracing::debug!("Purged {} old webhook events", count),
                Err(e) => tracing::warn!("Failed to purge webhook events: {}", e),
            }
        }
    });

    tracing::info!("Background cleanup task started (runs every 5 minutes)");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "goldstar=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    if let Some(email) = cli.grant_admin.as_deref() {
        let conn = db_pool.get().expect("Failed to get connection");
        match queries::set_admin_by_email(&conn, email) {
            Ok(true) => tracing::info!("Granted admin rights to {}", email),
            Ok(false) => tracing::warn!("--grant-admin: no account for {}", email),
            Err(e) => tracing::error!("--grant-admin failed: {}", e),
        }
    }

    let stripe = config.stripe().map(|settings| StripeClient::new(&settings));
    if stripe.is_none() {
        tracing::warn!("Stripe not configured: billing endpoints and webhooks are disabled");
    }
    let email = EmailService::new(config.resend_api_key.clone(), config.email_from.clone());
    if !email.is_enabled() {
        tracing::warn!("RESEND_API_KEY not set: emails will be logged, not sent");
    }

    let state = AppState {
        db: db_pool,
        session_keys: SessionKeys::from_secret(&config.jwt_secret),
        stripe,
        email: Arc::new(email),
        frontend_url: config.frontend_url.clone(),
        stripe_price_id: config.stripe_price_id.clone(),
    };

    spawn_cleanup_task(state.clone(), config.webhook_event_retention_days);

    let app = handlers::router(state, config.rate_limit).layer(TraceLayer::new_for_http());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    if cli.ephemeral && !config.dev_mode {
        tracing::warn!("--ephemeral ignored: not in dev mode (set GOLDSTAR_ENV=dev)");
    }

    tracing::info!("GoldStar server listening on {}", addr);

    // Connect info feeds the per-IP rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        let db_path = &config.database_path;
        match std::fs::remove_file(db_path) {
            Ok(()) => tracing::info!("Removed {}", db_path),
            Err(e) => tracing::warn!("Failed to remove {}: {}", db_path, e),
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
