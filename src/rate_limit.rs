//! Per-IP rate limiting for unauthenticated endpoints.
//!
//! Tiers:
//! - Strict: /auth/* (password guessing, email sends)
//! - Standard: public review pages reached from QR codes
//!
//! A tier configured with 0 requests per minute is not installed.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;

/// Rate limiter layer type alias using governor types directly
pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Token bucket refilling `requests_per_minute` per minute with an equal burst.
/// None for 0.
pub fn create_layer(requests_per_minute: u32) -> Option<RateLimitLayer> {
    if requests_per_minute == 0 {
        return None;
    }

    let period_ms = (60_000 / requests_per_minute as u64).max(1);
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_millis(period_ms))
        .burst_size(requests_per_minute)
        .finish()?;

    Some(GovernorLayer::new(Arc::new(config)))
}

/// Wrap `router` in a limiter when the tier is enabled.
pub fn maybe_limit<S>(router: Router<S>, requests_per_minute: u32) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    match create_layer(requests_per_minute) {
        Some(layer) => router.layer(layer),
        None => router,
    }
}
