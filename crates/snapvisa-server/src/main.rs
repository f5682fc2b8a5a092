//! snapvisa HTTP Server
//!
//! Resizes passport photos to the BLS Canada spec, gates the download behind
//! a Stripe checkout after the free allowance, and collects feedback.

mod config;
mod error;
mod handlers;
mod pages;
mod routes;
mod session;
mod state;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snapvisa_feedback::FeedbackConfig;
use snapvisa_payments::{PriceConfig, StripeClient};
use snapvisa_pipeline::PhotoSpec;

use crate::config::ServerConfig;
use crate::session::SessionCookies;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("invalid server configuration")?;
    let photo_spec = PhotoSpec::from_env().context("invalid photo configuration")?;
    tracing::info!(
        "Photo spec: {}x{} px, max {:.0} KB",
        photo_spec.target_width,
        photo_spec.target_height,
        photo_spec.max_kb()
    );

    // Initialize feedback sink
    let feedback = FeedbackConfig::from_env()
        .and_then(FeedbackConfig::build_sink)
        .context("invalid feedback configuration")?;

    let cookies = SessionCookies::new(&config.session_secret)
        .map_err(|e| anyhow::anyhow!("invalid session secret: {e}"))?;
    let bind_addr = config.bind_addr.clone();
    let mut state = AppState::new(config, photo_spec, cookies, feedback);

    // Initialize payments
    match StripeClient::from_env() {
        Ok(stripe) => {
            let price = PriceConfig::from_env().context("invalid price configuration")?;
            let webhook_secret = Some(stripe.webhook_secret().to_string());
            tracing::info!("✓ Stripe configured ({})", price.display());
            state = state.with_payments(Arc::new(stripe), price, webhook_secret);
        }
        Err(e) => {
            tracing::warn!("⚠ Stripe not configured - payments disabled ({e})");
            tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
        }
    }

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 snapvisa server running on http://{}", bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health             - Health check");
    tracing::info!("  GET  /api/session        - Session state and token");
    tracing::info!("  POST /api/upload         - Upload and resize a photo");
    tracing::info!("  POST /api/checkout       - Create Stripe checkout");
    tracing::info!("  GET  /api/download       - Download the resized photo");
    tracing::info!("  POST /api/feedback       - Send feedback");
    tracing::info!("  POST /api/session/reset  - Start over");
    tracing::info!("  POST /webhook/stripe     - Stripe webhook");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
