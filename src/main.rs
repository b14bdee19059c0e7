// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Docgate API Server
//!
//! Serves the access-control API for the document site: approval lists,
//! invitation links, signup reconciliation and access checks.

use docgate::{config::Config, db::IdentityDb, services::EmailService, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, site_url = %config.site_url, "Starting Docgate API");

    // Identity store
    let db = match &config.identity_secret_key {
        Some(secret_key) => IdentityDb::new_remote(&config.identity_api_url, secret_key)?,
        None => {
            tracing::warn!("IDENTITY_SECRET_KEY not set; using an empty in-memory identity store");
            IdentityDb::new_memory()
        }
    };

    // Outgoing email
    let email = EmailService::new(config.email_api_key.as_deref(), &config.email_from)?;

    // Build shared state
    let state = AppState::new(config.clone(), db, email)?;

    // Build router
    let app = docgate::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,docgate=debug,audit=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
