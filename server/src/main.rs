//! Tally subscriber service binary.
//!
//! Wires together the store, the SMTP mailer, and the axum router, then
//! serves until SIGINT/SIGTERM. Connection lifecycle is owned here and
//! injected into the handlers; nothing module-level holds a store handle.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tally_subscribers::web::{
    health, list_subscribers, send_newsletter, tally_webhook, unsubscribe, AppState,
};
use tally_subscribers::{Config, Database, SmtpMailer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        database_path = %config.database_path,
        signature_verification_configured = config.tally_webhook_secret.is_some(),
        smtp_host = %config.smtp_host,
        smtp_configured = config.smtp_password.is_some(),
        "config_loaded"
    );

    // Open the store
    let db = Arc::new(Database::open(Path::new(&config.database_path))?);

    // Build the SMTP mailer
    let mailer = Arc::new(SmtpMailer::from_config(&config).context("Failed to build mailer")?);

    // Create application state
    let state = AppState::new(config.clone(), db, mailer);

    // Build the router
    let app = Router::new()
        .route("/health", get(health))
        .route("/api/webhook/tally", post(tally_webhook))
        .route("/api/subscribers", get(list_subscribers))
        .route("/api/subscribers/unsubscribe", post(unsubscribe))
        .route("/api/newsletter/send", post(send_newsletter))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("server_shutting_down");
}
