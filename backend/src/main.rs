//! Homeward Backend Server
//!
//! Serves the escrow ledger of the Homeward real-estate marketplace over HTTP,
//! with a WebSocket feed of ledger events.

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use homeward_ledger::{tokens, AccountBook, Address, MarketplaceLedger, PropertyRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use homeward_server::auth::AuthService;
use homeward_server::config::Config;
use homeward_server::escrow::EscrowService;
use homeward_server::state::AppState;
use homeward_server::websocket::WsState;
use homeward_server::{middleware, seed};

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);
const RATE_LIMIT_IDLE: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(environment = config.environment.as_str(), "Starting Homeward backend");

    let escrow_config = config
        .escrow_config()
        .context("Invalid escrow party configuration")?;
    tracing::info!(
        custody = %escrow_config.custody(),
        seller = %escrow_config.seller(),
        inspector = %escrow_config.inspector(),
        lender = %escrow_config.lender(),
        "Escrow parties configured"
    );

    let mut ledger =
        MarketplaceLedger::new(escrow_config, PropertyRegistry::new(), AccountBook::new());

    if config.seed_demo {
        if let Some(buyer) = &config.demo_buyer_address {
            seed::seed_demo(
                &mut ledger,
                &Address::new(buyer.as_str()),
                tokens(config.demo_initial_balance),
            )?;
        }
    }

    let ws_state = WsState::new();
    let escrow_service = Arc::new(EscrowService::new(ledger, ws_state.clone()));
    let auth_service = Arc::new(AuthService::new(
        config.jwt_secret.clone(),
        config.auth_nonce_ttl_seconds,
        config.jwt_access_token_ttl_seconds,
    ));

    let config = Arc::new(config);
    let app_state = AppState::new(
        escrow_service,
        auth_service.clone(),
        ws_state,
        config.clone(),
    );

    let rate_limiter = app_state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            interval.tick().await;
            let idle_clients = rate_limiter.cleanup(RATE_LIMIT_IDLE).await;
            let expired_sessions = auth_service.purge_expired().await;
            tracing::debug!(idle_clients, expired_sessions, "Maintenance sweep");
        }
    });

    let mut app = homeward_server::app(app_state)
        .layer(configure_cors(config.cors_allowed_origins.as_deref()));
    if config.environment.is_production() {
        app = app.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("WebSocket available at ws://{}/ws", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
