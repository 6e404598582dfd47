//! Liveness endpoints

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    environment: &'static str,
    version: &'static str,
    open_listings: usize,
    websocket_clients: usize,
}

pub async fn root() -> &'static str {
    "Homeward API Server"
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let open_listings = state
        .escrow_service
        .read(|ledger| ledger.listings().filter(|l| l.is_listed()).count())
        .await;

    Json(HealthResponse {
        status: "healthy",
        environment: state.config.environment.as_str(),
        version: env!("CARGO_PKG_VERSION"),
        open_listings,
        websocket_clients: state.ws_state.connected_clients().await,
    })
}
