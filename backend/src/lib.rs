//! Homeward Backend Library
//!
//! HTTP and WebSocket front end for the Homeward escrow ledger.

pub mod auth;
pub mod config;
pub mod error;
pub mod escrow;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod seed;
pub mod state;
pub mod websocket;

use axum::{
    http::{header, HeaderValue},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;

use state::AppState;

/// Build the application router with its middleware stack.
///
/// CORS and HSTS depend on deployment and are layered on by the binary.
pub fn app(state: AppState) -> Router {
    let dev_tools = state.config.dev_tools_enabled();
    let rate_limiter = state.rate_limiter.clone();

    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health_check))
        .route("/ws", get(websocket::ws_handler))
        .merge(routes::auth_routes())
        .merge(routes::property_routes())
        .merge(routes::escrow_routes())
        .merge(routes::account_routes(dev_tools))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limiter,
                    middleware::rate_limit,
                ))
                .layer(axum::middleware::from_fn(middleware::request_tracing))
                .layer(axum::middleware::from_fn(middleware::security_headers))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                )),
        )
}
