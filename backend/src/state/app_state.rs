//! Application state shared across handlers

use axum::extract::FromRef;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::Config;
use crate::escrow::EscrowService;
use crate::middleware::RateLimiter;
use crate::websocket::WsState;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub escrow_service: Arc<EscrowService>,
    pub auth_service: Arc<AuthService>,
    pub ws_state: WsState,
    pub rate_limiter: RateLimiter,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        escrow_service: Arc<EscrowService>,
        auth_service: Arc<AuthService>,
        ws_state: WsState,
        config: Arc<Config>,
    ) -> Self {
        Self {
            rate_limiter: RateLimiter::new(config.rate_limit_rps),
            escrow_service,
            auth_service,
            ws_state,
            config,
        }
    }
}

impl FromRef<AppState> for WsState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ws_state.clone()
    }
}

impl FromRef<AppState> for Arc<EscrowService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.escrow_service.clone()
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for RateLimiter {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.rate_limiter.clone()
    }
}
