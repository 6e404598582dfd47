//! Account routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::account;
use crate::state::AppState;

/// Balances, plus the faucet outside production
pub fn account_routes(dev_tools: bool) -> Router<AppState> {
    let router = Router::new().route(
        "/api/accounts/:address/balance",
        get(account::get_balance),
    );

    if dev_tools {
        router.route("/api/dev/faucet", post(account::faucet))
    } else {
        router
    }
}
