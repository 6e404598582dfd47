//! Escrow sale routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::escrow;
use crate::state::AppState;

/// Create escrow routes
pub fn escrow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/escrow/config", get(escrow::get_escrow_config))
        .route("/api/escrow/balance", get(escrow::get_custody_balance))
        .route(
            "/api/escrow/listings",
            get(escrow::list_listings).post(escrow::create_listing),
        )
        .route("/api/escrow/listings/:id", get(escrow::get_listing))
        .route(
            "/api/escrow/listings/:id/deposit",
            post(escrow::deposit_earnest),
        )
        .route("/api/escrow/listings/:id/fund", post(escrow::fund_purchase))
        .route(
            "/api/escrow/listings/:id/inspection",
            post(escrow::update_inspection),
        )
        .route("/api/escrow/listings/:id/approve", post(escrow::approve_sale))
        .route(
            "/api/escrow/listings/:id/finalize",
            post(escrow::finalize_sale),
        )
        .route("/api/escrow/listings/:id/cancel", post(escrow::cancel_sale))
        .route(
            "/api/escrow/listings/:id/approvals/:address",
            get(escrow::get_approval),
        )
}
