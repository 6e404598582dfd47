//! Property token routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::property;
use crate::state::AppState;

/// Create property routes
pub fn property_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/properties",
            get(property::list_properties).post(property::mint_property),
        )
        .route("/api/properties/:id", get(property::get_property))
        .route(
            "/api/properties/:id/approve",
            post(property::approve_transfer),
        )
}
