//! Route definitions for the Homeward API

mod account;
mod auth;
mod escrow;
mod property;

pub use account::account_routes;
pub use auth::auth_routes;
pub use escrow::escrow_routes;
pub use property::property_routes;
