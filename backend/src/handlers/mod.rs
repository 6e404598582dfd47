//! API handlers for the Homeward backend

pub mod account;
pub mod auth;
pub mod escrow;
pub mod health;
pub mod property;

// Re-export AuthenticatedUser from middleware for handler use
pub use crate::middleware::AuthenticatedUser;
