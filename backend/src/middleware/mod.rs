//! Middleware for the Homeward API
//!
//! Request tracing, rate limiting, security headers and the wallet
//! authentication extractor.

pub mod auth;
mod rate_limiter;
mod security;
mod tracing;

pub use auth::AuthenticatedUser;
pub use rate_limiter::{rate_limit, RateLimiter};
pub use security::{hsts_header, security_headers};
pub use tracing::{client_ip, request_tracing};
