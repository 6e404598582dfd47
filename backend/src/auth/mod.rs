//! Authentication module for Homeward
//!
//! Provides wallet-based authentication using Stellar addresses.
//! - Challenge-response authentication with nonces
//! - JWT access token generation and validation
//! - Session revocation

mod crypto;
mod jwt;
mod service;

pub use crypto::{
    decode_stellar_public_key, encode_stellar_public_key, is_stellar_address,
    verify_stellar_signature, CryptoError,
};
pub use jwt::{generate_access_token, verify_token, Claims, JwtError};
pub use service::{AuthError, AuthService, Session};
