//! Authentication request/response DTOs

use chrono::{DateTime, Utc};
use homeward_ledger::Role;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request for authentication challenge
#[derive(Debug, Deserialize, Validate)]
pub struct ChallengeRequest {
    #[validate(length(equal = 56))]
    pub wallet_address: String,
}

/// Response containing the authentication challenge
#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub nonce: String,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

/// Request to verify a signed challenge
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    #[validate(length(equal = 56))]
    pub wallet_address: String,
    #[validate(length(min = 1))]
    pub nonce: String,
    /// Base64-encoded ed25519 signature over the challenge message
    #[validate(length(min = 1))]
    pub signature: String,
}

/// Access token issued after a successful verification
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthTokensResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub wallet_address: String,
}

/// The authenticated wallet and the escrow roles it holds
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub wallet_address: String,
    pub roles: Vec<Role>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
