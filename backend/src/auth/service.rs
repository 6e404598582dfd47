//! Authentication service
//!
//! Challenge-response login for Stellar wallets. Challenges and sessions are
//! held in memory and do not survive a restart.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{AuthTokensResponse, ChallengeResponse};

use super::crypto::{decode_stellar_public_key, verify_stellar_signature, CryptoError};
use super::jwt::{generate_access_token, JwtError};

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid wallet address: {0}")]
    InvalidWalletAddress(String),

    #[error("Nonce not found or already used")]
    NonceNotFound,

    #[error("Nonce expired")]
    NonceExpired,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Session not found or revoked")]
    SessionNotFound,

    #[error("Token error: {0}")]
    TokenError(String),
}

impl From<CryptoError> for AuthError {
    fn from(e: CryptoError) -> Self {
        AuthError::InvalidSignature(e.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        AuthError::TokenError(e.to_string())
    }
}

#[derive(Debug, Clone)]
struct PendingChallenge {
    wallet_address: String,
    message: String,
    expires_at: DateTime<Utc>,
}

/// An issued access token that has not been revoked
#[derive(Debug, Clone)]
pub struct Session {
    pub wallet_address: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Authentication service
pub struct AuthService {
    jwt_secret: String,
    nonce_ttl_seconds: i64,
    access_token_ttl_seconds: i64,
    challenges: RwLock<HashMap<String, PendingChallenge>>,
    sessions: RwLock<HashMap<String, Session>>,
}

impl AuthService {
    pub fn new(jwt_secret: String, nonce_ttl_seconds: i64, access_token_ttl_seconds: i64) -> Self {
        Self {
            jwt_secret,
            nonce_ttl_seconds,
            access_token_ttl_seconds,
            challenges: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    /// Generate a nonce challenge for wallet authentication
    pub async fn generate_challenge(
        &self,
        wallet_address: &str,
    ) -> Result<ChallengeResponse, AuthError> {
        decode_stellar_public_key(wallet_address)
            .map_err(|e| AuthError::InvalidWalletAddress(e.to_string()))?;

        let nonce = generate_secure_nonce(wallet_address);
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.nonce_ttl_seconds);

        let message = format!(
            "Sign this message to authenticate with Homeward:\n\nNonce: {}\nWallet: {}\nExpires: {}",
            nonce,
            wallet_address,
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        let mut challenges = self.challenges.write().await;
        challenges.retain(|_, pending| pending.expires_at > now);
        challenges.insert(
            nonce.clone(),
            PendingChallenge {
                wallet_address: wallet_address.to_string(),
                message: message.clone(),
                expires_at,
            },
        );

        tracing::debug!(wallet = %wallet_address, "Issued auth challenge");

        Ok(ChallengeResponse {
            nonce,
            message,
            expires_at,
        })
    }

    /// Verify a signed challenge and issue an access token
    ///
    /// A nonce is consumed by the first valid signature over it.
    pub async fn verify_signature(
        &self,
        wallet_address: &str,
        nonce: &str,
        signature: &str,
    ) -> Result<AuthTokensResponse, AuthError> {
        {
            let mut challenges = self.challenges.write().await;
            let pending = challenges
                .get(nonce)
                .filter(|pending| pending.wallet_address == wallet_address)
                .cloned()
                .ok_or(AuthError::NonceNotFound)?;

            if pending.expires_at < Utc::now() {
                challenges.remove(nonce);
                return Err(AuthError::NonceExpired);
            }

            verify_stellar_signature(wallet_address, &pending.message, signature)?;
            challenges.remove(nonce);
        }

        let jti = Uuid::new_v4().to_string();
        let access_token = generate_access_token(
            wallet_address,
            &jti,
            &self.jwt_secret,
            self.access_token_ttl_seconds,
        )?;

        let issued_at = Utc::now();
        self.sessions.write().await.insert(
            jti,
            Session {
                wallet_address: wallet_address.to_string(),
                issued_at,
                expires_at: issued_at + Duration::seconds(self.access_token_ttl_seconds),
            },
        );

        tracing::info!(wallet = %wallet_address, "Wallet authenticated");

        Ok(AuthTokensResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_ttl_seconds,
            wallet_address: wallet_address.to_string(),
        })
    }

    /// Check that a session exists, is unexpired and has not been revoked
    pub async fn verify_session(&self, jti: &str) -> Result<Session, AuthError> {
        self.sessions
            .read()
            .await
            .get(jti)
            .filter(|session| session.expires_at > Utc::now())
            .cloned()
            .ok_or(AuthError::SessionNotFound)
    }

    /// Revoke a session (logout)
    pub async fn revoke_session(&self, jti: &str) -> Result<(), AuthError> {
        self.sessions
            .write()
            .await
            .remove(jti)
            .map(|_| ())
            .ok_or(AuthError::SessionNotFound)
    }

    /// Drop expired sessions
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        before - sessions.len()
    }
}

/// Random nonce bound to the requesting wallet
fn generate_secure_nonce(wallet_address: &str) -> String {
    use rand::Rng;
    let entropy: [u8; 32] = rand::thread_rng().gen();

    let mut hasher = Sha256::new();
    hasher.update(entropy);
    hasher.update(wallet_address.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::encode_stellar_public_key;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use ed25519_dalek::{Signer, SigningKey};

    fn wallet() -> (SigningKey, String) {
        let key = SigningKey::from_bytes(&[42u8; 32]);
        let address = encode_stellar_public_key(&key.verifying_key().to_bytes());
        (key, address)
    }

    fn service() -> AuthService {
        AuthService::new("test-secret".to_string(), 300, 900)
    }

    #[tokio::test]
    async fn test_challenge_verify_round_trip() {
        let auth = service();
        let (key, address) = wallet();

        let challenge = auth.generate_challenge(&address).await.unwrap();
        assert_eq!(challenge.nonce.len(), 64);
        assert!(challenge.message.contains(&address));

        let signature = STANDARD.encode(key.sign(challenge.message.as_bytes()).to_bytes());
        let tokens = auth
            .verify_signature(&address, &challenge.nonce, &signature)
            .await
            .unwrap();
        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.wallet_address, address);

        // Nonces are single use
        let replay = auth
            .verify_signature(&address, &challenge.nonce, &signature)
            .await;
        assert!(matches!(replay, Err(AuthError::NonceNotFound)));
    }

    #[tokio::test]
    async fn test_bad_signature_keeps_nonce() {
        let auth = service();
        let (key, address) = wallet();
        let challenge = auth.generate_challenge(&address).await.unwrap();

        let wrong = STANDARD.encode(key.sign(b"something else").to_bytes());
        let result = auth
            .verify_signature(&address, &challenge.nonce, &wrong)
            .await;
        assert!(matches!(result, Err(AuthError::InvalidSignature(_))));

        let signature = STANDARD.encode(key.sign(challenge.message.as_bytes()).to_bytes());
        assert!(auth
            .verify_signature(&address, &challenge.nonce, &signature)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_invalid_wallet_rejected() {
        let auth = service();
        let result = auth.generate_challenge("not-a-wallet").await;
        assert!(matches!(result, Err(AuthError::InvalidWalletAddress(_))));
    }

    #[tokio::test]
    async fn test_expired_challenge_rejected() {
        let auth = AuthService::new("test-secret".to_string(), -1, 900);
        let (key, address) = wallet();
        let challenge = auth.generate_challenge(&address).await.unwrap();

        let signature = STANDARD.encode(key.sign(challenge.message.as_bytes()).to_bytes());
        let result = auth
            .verify_signature(&address, &challenge.nonce, &signature)
            .await;
        assert!(matches!(result, Err(AuthError::NonceExpired)));
    }

    #[tokio::test]
    async fn test_revoked_session_is_gone() {
        let auth = service();
        let (key, address) = wallet();
        let challenge = auth.generate_challenge(&address).await.unwrap();
        let signature = STANDARD.encode(key.sign(challenge.message.as_bytes()).to_bytes());
        let tokens = auth
            .verify_signature(&address, &challenge.nonce, &signature)
            .await
            .unwrap();

        let claims = crate::auth::verify_token(&tokens.access_token, "test-secret").unwrap();
        let session = auth.verify_session(&claims.jti).await.unwrap();
        assert_eq!(session.wallet_address, address);

        auth.revoke_session(&claims.jti).await.unwrap();
        assert!(auth.verify_session(&claims.jti).await.is_err());
        assert!(auth.revoke_session(&claims.jti).await.is_err());
        assert_eq!(auth.purge_expired().await, 0);
    }
}
