//! Authentication extractor
//!
//! Resolves the Bearer token on a request to the wallet that signed in.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use homeward_ledger::Address;
use std::sync::Arc;

use crate::auth::{verify_token, AuthService, JwtError};
use crate::error::{ErrorDetails, ErrorResponse};

/// Wallet identity extracted from a valid access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub wallet_address: Address,
    pub jti: String,
}

fn reject(code: &str, message: &str) -> Response {
    let body = ErrorResponse {
        error: ErrorDetails {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// ```rust,ignore
/// async fn deposit(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("depositing as {}", user.wallet_address)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    reject(
                        "MISSING_TOKEN",
                        "Authorization header with Bearer token required",
                    )
                })?;

        let auth_service = Arc::<AuthService>::from_ref(state);

        let claims = verify_token(bearer.token(), auth_service.jwt_secret()).map_err(|e| match e {
            JwtError::TokenExpired => reject("TOKEN_EXPIRED", "Token has expired"),
            _ => reject("INVALID_TOKEN", "Invalid token"),
        })?;

        // Logged-out tokens stay cryptographically valid until they expire
        let session = auth_service
            .verify_session(&claims.jti)
            .await
            .map_err(|_| reject("SESSION_REVOKED", "Session has been revoked"))?;

        if session.wallet_address != claims.sub {
            return Err(reject("INVALID_TOKEN", "Token does not match its session"));
        }

        Ok(AuthenticatedUser {
            wallet_address: Address::new(claims.sub),
            jti: claims.jti,
        })
    }
}
