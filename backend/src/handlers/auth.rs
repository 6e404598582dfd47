//! Authentication HTTP handlers
//!
//! Endpoints for wallet-based authentication.

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use super::AuthenticatedUser;
use crate::error::ApiResult;
use crate::models::{
    AuthTokensResponse, ChallengeRequest, ChallengeResponse, SessionResponse, VerifyRequest,
};
use crate::state::AppState;

/// POST /auth/challenge - Request a nonce for wallet authentication
pub async fn request_challenge(
    State(state): State<AppState>,
    Json(req): Json<ChallengeRequest>,
) -> ApiResult<Json<ChallengeResponse>> {
    req.validate()?;
    let challenge = state
        .auth_service
        .generate_challenge(&req.wallet_address)
        .await?;

    Ok(Json(challenge))
}

/// POST /auth/verify - Verify the signed challenge and issue an access token
pub async fn verify_signature(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Json<AuthTokensResponse>> {
    req.validate()?;
    let tokens = state
        .auth_service
        .verify_signature(&req.wallet_address, &req.nonce, &req.signature)
        .await?;

    Ok(Json(tokens))
}

/// POST /auth/logout - Revoke current session
pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<StatusCode> {
    state.auth_service.revoke_session(&user.jti).await?;
    tracing::info!(wallet = %user.wallet_address, "Wallet logged out");

    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/me - The authenticated wallet and its escrow roles
pub async fn get_current_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<SessionResponse>> {
    let session = state.auth_service.verify_session(&user.jti).await?;
    let roles = state.escrow_service.roles_of(&user.wallet_address).await;

    Ok(Json(SessionResponse {
        wallet_address: session.wallet_address,
        roles,
        issued_at: session.issued_at,
        expires_at: session.expires_at,
    }))
}
