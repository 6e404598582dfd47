//! Account balance handlers

use axum::{
    extract::{Path, State},
    Json,
};
use homeward_ledger::Address;

use super::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::escrow::{BalanceResponse, FaucetRequest};
use crate::models::ApiResponse;
use crate::state::AppState;

/// GET /api/accounts/:address/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Json<ApiResponse<BalanceResponse>> {
    let address = Address::new(address);
    let balance = state.escrow_service.account_balance(&address).await;
    Json(ApiResponse::ok(BalanceResponse { address, balance }))
}

/// POST /api/dev/faucet - Credit test funds (non-production only)
pub async fn faucet(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<FaucetRequest>,
) -> ApiResult<Json<ApiResponse<BalanceResponse>>> {
    if !state.config.dev_tools_enabled() {
        return Err(ApiError::NotFound("Faucet is disabled".to_string()));
    }

    let address = request
        .address
        .map(Address::new)
        .unwrap_or(user.wallet_address);
    let balance = state.escrow_service.faucet(&address, request.amount).await?;
    Ok(Json(ApiResponse::ok(BalanceResponse { address, balance })))
}
