//! Property token handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use homeward_ledger::{Address, PropertyId};
use validator::Validate;

use super::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::escrow::{ApproveTransferRequest, MintPropertyRequest, PropertyView};
use crate::models::ApiResponse;
use crate::state::AppState;

/// GET /api/properties
pub async fn list_properties(State(state): State<AppState>) -> Json<ApiResponse<Vec<PropertyView>>> {
    Json(ApiResponse::ok(state.escrow_service.properties().await))
}

/// GET /api/properties/:id
pub async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<PropertyId>,
) -> ApiResult<Json<ApiResponse<PropertyView>>> {
    let property = state
        .escrow_service
        .property(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Property {} does not exist", id)))?;
    Ok(Json(ApiResponse::ok(property)))
}

/// POST /api/properties - Mint a property token to the caller
pub async fn mint_property(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<MintPropertyRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<PropertyView>>)> {
    request.validate()?;
    let property = state
        .escrow_service
        .mint_property(&user.wallet_address, request.token_uri)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(property))))
}

/// POST /api/properties/:id/approve - Owner approves an operator, custody by default
pub async fn approve_transfer(
    State(state): State<AppState>,
    Path(id): Path<PropertyId>,
    user: AuthenticatedUser,
    Json(request): Json<ApproveTransferRequest>,
) -> ApiResult<Json<ApiResponse<PropertyView>>> {
    let spender = request.spender.map(Address::new);
    let property = state
        .escrow_service
        .approve_transfer(&user.wallet_address, id, spender)
        .await?;
    Ok(Json(ApiResponse::ok(property)))
}
