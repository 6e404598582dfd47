//! Escrow sale handlers
//!
//! Every mutating endpoint acts as the authenticated wallet; the ledger
//! decides whether that wallet holds the role the operation needs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use homeward_ledger::{Address, PropertyId};
use validator::Validate;

use super::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::escrow::{
    AmountRequest, ApprovalResponse, BalanceResponse, CreateListingRequest,
    EscrowConfigResponse, InspectionRequest, ListListingsQuery, ListingView,
};
use crate::models::ApiResponse;
use crate::state::AppState;

type ListingResult = ApiResult<Json<ApiResponse<ListingView>>>;

/// GET /api/escrow/config
pub async fn get_escrow_config(
    State(state): State<AppState>,
) -> Json<ApiResponse<EscrowConfigResponse>> {
    Json(ApiResponse::ok(state.escrow_service.config_response()))
}

/// GET /api/escrow/balance - Funds held in custody
pub async fn get_custody_balance(State(state): State<AppState>) -> Json<ApiResponse<BalanceResponse>> {
    let service = &state.escrow_service;
    Json(ApiResponse::ok(BalanceResponse {
        address: service.config().custody().clone(),
        balance: service.custody_balance().await,
    }))
}

/// GET /api/escrow/listings
pub async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<ListListingsQuery>,
) -> Json<ApiResponse<Vec<ListingView>>> {
    Json(ApiResponse::ok(
        state.escrow_service.listings(query.status).await,
    ))
}

/// POST /api/escrow/listings - Seller lists a property for a buyer
pub async fn create_listing(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateListingRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ListingView>>)> {
    request.validate()?;
    let listing = state
        .escrow_service
        .create_listing(&user.wallet_address, request)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(listing))))
}

/// GET /api/escrow/listings/:id
pub async fn get_listing(State(state): State<AppState>, Path(id): Path<PropertyId>) -> ListingResult {
    state
        .escrow_service
        .listing(id)
        .await
        .map(|listing| Json(ApiResponse::ok(listing)))
        .ok_or_else(|| ApiError::NotFound(format!("No sale recorded for property {}", id)))
}

/// POST /api/escrow/listings/:id/deposit - Buyer's earnest deposit
pub async fn deposit_earnest(
    State(state): State<AppState>,
    Path(id): Path<PropertyId>,
    user: AuthenticatedUser,
    Json(request): Json<AmountRequest>,
) -> ListingResult {
    let listing = state
        .escrow_service
        .deposit_earnest(&user.wallet_address, id, request.amount)
        .await?;
    Ok(Json(ApiResponse::ok(listing)))
}

/// POST /api/escrow/listings/:id/fund - Lender's contribution
pub async fn fund_purchase(
    State(state): State<AppState>,
    Path(id): Path<PropertyId>,
    user: AuthenticatedUser,
    Json(request): Json<AmountRequest>,
) -> ListingResult {
    let listing = state
        .escrow_service
        .fund_purchase(&user.wallet_address, id, request.amount)
        .await?;
    Ok(Json(ApiResponse::ok(listing)))
}

/// POST /api/escrow/listings/:id/inspection - Inspector records the outcome
pub async fn update_inspection(
    State(state): State<AppState>,
    Path(id): Path<PropertyId>,
    user: AuthenticatedUser,
    Json(request): Json<InspectionRequest>,
) -> ListingResult {
    let listing = state
        .escrow_service
        .update_inspection(&user.wallet_address, id, request.passed)
        .await?;
    Ok(Json(ApiResponse::ok(listing)))
}

/// POST /api/escrow/listings/:id/approve
pub async fn approve_sale(
    State(state): State<AppState>,
    Path(id): Path<PropertyId>,
    user: AuthenticatedUser,
) -> ListingResult {
    let listing = state
        .escrow_service
        .approve_sale(&user.wallet_address, id)
        .await?;
    Ok(Json(ApiResponse::ok(listing)))
}

/// POST /api/escrow/listings/:id/finalize
pub async fn finalize_sale(
    State(state): State<AppState>,
    Path(id): Path<PropertyId>,
    user: AuthenticatedUser,
) -> ListingResult {
    let listing = state
        .escrow_service
        .finalize_sale(&user.wallet_address, id)
        .await?;
    Ok(Json(ApiResponse::ok(listing)))
}

/// POST /api/escrow/listings/:id/cancel
pub async fn cancel_sale(
    State(state): State<AppState>,
    Path(id): Path<PropertyId>,
    user: AuthenticatedUser,
) -> ListingResult {
    let listing = state
        .escrow_service
        .cancel_sale(&user.wallet_address, id)
        .await?;
    Ok(Json(ApiResponse::ok(listing)))
}

/// GET /api/escrow/listings/:id/approvals/:address
pub async fn get_approval(
    State(state): State<AppState>,
    Path((id, address)): Path<(PropertyId, String)>,
) -> Json<ApiResponse<ApprovalResponse>> {
    let address = Address::new(address);
    let approved = state.escrow_service.approval(id, &address).await;
    Json(ApiResponse::ok(ApprovalResponse {
        property_id: id,
        address,
        approved,
    }))
}
