//! Escrow and property DTOs for the Homeward API

use homeward_ledger::{
    amount_serde, Address, Amount, CancellationPolicy, ExcessPolicy, ListingStatus,
    PropertyId, PropertyListing, PropertyToken, Role,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request DTO for listing a property
#[derive(Debug, Deserialize, Validate)]
pub struct CreateListingRequest {
    pub property_id: PropertyId,
    #[validate(length(equal = 56))]
    pub buyer: String,
    /// Base units, as a decimal string
    #[serde(with = "amount_serde")]
    pub purchase_price: Amount,
    #[serde(with = "amount_serde")]
    pub escrow_amount: Amount,
}

/// Deposit or lender funding
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    #[serde(with = "amount_serde")]
    pub amount: Amount,
}

#[derive(Debug, Deserialize)]
pub struct InspectionRequest {
    #[serde(default = "inspection_passed_default")]
    pub passed: bool,
}

fn inspection_passed_default() -> bool {
    true
}

/// Query parameters for listing sales
#[derive(Debug, Default, Deserialize)]
pub struct ListListingsQuery {
    pub status: Option<ListingStatus>,
}

/// Which of the required parties have approved the current sale
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalStatus {
    pub seller: bool,
    pub buyer: bool,
    pub inspector: bool,
}

/// A sale record together with its approval progress
#[derive(Debug, Clone, Serialize)]
pub struct ListingView {
    #[serde(flatten)]
    pub listing: PropertyListing,
    pub approvals: ApprovalStatus,
    pub pending_approvals: Vec<Role>,
    #[serde(with = "amount_serde")]
    pub shortfall: Amount,
}

/// Response DTO for a single approval lookup
#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub property_id: PropertyId,
    pub address: Address,
    pub approved: bool,
}

/// Fixed parties and settlement rules the ledger runs with
#[derive(Debug, Serialize)]
pub struct EscrowConfigResponse {
    pub custody: Address,
    pub seller: Address,
    pub inspector: Address,
    pub lender: Address,
    pub excess_policy: ExcessPolicy,
    pub cancellation_policy: CancellationPolicy,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub address: Address,
    #[serde(with = "amount_serde")]
    pub balance: Amount,
}

/// Property token with its latest sale, if any
#[derive(Debug, Serialize)]
pub struct PropertyView {
    pub id: PropertyId,
    pub owner: Address,
    pub approved: Option<Address>,
    pub token_uri: String,
    pub listing: Option<ListingView>,
}

impl PropertyView {
    pub fn new(id: PropertyId, token: &PropertyToken, listing: Option<ListingView>) -> Self {
        Self {
            id,
            owner: token.owner.clone(),
            approved: token.approved.clone(),
            token_uri: token.token_uri.clone(),
            listing,
        }
    }
}

/// Request DTO for minting a property token to the caller
#[derive(Debug, Deserialize, Validate)]
pub struct MintPropertyRequest {
    #[validate(length(min = 1, max = 2048))]
    pub token_uri: String,
}

/// Approve an operator for a token. Defaults to the escrow custody account.
#[derive(Debug, Default, Deserialize)]
pub struct ApproveTransferRequest {
    pub spender: Option<String>,
}

/// Development-only account funding
#[derive(Debug, Deserialize)]
pub struct FaucetRequest {
    /// Defaults to the caller
    pub address: Option<String>,
    #[serde(with = "amount_serde")]
    pub amount: Amount,
}
