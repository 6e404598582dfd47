//! Error types for the ledger and its collaborators.

use thiserror::Error;

use crate::config::Role;
use crate::types::{Address, Amount, PropertyId};

/// Reasons a ledger operation is rejected. A rejected operation leaves no trace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{caller} is not permitted to {operation}")]
    UnauthorizedCaller {
        caller: Address,
        operation: &'static str,
    },

    #[error("property {0} is already listed")]
    AlreadyListed(PropertyId),

    #[error("property {0} is not listed")]
    NotListed(PropertyId),

    #[error("escrow amount {escrow_amount} exceeds purchase price {purchase_price}")]
    InvalidEscrowAmount {
        purchase_price: Amount,
        escrow_amount: Amount,
    },

    #[error("escrow balance {available} for property {property_id} is below the purchase price {required}")]
    InsufficientEscrowBalance {
        property_id: PropertyId,
        required: Amount,
        available: Amount,
    },

    #[error("inspection has not passed for property {0}")]
    InspectionNotPassed(PropertyId),

    #[error("property {property_id} is missing approval from {}", join_roles(.missing))]
    MissingApprovals {
        property_id: PropertyId,
        missing: Vec<Role>,
    },

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("{0} cannot be designated as buyer")]
    InvalidBuyer(Address),

    #[error("earnest deposit of {offered} leaves the total below the required {required}")]
    EarnestBelowRequired { required: Amount, offered: Amount },

    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Treasury(#[from] TreasuryError),
}

impl LedgerError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::UnauthorizedCaller { .. } => "UNAUTHORIZED_CALLER",
            LedgerError::AlreadyListed(_) => "ALREADY_LISTED",
            LedgerError::NotListed(_) => "NOT_LISTED",
            LedgerError::InvalidEscrowAmount { .. } => "INVALID_ESCROW_AMOUNT",
            LedgerError::InsufficientEscrowBalance { .. } => "INSUFFICIENT_ESCROW_BALANCE",
            LedgerError::InspectionNotPassed(_) => "INSPECTION_NOT_PASSED",
            LedgerError::MissingApprovals { .. } => "MISSING_APPROVALS",
            LedgerError::InvalidAmount => "INVALID_AMOUNT",
            LedgerError::InvalidBuyer(_) => "INVALID_BUYER",
            LedgerError::EarnestBelowRequired { .. } => "EARNEST_BELOW_REQUIRED",
            LedgerError::ArithmeticOverflow => "ARITHMETIC_OVERFLOW",
            LedgerError::Registry(err) => err.code(),
            LedgerError::Treasury(err) => err.code(),
        }
    }
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("token {0} does not exist")]
    TokenNotFound(PropertyId),

    #[error("{caller} does not own token {property_id}")]
    NotOwner {
        property_id: PropertyId,
        caller: Address,
    },

    #[error("{operator} is not approved to transfer token {property_id}")]
    NotApproved {
        property_id: PropertyId,
        operator: Address,
    },

    #[error("token URI must not be empty")]
    EmptyTokenUri,
}

impl RegistryError {
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::TokenNotFound(_) => "TOKEN_NOT_FOUND",
            RegistryError::NotOwner { .. } => "NOT_TOKEN_OWNER",
            RegistryError::NotApproved { .. } => "TRANSFER_NOT_APPROVED",
            RegistryError::EmptyTokenUri => "EMPTY_TOKEN_URI",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreasuryError {
    #[error("{account} holds {balance}, cannot transfer {requested}")]
    InsufficientFunds {
        account: Address,
        balance: Amount,
        requested: Amount,
    },

    #[error("balance of {0} would overflow")]
    Overflow(Address),
}

impl TreasuryError {
    pub fn code(&self) -> &'static str {
        match self {
            TreasuryError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TreasuryError::Overflow(_) => "BALANCE_OVERFLOW",
        }
    }
}

/// Invalid [`EscrowConfig`](crate::EscrowConfig) or policy name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} address must not be empty")]
    EmptyAddress(&'static str),

    #[error("{first} and {second} share address {address}")]
    DuplicateAddress {
        first: &'static str,
        second: &'static str,
        address: String,
    },

    #[error("unknown settlement policy: {0}")]
    UnknownPolicy(String),
}
