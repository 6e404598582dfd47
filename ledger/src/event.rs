use serde::Serialize;

use crate::config::Role;
use crate::types::{amount_serde, Address, Amount, PropertyId};

/// Record of a committed ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Listed {
        property_id: PropertyId,
        buyer: Address,
        #[serde(with = "amount_serde")]
        purchase_price: Amount,
        #[serde(with = "amount_serde")]
        escrow_amount: Amount,
    },
    EarnestDeposited {
        property_id: PropertyId,
        buyer: Address,
        #[serde(with = "amount_serde")]
        amount: Amount,
        #[serde(with = "amount_serde")]
        escrow_balance: Amount,
    },
    PurchaseFunded {
        property_id: PropertyId,
        lender: Address,
        #[serde(with = "amount_serde")]
        amount: Amount,
        #[serde(with = "amount_serde")]
        escrow_balance: Amount,
    },
    InspectionUpdated {
        property_id: PropertyId,
        passed: bool,
    },
    SaleApproved {
        property_id: PropertyId,
        approver: Address,
        role: Role,
    },
    SaleFinalized {
        property_id: PropertyId,
        buyer: Address,
        seller: Address,
        #[serde(with = "amount_serde")]
        purchase_price: Amount,
        #[serde(with = "amount_serde")]
        excess: Amount,
    },
    SaleCancelled {
        property_id: PropertyId,
        #[serde(with = "amount_serde")]
        refunded_to_buyer: Amount,
        #[serde(with = "amount_serde")]
        paid_to_seller: Amount,
        #[serde(with = "amount_serde")]
        returned_to_lender: Amount,
    },
}

impl LedgerEvent {
    pub fn property_id(&self) -> PropertyId {
        match self {
            LedgerEvent::Listed { property_id, .. }
            | LedgerEvent::EarnestDeposited { property_id, .. }
            | LedgerEvent::PurchaseFunded { property_id, .. }
            | LedgerEvent::InspectionUpdated { property_id, .. }
            | LedgerEvent::SaleApproved { property_id, .. }
            | LedgerEvent::SaleFinalized { property_id, .. }
            | LedgerEvent::SaleCancelled { property_id, .. } => *property_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::Listed { .. } => "listed",
            LedgerEvent::EarnestDeposited { .. } => "earnest_deposited",
            LedgerEvent::PurchaseFunded { .. } => "purchase_funded",
            LedgerEvent::InspectionUpdated { .. } => "inspection_updated",
            LedgerEvent::SaleApproved { .. } => "sale_approved",
            LedgerEvent::SaleFinalized { .. } => "sale_finalized",
            LedgerEvent::SaleCancelled { .. } => "sale_cancelled",
        }
    }
}
