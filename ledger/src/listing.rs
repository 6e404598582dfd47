use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{amount_serde, Address, Amount, PropertyId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Listed,
    Finalized,
    Cancelled,
}

impl ListingStatus {
    /// Finalized and cancelled listings accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ListingStatus::Finalized | ListingStatus::Cancelled)
    }
}

/// Sale record for one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyListing {
    pub property_id: PropertyId,
    pub status: ListingStatus,
    pub buyer: Address,
    #[serde(with = "amount_serde")]
    pub purchase_price: Amount,
    /// Earnest deposit the buyer must put up.
    #[serde(with = "amount_serde")]
    pub escrow_amount: Amount,
    /// Funds currently held in custody against this sale.
    #[serde(with = "amount_serde")]
    pub escrow_balance: Amount,
    #[serde(with = "amount_serde")]
    pub earnest_deposited: Amount,
    #[serde(with = "amount_serde")]
    pub lender_funded: Amount,
    pub inspection_passed: bool,
    pub listed_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl PropertyListing {
    pub(crate) fn open(
        property_id: PropertyId,
        buyer: Address,
        purchase_price: Amount,
        escrow_amount: Amount,
        listed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            property_id,
            status: ListingStatus::Listed,
            buyer,
            purchase_price,
            escrow_amount,
            escrow_balance: 0,
            earnest_deposited: 0,
            lender_funded: 0,
            inspection_passed: false,
            listed_at,
            closed_at: None,
        }
    }

    pub fn is_listed(&self) -> bool {
        self.status == ListingStatus::Listed
    }

    /// Amount still needed before the sale can close.
    pub fn shortfall(&self) -> Amount {
        self.purchase_price.saturating_sub(self.escrow_balance)
    }

    pub(crate) fn close(&mut self, status: ListingStatus, at: DateTime<Utc>) {
        self.status = status;
        self.escrow_balance = 0;
        self.closed_at = Some(at);
    }
}
