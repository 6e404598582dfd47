//! Homeward escrow ledger.
//!
//! A per-property sale state machine: the seller lists a tokenized property
//! for a designated buyer, the buyer deposits earnest funds, the inspector
//! records the inspection outcome, seller, buyer and inspector approve, and
//! the seller finalizes (token to buyer, funds to seller) or either party
//! cancels. Token ownership lives in an [`AssetRegistry`], balances in a
//! [`Treasury`]; the ledger holds both in a custody account while a sale is
//! open.

pub mod config;
pub mod error;
pub mod event;
pub mod ledger;
pub mod listing;
pub mod registry;
pub mod treasury;
pub mod types;

pub use config::{CancellationPolicy, EscrowConfig, ExcessPolicy, Role, SettlementPolicy};
pub use error::{ConfigError, LedgerError, RegistryError, TreasuryError};
pub use event::LedgerEvent;
pub use ledger::EscrowLedger;
pub use listing::{ListingStatus, PropertyListing};
pub use registry::{AssetRegistry, PropertyRegistry, PropertyToken};
pub use treasury::{AccountBook, Treasury};
pub use types::{amount_serde, tokens, Address, Amount, PropertyId, TOKEN_DECIMALS, UNITS_PER_TOKEN};

/// Ledger backed by the in-memory registry and account book.
pub type MarketplaceLedger = EscrowLedger<PropertyRegistry, AccountBook>;
