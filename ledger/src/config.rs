//! Fixed participants and settlement policy of an escrow ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::types::Address;

/// Participant role in a sale.
///
/// Seller, inspector and lender are fixed for the lifetime of a ledger; the
/// buyer is designated per listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Seller,
    Buyer,
    Inspector,
    Lender,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Seller => "seller",
            Role::Buyer => "buyer",
            Role::Inspector => "inspector",
            Role::Lender => "lender",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to escrow funds above the purchase price on finalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcessPolicy {
    /// The seller receives the whole escrow balance.
    #[default]
    PaySeller,
    /// Excess goes back to the lender up to its funding, the rest to the buyer.
    ReturnToContributors,
}

impl FromStr for ExcessPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pay_seller" => Ok(ExcessPolicy::PaySeller),
            "return_to_contributors" => Ok(ExcessPolicy::ReturnToContributors),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Where the buyer's earnest goes when a sale is cancelled after inspection passed.
///
/// An earnest deposit is always refunded when inspection has not passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationPolicy {
    #[default]
    ForfeitToSeller,
    RefundBuyer,
}

impl FromStr for CancellationPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forfeit_to_seller" => Ok(CancellationPolicy::ForfeitToSeller),
            "refund_buyer" => Ok(CancellationPolicy::RefundBuyer),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPolicy {
    pub excess: ExcessPolicy,
    pub cancellation: CancellationPolicy,
}

/// Immutable configuration of an [`EscrowLedger`](crate::EscrowLedger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscrowConfig {
    custody: Address,
    seller: Address,
    inspector: Address,
    lender: Address,
    settlement: SettlementPolicy,
}

impl EscrowConfig {
    /// Build a configuration. Every address must be non-empty and distinct.
    pub fn new(
        custody: Address,
        seller: Address,
        inspector: Address,
        lender: Address,
    ) -> Result<Self, ConfigError> {
        let named: [(&'static str, &Address); 4] = [
            ("custody", &custody),
            ("seller", &seller),
            ("inspector", &inspector),
            ("lender", &lender),
        ];

        for (i, &(name, address)) in named.iter().enumerate() {
            if address.is_empty() {
                return Err(ConfigError::EmptyAddress(name));
            }
            for &(other, earlier) in &named[..i] {
                if earlier == address {
                    return Err(ConfigError::DuplicateAddress {
                        first: other,
                        second: name,
                        address: address.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            custody,
            seller,
            inspector,
            lender,
            settlement: SettlementPolicy::default(),
        })
    }

    pub fn with_settlement(mut self, settlement: SettlementPolicy) -> Self {
        self.settlement = settlement;
        self
    }

    /// Account that holds tokens and funds while a sale is in escrow.
    pub fn custody(&self) -> &Address {
        &self.custody
    }

    pub fn seller(&self) -> &Address {
        &self.seller
    }

    pub fn inspector(&self) -> &Address {
        &self.inspector
    }

    pub fn lender(&self) -> &Address {
        &self.lender
    }

    pub fn settlement(&self) -> SettlementPolicy {
        self.settlement
    }

    /// Fixed role held by `address`, if any. Buyers are per listing and never returned here.
    pub fn fixed_role(&self, address: &Address) -> Option<Role> {
        if address == &self.seller {
            Some(Role::Seller)
        } else if address == &self.inspector {
            Some(Role::Inspector)
        } else if address == &self.lender {
            Some(Role::Lender)
        } else {
            None
        }
    }

    /// True for fixed-role and custody addresses, none of which may act as a buyer.
    pub fn is_reserved(&self, address: &Address) -> bool {
        address == &self.custody || self.fixed_role(address).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EscrowConfig {
        EscrowConfig::new(
            Address::new("custody"),
            Address::new("seller"),
            Address::new("inspector"),
            Address::new("lender"),
        )
        .unwrap()
    }

    #[test]
    fn test_roles_resolved_by_address() {
        let config = config();
        assert_eq!(config.fixed_role(&Address::new("seller")), Some(Role::Seller));
        assert_eq!(config.fixed_role(&Address::new("lender")), Some(Role::Lender));
        assert_eq!(config.fixed_role(&Address::new("custody")), None);
        assert!(config.is_reserved(&Address::new("custody")));
        assert!(!config.is_reserved(&Address::new("buyer")));
    }

    #[test]
    fn test_duplicate_addresses_rejected() {
        let err = EscrowConfig::new(
            Address::new("custody"),
            Address::new("shared"),
            Address::new("inspector"),
            Address::new("shared"),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::DuplicateAddress {
                first: "seller",
                second: "lender",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_address_rejected() {
        let err = EscrowConfig::new(
            Address::new("custody"),
            Address::new(""),
            Address::new("inspector"),
            Address::new("lender"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyAddress("seller")));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "return_to_contributors".parse::<ExcessPolicy>().unwrap(),
            ExcessPolicy::ReturnToContributors
        );
        assert_eq!(
            " Refund_Buyer ".parse::<CancellationPolicy>().unwrap(),
            CancellationPolicy::RefundBuyer
        );
        assert!("keep_it".parse::<ExcessPolicy>().is_err());
        assert_eq!(SettlementPolicy::default().excess, ExcessPolicy::PaySeller);
        assert_eq!(
            SettlementPolicy::default().cancellation,
            CancellationPolicy::ForfeitToSeller
        );
    }
}
