//! Property token registry.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::RegistryError;
use crate::types::{Address, PropertyId};

/// Ownership registry consumed by the escrow ledger.
pub trait AssetRegistry {
    fn owner_of(&self, property_id: PropertyId) -> Result<Address, RegistryError>;

    fn get_approved(&self, property_id: PropertyId) -> Result<Option<Address>, RegistryError>;

    /// Let `spender` move the token once. Only the owner may approve.
    fn approve(
        &mut self,
        caller: &Address,
        spender: &Address,
        property_id: PropertyId,
    ) -> Result<(), RegistryError>;

    /// Move the token from `from` to `to`. `operator` must be the owner or the approved spender.
    fn transfer_from(
        &mut self,
        operator: &Address,
        from: &Address,
        to: &Address,
        property_id: PropertyId,
    ) -> Result<(), RegistryError>;

    fn token_uri(&self, property_id: PropertyId) -> Result<String, RegistryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyToken {
    pub owner: Address,
    pub approved: Option<Address>,
    pub token_uri: String,
}

/// In-memory registry. Token ids are assigned sequentially from 1.
#[derive(Debug, Clone, Default)]
pub struct PropertyRegistry {
    tokens: BTreeMap<PropertyId, PropertyToken>,
    minted: u64,
}

impl PropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(
        &mut self,
        owner: &Address,
        token_uri: impl Into<String>,
    ) -> Result<PropertyId, RegistryError> {
        let token_uri = token_uri.into();
        if token_uri.trim().is_empty() {
            return Err(RegistryError::EmptyTokenUri);
        }

        self.minted += 1;
        let property_id = PropertyId::new(self.minted);
        self.tokens.insert(
            property_id,
            PropertyToken {
                owner: owner.clone(),
                approved: None,
                token_uri,
            },
        );

        debug!(property_id = %property_id, owner = %owner, "property token minted");
        Ok(property_id)
    }

    pub fn total_supply(&self) -> u64 {
        self.minted
    }

    pub fn token(&self, property_id: PropertyId) -> Option<&PropertyToken> {
        self.tokens.get(&property_id)
    }

    pub fn tokens(&self) -> impl Iterator<Item = (PropertyId, &PropertyToken)> {
        self.tokens.iter().map(|(id, token)| (*id, token))
    }

    fn token_mut(&mut self, property_id: PropertyId) -> Result<&mut PropertyToken, RegistryError> {
        self.tokens
            .get_mut(&property_id)
            .ok_or(RegistryError::TokenNotFound(property_id))
    }
}

impl AssetRegistry for PropertyRegistry {
    fn owner_of(&self, property_id: PropertyId) -> Result<Address, RegistryError> {
        self.token(property_id)
            .map(|token| token.owner.clone())
            .ok_or(RegistryError::TokenNotFound(property_id))
    }

    fn get_approved(&self, property_id: PropertyId) -> Result<Option<Address>, RegistryError> {
        self.token(property_id)
            .map(|token| token.approved.clone())
            .ok_or(RegistryError::TokenNotFound(property_id))
    }

    fn approve(
        &mut self,
        caller: &Address,
        spender: &Address,
        property_id: PropertyId,
    ) -> Result<(), RegistryError> {
        let token = self.token_mut(property_id)?;
        if &token.owner != caller {
            return Err(RegistryError::NotOwner {
                property_id,
                caller: caller.clone(),
            });
        }

        token.approved = Some(spender.clone());
        debug!(property_id = %property_id, spender = %spender, "transfer approved");
        Ok(())
    }

    fn transfer_from(
        &mut self,
        operator: &Address,
        from: &Address,
        to: &Address,
        property_id: PropertyId,
    ) -> Result<(), RegistryError> {
        let token = self.token_mut(property_id)?;
        if &token.owner != from {
            return Err(RegistryError::NotOwner {
                property_id,
                caller: from.clone(),
            });
        }
        if operator != from && token.approved.as_ref() != Some(operator) {
            return Err(RegistryError::NotApproved {
                property_id,
                operator: operator.clone(),
            });
        }

        token.owner = to.clone();
        token.approved = None;
        debug!(property_id = %property_id, from = %from, to = %to, "property token transferred");
        Ok(())
    }

    fn token_uri(&self, property_id: PropertyId) -> Result<String, RegistryError> {
        self.token(property_id)
            .map(|token| token.token_uri.clone())
            .ok_or(RegistryError::TokenNotFound(property_id))
    }
}
