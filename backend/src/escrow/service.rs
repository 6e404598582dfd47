//! Escrow service layer
//!
//! Owns the marketplace ledger behind a single lock. Every mutation takes the
//! write lock, runs one ledger operation, drains the events it recorded and
//! hands them to the WebSocket feed once the lock is released.

use homeward_ledger::{
    Address, Amount, AssetRegistry, EscrowConfig, LedgerError, ListingStatus, MarketplaceLedger,
    PropertyId, PropertyListing, PropertyToken, RegistryError, Role, Treasury,
};
use tokio::sync::RwLock;

use crate::escrow::{
    ApprovalStatus, CreateListingRequest, EscrowConfigResponse, ListingView, PropertyView,
};
use crate::websocket::WsState;

/// Escrow service for the sale lifecycle
pub struct EscrowService {
    ledger: RwLock<MarketplaceLedger>,
    config: EscrowConfig,
    ws_state: WsState,
}

impl EscrowService {
    pub fn new(ledger: MarketplaceLedger, ws_state: WsState) -> Self {
        Self {
            config: ledger.config().clone(),
            ledger: RwLock::new(ledger),
            ws_state,
        }
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    pub fn config_response(&self) -> EscrowConfigResponse {
        let settlement = self.config.settlement();
        EscrowConfigResponse {
            custody: self.config.custody().clone(),
            seller: self.config.seller().clone(),
            inspector: self.config.inspector().clone(),
            lender: self.config.lender().clone(),
            excess_policy: settlement.excess,
            cancellation_policy: settlement.cancellation,
        }
    }

    /// Run a read-only query under the shared lock
    pub async fn read<F, O>(&self, f: F) -> O
    where
        F: FnOnce(&MarketplaceLedger) -> O,
    {
        let ledger = self.ledger.read().await;
        f(&ledger)
    }

    /// Run a mutation under the write lock and publish the events it recorded
    pub async fn execute<F, O>(&self, f: F) -> Result<O, LedgerError>
    where
        F: FnOnce(&mut MarketplaceLedger) -> Result<O, LedgerError>,
    {
        let (result, events) = {
            let mut ledger = self.ledger.write().await;
            let result = f(&mut ledger);
            (result, ledger.take_events())
        };

        for event in events {
            tracing::debug!(
                event = event.name(),
                property_id = %event.property_id(),
                "Publishing ledger event"
            );
            self.ws_state.broadcast_event(event);
        }

        result
    }

    /// Fixed roles held by `wallet`, plus `Buyer` if it is the designated buyer
    /// of any open sale
    pub async fn roles_of(&self, wallet: &Address) -> Vec<Role> {
        let mut roles: Vec<Role> = self.config.fixed_role(wallet).into_iter().collect();
        let is_buyer = self
            .read(|ledger| {
                ledger
                    .listings()
                    .any(|listing| listing.is_listed() && &listing.buyer == wallet)
            })
            .await;
        if is_buyer {
            roles.push(Role::Buyer);
        }
        roles
    }

    // ---------------------------------------------------------------------
    // Sales
    // ---------------------------------------------------------------------

    pub async fn listing(&self, property_id: PropertyId) -> Option<ListingView> {
        self.read(|ledger| {
            ledger
                .listing(property_id)
                .map(|listing| listing_view(ledger, listing))
        })
        .await
    }

    pub async fn listings(&self, status: Option<ListingStatus>) -> Vec<ListingView> {
        self.read(|ledger| {
            ledger
                .listings()
                .filter(|listing| status.map_or(true, |status| listing.status == status))
                .map(|listing| listing_view(ledger, listing))
                .collect()
        })
        .await
    }

    pub async fn create_listing(
        &self,
        caller: &Address,
        request: CreateListingRequest,
    ) -> Result<ListingView, LedgerError> {
        let buyer = Address::new(request.buyer);
        self.mutate(request.property_id, |ledger| {
            ledger.list(
                caller,
                request.property_id,
                &buyer,
                request.purchase_price,
                request.escrow_amount,
            )
        })
        .await
    }

    pub async fn deposit_earnest(
        &self,
        caller: &Address,
        property_id: PropertyId,
        amount: Amount,
    ) -> Result<ListingView, LedgerError> {
        self.mutate(property_id, |ledger| {
            ledger.deposit_earnest(caller, property_id, amount)
        })
        .await
    }

    pub async fn fund_purchase(
        &self,
        caller: &Address,
        property_id: PropertyId,
        amount: Amount,
    ) -> Result<ListingView, LedgerError> {
        self.mutate(property_id, |ledger| {
            ledger.fund_purchase(caller, property_id, amount)
        })
        .await
    }

    pub async fn update_inspection(
        &self,
        caller: &Address,
        property_id: PropertyId,
        passed: bool,
    ) -> Result<ListingView, LedgerError> {
        self.mutate(property_id, |ledger| {
            ledger.update_inspection_status(caller, property_id, passed)
        })
        .await
    }

    pub async fn approve_sale(
        &self,
        caller: &Address,
        property_id: PropertyId,
    ) -> Result<ListingView, LedgerError> {
        self.mutate(property_id, |ledger| ledger.approve_sale(caller, property_id))
            .await
    }

    pub async fn finalize_sale(
        &self,
        caller: &Address,
        property_id: PropertyId,
    ) -> Result<ListingView, LedgerError> {
        self.mutate(property_id, |ledger| ledger.finalize_sale(caller, property_id))
            .await
    }

    pub async fn cancel_sale(
        &self,
        caller: &Address,
        property_id: PropertyId,
    ) -> Result<ListingView, LedgerError> {
        self.mutate(property_id, |ledger| ledger.cancel_sale(caller, property_id))
            .await
    }

    pub async fn approval(&self, property_id: PropertyId, address: &Address) -> bool {
        self.read(|ledger| ledger.approval(property_id, address)).await
    }

    /// Funds held in custody across all open sales
    pub async fn custody_balance(&self) -> Amount {
        self.read(|ledger| ledger.balance()).await
    }

    pub async fn account_balance(&self, address: &Address) -> Amount {
        self.read(|ledger| ledger.treasury().balance_of(address))
            .await
    }

    // ---------------------------------------------------------------------
    // Property tokens
    // ---------------------------------------------------------------------

    pub async fn properties(&self) -> Vec<PropertyView> {
        self.read(|ledger| {
            ledger
                .registry()
                .tokens()
                .map(|(id, token)| property_view(ledger, id, token))
                .collect()
        })
        .await
    }

    pub async fn property(&self, property_id: PropertyId) -> Option<PropertyView> {
        self.read(|ledger| {
            ledger
                .registry()
                .token(property_id)
                .map(|token| property_view(ledger, property_id, token))
        })
        .await
    }

    /// Mint a new property token owned by `owner`
    pub async fn mint_property(
        &self,
        owner: &Address,
        token_uri: String,
    ) -> Result<PropertyView, LedgerError> {
        self.execute(|ledger| {
            let property_id = ledger.registry_mut().mint(owner, token_uri)?;
            tracing::info!(property_id = %property_id, owner = %owner, "Property minted");
            view_property(ledger, property_id)
        })
        .await
    }

    /// Let `spender` move the caller's token; listing requires custody approval
    pub async fn approve_transfer(
        &self,
        caller: &Address,
        property_id: PropertyId,
        spender: Option<Address>,
    ) -> Result<PropertyView, LedgerError> {
        let spender = spender.unwrap_or_else(|| self.config.custody().clone());
        self.execute(|ledger| {
            ledger
                .registry_mut()
                .approve(caller, &spender, property_id)?;
            view_property(ledger, property_id)
        })
        .await
    }

    /// Credit an account out of thin air. Development environments only.
    pub async fn faucet(&self, account: &Address, amount: Amount) -> Result<Amount, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        self.execute(|ledger| {
            let balance = ledger.treasury_mut().credit(account, amount)?;
            tracing::info!(account = %account, amount = %amount, "Faucet credited account");
            Ok(balance)
        })
        .await
    }

    async fn mutate<F>(&self, property_id: PropertyId, f: F) -> Result<ListingView, LedgerError>
    where
        F: FnOnce(&mut MarketplaceLedger) -> Result<(), LedgerError>,
    {
        self.execute(|ledger| {
            f(ledger)?;
            ledger
                .listing(property_id)
                .map(|listing| listing_view(ledger, listing))
                .ok_or(LedgerError::NotListed(property_id))
        })
        .await
    }
}

fn listing_view(ledger: &MarketplaceLedger, listing: &PropertyListing) -> ListingView {
    let id = listing.property_id;
    let approvals = ApprovalStatus {
        seller: ledger.approval(id, ledger.seller()),
        buyer: ledger.approval(id, &listing.buyer),
        inspector: ledger.approval(id, ledger.inspector()),
    };

    ListingView {
        listing: listing.clone(),
        approvals,
        pending_approvals: ledger.pending_approvals(id),
        shortfall: listing.shortfall(),
    }
}

fn property_view(
    ledger: &MarketplaceLedger,
    id: PropertyId,
    token: &PropertyToken,
) -> PropertyView {
    let listing = ledger
        .listing(id)
        .map(|listing| listing_view(ledger, listing));
    PropertyView::new(id, token, listing)
}

fn view_property(
    ledger: &MarketplaceLedger,
    property_id: PropertyId,
) -> Result<PropertyView, LedgerError> {
    let token = ledger
        .registry()
        .token(property_id)
        .ok_or(RegistryError::TokenNotFound(property_id))?;
    Ok(property_view(ledger, property_id, token))
}
