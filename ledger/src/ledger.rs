//! The escrow state machine.
//!
//! Every operation checks its preconditions, commits its effects on ledger
//! state, then calls out to the registry and treasury. A failed call-out
//! restores the pre-call state and reverses any value already moved, so an
//! operation either commits entirely or not at all.

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, warn};

use crate::config::{CancellationPolicy, EscrowConfig, ExcessPolicy, Role};
use crate::error::LedgerError;
use crate::event::LedgerEvent;
use crate::listing::{ListingStatus, PropertyListing};
use crate::registry::AssetRegistry;
use crate::treasury::Treasury;
use crate::types::{Address, Amount, PropertyId};

/// Escrow ledger coordinating property sales between a seller, buyers, an
/// inspector and a lender.
///
/// The ledger owns its registry and treasury; callers serialize access to it
/// (the server keeps it behind a single lock).
#[derive(Debug)]
pub struct EscrowLedger<R, T> {
    config: EscrowConfig,
    registry: R,
    treasury: T,
    listings: BTreeMap<PropertyId, PropertyListing>,
    approvals: BTreeSet<(PropertyId, Address)>,
    events: Vec<LedgerEvent>,
}

/// Ledger state of one property captured before its effects are applied.
struct Checkpoint {
    property_id: PropertyId,
    listing: Option<PropertyListing>,
    approvals: Vec<Address>,
}

#[derive(Debug, Clone)]
struct Payout {
    to: Address,
    amount: Amount,
}

impl Payout {
    fn new(to: &Address, amount: Amount) -> Self {
        Self {
            to: to.clone(),
            amount,
        }
    }
}

impl<R: AssetRegistry, T: Treasury> EscrowLedger<R, T> {
    pub fn new(config: EscrowConfig, registry: R, treasury: T) -> Self {
        Self {
            config,
            registry,
            treasury,
            listings: BTreeMap::new(),
            approvals: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    pub fn custody(&self) -> &Address {
        self.config.custody()
    }

    pub fn seller(&self) -> &Address {
        self.config.seller()
    }

    pub fn inspector(&self) -> &Address {
        self.config.inspector()
    }

    pub fn lender(&self) -> &Address {
        self.config.lender()
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Direct registry access for owner-driven actions such as minting and approvals.
    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }

    pub fn treasury(&self) -> &T {
        &self.treasury
    }

    pub fn treasury_mut(&mut self) -> &mut T {
        &mut self.treasury
    }

    /// Latest sale record for a property, whatever its status.
    pub fn listing(&self, property_id: PropertyId) -> Option<&PropertyListing> {
        self.listings.get(&property_id)
    }

    pub fn listings(&self) -> impl Iterator<Item = &PropertyListing> {
        self.listings.values()
    }

    pub fn is_listed(&self, property_id: PropertyId) -> bool {
        self.listing(property_id)
            .map_or(false, PropertyListing::is_listed)
    }

    pub fn buyer(&self, property_id: PropertyId) -> Option<&Address> {
        self.listing(property_id).map(|listing| &listing.buyer)
    }

    pub fn purchase_price(&self, property_id: PropertyId) -> Amount {
        self.listing(property_id)
            .map_or(0, |listing| listing.purchase_price)
    }

    pub fn escrow_amount(&self, property_id: PropertyId) -> Amount {
        self.listing(property_id)
            .map_or(0, |listing| listing.escrow_amount)
    }

    pub fn escrow_balance(&self, property_id: PropertyId) -> Amount {
        self.listing(property_id)
            .map_or(0, |listing| listing.escrow_balance)
    }

    pub fn inspection_status(&self, property_id: PropertyId) -> bool {
        self.listing(property_id)
            .map_or(false, |listing| listing.inspection_passed)
    }

    pub fn approval(&self, property_id: PropertyId, address: &Address) -> bool {
        self.approvals.contains(&(property_id, address.clone()))
    }

    /// Roles whose approval the current sale of `property_id` still lacks.
    pub fn pending_approvals(&self, property_id: PropertyId) -> Vec<Role> {
        self.listing(property_id)
            .map(|listing| self.missing_approvals(listing))
            .unwrap_or_default()
    }

    /// Funds held in the custody account.
    pub fn balance(&self) -> Amount {
        self.treasury.balance_of(self.config.custody())
    }

    /// Drain events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    // ---------------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------------

    /// Put a property up for sale to `buyer`. The seller must have approved
    /// the custody account on the registry beforehand.
    pub fn list(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
        buyer: &Address,
        purchase_price: Amount,
        escrow_amount: Amount,
    ) -> Result<(), LedgerError> {
        let result = self.try_list(caller, property_id, buyer, purchase_price, escrow_amount);
        log_outcome("list", caller, property_id, &result);
        result
    }

    /// Buyer's earnest deposit. The buyer's cumulative earnest must reach the
    /// listing's escrow amount.
    pub fn deposit_earnest(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let result = self.try_deposit_earnest(caller, property_id, amount);
        log_outcome("deposit_earnest", caller, property_id, &result);
        result
    }

    /// Lender's contribution towards the purchase price.
    pub fn fund_purchase(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let result = self.try_fund_purchase(caller, property_id, amount);
        log_outcome("fund_purchase", caller, property_id, &result);
        result
    }

    pub fn update_inspection_status(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
        passed: bool,
    ) -> Result<(), LedgerError> {
        let result = self.try_update_inspection_status(caller, property_id, passed);
        log_outcome("update_inspection_status", caller, property_id, &result);
        result
    }

    pub fn pass_inspection(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
    ) -> Result<(), LedgerError> {
        self.update_inspection_status(caller, property_id, true)
    }

    /// Record the caller's approval. Approving twice has no further effect.
    pub fn approve_sale(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
    ) -> Result<(), LedgerError> {
        let result = self.try_approve_sale(caller, property_id);
        log_outcome("approve_sale", caller, property_id, &result);
        result
    }

    /// Close the sale: the token goes to the buyer and the price to the seller.
    pub fn finalize_sale(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
    ) -> Result<(), LedgerError> {
        let result = self.try_finalize_sale(caller, property_id);
        log_outcome("finalize_sale", caller, property_id, &result);
        result
    }

    /// Abandon the sale: funds are settled per the cancellation policy and the
    /// token returns to the seller.
    pub fn cancel_sale(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
    ) -> Result<(), LedgerError> {
        let result = self.try_cancel_sale(caller, property_id);
        log_outcome("cancel_sale", caller, property_id, &result);
        result
    }

    fn try_list(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
        buyer: &Address,
        purchase_price: Amount,
        escrow_amount: Amount,
    ) -> Result<(), LedgerError> {
        self.require_role(caller, Role::Seller, "list a property")?;
        if escrow_amount > purchase_price {
            return Err(LedgerError::InvalidEscrowAmount {
                purchase_price,
                escrow_amount,
            });
        }
        if purchase_price == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if self.is_listed(property_id) {
            return Err(LedgerError::AlreadyListed(property_id));
        }
        if buyer.is_empty() || self.config.is_reserved(buyer) {
            return Err(LedgerError::InvalidBuyer(buyer.clone()));
        }

        let checkpoint = self.checkpoint(property_id);
        self.clear_approvals(property_id);
        self.listings.insert(
            property_id,
            PropertyListing::open(
                property_id,
                buyer.clone(),
                purchase_price,
                escrow_amount,
                Utc::now(),
            ),
        );

        let custody = self.config.custody().clone();
        if let Err(err) = self
            .registry
            .transfer_from(&custody, caller, &custody, property_id)
        {
            self.restore(checkpoint);
            return Err(err.into());
        }

        self.events.push(LedgerEvent::Listed {
            property_id,
            buyer: buyer.clone(),
            purchase_price,
            escrow_amount,
        });
        Ok(())
    }

    fn try_deposit_earnest(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let listing = self.active_listing(property_id)?;
        if &listing.buyer != caller {
            return Err(unauthorized(caller, "deposit earnest"));
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let earnest_deposited = listing
            .earnest_deposited
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        if earnest_deposited < listing.escrow_amount {
            return Err(LedgerError::EarnestBelowRequired {
                required: listing.escrow_amount,
                offered: amount,
            });
        }
        let escrow_balance = listing
            .escrow_balance
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;

        let checkpoint = self.checkpoint(property_id);
        self.update_listing(property_id, |listing| {
            listing.earnest_deposited = earnest_deposited;
            listing.escrow_balance = escrow_balance;
        });

        let custody = self.config.custody().clone();
        if let Err(err) = self.treasury.transfer(caller, &custody, amount) {
            self.restore(checkpoint);
            return Err(err.into());
        }

        self.events.push(LedgerEvent::EarnestDeposited {
            property_id,
            buyer: caller.clone(),
            amount,
            escrow_balance,
        });
        Ok(())
    }

    fn try_fund_purchase(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.require_role(caller, Role::Lender, "fund a purchase")?;
        let listing = self.active_listing(property_id)?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let lender_funded = listing
            .lender_funded
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        let escrow_balance = listing
            .escrow_balance
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;

        let checkpoint = self.checkpoint(property_id);
        self.update_listing(property_id, |listing| {
            listing.lender_funded = lender_funded;
            listing.escrow_balance = escrow_balance;
        });

        let custody = self.config.custody().clone();
        if let Err(err) = self.treasury.transfer(caller, &custody, amount) {
            self.restore(checkpoint);
            return Err(err.into());
        }

        self.events.push(LedgerEvent::PurchaseFunded {
            property_id,
            lender: caller.clone(),
            amount,
            escrow_balance,
        });
        Ok(())
    }

    fn try_update_inspection_status(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
        passed: bool,
    ) -> Result<(), LedgerError> {
        self.require_role(caller, Role::Inspector, "update inspection status")?;
        self.active_listing(property_id)?;

        self.update_listing(property_id, |listing| listing.inspection_passed = passed);
        self.events.push(LedgerEvent::InspectionUpdated {
            property_id,
            passed,
        });
        Ok(())
    }

    fn try_approve_sale(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
    ) -> Result<(), LedgerError> {
        let listing = self.active_listing(property_id)?;
        let role = self
            .sale_role(caller, listing)
            .ok_or_else(|| unauthorized(caller, "approve this sale"))?;

        if !self.approvals.insert((property_id, caller.clone())) {
            debug!(property_id = %property_id, approver = %caller, "approval already recorded");
            return Ok(());
        }

        self.events.push(LedgerEvent::SaleApproved {
            property_id,
            approver: caller.clone(),
            role,
        });
        Ok(())
    }

    fn try_finalize_sale(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
    ) -> Result<(), LedgerError> {
        self.require_role(caller, Role::Seller, "finalize a sale")?;
        let listing = self.active_listing(property_id)?;
        if !listing.inspection_passed {
            return Err(LedgerError::InspectionNotPassed(property_id));
        }
        let missing = self.missing_approvals(listing);
        if !missing.is_empty() {
            return Err(LedgerError::MissingApprovals {
                property_id,
                missing,
            });
        }
        if listing.escrow_balance < listing.purchase_price {
            return Err(LedgerError::InsufficientEscrowBalance {
                property_id,
                required: listing.purchase_price,
                available: listing.escrow_balance,
            });
        }

        let buyer = listing.buyer.clone();
        let purchase_price = listing.purchase_price;
        let excess = listing.escrow_balance - listing.purchase_price;
        let payouts = self.finalize_payouts(listing);

        let checkpoint = self.checkpoint(property_id);
        self.update_listing(property_id, |listing| {
            listing.close(ListingStatus::Finalized, Utc::now())
        });

        // Payouts go first: the ledger can claw back a payout, not a token.
        let paid = match self.pay_out(&payouts) {
            Ok(paid) => paid,
            Err(err) => {
                self.restore(checkpoint);
                return Err(err);
            }
        };
        let custody = self.config.custody().clone();
        if let Err(err) = self
            .registry
            .transfer_from(&custody, &custody, &buyer, property_id)
        {
            self.reverse(&paid);
            self.restore(checkpoint);
            return Err(err.into());
        }

        self.events.push(LedgerEvent::SaleFinalized {
            property_id,
            buyer,
            seller: self.config.seller().clone(),
            purchase_price,
            excess,
        });
        Ok(())
    }

    fn try_cancel_sale(
        &mut self,
        caller: &Address,
        property_id: PropertyId,
    ) -> Result<(), LedgerError> {
        let listing = self.active_listing(property_id)?;
        if caller != self.config.seller() && caller != &listing.buyer {
            return Err(unauthorized(caller, "cancel this sale"));
        }

        let refund_earnest = !listing.inspection_passed
            || self.config.settlement().cancellation == CancellationPolicy::RefundBuyer;
        let (refunded_to_buyer, paid_to_seller) = if refund_earnest {
            (listing.earnest_deposited, 0)
        } else {
            (0, listing.earnest_deposited)
        };
        let returned_to_lender = listing.lender_funded;
        let payouts = non_zero(vec![
            Payout::new(&listing.buyer, refunded_to_buyer),
            Payout::new(self.config.seller(), paid_to_seller),
            Payout::new(self.config.lender(), returned_to_lender),
        ]);

        let checkpoint = self.checkpoint(property_id);
        self.update_listing(property_id, |listing| {
            listing.close(ListingStatus::Cancelled, Utc::now())
        });

        let paid = match self.pay_out(&payouts) {
            Ok(paid) => paid,
            Err(err) => {
                self.restore(checkpoint);
                return Err(err);
            }
        };
        let custody = self.config.custody().clone();
        let seller = self.config.seller().clone();
        if let Err(err) = self
            .registry
            .transfer_from(&custody, &custody, &seller, property_id)
        {
            self.reverse(&paid);
            self.restore(checkpoint);
            return Err(err.into());
        }

        self.events.push(LedgerEvent::SaleCancelled {
            property_id,
            refunded_to_buyer,
            paid_to_seller,
            returned_to_lender,
        });
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn require_role(
        &self,
        caller: &Address,
        role: Role,
        operation: &'static str,
    ) -> Result<(), LedgerError> {
        if self.config.fixed_role(caller) == Some(role) {
            Ok(())
        } else {
            Err(unauthorized(caller, operation))
        }
    }

    fn active_listing(&self, property_id: PropertyId) -> Result<&PropertyListing, LedgerError> {
        self.listings
            .get(&property_id)
            .filter(|listing| listing.is_listed())
            .ok_or(LedgerError::NotListed(property_id))
    }

    fn update_listing(&mut self, property_id: PropertyId, apply: impl FnOnce(&mut PropertyListing)) {
        if let Some(listing) = self.listings.get_mut(&property_id) {
            apply(listing);
        }
    }

    /// Role under which `caller` may approve this sale.
    fn sale_role(&self, caller: &Address, listing: &PropertyListing) -> Option<Role> {
        if caller == &listing.buyer {
            return Some(Role::Buyer);
        }
        match self.config.fixed_role(caller) {
            Some(Role::Seller) => Some(Role::Seller),
            Some(Role::Inspector) => Some(Role::Inspector),
            _ => None,
        }
    }

    fn missing_approvals(&self, listing: &PropertyListing) -> Vec<Role> {
        [
            (Role::Seller, self.config.seller()),
            (Role::Buyer, &listing.buyer),
            (Role::Inspector, self.config.inspector()),
        ]
        .into_iter()
        .filter(|(_, address)| !self.approval(listing.property_id, address))
        .map(|(role, _)| role)
        .collect()
    }

    fn finalize_payouts(&self, listing: &PropertyListing) -> Vec<Payout> {
        let seller = self.config.seller();
        match self.config.settlement().excess {
            ExcessPolicy::PaySeller => non_zero(vec![Payout::new(seller, listing.escrow_balance)]),
            ExcessPolicy::ReturnToContributors => {
                let excess = listing.escrow_balance - listing.purchase_price;
                let to_lender = excess.min(listing.lender_funded);
                non_zero(vec![
                    Payout::new(seller, listing.purchase_price),
                    Payout::new(self.config.lender(), to_lender),
                    Payout::new(&listing.buyer, excess - to_lender),
                ])
            }
        }
    }

    /// Pay out of custody. On failure, payouts already made are reversed.
    fn pay_out(&mut self, payouts: &[Payout]) -> Result<Vec<Payout>, LedgerError> {
        let custody = self.config.custody().clone();
        let mut paid = Vec::with_capacity(payouts.len());
        for payout in payouts {
            if let Err(err) = self.treasury.transfer(&custody, &payout.to, payout.amount) {
                self.reverse(&paid);
                return Err(err.into());
            }
            paid.push(payout.clone());
        }
        Ok(paid)
    }

    fn reverse(&mut self, paid: &[Payout]) {
        let custody = self.config.custody().clone();
        for payout in paid.iter().rev() {
            if let Err(err) = self.treasury.transfer(&payout.to, &custody, payout.amount) {
                error!(
                    to = %payout.to,
                    amount = %payout.amount,
                    error = %err,
                    "failed to reverse escrow payout"
                );
            }
        }
    }

    fn clear_approvals(&mut self, property_id: PropertyId) {
        self.approvals.retain(|(id, _)| *id != property_id);
    }

    fn checkpoint(&self, property_id: PropertyId) -> Checkpoint {
        Checkpoint {
            property_id,
            listing: self.listings.get(&property_id).cloned(),
            approvals: self
                .approvals
                .iter()
                .filter(|(id, _)| *id == property_id)
                .map(|(_, address)| address.clone())
                .collect(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        let Checkpoint {
            property_id,
            listing,
            approvals,
        } = checkpoint;

        match listing {
            Some(listing) => {
                self.listings.insert(property_id, listing);
            }
            None => {
                self.listings.remove(&property_id);
            }
        }
        self.clear_approvals(property_id);
        self.approvals
            .extend(approvals.into_iter().map(|address| (property_id, address)));

        warn!(property_id = %property_id, "escrow operation rolled back");
    }
}

fn unauthorized(caller: &Address, operation: &'static str) -> LedgerError {
    LedgerError::UnauthorizedCaller {
        caller: caller.clone(),
        operation,
    }
}

fn non_zero(payouts: Vec<Payout>) -> Vec<Payout> {
    payouts.into_iter().filter(|p| p.amount > 0).collect()
}

fn log_outcome(
    operation: &'static str,
    caller: &Address,
    property_id: PropertyId,
    result: &Result<(), LedgerError>,
) {
    match result {
        Ok(()) => info!(
            operation,
            caller = %caller,
            property_id = %property_id,
            "escrow operation committed"
        ),
        Err(err) => debug!(
            operation,
            caller = %caller,
            property_id = %property_id,
            code = err.code(),
            error = %err,
            "escrow operation rejected"
        ),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::SettlementPolicy;
    use crate::error::{RegistryError, TreasuryError};
    use crate::registry::PropertyRegistry;
    use crate::treasury::AccountBook;
    use crate::types::tokens;

    /// Treasury that refuses payments to one account.
    #[derive(Debug, Default)]
    struct BlockingTreasury {
        book: AccountBook,
        blocked: Option<Address>,
    }

    impl Treasury for BlockingTreasury {
        fn balance_of(&self, account: &Address) -> Amount {
            self.book.balance_of(account)
        }

        fn transfer(
            &mut self,
            from: &Address,
            to: &Address,
            amount: Amount,
        ) -> Result<(), TreasuryError> {
            if self.blocked.as_ref() == Some(to) {
                return Err(TreasuryError::Overflow(to.clone()));
            }
            self.book.transfer(from, to, amount)
        }
    }

    struct TestEnv {
        ledger: EscrowLedger<PropertyRegistry, BlockingTreasury>,
        custody: Address,
        seller: Address,
        buyer: Address,
        inspector: Address,
        lender: Address,
        property_id: PropertyId,
    }

    fn setup_with(settlement: SettlementPolicy) -> TestEnv {
        let custody = Address::new("escrow");
        let seller = Address::new("seller");
        let buyer = Address::new("buyer");
        let inspector = Address::new("inspector");
        let lender = Address::new("lender");

        let mut registry = PropertyRegistry::new();
        let property_id = registry
            .mint(&seller, "https://ipfs.io/ipfs/QmQVcpsjrA6cr1iJjZAodYwmPekYgbnXGo4DFubJiLc2EB/1.json")
            .unwrap();

        let mut treasury = BlockingTreasury::default();
        treasury.book.credit(&buyer, tokens(100)).unwrap();
        treasury.book.credit(&lender, tokens(100)).unwrap();

        let config = EscrowConfig::new(
            custody.clone(),
            seller.clone(),
            inspector.clone(),
            lender.clone(),
        )
        .unwrap()
        .with_settlement(settlement);

        TestEnv {
            ledger: EscrowLedger::new(config, registry, treasury),
            custody,
            seller,
            buyer,
            inspector,
            lender,
            property_id,
        }
    }

    fn setup() -> TestEnv {
        setup_with(SettlementPolicy::default())
    }

    /// Approve custody and list for 10 tokens with 5 earnest.
    fn list(t: &mut TestEnv) {
        t.ledger
            .registry_mut()
            .approve(&t.seller, &t.custody, t.property_id)
            .unwrap();
        t.ledger
            .list(&t.seller, t.property_id, &t.buyer, tokens(10), tokens(5))
            .unwrap();
    }

    /// Listing with earnest deposited, inspection passed and every approval in.
    fn ready_to_close(t: &mut TestEnv) {
        list(t);
        t.ledger
            .deposit_earnest(&t.buyer, t.property_id, tokens(5))
            .unwrap();
        t.ledger.pass_inspection(&t.inspector, t.property_id).unwrap();
        for approver in [t.seller.clone(), t.buyer.clone(), t.inspector.clone()] {
            t.ledger.approve_sale(&approver, t.property_id).unwrap();
        }
    }

    fn balance(t: &TestEnv, account: &Address) -> Amount {
        t.ledger.treasury().balance_of(account)
    }

    #[test]
    fn test_list_moves_token_into_custody() {
        let mut t = setup();
        list(&mut t);

        assert!(t.ledger.is_listed(t.property_id));
        assert_eq!(t.ledger.registry().owner_of(t.property_id).unwrap(), t.custody);
        assert_eq!(t.ledger.buyer(t.property_id), Some(&t.buyer));
        assert_eq!(t.ledger.purchase_price(t.property_id), tokens(10));
        assert_eq!(t.ledger.escrow_amount(t.property_id), tokens(5));
        assert!(!t.ledger.inspection_status(t.property_id));

        let events = t.ledger.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "listed");
        assert!(t.ledger.take_events().is_empty());
    }

    #[test]
    fn test_list_requires_seller() {
        let mut t = setup();
        let err = t
            .ledger
            .list(&t.buyer, t.property_id, &t.buyer, tokens(10), tokens(5))
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnauthorizedCaller { .. }));
    }

    #[test]
    fn test_list_rejects_escrow_above_price() {
        let mut t = setup();
        let err = t
            .ledger
            .list(&t.seller, t.property_id, &t.buyer, tokens(5), tokens(6))
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::InvalidEscrowAmount {
                purchase_price: tokens(5),
                escrow_amount: tokens(6),
            }
        );
        assert!(!t.ledger.is_listed(t.property_id));
        assert!(t.ledger.listing(t.property_id).is_none());
    }

    #[test]
    fn test_list_rejects_reserved_buyer() {
        let mut t = setup();
        for reserved in [t.lender.clone(), t.custody.clone(), t.inspector.clone()] {
            let err = t
                .ledger
                .list(&t.seller, t.property_id, &reserved, tokens(10), tokens(5))
                .unwrap_err();
            assert_eq!(err, LedgerError::InvalidBuyer(reserved));
        }
    }

    #[test]
    fn test_list_twice_rejected() {
        let mut t = setup();
        list(&mut t);
        let err = t
            .ledger
            .list(&t.seller, t.property_id, &t.buyer, tokens(10), tokens(5))
            .unwrap_err();
        assert_eq!(err, LedgerError::AlreadyListed(t.property_id));
    }

    #[test]
    fn test_list_without_registry_approval_leaves_no_record() {
        let mut t = setup();
        let err = t
            .ledger
            .list(&t.seller, t.property_id, &t.buyer, tokens(10), tokens(5))
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Registry(RegistryError::NotApproved { .. })
        ));
        assert!(t.ledger.listing(t.property_id).is_none());
        assert_eq!(t.ledger.registry().owner_of(t.property_id).unwrap(), t.seller);
        assert!(t.ledger.take_events().is_empty());
    }

    #[test]
    fn test_deposit_earnest_updates_balance() {
        let mut t = setup();
        list(&mut t);
        t.ledger
            .deposit_earnest(&t.buyer, t.property_id, tokens(5))
            .unwrap();

        assert_eq!(t.ledger.balance(), tokens(5));
        assert_eq!(t.ledger.escrow_balance(t.property_id), tokens(5));
        assert_eq!(balance(&t, &t.buyer), tokens(95));
    }

    #[test]
    fn test_deposit_from_non_buyer_rejected() {
        let mut t = setup();
        list(&mut t);
        let err = t
            .ledger
            .deposit_earnest(&t.lender, t.property_id, tokens(5))
            .unwrap_err();

        assert!(matches!(err, LedgerError::UnauthorizedCaller { .. }));
        assert_eq!(t.ledger.balance(), 0);
    }

    #[test]
    fn test_deposit_below_required_rejected() {
        let mut t = setup();
        list(&mut t);
        let err = t
            .ledger
            .deposit_earnest(&t.buyer, t.property_id, tokens(4))
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::EarnestBelowRequired {
                required: tokens(5),
                offered: tokens(4),
            }
        );

        assert_eq!(
            t.ledger.deposit_earnest(&t.buyer, t.property_id, 0),
            Err(LedgerError::InvalidAmount)
        );
    }

    #[test]
    fn test_deposit_without_funds_rolls_back() {
        let mut t = setup();
        list(&mut t);
        let err = t
            .ledger
            .deposit_earnest(&t.buyer, t.property_id, tokens(500))
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Treasury(TreasuryError::InsufficientFunds { .. })
        ));
        assert_eq!(t.ledger.escrow_balance(t.property_id), 0);
        assert_eq!(t.ledger.listing(t.property_id).unwrap().earnest_deposited, 0);
    }

    #[test]
    fn test_only_inspector_updates_inspection() {
        let mut t = setup();
        list(&mut t);

        let err = t
            .ledger
            .update_inspection_status(&t.seller, t.property_id, true)
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnauthorizedCaller { .. }));

        t.ledger
            .update_inspection_status(&t.inspector, t.property_id, true)
            .unwrap();
        assert!(t.ledger.inspection_status(t.property_id));
        t.ledger
            .update_inspection_status(&t.inspector, t.property_id, false)
            .unwrap();
        assert!(!t.ledger.inspection_status(t.property_id));
    }

    #[test]
    fn test_approve_sale_is_idempotent() {
        let mut t = setup();
        list(&mut t);
        t.ledger.take_events();

        t.ledger.approve_sale(&t.buyer, t.property_id).unwrap();
        t.ledger.approve_sale(&t.buyer, t.property_id).unwrap();

        assert!(t.ledger.approval(t.property_id, &t.buyer));
        assert_eq!(t.ledger.take_events().len(), 1);
        assert_eq!(
            t.ledger.pending_approvals(t.property_id),
            vec![Role::Seller, Role::Inspector]
        );
    }

    #[test]
    fn test_lender_cannot_approve() {
        let mut t = setup();
        list(&mut t);
        let err = t.ledger.approve_sale(&t.lender, t.property_id).unwrap_err();
        assert!(matches!(err, LedgerError::UnauthorizedCaller { .. }));
        assert!(!t.ledger.approval(t.property_id, &t.lender));
    }

    #[test]
    fn test_finalize_precondition_order() {
        let mut t = setup();
        assert_eq!(
            t.ledger.finalize_sale(&t.seller, t.property_id),
            Err(LedgerError::NotListed(t.property_id))
        );

        list(&mut t);
        assert_eq!(
            t.ledger.finalize_sale(&t.seller, t.property_id),
            Err(LedgerError::InspectionNotPassed(t.property_id))
        );

        t.ledger.pass_inspection(&t.inspector, t.property_id).unwrap();
        t.ledger.approve_sale(&t.seller, t.property_id).unwrap();
        assert_eq!(
            t.ledger.finalize_sale(&t.seller, t.property_id),
            Err(LedgerError::MissingApprovals {
                property_id: t.property_id,
                missing: vec![Role::Buyer, Role::Inspector],
            })
        );

        t.ledger.approve_sale(&t.buyer, t.property_id).unwrap();
        t.ledger.approve_sale(&t.inspector, t.property_id).unwrap();
        assert_eq!(
            t.ledger.finalize_sale(&t.seller, t.property_id),
            Err(LedgerError::InsufficientEscrowBalance {
                property_id: t.property_id,
                required: tokens(10),
                available: 0,
            })
        );
    }

    #[test]
    fn test_finalize_settles_sale() {
        let mut t = setup();
        ready_to_close(&mut t);
        t.ledger
            .fund_purchase(&t.lender, t.property_id, tokens(5))
            .unwrap();
        assert_eq!(t.ledger.balance(), tokens(10));

        t.ledger.finalize_sale(&t.seller, t.property_id).unwrap();

        assert_eq!(t.ledger.balance(), 0);
        assert_eq!(balance(&t, &t.seller), tokens(10));
        assert_eq!(t.ledger.registry().owner_of(t.property_id).unwrap(), t.buyer);
        assert!(!t.ledger.is_listed(t.property_id));

        let listing = t.ledger.listing(t.property_id).unwrap();
        assert_eq!(listing.status, ListingStatus::Finalized);
        assert!(listing.closed_at.is_some());
        assert_eq!(listing.escrow_balance, 0);
    }

    #[test]
    fn test_finalized_listing_rejects_mutations() {
        let mut t = setup();
        ready_to_close(&mut t);
        t.ledger
            .fund_purchase(&t.lender, t.property_id, tokens(5))
            .unwrap();
        t.ledger.finalize_sale(&t.seller, t.property_id).unwrap();

        let not_listed = Err(LedgerError::NotListed(t.property_id));
        assert_eq!(t.ledger.deposit_earnest(&t.buyer, t.property_id, tokens(5)), not_listed);
        assert_eq!(t.ledger.fund_purchase(&t.lender, t.property_id, tokens(1)), not_listed);
        assert_eq!(t.ledger.pass_inspection(&t.inspector, t.property_id), not_listed);
        assert_eq!(t.ledger.approve_sale(&t.buyer, t.property_id), not_listed);
        assert_eq!(t.ledger.finalize_sale(&t.seller, t.property_id), not_listed);
        assert_eq!(t.ledger.cancel_sale(&t.seller, t.property_id), not_listed);
    }

    #[test]
    fn test_excess_paid_to_seller_by_default() {
        let mut t = setup();
        ready_to_close(&mut t);
        t.ledger
            .fund_purchase(&t.lender, t.property_id, tokens(8))
            .unwrap();

        t.ledger.finalize_sale(&t.seller, t.property_id).unwrap();
        assert_eq!(balance(&t, &t.seller), tokens(13));
        assert_eq!(t.ledger.balance(), 0);
    }

    #[test]
    fn test_excess_returned_to_contributors() {
        let mut t = setup_with(SettlementPolicy {
            excess: ExcessPolicy::ReturnToContributors,
            ..SettlementPolicy::default()
        });
        ready_to_close(&mut t);
        t.ledger
            .fund_purchase(&t.lender, t.property_id, tokens(2))
            .unwrap();
        t.ledger
            .deposit_earnest(&t.buyer, t.property_id, tokens(7))
            .unwrap();

        // balance 14: price 10, excess 4 of which 2 were lent
        t.ledger.finalize_sale(&t.seller, t.property_id).unwrap();
        assert_eq!(balance(&t, &t.seller), tokens(10));
        assert_eq!(balance(&t, &t.lender), tokens(100));
        assert_eq!(balance(&t, &t.buyer), tokens(100 - 12 + 2));
        assert_eq!(t.ledger.balance(), 0);
    }

    #[test]
    fn test_failed_payout_restores_state() {
        let mut t = setup_with(SettlementPolicy {
            excess: ExcessPolicy::ReturnToContributors,
            ..SettlementPolicy::default()
        });
        ready_to_close(&mut t);
        t.ledger
            .fund_purchase(&t.lender, t.property_id, tokens(2))
            .unwrap();
        t.ledger
            .deposit_earnest(&t.buyer, t.property_id, tokens(6))
            .unwrap();
        t.ledger.take_events();
        t.ledger.treasury_mut().blocked = Some(t.buyer.clone());

        let err = t.ledger.finalize_sale(&t.seller, t.property_id).unwrap_err();
        assert!(matches!(err, LedgerError::Treasury(_)));

        // seller and lender were paid before the buyer refund failed
        assert_eq!(t.ledger.balance(), tokens(13));
        assert_eq!(balance(&t, &t.seller), 0);
        assert_eq!(balance(&t, &t.lender), tokens(98));
        assert!(t.ledger.is_listed(t.property_id));
        assert_eq!(t.ledger.escrow_balance(t.property_id), tokens(13));
        assert!(t.ledger.pending_approvals(t.property_id).is_empty());
        assert_eq!(t.ledger.registry().owner_of(t.property_id).unwrap(), t.custody);
        assert!(t.ledger.take_events().is_empty());
    }

    #[test]
    fn test_cancel_before_inspection_refunds_buyer() {
        let mut t = setup();
        list(&mut t);
        t.ledger
            .deposit_earnest(&t.buyer, t.property_id, tokens(5))
            .unwrap();

        t.ledger.cancel_sale(&t.buyer, t.property_id).unwrap();

        assert_eq!(t.ledger.balance(), 0);
        assert_eq!(balance(&t, &t.buyer), tokens(100));
        assert_eq!(t.ledger.registry().owner_of(t.property_id).unwrap(), t.seller);
        assert_eq!(
            t.ledger.listing(t.property_id).unwrap().status,
            ListingStatus::Cancelled
        );
    }

    #[test]
    fn test_cancel_after_inspection_forfeits_earnest() {
        let mut t = setup();
        list(&mut t);
        t.ledger
            .deposit_earnest(&t.buyer, t.property_id, tokens(5))
            .unwrap();
        t.ledger
            .fund_purchase(&t.lender, t.property_id, tokens(3))
            .unwrap();
        t.ledger.pass_inspection(&t.inspector, t.property_id).unwrap();

        t.ledger.cancel_sale(&t.seller, t.property_id).unwrap();

        assert_eq!(balance(&t, &t.seller), tokens(5));
        assert_eq!(balance(&t, &t.buyer), tokens(95));
        assert_eq!(balance(&t, &t.lender), tokens(100));
        assert_eq!(t.ledger.balance(), 0);
    }

    #[test]
    fn test_cancel_after_inspection_with_refund_policy() {
        let mut t = setup_with(SettlementPolicy {
            cancellation: CancellationPolicy::RefundBuyer,
            ..SettlementPolicy::default()
        });
        list(&mut t);
        t.ledger
            .deposit_earnest(&t.buyer, t.property_id, tokens(5))
            .unwrap();
        t.ledger.pass_inspection(&t.inspector, t.property_id).unwrap();

        t.ledger.cancel_sale(&t.buyer, t.property_id).unwrap();
        assert_eq!(balance(&t, &t.buyer), tokens(100));
        assert_eq!(balance(&t, &t.seller), 0);
    }

    #[test]
    fn test_cancel_by_outsider_rejected() {
        let mut t = setup();
        list(&mut t);
        let err = t
            .ledger
            .cancel_sale(&t.inspector, t.property_id)
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnauthorizedCaller { .. }));
        assert!(t.ledger.is_listed(t.property_id));
    }

    #[test]
    fn test_relist_after_cancel_starts_fresh() {
        let mut t = setup();
        list(&mut t);
        t.ledger.approve_sale(&t.seller, t.property_id).unwrap();
        t.ledger.pass_inspection(&t.inspector, t.property_id).unwrap();
        t.ledger.cancel_sale(&t.seller, t.property_id).unwrap();

        list(&mut t);
        assert!(t.ledger.is_listed(t.property_id));
        assert!(!t.ledger.approval(t.property_id, &t.seller));
        assert!(!t.ledger.inspection_status(t.property_id));
        assert_eq!(t.ledger.escrow_balance(t.property_id), 0);
    }

    #[test]
    fn test_absent_listing_reads_default() {
        let t = setup();
        let unknown = PropertyId::new(42);
        assert!(!t.ledger.is_listed(unknown));
        assert_eq!(t.ledger.buyer(unknown), None);
        assert_eq!(t.ledger.purchase_price(unknown), 0);
        assert_eq!(t.ledger.escrow_amount(unknown), 0);
        assert_eq!(t.ledger.escrow_balance(unknown), 0);
        assert!(!t.ledger.inspection_status(unknown));
        assert!(!t.ledger.approval(unknown, &t.seller));
        assert!(t.ledger.pending_approvals(unknown).is_empty());
    }
}
