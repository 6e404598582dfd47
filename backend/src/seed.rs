//! Demo marketplace seeding
//!
//! Mints a handful of property tokens to the seller, puts them in escrow for
//! a demo buyer and funds the buyer and lender so a full sale can be walked
//! through without any setup.

use anyhow::Context;
use homeward_ledger::{
    tokens, Address, Amount, AssetRegistry, MarketplaceLedger, PropertyId,
};

const METADATA_BASE_URI: &str =
    "https://ipfs.io/ipfs/QmQVcpsjrA6cr1iJjZAodYwmPekYgbnXGo4DFubJiLc2EB";

/// (purchase price, escrow amount) in whole tokens
const DEMO_LISTINGS: [(u64, u64); 3] = [(20, 15), (15, 10), (10, 5)];

pub fn seed_demo(
    ledger: &mut MarketplaceLedger,
    buyer: &Address,
    initial_balance: Amount,
) -> anyhow::Result<Vec<PropertyId>> {
    let seller = ledger.seller().clone();
    let custody = ledger.custody().clone();
    let lender = ledger.lender().clone();
    let mut listed = Vec::with_capacity(DEMO_LISTINGS.len());

    for (index, (price, escrow)) in DEMO_LISTINGS.into_iter().enumerate() {
        let token_uri = format!("{}/{}.json", METADATA_BASE_URI, index + 1);
        let property_id = ledger
            .registry_mut()
            .mint(&seller, token_uri)
            .context("Failed to mint demo property")?;

        ledger
            .registry_mut()
            .approve(&seller, &custody, property_id)
            .with_context(|| format!("Failed to approve custody for property {}", property_id))?;

        ledger
            .list(&seller, property_id, buyer, tokens(price), tokens(escrow))
            .with_context(|| format!("Failed to list demo property {}", property_id))?;

        listed.push(property_id);
    }

    for account in [buyer, &lender] {
        ledger
            .treasury_mut()
            .credit(account, initial_balance)
            .with_context(|| format!("Failed to fund demo account {}", account))?;
    }

    // Nobody is subscribed yet
    ledger.take_events();

    tracing::info!(
        properties = listed.len(),
        buyer = %buyer,
        "Seeded demo marketplace"
    );
    Ok(listed)
}
