//! Snapshot of monitored markets and their quotes.
//!
//! Resolution is edge-triggered: the first transition out of `Unresolved` is
//! recorded and any later resolution change for the same market is ignored.

use std::collections::HashMap;

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::types::{Market, Quote, Resolution};

/// What an upsert did to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogUpdate {
    /// A new market was added.
    Inserted,
    /// An existing market was refreshed.
    Updated,
    /// The market transitioned to a resolved state.
    Resolved(Resolution),
}

/// Markets and latest quotes, owned by the engine.
#[derive(Debug, Clone, Default)]
pub struct MarketCatalog {
    markets: HashMap<String, Market>,
    quotes: HashMap<String, Quote>,
}

impl MarketCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a market descriptor.
    ///
    /// A captured reference price survives updates that do not carry one, and
    /// resolution never changes once set.
    pub fn upsert(&mut self, mut market: Market) -> CatalogUpdate {
        let Some(existing) = self.markets.get_mut(&market.id) else {
            let update = if market.resolution.is_resolved() {
                CatalogUpdate::Resolved(market.resolution)
            } else {
                CatalogUpdate::Inserted
            };
            self.markets.insert(market.id.clone(), market);
            return update;
        };

        if let Some(reference) = existing.reference_price() {
            market.capture_reference(reference);
        }

        let previous = existing.resolution;
        if previous.is_resolved() {
            if market.resolution != previous {
                warn!(
                    market = %market.id,
                    previous = %previous,
                    incoming = %market.resolution,
                    "Ignoring resolution change on resolved market"
                );
            }
            market.resolution = previous;
            *existing = market;
            return CatalogUpdate::Updated;
        }

        let resolution = market.resolution;
        *existing = market;
        if resolution.is_resolved() {
            info!(market = %existing.id, resolution = %resolution, "Market resolved");
            CatalogUpdate::Resolved(resolution)
        } else {
            CatalogUpdate::Updated
        }
    }

    /// Mark a market resolved. Returns true only on the first transition.
    pub fn resolve(&mut self, market_id: &str, resolution: Resolution) -> bool {
        match self.markets.get_mut(market_id) {
            Some(market) if !market.resolution.is_resolved() && resolution.is_resolved() => {
                market.resolution = resolution;
                info!(market = %market_id, resolution = %resolution, "Market resolved");
                true
            }
            _ => false,
        }
    }

    /// Replace the latest quote for a market. Invalid quotes are ignored.
    pub fn set_quote(&mut self, market_id: &str, quote: Quote) -> bool {
        if !quote.is_valid() {
            warn!(market = %market_id, yes = %quote.yes, no = %quote.no, "Ignoring invalid quote");
            return false;
        }
        self.quotes.insert(market_id.to_string(), quote);
        true
    }

    /// Record the captured reference price of an up/down market.
    pub fn capture_reference(&mut self, market_id: &str, price: Decimal) -> bool {
        self.markets
            .get_mut(market_id)
            .is_some_and(|market| market.capture_reference(price))
    }

    /// Look up a market.
    pub fn get(&self, market_id: &str) -> Option<&Market> {
        self.markets.get(market_id)
    }

    /// Latest quote for a market.
    pub fn quote(&self, market_id: &str) -> Option<Quote> {
        self.quotes.get(market_id).copied()
    }

    /// All markets, in no particular order.
    pub fn markets(&self) -> impl Iterator<Item = &Market> {
        self.markets.values()
    }

    /// Number of tracked markets.
    pub fn len(&self) -> usize {
        self.markets.len()
    }

    /// Whether no markets are tracked.
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    /// Drop resolved or expired markets that no longer matter.
    pub fn prune(&mut self, now: OffsetDateTime, keep: impl Fn(&str) -> bool) -> usize {
        let before = self.markets.len();
        self.markets
            .retain(|id, market| keep(id) || !(market.resolution.is_resolved() || market.is_expired(now)));
        let markets = &self.markets;
        self.quotes.retain(|id, _| markets.contains_key(id));
        before - self.markets.len()
    }
}
