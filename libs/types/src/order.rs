//! Order object model
//!
//! Four order kinds live in the store: limit orders, call orders (open short
//! positions), forced-settlement orders, and collateral bids. Each kind also
//! defines the composite key its `by_price` secondary index sorts on.

use crate::errors::ArithmeticError;
use crate::ids::{AccountId, AssetId, BidId, CallOrderId, LimitOrderId, SettlementId};
use crate::numeric::AssetAmount;
use crate::price::Price;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ── Limit orders ─────────────────────────────────────────────────────────

/// An offer to sell `for_sale` of the sell asset at `sell_price`.
///
/// Invariant: `for_sale > 0` for every order in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub id: LimitOrderId,
    pub seller: AccountId,
    /// Remaining shares of `sell_price.base.asset_id` offered.
    pub for_sale: i64,
    /// Quoted sell asset / receive asset.
    pub sell_price: Price,
    /// Reserve-equivalent submission fee travelling with the order.
    pub deferred_fee: i64,
    /// The fee as originally paid when it was paid in a non-reserve asset;
    /// zero amount means reserve-only bookkeeping applies.
    pub deferred_paid_fee: AssetAmount,
}

impl LimitOrder {
    pub fn sell_asset_id(&self) -> AssetId {
        self.sell_price.base.asset_id
    }

    pub fn receive_asset_id(&self) -> AssetId {
        self.sell_price.quote.asset_id
    }

    pub fn amount_for_sale(&self) -> AssetAmount {
        AssetAmount::new(self.for_sale, self.sell_asset_id())
    }

    /// What the remaining sale would bring in at the order's own price.
    /// Zero here means the order is too small to execute and must be culled.
    pub fn amount_to_receive(&self) -> Result<AssetAmount, ArithmeticError> {
        self.amount_for_sale().times(&self.sell_price)
    }
}

/// `by_price` index key for limit orders: grouped by market pair,
/// best (highest) price first, then oldest order first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitOrderKey {
    pub price: Price,
    pub id: LimitOrderId,
}

impl LimitOrderKey {
    pub fn new(price: Price, id: LimitOrderId) -> Self {
        Self { price, id }
    }
}

impl Ord for LimitOrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.price
            .pair()
            .cmp(&other.price.pair())
            .then_with(|| other.price.cmp(&self.price)) // descending price
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for LimitOrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ── Call orders ──────────────────────────────────────────────────────────

/// An open short position: `debt` of a market-issued asset owed against
/// posted `collateral` of its backing asset.
///
/// Invariant: `debt > 0` and `collateral > 0` for every order in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOrder {
    pub id: CallOrderId,
    pub borrower: AccountId,
    pub collateral: AssetAmount,
    pub debt: AssetAmount,
    /// `Price::call_price(debt, collateral, mcr)`, maintained on every fill.
    pub call_price: Price,
}

impl CallOrder {
    pub fn debt_asset_id(&self) -> AssetId {
        self.debt.asset_id
    }

    pub fn collateral_asset_id(&self) -> AssetId {
        self.collateral.asset_id
    }
}

/// `by_price` index key for call orders: grouped by market pair,
/// least-collateralized position first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOrderKey {
    pub call_price: Price,
    pub id: CallOrderId,
}

impl CallOrderKey {
    pub fn new(call_price: Price, id: CallOrderId) -> Self {
        Self { call_price, id }
    }
}

impl Ord for CallOrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.call_price
            .cmp(&other.call_price)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for CallOrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ── Forced settlements ───────────────────────────────────────────────────

/// A holder's claim to settle `balance` of a market-issued asset at the
/// feed price after the settlement delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceSettlement {
    pub id: SettlementId,
    pub owner: AccountId,
    pub balance: AssetAmount,
}

// ── Collateral bids ──────────────────────────────────────────────────────

/// An offer to inject collateral into a globally settled market-issued
/// asset in exchange for taking over part of its debt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralBid {
    pub id: BidId,
    pub bidder: AccountId,
    /// Additional collateral offered / debt covered.
    pub inv_swan_price: Price,
}

impl CollateralBid {
    pub fn additional_collateral(&self) -> AssetAmount {
        self.inv_swan_price.base
    }

    pub fn debt_covered(&self) -> AssetAmount {
        self.inv_swan_price.quote
    }

    pub fn debt_asset_id(&self) -> AssetId {
        self.inv_swan_price.quote.asset_id
    }
}

/// `by_price` index key for collateral bids: grouped by debt asset, most
/// generous bid (highest collateral per debt) first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidKey {
    pub debt_asset: AssetId,
    pub price: Price,
    pub id: BidId,
}

impl BidKey {
    pub fn new(debt_asset: AssetId, price: Price, id: BidId) -> Self {
        Self { debt_asset, price, id }
    }
}

impl Ord for BidKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.debt_asset
            .cmp(&other.debt_asset)
            .then_with(|| self.price.pair().cmp(&other.price.pair()))
            .then_with(|| other.price.cmp(&self.price)) // descending price
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for BidKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(base: i64, base_id: u32, quote: i64, quote_id: u32) -> Price {
        AssetAmount::new(base, AssetId::new(base_id))
            / AssetAmount::new(quote, AssetId::new(quote_id))
    }

    fn limit(id: u64, base: i64, quote: i64) -> LimitOrder {
        LimitOrder {
            id: LimitOrderId::new(id),
            seller: AccountId::new(1),
            for_sale: base,
            sell_price: price(base, 1, quote, 0),
            deferred_fee: 0,
            deferred_paid_fee: AssetAmount::zero(AssetId::RESERVE),
        }
    }

    #[test]
    fn test_limit_key_orders_best_price_first() {
        let expensive = LimitOrderKey::new(price(1, 1, 10, 0), LimitOrderId::new(1));
        let cheap = LimitOrderKey::new(price(1, 1, 5, 0), LimitOrderId::new(2));
        // asking 5 per share beats asking 10, so it walks first
        assert!(cheap < expensive);
    }

    #[test]
    fn test_limit_key_breaks_ties_by_id() {
        let older = LimitOrderKey::new(price(1, 1, 10, 0), LimitOrderId::new(1));
        let newer = LimitOrderKey::new(price(2, 1, 20, 0), LimitOrderId::new(2));
        assert!(older < newer);
    }

    #[test]
    fn test_call_key_orders_least_collateralized_first() {
        let thin = Price::call_price(
            AssetAmount::new(100, AssetId::new(1)),
            AssetAmount::new(150, AssetId::RESERVE),
            1750,
        );
        let fat = Price::call_price(
            AssetAmount::new(100, AssetId::new(1)),
            AssetAmount::new(500, AssetId::RESERVE),
            1750,
        );
        let a = CallOrderKey::new(thin, CallOrderId::new(2));
        let b = CallOrderKey::new(fat, CallOrderId::new(1));
        assert!(a < b);
    }

    #[test]
    fn test_bid_key_orders_best_bid_first() {
        let generous = BidKey::new(AssetId::new(1), price(2000, 0, 200, 1), BidId::new(2));
        let stingy = BidKey::new(AssetId::new(1), price(1000, 0, 200, 1), BidId::new(1));
        assert!(generous < stingy);
    }

    #[test]
    fn test_amount_to_receive_detects_dust() {
        // 9 shares at 1000/1: 9 * 1 / 1000 truncates to zero
        let order = limit(1, 1000, 1);
        let mut dust = order.clone();
        dust.for_sale = 9;
        assert_eq!(dust.amount_to_receive().unwrap().amount, 0);
        assert!(order.amount_to_receive().unwrap().amount > 0);
    }
}
