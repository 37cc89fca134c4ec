//! In-memory transactional object store
//!
//! Holds every object the engine mutates — assets, balances, statistics and
//! the four order kinds — plus the ordered `by_price` secondary indexes the
//! matchers walk. All maps are B-trees so iteration order is deterministic.
//!
//! Matching mutates the same indexes it walks, so the store never hands out
//! iterators: cursor queries (`first_*` / `next_*`) return owned keys and
//! callers re-query after every mutation that may have reordered the index.
//!
//! Transactionality is checkpoint-based: [`Store::begin`] captures the
//! object state, and [`Store::rollback`] restores it if the surrounding
//! operation fails. This is the in-memory equivalent of the undo journal a
//! persistent store would keep.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use types::prelude::*;

use crate::events::AppliedOperation;

#[derive(Debug, Clone, Default)]
struct StoreState {
    assets: BTreeMap<AssetId, AssetObject>,
    bitassets: BTreeMap<AssetId, BitassetData>,
    dynamic_data: BTreeMap<AssetId, AssetDynamicData>,
    statistics: BTreeMap<AccountId, AccountStatistics>,
    balances: BTreeMap<(AccountId, AssetId), i64>,

    limit_orders: BTreeMap<LimitOrderId, LimitOrder>,
    call_orders: BTreeMap<CallOrderId, CallOrder>,
    settlements: BTreeMap<SettlementId, ForceSettlement>,
    bids: BTreeMap<BidId, CollateralBid>,

    limit_index: BTreeSet<LimitOrderKey>,
    call_index: BTreeSet<CallOrderKey>,
    bid_index: BTreeSet<BidKey>,

    next_asset_id: u32,
    next_limit_id: u64,
    next_call_id: u64,
    next_settlement_id: u64,
    next_bid_id: u64,
}

/// Saved state for rollback. Dropping a checkpoint commits.
pub struct Checkpoint {
    state: StoreState,
    applied_len: usize,
}

/// The object store. See the module docs for the access contract.
#[derive(Debug, Default)]
pub struct Store {
    state: StoreState,
    applied: Vec<AppliedOperation>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Undo sessions ───────────────────────────────────────────────────

    pub fn begin(&self) -> Checkpoint {
        Checkpoint {
            state: self.state.clone(),
            applied_len: self.applied.len(),
        }
    }

    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.state = checkpoint.state;
        self.applied.truncate(checkpoint.applied_len);
    }

    // ── Applied-operation stream ────────────────────────────────────────

    pub fn push_applied(&mut self, op: AppliedOperation) {
        self.applied.push(op);
    }

    pub fn applied(&self) -> &[AppliedOperation] {
        &self.applied
    }

    pub fn drain_applied(&mut self) -> Vec<AppliedOperation> {
        std::mem::take(&mut self.applied)
    }

    // ── Assets ──────────────────────────────────────────────────────────

    pub fn create_asset(
        &mut self,
        symbol: impl Into<String>,
        issuer: AccountId,
        options: AssetOptions,
    ) -> AssetId {
        let id = AssetId::new(self.state.next_asset_id);
        self.state.next_asset_id += 1;
        self.state.assets.insert(
            id,
            AssetObject { id, symbol: symbol.into(), issuer, options },
        );
        self.state.dynamic_data.insert(id, AssetDynamicData::default());
        id
    }

    pub fn attach_bitasset_data(&mut self, data: BitassetData) {
        self.state.bitassets.insert(data.asset_id, data);
    }

    pub fn asset(&self, id: AssetId) -> Result<&AssetObject, MarketError> {
        self.state
            .assets
            .get(&id)
            .ok_or_else(|| MarketError::not_found("asset", id.value() as u64))
    }

    pub fn is_market_issued(&self, id: AssetId) -> bool {
        self.state.bitassets.contains_key(&id)
    }

    pub fn bitasset(&self, id: AssetId) -> Option<&BitassetData> {
        self.state.bitassets.get(&id)
    }

    pub fn modify_bitasset(
        &mut self,
        id: AssetId,
        f: impl FnOnce(&mut BitassetData),
    ) -> Result<(), MarketError> {
        let data = self
            .state
            .bitassets
            .get_mut(&id)
            .ok_or(MarketError::NotMarketIssued(id))?;
        f(data);
        Ok(())
    }

    pub fn dynamic_data(&self, id: AssetId) -> Result<&AssetDynamicData, MarketError> {
        self.state
            .dynamic_data
            .get(&id)
            .ok_or_else(|| MarketError::not_found("asset", id.value() as u64))
    }

    pub fn modify_dynamic_data(
        &mut self,
        id: AssetId,
        f: impl FnOnce(&mut AssetDynamicData),
    ) -> Result<(), MarketError> {
        let data = self
            .state
            .dynamic_data
            .get_mut(&id)
            .ok_or_else(|| MarketError::not_found("asset", id.value() as u64))?;
        f(data);
        Ok(())
    }

    // ── Balances ────────────────────────────────────────────────────────

    pub fn balance(&self, account: AccountId, asset: AssetId) -> i64 {
        self.state.balances.get(&(account, asset)).copied().unwrap_or(0)
    }

    /// Signed balance adjustment. Fails the enclosing operation rather than
    /// drive a balance negative.
    pub fn adjust_balance(
        &mut self,
        account: AccountId,
        delta: AssetAmount,
    ) -> Result<(), MarketError> {
        if delta.amount == 0 {
            return Ok(());
        }
        let entry = self.state.balances.entry((account, delta.asset_id)).or_insert(0);
        let updated = *entry + delta.amount;
        if updated < 0 {
            return Err(MarketError::InsufficientBalance {
                account,
                asset: delta.asset_id,
                required: -delta.amount,
                available: *entry,
            });
        }
        *entry = updated;
        Ok(())
    }

    /// Total of all account balances in one asset (for invariant checks).
    pub fn total_balance_of(&self, asset: AssetId) -> i64 {
        self.state
            .balances
            .iter()
            .filter(|((_, a), _)| *a == asset)
            .map(|(_, amount)| *amount)
            .sum()
    }

    // ── Account statistics ──────────────────────────────────────────────

    pub fn statistics(&self, account: AccountId) -> Option<&AccountStatistics> {
        self.state.statistics.get(&account)
    }

    pub fn modify_statistics(
        &mut self,
        account: AccountId,
        f: impl FnOnce(&mut AccountStatistics),
    ) {
        let stats = self
            .state
            .statistics
            .entry(account)
            .or_insert_with(|| AccountStatistics::new(account));
        f(stats);
    }

    // ── Limit orders ────────────────────────────────────────────────────

    pub fn create_limit_order(
        &mut self,
        seller: AccountId,
        for_sale: i64,
        sell_price: Price,
        deferred_fee: i64,
        deferred_paid_fee: AssetAmount,
    ) -> LimitOrderId {
        let id = LimitOrderId::new(self.state.next_limit_id);
        self.state.next_limit_id += 1;
        let order = LimitOrder {
            id,
            seller,
            for_sale,
            sell_price,
            deferred_fee,
            deferred_paid_fee,
        };
        self.state.limit_index.insert(LimitOrderKey::new(sell_price, id));
        self.state.limit_orders.insert(id, order);
        id
    }

    pub fn limit_order(&self, id: LimitOrderId) -> Result<&LimitOrder, MarketError> {
        self.state
            .limit_orders
            .get(&id)
            .ok_or_else(|| MarketError::not_found("limit order", id.value()))
    }

    pub fn find_limit_order(&self, id: LimitOrderId) -> Option<&LimitOrder> {
        self.state.limit_orders.get(&id)
    }

    /// The sell price is part of the index key and must not change here.
    pub fn modify_limit_order(
        &mut self,
        id: LimitOrderId,
        f: impl FnOnce(&mut LimitOrder),
    ) -> Result<(), MarketError> {
        let order = self
            .state
            .limit_orders
            .get_mut(&id)
            .ok_or_else(|| MarketError::not_found("limit order", id.value()))?;
        let price_before = order.sell_price;
        f(order);
        debug_assert_eq!(price_before, order.sell_price, "sell price is immutable");
        Ok(())
    }

    pub fn remove_limit_order(&mut self, id: LimitOrderId) -> Result<LimitOrder, MarketError> {
        let order = self
            .state
            .limit_orders
            .remove(&id)
            .ok_or_else(|| MarketError::not_found("limit order", id.value()))?;
        self.state
            .limit_index
            .remove(&LimitOrderKey::new(order.sell_price, id));
        Ok(order)
    }

    /// The entry just before `key` in the book — a same-market predecessor
    /// means `key`'s order is not at the front of its side.
    pub fn limit_key_before(&self, key: &LimitOrderKey) -> Option<LimitOrderKey> {
        self.state
            .limit_index
            .range((Bound::Unbounded, Bound::Excluded(*key)))
            .next_back()
            .copied()
    }

    pub fn first_limit_key(
        &self,
        lower: &LimitOrderKey,
        upper: &LimitOrderKey,
    ) -> Option<LimitOrderKey> {
        self.state
            .limit_index
            .range((Bound::Included(*lower), Bound::Included(*upper)))
            .next()
            .copied()
    }

    pub fn next_limit_key(
        &self,
        prev: &LimitOrderKey,
        upper: &LimitOrderKey,
    ) -> Option<LimitOrderKey> {
        self.state
            .limit_index
            .range((Bound::Excluded(*prev), Bound::Included(*upper)))
            .next()
            .copied()
    }

    pub fn limit_orders(&self) -> impl Iterator<Item = &LimitOrder> {
        self.state.limit_orders.values()
    }

    // ── Call orders ─────────────────────────────────────────────────────

    pub fn create_call_order(
        &mut self,
        borrower: AccountId,
        collateral: AssetAmount,
        debt: AssetAmount,
        call_price: Price,
    ) -> CallOrderId {
        let id = CallOrderId::new(self.state.next_call_id);
        self.state.next_call_id += 1;
        self.state.call_index.insert(CallOrderKey::new(call_price, id));
        self.state
            .call_orders
            .insert(id, CallOrder { id, borrower, collateral, debt, call_price });
        id
    }

    pub fn call_order(&self, id: CallOrderId) -> Result<&CallOrder, MarketError> {
        self.state
            .call_orders
            .get(&id)
            .ok_or_else(|| MarketError::not_found("call order", id.value()))
    }

    pub fn find_call_order(&self, id: CallOrderId) -> Option<&CallOrder> {
        self.state.call_orders.get(&id)
    }

    /// Re-inserts the index key afterwards: fills recompute `call_price`.
    pub fn modify_call_order(
        &mut self,
        id: CallOrderId,
        f: impl FnOnce(&mut CallOrder),
    ) -> Result<(), MarketError> {
        let order = self
            .state
            .call_orders
            .get_mut(&id)
            .ok_or_else(|| MarketError::not_found("call order", id.value()))?;
        let key_before = CallOrderKey::new(order.call_price, id);
        f(order);
        let key_after = CallOrderKey::new(order.call_price, id);
        if key_before != key_after {
            self.state.call_index.remove(&key_before);
            self.state.call_index.insert(key_after);
        }
        Ok(())
    }

    pub fn remove_call_order(&mut self, id: CallOrderId) -> Result<CallOrder, MarketError> {
        let order = self
            .state
            .call_orders
            .remove(&id)
            .ok_or_else(|| MarketError::not_found("call order", id.value()))?;
        self.state
            .call_index
            .remove(&CallOrderKey::new(order.call_price, id));
        Ok(order)
    }

    /// The least-collateralized call order in the given market, if any.
    pub fn least_collateralized_call(
        &self,
        collateral_asset: AssetId,
        debt_asset: AssetId,
    ) -> Option<CallOrderKey> {
        let probe = CallOrderKey::new(
            Price::min_for(collateral_asset, debt_asset),
            CallOrderId::new(0),
        );
        self.state
            .call_index
            .range((Bound::Included(probe), Bound::Unbounded))
            .next()
            .filter(|key| key.call_price.pair() == (collateral_asset, debt_asset))
            .copied()
    }

    pub fn find_call_order_by_borrower(
        &self,
        borrower: AccountId,
        debt_asset: AssetId,
    ) -> Option<CallOrderId> {
        self.state
            .call_orders
            .values()
            .find(|order| order.borrower == borrower && order.debt_asset_id() == debt_asset)
            .map(|order| order.id)
    }

    pub fn call_orders(&self) -> impl Iterator<Item = &CallOrder> {
        self.state.call_orders.values()
    }

    // ── Forced settlements ──────────────────────────────────────────────

    pub fn create_settlement(&mut self, owner: AccountId, balance: AssetAmount) -> SettlementId {
        let id = SettlementId::new(self.state.next_settlement_id);
        self.state.next_settlement_id += 1;
        self.state
            .settlements
            .insert(id, ForceSettlement { id, owner, balance });
        id
    }

    pub fn settlement(&self, id: SettlementId) -> Result<&ForceSettlement, MarketError> {
        self.state
            .settlements
            .get(&id)
            .ok_or_else(|| MarketError::not_found("settlement", id.value()))
    }

    pub fn modify_settlement(
        &mut self,
        id: SettlementId,
        f: impl FnOnce(&mut ForceSettlement),
    ) -> Result<(), MarketError> {
        let settlement = self
            .state
            .settlements
            .get_mut(&id)
            .ok_or_else(|| MarketError::not_found("settlement", id.value()))?;
        f(settlement);
        Ok(())
    }

    pub fn remove_settlement(&mut self, id: SettlementId) -> Result<ForceSettlement, MarketError> {
        self.state
            .settlements
            .remove(&id)
            .ok_or_else(|| MarketError::not_found("settlement", id.value()))
    }

    pub fn settlements(&self) -> impl Iterator<Item = &ForceSettlement> {
        self.state.settlements.values()
    }

    // ── Collateral bids ─────────────────────────────────────────────────

    pub fn create_bid(&mut self, bidder: AccountId, inv_swan_price: Price) -> BidId {
        let id = BidId::new(self.state.next_bid_id);
        self.state.next_bid_id += 1;
        let bid = CollateralBid { id, bidder, inv_swan_price };
        self.state
            .bid_index
            .insert(BidKey::new(bid.debt_asset_id(), inv_swan_price, id));
        self.state.bids.insert(id, bid);
        id
    }

    pub fn bid(&self, id: BidId) -> Result<&CollateralBid, MarketError> {
        self.state
            .bids
            .get(&id)
            .ok_or_else(|| MarketError::not_found("collateral bid", id.value()))
    }

    pub fn remove_bid(&mut self, id: BidId) -> Result<CollateralBid, MarketError> {
        let bid = self
            .state
            .bids
            .remove(&id)
            .ok_or_else(|| MarketError::not_found("collateral bid", id.value()))?;
        self.state
            .bid_index
            .remove(&BidKey::new(bid.debt_asset_id(), bid.inv_swan_price, id));
        Ok(bid)
    }

    pub fn find_bid_by_bidder(&self, debt_asset: AssetId, bidder: AccountId) -> Option<BidId> {
        self.state
            .bids
            .values()
            .find(|bid| bid.debt_asset_id() == debt_asset && bid.bidder == bidder)
            .map(|bid| bid.id)
    }

    /// All bids for one settled asset, most generous first.
    pub fn bid_ids_for(&self, debt_asset: AssetId, backing_asset: AssetId) -> Vec<BidId> {
        let probe = BidKey::new(
            debt_asset,
            Price::max_for(backing_asset, debt_asset),
            BidId::new(0),
        );
        self.state
            .bid_index
            .range((Bound::Included(probe), Bound::Unbounded))
            .take_while(|key| key.debt_asset == debt_asset)
            .map(|key| key.id)
            .collect()
    }

    pub fn bids(&self) -> impl Iterator<Item = &CollateralBid> {
        self.state.bids.values()
    }
}
