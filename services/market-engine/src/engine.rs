//! Engine orchestrator
//!
//! [`MarketEngine`] owns the object store and exposes the operation surface:
//! asset registration, borrowing against collateral, limit-order placement
//! and cancellation, forced settlement, feed publication, and the
//! settlement-state transitions implemented in the sibling modules.
//!
//! Every public operation runs inside an undo session: on error the store
//! is restored to the pre-call state before the error propagates.

use tracing::warn;
use types::prelude::*;

use crate::events::{AppliedOperation, AssetSettleCancelRecord, LimitOrderCancelRecord};
use crate::store::Store;

/// Engine configuration.
///
/// Historical behavior toggles are named flags resolved once, never
/// timestamp comparisons in hot paths. Defaults select current behavior.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub fee_schedule: FeeSchedule,
    /// Whether removing a dust order charges the cancellation fee. The
    /// legacy variant waived it for engine-initiated culls.
    pub charge_fee_on_cull: bool,
    /// Reserve fees above this threshold enter cashback vesting instead of
    /// vesting immediately.
    pub cashback_vesting_threshold: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fee_schedule: FeeSchedule::default(),
            charge_fee_on_cull: true,
            cashback_vesting_threshold: 0,
        }
    }
}

/// Outcome of placing a limit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceOrderResult {
    pub order_id: LimitOrderId,
    /// The order was fully consumed (or culled) during matching and no
    /// longer exists.
    pub consumed: bool,
}

/// Outcome of a forced-settlement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Settlement order queued for execution after the settlement delay.
    Queued(SettlementId),
    /// The asset was globally settled; paid instantly from the fund.
    Settled(AssetAmount),
}

/// The market matching and collateral engine.
#[derive(Debug, Default)]
pub struct MarketEngine {
    store: Store,
    config: EngineConfig,
}

impl MarketEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { store: Store::new(), config }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs `f` inside an undo session, rolling back on error.
    pub(crate) fn transactional<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, MarketError>,
    ) -> Result<T, MarketError> {
        let checkpoint = self.store.begin();
        let result = f(self);
        if result.is_err() {
            self.store.rollback(checkpoint);
        }
        result
    }

    // ── Asset registry ──────────────────────────────────────────────────

    pub fn create_asset(
        &mut self,
        symbol: impl Into<String>,
        issuer: AccountId,
        options: AssetOptions,
    ) -> AssetId {
        self.store.create_asset(symbol, issuer, options)
    }

    /// Registers a market-issued asset backed by `backing_asset`.
    pub fn create_bitasset(
        &mut self,
        symbol: impl Into<String>,
        issuer: AccountId,
        options: AssetOptions,
        backing_asset: AssetId,
        is_prediction_market: bool,
    ) -> AssetId {
        let id = self.store.create_asset(symbol, issuer, options);
        self.store
            .attach_bitasset_data(BitassetData::new(id, backing_asset, is_prediction_market));
        id
    }

    /// Credits an account out of thin air — genesis distribution and test
    /// fixtures. Market-issued supply can only come from borrowing.
    pub fn deposit(
        &mut self,
        account: AccountId,
        amount: AssetAmount,
    ) -> Result<(), MarketError> {
        self.transactional(|engine| {
            if engine.store.is_market_issued(amount.asset_id) {
                return Err(MarketError::Invalid(
                    "market-issued supply comes from call orders, not deposits",
                ));
            }
            engine.store.asset(amount.asset_id)?;
            engine.store.modify_dynamic_data(amount.asset_id, |data| {
                data.current_supply += amount.amount;
            })?;
            engine.store.adjust_balance(account, amount)
        })
    }

    /// Moves reserve from `from`'s balance into an asset's fee pool, which
    /// backs reserve-equivalent fees paid in that asset.
    pub fn fund_fee_pool(
        &mut self,
        from: AccountId,
        asset_id: AssetId,
        reserve_amount: i64,
    ) -> Result<(), MarketError> {
        self.transactional(|engine| {
            if reserve_amount <= 0 {
                return Err(MarketError::Invalid("fee pool funding must be positive"));
            }
            engine.store.asset(asset_id)?;
            engine
                .store
                .adjust_balance(from, AssetAmount::new(-reserve_amount, AssetId::RESERVE))?;
            engine.store.modify_dynamic_data(asset_id, |data| {
                data.fee_pool += reserve_amount;
            })
        })
    }

    // ── Feed publication ────────────────────────────────────────────────

    /// Installs a new price feed, then either sweeps margin calls or, for a
    /// settled asset whose fund again satisfies the maintenance ratio at
    /// the new feed, revives it.
    pub fn publish_feed(
        &mut self,
        asset_id: AssetId,
        feed: PriceFeed,
    ) -> Result<(), MarketError> {
        self.transactional(|engine| {
            if !engine.store.is_market_issued(asset_id) {
                return Err(MarketError::NotMarketIssued(asset_id));
            }
            if let Some(price) = feed.settlement_price {
                price.validate()?;
            }
            engine
                .store
                .modify_bitasset(asset_id, |data| data.current_feed = feed)?;

            let bitasset = engine.store.bitasset(asset_id).expect("checked above").clone();
            if bitasset.has_settlement() {
                if engine.fund_satisfies_maintenance(&bitasset)? {
                    engine.revive_bitasset_inner(asset_id)?;
                }
                return Ok(());
            }
            engine.check_call_orders_inner(asset_id, true, false)?;
            Ok(())
        })
    }

    /// Whether the settlement fund over-collateralizes the outstanding
    /// supply at the current feed and maintenance ratio, i.e.
    /// `fund / supply > feed * mcr`.
    fn fund_satisfies_maintenance(
        &self,
        bitasset: &BitassetData,
    ) -> Result<bool, MarketError> {
        let Some(feed) = bitasset.current_feed.settlement_price else {
            return Ok(false);
        };
        let supply = self.store.dynamic_data(bitasset.asset_id)?.current_supply;
        if supply == 0 {
            return Ok(true);
        }
        // fund * feed.base * DENOM > supply * feed.quote * mcr, all in i128
        let lhs = bitasset.settlement_fund as i128
            * feed.base.amount as i128
            * COLLATERAL_RATIO_DENOM as i128;
        let rhs = supply as i128
            * feed.quote.amount as i128
            * bitasset.current_feed.maintenance_collateral_ratio as i128;
        Ok(lhs > rhs)
    }

    // ── Call-order updates (borrowing) ──────────────────────────────────

    /// Adjusts (or opens, or closes) the caller's short position in
    /// `delta_debt.asset_id` by `delta_debt` and `delta_collateral`.
    ///
    /// Issues borrowed supply to the borrower's balance and locks the
    /// posted collateral. A position left with zero debt must also be left
    /// with zero collateral and is removed. The resulting position must
    /// satisfy the maintenance collateral ratio at the current feed.
    pub fn borrow(
        &mut self,
        borrower: AccountId,
        delta_debt: AssetAmount,
        delta_collateral: AssetAmount,
    ) -> Result<Option<CallOrderId>, MarketError> {
        self.transactional(|engine| engine.borrow_inner(borrower, delta_debt, delta_collateral))
    }

    fn borrow_inner(
        &mut self,
        borrower: AccountId,
        delta_debt: AssetAmount,
        delta_collateral: AssetAmount,
    ) -> Result<Option<CallOrderId>, MarketError> {
        let mia = delta_debt.asset_id;
        let bitasset = self
            .store
            .bitasset(mia)
            .ok_or(MarketError::NotMarketIssued(mia))?
            .clone();
        if bitasset.has_settlement() {
            return Err(MarketError::AlreadySettled(mia));
        }
        if bitasset.options.backing_asset != delta_collateral.asset_id {
            return Err(MarketError::Invalid("collateral is not the backing asset"));
        }
        let Some(feed_price) = bitasset.current_feed.settlement_price else {
            return Err(MarketError::NoPriceFeed(mia));
        };
        let mcr = bitasset.current_feed.maintenance_collateral_ratio;

        // Move funds first so overdrafts abort before the store changes.
        self.store.adjust_balance(borrower, -delta_collateral)?;
        self.store.adjust_balance(borrower, delta_debt)?;
        self.store.modify_dynamic_data(mia, |data| {
            data.current_supply += delta_debt.amount;
        })?;
        if delta_collateral.asset_id.is_reserve() {
            self.store.modify_statistics(borrower, |stats| {
                stats.total_reserve_in_orders += delta_collateral.amount;
            });
        }

        let existing = self.store.find_call_order_by_borrower(borrower, mia);
        let (debt, collateral) = match existing {
            Some(id) => {
                let order = self.store.call_order(id)?;
                (order.debt + delta_debt, order.collateral + delta_collateral)
            }
            None => (delta_debt, delta_collateral),
        };
        if debt.amount < 0 || collateral.amount < 0 {
            return Err(MarketError::Invalid("position cannot go negative"));
        }

        if debt.amount == 0 {
            if collateral.amount != 0 {
                return Err(MarketError::Invalid(
                    "closing a position must withdraw all collateral",
                ));
            }
            let Some(id) = existing else {
                return Err(MarketError::Invalid("no position to close"));
            };
            self.store.remove_call_order(id)?;
            return Ok(None);
        }
        if collateral.amount == 0 {
            return Err(MarketError::Invalid("position requires collateral"));
        }

        let call_price = Price::call_price(debt, collateral, mcr);
        // A fresh or adjusted position may not be instantly margin-callable:
        // a position is callable once `~call_price >= feed`.
        if call_price.invert() >= feed_price {
            return Err(MarketError::Invalid(
                "insufficient collateral for the maintenance ratio",
            ));
        }

        let id = match existing {
            Some(id) => {
                self.store.modify_call_order(id, |order| {
                    order.debt = debt;
                    order.collateral = collateral;
                    order.call_price = call_price;
                })?;
                id
            }
            None => self
                .store
                .create_call_order(borrower, collateral, debt, call_price),
        };

        // The new position may free the book enough to match other calls.
        self.check_call_orders_inner(mia, false, false)?;
        Ok(Some(id))
    }

    // ── Limit orders ────────────────────────────────────────────────────

    /// Places a limit order selling `amount_for_sale` for at least
    /// `min_to_receive`, then matches it against the book.
    ///
    /// `deferred_fee` is the reserve-equivalent submission fee and
    /// `deferred_paid_fee` the fee as originally paid when it was paid in a
    /// non-reserve asset; both travel with the order.
    pub fn place_limit_order(
        &mut self,
        seller: AccountId,
        amount_for_sale: AssetAmount,
        min_to_receive: AssetAmount,
        deferred_fee: i64,
        deferred_paid_fee: AssetAmount,
    ) -> Result<PlaceOrderResult, MarketError> {
        self.transactional(|engine| {
            if amount_for_sale.amount <= 0 || min_to_receive.amount <= 0 {
                return Err(MarketError::Invalid("order amounts must be positive"));
            }
            if amount_for_sale.asset_id == min_to_receive.asset_id {
                return Err(MarketError::Invalid("order must cross two assets"));
            }
            engine.store.asset(amount_for_sale.asset_id)?;
            engine.store.asset(min_to_receive.asset_id)?;

            engine.store.adjust_balance(seller, -amount_for_sale)?;
            if deferred_paid_fee.amount > 0 && deferred_paid_fee.asset_id.is_reserve() {
                return Err(MarketError::Invalid(
                    "reserve-paid fees defer through deferred_fee alone",
                ));
            }
            if deferred_paid_fee.amount > 0 {
                // Fee paid in a non-reserve asset: that asset's fee pool
                // provides the reserve equivalent that defers with the
                // order.
                engine.store.adjust_balance(seller, -deferred_paid_fee)?;
                let pool = engine
                    .store
                    .dynamic_data(deferred_paid_fee.asset_id)?
                    .fee_pool;
                if pool < deferred_fee {
                    return Err(MarketError::Invalid(
                        "fee pool cannot cover the reserve-equivalent fee",
                    ));
                }
                engine
                    .store
                    .modify_dynamic_data(deferred_paid_fee.asset_id, |data| {
                        data.fee_pool -= deferred_fee;
                    })?;
            } else if deferred_fee > 0 {
                engine
                    .store
                    .adjust_balance(seller, AssetAmount::new(-deferred_fee, AssetId::RESERVE))?;
            }
            if amount_for_sale.asset_id.is_reserve() {
                engine.store.modify_statistics(seller, |stats| {
                    stats.total_reserve_in_orders += amount_for_sale.amount;
                });
            }

            let sell_price = amount_for_sale / min_to_receive;
            sell_price.validate()?;
            let order_id = engine.store.create_limit_order(
                seller,
                amount_for_sale.amount,
                sell_price,
                deferred_fee,
                deferred_paid_fee,
            );

            let consumed = engine.apply_order(order_id, true)?;
            Ok(PlaceOrderResult { order_id, consumed })
        })
    }

    /// User-requested cancellation of a resting limit order.
    pub fn cancel_limit_order(&mut self, id: LimitOrderId) -> Result<(), MarketError> {
        self.transactional(|engine| engine.cancel_limit_order_inner(id, true, false))
    }

    /// Applies a newly-inserted limit order to the book.
    ///
    /// Returns `true` when the order was fully consumed or culled — the
    /// caller must not reference it again — and `false` when it rests on
    /// the book.
    ///
    /// When the order sells a market-issued asset for its backing asset,
    /// margin calls compete with the resting limit orders for it; the call
    /// side's effective price is bounded by the max short squeeze price.
    pub fn apply_order(
        &mut self,
        order_id: LimitOrderId,
        allow_black_swan: bool,
    ) -> Result<bool, MarketError> {
        let new_order = self.store.limit_order(order_id)?.clone();
        let sell_asset_id = new_order.sell_asset_id();
        let recv_asset_id = new_order.receive_asset_id();

        // Only an order at the front of its side of the book can match.
        let own_key = LimitOrderKey::new(new_order.sell_price, order_id);
        if let Some(prev) = self.store.limit_key_before(&own_key) {
            if prev.price.pair() == own_key.price.pair() {
                return Ok(false);
            }
        }

        // Cross-matching against margin calls applies only when this order
        // is buying collateral: selling the MIA itself, receiving its
        // backing asset, on a live, fed, non-prediction market.
        let sell_bitasset = self.store.bitasset(sell_asset_id).cloned();
        let mut to_check_call_orders = false;
        if let Some(bitasset) = &sell_bitasset {
            if bitasset.options.backing_asset == recv_asset_id
                && !bitasset.is_prediction_market
                && !bitasset.has_settlement()
                && bitasset.current_feed.settlement_price.is_some()
            {
                to_check_call_orders = true;
            }
        }

        // The opposite side of the book, best offer first.
        let max_price = new_order.sell_price.invert();
        let limit_lower = LimitOrderKey::new(
            Price::max_for(recv_asset_id, sell_asset_id),
            LimitOrderId::new(0),
        );
        let limit_upper = LimitOrderKey::new(max_price, LimitOrderId::new(u64::MAX));
        let mut limit_cursor = self.store.first_limit_key(&limit_lower, &limit_upper);
        let mut to_check_limit_orders = limit_cursor.is_some();

        let mut taker_consumed = false;

        if to_check_call_orders {
            let bitasset = sell_bitasset.as_ref().expect("checked above");
            let feed_price = bitasset
                .current_feed
                .settlement_price
                .expect("checked above");
            let min_call_price = bitasset
                .current_feed
                .max_short_squeeze_price()
                .expect("feed is valid");

            loop {
                // Refetch on every pass: the previous fill may have changed
                // or removed the least-collateralized position.
                let Some(call_key) =
                    self.store.least_collateralized_call(recv_asset_id, sell_asset_id)
                else {
                    break;
                };
                let call_order = self.store.call_order(call_key.id)?.clone();

                let mut call_match_price = call_order.call_price.invert();
                let mut keep_checking_calls = true;
                if feed_price > call_match_price {
                    // Even the least-collateralized position satisfies the
                    // feed; nothing further is callable.
                    keep_checking_calls = false;
                } else {
                    if call_match_price < min_call_price {
                        // Feed-protected: squeeze no further than MSSR.
                        call_match_price = min_call_price;
                    }
                    if call_match_price > new_order.sell_price {
                        // The new order's price does not reach the call.
                        keep_checking_calls = false;
                    }
                }
                if !keep_checking_calls {
                    break;
                }

                if to_check_limit_orders {
                    // Fill every resting limit that beats the call's price.
                    let mut finished = false;
                    while !finished {
                        let Some(key) = limit_cursor else { break };
                        if call_match_price <= key.price.invert() {
                            break;
                        }
                        limit_cursor = self.store.next_limit_key(&key, &limit_upper);
                        finished =
                            self.match_limit_limit(order_id, key.id, key.price)? != 2;
                    }
                    if finished {
                        taker_consumed = true;
                        to_check_limit_orders = false;
                        break;
                    }
                    if limit_cursor.is_none() {
                        to_check_limit_orders = false;
                    }
                }

                // A call whose required payout exceeds its own collateral
                // cannot be covered by matching: the whole market fails.
                let usd_to_buy = call_order.debt;
                if usd_to_buy.times(&call_match_price)? > call_order.collateral {
                    if !allow_black_swan {
                        return Err(MarketError::BlackSwan(sell_asset_id));
                    }
                    self.globally_settle_inner(sell_asset_id, feed_price)?;
                    return Ok(true);
                }

                let match_result =
                    self.match_limit_call(order_id, call_key.id, call_match_price)?;
                if match_result != 2 {
                    // The taker is gone; stop matching entirely.
                    taker_consumed = true;
                    to_check_limit_orders = false;
                    break;
                }
                // Only the call filled: loop and refetch the next one.
            }
        }

        if to_check_limit_orders && !taker_consumed {
            let mut finished = false;
            while !finished {
                let Some(key) = limit_cursor else { break };
                limit_cursor = self.store.next_limit_key(&key, &limit_upper);
                finished = self.match_limit_limit(order_id, key.id, key.price)? != 2;
            }
        }

        if self.store.find_limit_order(order_id).is_none() {
            return Ok(true);
        }
        // A taker whose receivable rounded to zero is culled only now that
        // no further match is possible.
        self.maybe_cull_small(order_id)
    }

    /// Removes an order whose remaining receivable rounds to zero,
    /// refunding the remainder. No fill record is emitted.
    pub(crate) fn maybe_cull_small(
        &mut self,
        id: LimitOrderId,
    ) -> Result<bool, MarketError> {
        let order = self.store.limit_order(id)?;
        if order.amount_to_receive()?.amount != 0 {
            return Ok(false);
        }
        if order.deferred_fee > 0 && !self.config.charge_fee_on_cull {
            warn!(order = %id, "cancelling dust order without charging a fee");
            self.cancel_limit_order_inner(id, true, true)?;
        } else {
            self.cancel_limit_order_inner(id, true, false)?;
        }
        Ok(true)
    }

    /// Shared cancellation path for user requests and engine-initiated
    /// culls.
    ///
    /// Charges the cancellation fee out of the deferred fee (capped at it),
    /// refunds the remaining order balance, and returns the unconsumed
    /// deferred fee: straight to the seller under reserve-only bookkeeping,
    /// otherwise in the originally-paid asset with the reserve equivalent
    /// going back to that asset's fee pool.
    pub(crate) fn cancel_limit_order_inner(
        &mut self,
        id: LimitOrderId,
        create_virtual_op: bool,
        skip_cancel_fee: bool,
    ) -> Result<(), MarketError> {
        let order = self.store.limit_order(id)?.clone();
        let mut deferred_fee = order.deferred_fee;
        let mut deferred_paid_fee = order.deferred_paid_fee;
        let mut fee_charged = AssetAmount::zero(AssetId::RESERVE);

        if create_virtual_op && !skip_cancel_fee && deferred_fee > 0 {
            let mut cancel_fee = self.config.fee_schedule.limit_order_cancel_fee();
            if cancel_fee.amount > deferred_fee {
                cancel_fee.amount = deferred_fee;
            }
            if cancel_fee.amount > 0 {
                let threshold = self.config.cashback_vesting_threshold;
                self.store.modify_statistics(order.seller, |stats| {
                    stats.pay_fee(cancel_fee.amount, threshold);
                });
                deferred_fee -= cancel_fee.amount;

                if deferred_paid_fee.amount == 0 {
                    fee_charged = cancel_fee;
                } else {
                    // Prorate into the originally-paid asset, rounding up:
                    // ceil(paid * cancel / deferred)
                    let prorated = (deferred_paid_fee.amount as i128
                        * cancel_fee.amount as i128
                        + order.deferred_fee as i128
                        - 1)
                        / order.deferred_fee as i128;
                    let prorated = prorated as i64;
                    self.store
                        .modify_dynamic_data(deferred_paid_fee.asset_id, |data| {
                            data.accumulated_fees += prorated;
                        })?;
                    deferred_paid_fee.amount -= prorated;
                    fee_charged = AssetAmount::new(prorated, deferred_paid_fee.asset_id);
                }
            }
        }

        // Refund what is still for sale.
        let refunded = order.amount_for_sale();
        if refunded.asset_id.is_reserve() {
            self.store.modify_statistics(order.seller, |stats| {
                stats.total_reserve_in_orders -= refunded.amount;
            });
        }
        self.store.adjust_balance(order.seller, refunded)?;

        // Refund the unconsumed deferred fee.
        if order.deferred_paid_fee.amount == 0 {
            // Reserve-only bookkeeping: the deferred reserve fee goes back
            // to the seller.
            self.store
                .adjust_balance(order.seller, AssetAmount::new(deferred_fee, AssetId::RESERVE))?;
        } else {
            self.store.adjust_balance(order.seller, deferred_paid_fee)?;
            self.store
                .modify_dynamic_data(deferred_paid_fee.asset_id, |data| {
                    data.fee_pool += deferred_fee;
                })?;
        }

        if create_virtual_op {
            self.store
                .push_applied(AppliedOperation::LimitOrderCancel(LimitOrderCancelRecord {
                    order: id,
                    fee_paying_account: order.seller,
                    fee: fee_charged,
                }));
        }
        self.store.remove_limit_order(id)?;
        Ok(())
    }

    // ── Forced settlement ───────────────────────────────────────────────

    /// Requests settlement of `amount` against its collateral pool.
    ///
    /// On a live market this queues a forced-settlement order for the
    /// external delay machinery. On a globally settled market it redeems
    /// instantly against the settlement fund at the recorded settlement
    /// price, which is the only place supply is reduced after a swan.
    pub fn settle_asset(
        &mut self,
        account: AccountId,
        amount: AssetAmount,
    ) -> Result<SettleOutcome, MarketError> {
        self.transactional(|engine| {
            let mia = amount.asset_id;
            let bitasset = engine
                .store
                .bitasset(mia)
                .ok_or(MarketError::NotMarketIssued(mia))?
                .clone();
            if amount.amount <= 0 {
                return Err(MarketError::Invalid("settlement amount must be positive"));
            }

            if let Some(settlement_price) = bitasset.settlement_price {
                let supply = engine.store.dynamic_data(mia)?.current_supply;
                let mut settled = amount.times(&settlement_price)?;
                // The last redemption takes the whole fund so truncation
                // dust cannot strand value.
                if amount.amount == supply {
                    settled.amount = bitasset.settlement_fund;
                }
                if settled.amount > bitasset.settlement_fund {
                    return Err(MarketError::Invariant("settlement fund underfunded"));
                }
                engine.store.adjust_balance(account, -amount)?;
                engine.store.adjust_balance(account, settled)?;
                engine.store.modify_dynamic_data(mia, |data| {
                    data.current_supply -= amount.amount;
                })?;
                engine.store.modify_bitasset(mia, |data| {
                    data.settlement_fund -= settled.amount;
                })?;
                return Ok(SettleOutcome::Settled(settled));
            }

            engine.store.adjust_balance(account, -amount)?;
            let id = engine.store.create_settlement(account, amount);
            Ok(SettleOutcome::Queued(id))
        })
    }

    /// Cancels a queued forced-settlement order, refunding its balance.
    pub fn cancel_settlement(&mut self, id: SettlementId) -> Result<(), MarketError> {
        self.transactional(|engine| engine.cancel_settle_order_inner(id, true))
    }

    pub(crate) fn cancel_settle_order_inner(
        &mut self,
        id: SettlementId,
        create_virtual_op: bool,
    ) -> Result<(), MarketError> {
        let settlement = self.store.settlement(id)?.clone();
        self.store.adjust_balance(settlement.owner, settlement.balance)?;
        if create_virtual_op {
            self.store.push_applied(AppliedOperation::AssetSettleCancel(
                AssetSettleCancelRecord {
                    settlement: id,
                    account: settlement.owner,
                    amount: settlement.balance,
                },
            ));
        }
        self.store.remove_settlement(id)?;
        Ok(())
    }

    /// Drains the applied-operation stream accumulated by committed
    /// operations.
    pub fn drain_applied(&mut self) -> Vec<AppliedOperation> {
        self.store.drain_applied()
    }
}
