//! Fill application
//!
//! One function per maker kind. Each applies a single pairwise fill:
//! deduct `pays` from the order's locked value, credit `receives` minus the
//! market fee to its owner, and emit exactly one `fill_order` record. The
//! return value is `true` when the order left the store.

use types::prelude::*;

use crate::engine::MarketEngine;
use crate::events::{AppliedOperation, FillOrderRecord, OrderRef};

impl MarketEngine {
    /// Fill a limit order with `pays` of its sell asset against `receives`.
    ///
    /// The deferred submission fee is flushed to fee accounting on the first
    /// fill. A partial fill whose remainder can no longer buy anything is
    /// culled only when `cull_if_small` is set; during active matching the
    /// taker side defers that check until matching ends.
    pub(crate) fn fill_limit_order(
        &mut self,
        id: LimitOrderId,
        pays: AssetAmount,
        receives: AssetAmount,
        cull_if_small: bool,
        fill_price: Price,
        is_maker: bool,
    ) -> Result<bool, MarketError> {
        let order = self.store().limit_order(id)?.clone();
        if order.sell_asset_id() != pays.asset_id {
            return Err(MarketError::Invalid("fill pays the wrong asset"));
        }
        if pays.asset_id == receives.asset_id {
            return Err(MarketError::Invalid("fill must cross two assets"));
        }

        let issuer_fees = self.pay_market_fees(&receives)?;
        self.pay_order(order.seller, receives - issuer_fees, pays)?;

        self.store_mut()
            .push_applied(AppliedOperation::FillOrder(FillOrderRecord {
                order: OrderRef::Limit(id),
                owner: order.seller,
                pays,
                receives,
                fee: issuer_fees,
                fill_price,
                is_maker,
            }));

        // Cheap integer check first; most orders carry no deferred fee.
        if order.deferred_fee > 0 {
            let threshold = self.config().cashback_vesting_threshold;
            self.store_mut().modify_statistics(order.seller, |stats| {
                stats.pay_fee(order.deferred_fee, threshold);
            });
        }

        if order.deferred_paid_fee.amount > 0 {
            let paid_fee = order.deferred_paid_fee;
            self.store_mut()
                .modify_dynamic_data(paid_fee.asset_id, |data| {
                    data.accumulated_fees += paid_fee.amount;
                })?;
        }

        if pays == order.amount_for_sale() {
            self.store_mut().remove_limit_order(id)?;
            Ok(true)
        } else {
            self.store_mut().modify_limit_order(id, |o| {
                o.for_sale -= pays.amount;
                o.deferred_fee = 0;
                o.deferred_paid_fee.amount = 0;
            })?;
            if cull_if_small {
                return self.maybe_cull_small(id);
            }
            Ok(false)
        }
    }

    /// Fill a call order: reduce its debt by `receives` and its collateral
    /// by `pays`. Returns `true` when the debt reached zero and the
    /// position was closed, returning residual collateral to the borrower.
    pub(crate) fn fill_call_order(
        &mut self,
        id: CallOrderId,
        pays: AssetAmount,
        receives: AssetAmount,
        fill_price: Price,
        is_maker: bool,
    ) -> Result<bool, MarketError> {
        let order = self.store().call_order(id)?.clone();
        if order.debt_asset_id() != receives.asset_id {
            return Err(MarketError::Invalid("call fill receives the wrong asset"));
        }
        if order.collateral_asset_id() != pays.asset_id {
            return Err(MarketError::Invalid("call fill pays the wrong asset"));
        }
        if order.collateral < pays {
            return Err(MarketError::Invalid("call fill exceeds posted collateral"));
        }

        let mia = receives.asset_id;
        let bitasset = self
            .store()
            .bitasset(mia)
            .ok_or(MarketError::NotMarketIssued(mia))?;
        let mcr = bitasset.current_feed.maintenance_collateral_ratio;

        let mut collateral_freed: Option<AssetAmount> = None;
        self.store_mut().modify_call_order(id, |o| {
            o.debt -= receives;
            o.collateral -= pays;
            if o.debt.amount == 0 {
                collateral_freed = Some(o.collateral);
                o.collateral.amount = 0;
            } else {
                o.call_price = Price::call_price(o.debt, o.collateral, mcr);
            }
        })?;

        self.store_mut().modify_dynamic_data(mia, |data| {
            data.current_supply -= receives.amount;
        })?;

        if let Some(freed) = collateral_freed {
            self.store_mut().adjust_balance(order.borrower, freed)?;
        }
        if collateral_freed.is_some() || pays.asset_id.is_reserve() {
            self.store_mut().modify_statistics(order.borrower, |stats| {
                if let Some(freed) = collateral_freed {
                    if freed.amount > 0 && freed.asset_id.is_reserve() {
                        stats.total_reserve_in_orders -= freed.amount;
                    }
                }
                if pays.asset_id.is_reserve() {
                    stats.total_reserve_in_orders -= pays.amount;
                }
                debug_assert!(stats.total_reserve_in_orders >= 0);
            });
        }

        self.store_mut()
            .push_applied(AppliedOperation::FillOrder(FillOrderRecord {
                order: OrderRef::Call(id),
                owner: order.borrower,
                pays,
                receives,
                fee: AssetAmount::zero(pays.asset_id),
                fill_price,
                is_maker,
            }));

        if collateral_freed.is_some() {
            self.store_mut().remove_call_order(id)?;
        }
        Ok(collateral_freed.is_some())
    }

    /// Fill a forced-settlement order: reduce its claimed balance by `pays`
    /// and credit the owner `receives` minus the market fee.
    pub(crate) fn fill_settle_order(
        &mut self,
        id: SettlementId,
        pays: AssetAmount,
        receives: AssetAmount,
        fill_price: Price,
        is_maker: bool,
    ) -> Result<bool, MarketError> {
        let settle = self.store().settlement(id)?.clone();
        if pays.asset_id == receives.asset_id {
            return Err(MarketError::Invalid("fill must cross two assets"));
        }

        let issuer_fees = self.pay_market_fees(&receives)?;

        let filled = if pays < settle.balance {
            self.store_mut().modify_settlement(id, |s| {
                s.balance -= pays;
            })?;
            false
        } else {
            true
        };
        self.store_mut()
            .adjust_balance(settle.owner, receives - issuer_fees)?;

        self.store_mut()
            .push_applied(AppliedOperation::FillOrder(FillOrderRecord {
                order: OrderRef::Settlement(id),
                owner: settle.owner,
                pays,
                receives,
                fee: issuer_fees,
                fill_price,
                is_maker,
            }));

        if filled {
            self.store_mut().remove_settlement(id)?;
        }
        Ok(filled)
    }

    /// Credit a seller with trade proceeds, releasing the reserve-in-orders
    /// lock for what the order paid out.
    pub(crate) fn pay_order(
        &mut self,
        receiver: AccountId,
        receives: AssetAmount,
        pays: AssetAmount,
    ) -> Result<(), MarketError> {
        if pays.asset_id.is_reserve() {
            self.store_mut().modify_statistics(receiver, |stats| {
                stats.total_reserve_in_orders -= pays.amount;
            });
        }
        self.store_mut().adjust_balance(receiver, receives)
    }
}
