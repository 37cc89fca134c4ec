//! Pairwise matching
//!
//! Given two orders in opposing directions and a match price chosen by the
//! caller, consume the smaller side completely and fill both orders. The
//! limit-vs-limit and limit-vs-call matchers return a two-bit code:
//!
//! | code | meaning                        |
//! |------|--------------------------------|
//! | 1    | taker filled                   |
//! | 2    | maker filled                   |
//! | 3    | both filled                    |
//!
//! A zero code is impossible: the smaller side always fills.
//!
//! Rounding is the load-bearing invariant here: the larger side's receipt
//! is the smaller side converted at the match price, truncated toward zero.
//! Truncation always happens on the amount paid *by* the maker, so the
//! maker never pays out more than the exact ratio and no value is created.

use types::prelude::*;

use crate::engine::MarketEngine;

/// Match-result bit for the taker side.
pub const TAKER_FILLED: u8 = 1;
/// Match-result bit for the maker side.
pub const MAKER_FILLED: u8 = 2;

impl MarketEngine {
    /// Match an incoming limit order (taker) against a resting one (maker)
    /// at `match_price`, normally the maker's price.
    pub(crate) fn match_limit_limit(
        &mut self,
        taker_id: LimitOrderId,
        maker_id: LimitOrderId,
        match_price: Price,
    ) -> Result<u8, MarketError> {
        let taker = self.store().limit_order(taker_id)?.clone();
        let maker = self.store().limit_order(maker_id)?.clone();
        if taker.receive_asset_id() != maker.sell_asset_id()
            || taker.sell_asset_id() != maker.receive_asset_id()
        {
            return Err(MarketError::Invalid("orders are not in opposing markets"));
        }
        if taker.for_sale <= 0 || maker.for_sale <= 0 {
            return Err(MarketError::Invariant("resting order with nothing for sale"));
        }

        let taker_for_sale = taker.amount_for_sale();
        let maker_for_sale = maker.amount_for_sale();

        let taker_pays;
        let taker_receives;
        let maker_pays;
        let maker_receives;

        if taker_for_sale <= maker_for_sale.times(&match_price)? {
            // The taker is the smaller side.
            maker_receives = taker_for_sale;
            taker_receives = taker_for_sale.times(&match_price)?;
        } else {
            // The maker is the smaller side. The two sides may still compute
            // equal values after truncation; that only means the trade is
            // exact, no value appears or vanishes either way.
            taker_receives = maker_for_sale;
            maker_receives = maker_for_sale.times(&match_price)?;
        }

        maker_pays = taker_receives;
        taker_pays = maker_receives;

        let mut result = 0u8;
        result |= u8::from(self.fill_limit_order(
            taker_id,
            taker_pays,
            taker_receives,
            false,
            match_price,
            false,
        )?);
        result |= u8::from(self.fill_limit_order(
            maker_id,
            maker_pays,
            maker_receives,
            true,
            match_price,
            true,
        )?) << 1;

        if result == 0 {
            return Err(MarketError::Invariant("match consumed neither order"));
        }
        Ok(result)
    }

    /// Match a limit order (taker) against a margin-called position
    /// (maker). Truncation is always on the collateral the call pays out,
    /// in favor of the call.
    pub(crate) fn match_limit_call(
        &mut self,
        limit_id: LimitOrderId,
        call_id: CallOrderId,
        match_price: Price,
    ) -> Result<u8, MarketError> {
        let limit = self.store().limit_order(limit_id)?.clone();
        let call = self.store().call_order(call_id)?.clone();
        if limit.sell_asset_id() != call.debt_asset_id()
            || limit.receive_asset_id() != call.collateral_asset_id()
        {
            return Err(MarketError::Invalid("limit and call are not in the same market"));
        }
        if limit.for_sale <= 0 || call.debt.amount <= 0 || call.collateral.amount <= 0 {
            return Err(MarketError::Invariant("empty order reached the matcher"));
        }

        let usd_for_sale = limit.amount_for_sale();
        let usd_to_buy = call.debt;

        let call_receives;
        let order_receives;
        if usd_to_buy >= usd_for_sale {
            // The limit order is consumed whole.
            call_receives = usd_for_sale;
            order_receives = usd_for_sale.times(&match_price)?;
        } else {
            // The call is covered whole.
            call_receives = usd_to_buy;
            order_receives = usd_to_buy.times(&match_price)?;
        }
        let call_pays = order_receives;
        let order_pays = call_receives;

        let mut result = 0u8;
        result |= u8::from(self.fill_limit_order(
            limit_id,
            order_pays,
            order_receives,
            false,
            match_price,
            false,
        )?);
        result |= u8::from(self.fill_call_order(
            call_id,
            call_pays,
            call_receives,
            match_price,
            true,
        )?) << 1;

        if result == 0 {
            return Err(MarketError::Invariant("match consumed neither order"));
        }
        Ok(result)
    }

    /// Match a margin-called position (maker) against a forced-settlement
    /// order (taker), settling at most `max_settlement`.
    ///
    /// Raises [`MarketError::BlackSwan`] when the call's collateral cannot
    /// cover the required payout: only the market may trigger settlement,
    /// so the caller must cancel the forced settlement instead.
    ///
    /// Returns the amount of debt actually settled.
    pub fn match_call_settle(
        &mut self,
        call_id: CallOrderId,
        settle_id: SettlementId,
        match_price: Price,
        max_settlement: AssetAmount,
        fill_price: Price,
    ) -> Result<AssetAmount, MarketError> {
        self.transactional(|engine| {
            engine.match_call_settle_inner(call_id, settle_id, match_price, max_settlement, fill_price)
        })
    }

    fn match_call_settle_inner(
        &mut self,
        call_id: CallOrderId,
        settle_id: SettlementId,
        match_price: Price,
        max_settlement: AssetAmount,
        fill_price: Price,
    ) -> Result<AssetAmount, MarketError> {
        let call = self.store().call_order(call_id)?.clone();
        let settle = self.store().settlement(settle_id)?.clone();
        if call.debt_asset_id() != settle.balance.asset_id {
            return Err(MarketError::Invalid("settlement claims a different asset"));
        }
        if call.debt.amount <= 0 || call.collateral.amount <= 0 || settle.balance.amount <= 0 {
            return Err(MarketError::Invariant("empty order reached the matcher"));
        }

        let settle_for_sale = if settle.balance <= max_settlement {
            settle.balance
        } else {
            max_settlement
        };

        let call_receives = if settle_for_sale <= call.debt {
            settle_for_sale
        } else {
            call.debt
        };
        let call_pays = call_receives.times(&match_price)?;
        let settle_pays = call_receives;
        let settle_receives = call_pays;

        // The least collateralized position lacking the collateral to cover
        // at the match price is a black swan per the feed; only matching
        // against the book may trigger the actual settlement.
        if !(call_pays < call.collateral) {
            return Err(MarketError::BlackSwan(call.debt_asset_id()));
        }

        self.fill_call_order(call_id, call_pays, call_receives, fill_price, true)?;
        self.fill_settle_order(settle_id, settle_pays, settle_receives, fill_price, false)?;

        Ok(call_receives)
    }
}
