//! Margin-call sweep
//!
//! While the least-collateralized call order is undercollateralized
//! relative to the feed, match it against the best opposing limit order at
//! the limit's price, bounded by the max short squeeze price. Runs after
//! book perturbations and on feed updates.

use tracing::{error, warn};
use types::prelude::*;

use crate::engine::MarketEngine;

impl MarketEngine {
    /// Sweeps margin calls for `asset_id`.
    ///
    /// `for_new_limit_order` selects the maker role: during limit-order
    /// application the call is the maker, during a feed-driven sweep the
    /// resting limit is. That changes the recorded `is_maker` flags, not
    /// the trade economics.
    ///
    /// Returns `true` when state changed — a margin call executed, or a
    /// black swan escalated into global settlement (callers must not read
    /// "true" as "an order matched"). `enable_black_swan` gates the
    /// escalation; without it the black swan propagates as an error.
    pub fn check_call_orders(
        &mut self,
        asset_id: AssetId,
        enable_black_swan: bool,
        for_new_limit_order: bool,
    ) -> Result<bool, MarketError> {
        self.transactional(|engine| {
            engine.check_call_orders_inner(asset_id, enable_black_swan, for_new_limit_order)
        })
    }

    pub(crate) fn check_call_orders_inner(
        &mut self,
        asset_id: AssetId,
        enable_black_swan: bool,
        for_new_limit_order: bool,
    ) -> Result<bool, MarketError> {
        let Some(bitasset) = self.store().bitasset(asset_id).cloned() else {
            return Ok(false);
        };
        if bitasset.is_prediction_market || bitasset.has_settlement() {
            return Ok(false);
        }
        let Some(feed_price) = bitasset.current_feed.settlement_price else {
            return Ok(false);
        };
        let backing = bitasset.options.backing_asset;

        // Limit orders selling the MIA, best offer first, down to the max
        // short squeeze bound: cheaper offers cannot serve margin calls.
        let limit_lower = LimitOrderKey::new(
            Price::max_for(asset_id, backing),
            LimitOrderId::new(0),
        );
        let min_price = bitasset
            .current_feed
            .max_short_squeeze_price()
            .expect("feed is valid");
        let limit_upper = LimitOrderKey::new(min_price, LimitOrderId::new(u64::MAX));

        let mut limit_cursor = self.store().first_limit_key(&limit_lower, &limit_upper);
        if limit_cursor.is_none() {
            return Ok(false);
        }

        let mut margin_called = false;

        loop {
            let Some(call_key) = self.store().least_collateralized_call(backing, asset_id)
            else {
                break;
            };
            let call_order = self.store().call_order(call_key.id)?.clone();

            let Some(limit_key) = limit_cursor else {
                return Ok(margin_called);
            };
            let maker_limit = self.store().limit_order(limit_key.id)?.clone();
            let match_price = maker_limit.sell_price;
            let usd_for_sale = maker_limit.amount_for_sale();
            match_price.validate()?;

            // Even the least-collateralized position satisfies the feed:
            // nothing left to call.
            if feed_price > call_order.call_price.invert() {
                return Ok(margin_called);
            }

            margin_called = true;

            let usd_to_buy = call_order.debt;
            if usd_to_buy.times(&match_price)? > call_order.collateral {
                error!(asset = %asset_id, "black swan detected");
                if !enable_black_swan {
                    return Err(MarketError::BlackSwan(asset_id));
                }
                self.globally_settle_inner(asset_id, feed_price)?;
                return Ok(true);
            }

            // Consume the smaller side at the limit's price; the call's
            // payout truncates downward, in its own favor.
            let call_receives;
            let order_receives;
            let limit_consumed_by_size;
            if usd_to_buy >= usd_for_sale {
                call_receives = usd_for_sale;
                order_receives = usd_for_sale.times(&match_price)?;
                limit_consumed_by_size = true;
            } else {
                call_receives = usd_to_buy;
                order_receives = usd_to_buy.times(&match_price)?;
                limit_consumed_by_size = false;
            }
            let call_pays = order_receives;
            let order_pays = call_receives;

            self.fill_call_order(
                call_key.id,
                call_pays,
                call_receives,
                match_price,
                for_new_limit_order,
            )?;
            // The call's key may have moved or vanished; the loop refetches.

            let next_limit = self.store().next_limit_key(&limit_key, &limit_upper);
            if limit_consumed_by_size {
                limit_cursor = next_limit;
            }
            let really_filled = self.fill_limit_order(
                limit_key.id,
                order_pays,
                order_receives,
                true,
                match_price,
                !for_new_limit_order,
            )?;
            if !limit_consumed_by_size && really_filled {
                // Partial fill left a dust remainder that got culled.
                warn!(order = %limit_key.id, "margin-call counterparty culled as dust");
                limit_cursor = next_limit;
            }
        }

        Ok(margin_called)
    }
}
