//! Global settlement, collateral bids, and revival
//!
//! A black swan closes every call order for the asset at one price and
//! pools the paid collateral into the settlement fund. While settled,
//! holders redeem individually against the fund and anyone may bid
//! additional collateral to take over the debt. Revival reopens the market:
//! either the fund alone satisfies the maintenance ratio again, or bids
//! cover the whole supply.

use tracing::info;
use types::prelude::*;

use crate::engine::MarketEngine;
use crate::events::{AppliedOperation, BidCollateralRecord, ExecuteBidRecord};

impl MarketEngine {
    // ── Global settlement ───────────────────────────────────────────────

    /// Closes every call order for `asset_id` at `settlement_price`,
    /// freezing the asset until revival.
    pub fn globally_settle(
        &mut self,
        asset_id: AssetId,
        settlement_price: Price,
    ) -> Result<(), MarketError> {
        self.transactional(|engine| engine.globally_settle_inner(asset_id, settlement_price))
    }

    pub(crate) fn globally_settle_inner(
        &mut self,
        asset_id: AssetId,
        settlement_price: Price,
    ) -> Result<(), MarketError> {
        let bitasset = self
            .store()
            .bitasset(asset_id)
            .ok_or(MarketError::NotMarketIssued(asset_id))?
            .clone();
        if bitasset.has_settlement() {
            return Err(MarketError::AlreadySettled(asset_id));
        }
        let backing = bitasset.options.backing_asset;
        let original_supply = self.store().dynamic_data(asset_id)?.current_supply;

        // Each position pays min(debt * price, collateral) and is closed;
        // closing the last one zeroes the reported supply.
        let mut collateral_gathered = AssetAmount::zero(backing);
        while let Some(call_key) = self.store().least_collateralized_call(backing, asset_id) {
            let call = self.store().call_order(call_key.id)?.clone();
            let mut pays = call.debt.times(&settlement_price)?;
            if pays > call.collateral {
                pays = call.collateral;
            }
            collateral_gathered += pays;
            let removed =
                self.fill_call_order(call_key.id, pays, call.debt, settlement_price, true)?;
            if !removed {
                return Err(MarketError::Invariant(
                    "global settlement must close every position",
                ));
            }
        }

        if collateral_gathered.amount == 0 {
            return Err(MarketError::Invariant(
                "global settlement requires open positions",
            ));
        }
        self.store_mut().modify_bitasset(asset_id, |data| {
            // Recorded as supply / collateral gathered: the effective
            // per-unit backing left, inverted relative to the feed.
            data.settlement_price =
                Some(AssetAmount::new(original_supply, asset_id) / collateral_gathered);
            data.settlement_fund = collateral_gathered.amount;
        })?;

        // The individual fills above decremented the supply, but holders
        // still own their tokens; redemption against the fund is what
        // actually retires them.
        self.store_mut().modify_dynamic_data(asset_id, |data| {
            data.current_supply = original_supply;
        })?;

        info!(asset = %asset_id, fund = collateral_gathered.amount, "globally settled");
        Ok(())
    }

    // ── Collateral bids ─────────────────────────────────────────────────

    /// Places, replaces, or (with zero debt covered) cancels the caller's
    /// collateral bid on a globally settled asset.
    pub fn bid_collateral(
        &mut self,
        bidder: AccountId,
        additional_collateral: AssetAmount,
        debt_covered: AssetAmount,
    ) -> Result<Option<BidId>, MarketError> {
        self.transactional(|engine| {
            engine.bid_collateral_inner(bidder, additional_collateral, debt_covered)
        })
    }

    fn bid_collateral_inner(
        &mut self,
        bidder: AccountId,
        additional_collateral: AssetAmount,
        debt_covered: AssetAmount,
    ) -> Result<Option<BidId>, MarketError> {
        let mia = debt_covered.asset_id;
        let bitasset = self
            .store()
            .bitasset(mia)
            .ok_or(MarketError::NotMarketIssued(mia))?
            .clone();
        if !bitasset.has_settlement() {
            return Err(MarketError::NotSettled(mia));
        }
        if bitasset.is_prediction_market {
            return Err(MarketError::PredictionMarket(mia));
        }
        if additional_collateral.asset_id != bitasset.options.backing_asset {
            return Err(MarketError::Invalid("bid must post the backing asset"));
        }
        if !self.store().asset(mia)?.options.allow_collateral_bidding {
            return Err(MarketError::Invalid("collateral bidding is disabled"));
        }

        let existing = self.store().find_bid_by_bidder(mia, bidder);

        if debt_covered.amount == 0 {
            // A zero-debt bid cancels the existing one.
            let Some(bid_id) = existing else {
                return Err(MarketError::Invalid("no bid to cancel"));
            };
            self.cancel_bid_inner(bid_id, true)?;
            return Ok(None);
        }
        if additional_collateral.amount <= 0 {
            return Err(MarketError::Invalid("bid requires positive collateral"));
        }
        if debt_covered.amount < 0 {
            return Err(MarketError::Invalid("bid cannot cover negative debt"));
        }

        // A new bid from the same account replaces (and refunds) the old.
        if let Some(bid_id) = existing {
            self.cancel_bid_inner(bid_id, false)?;
        }

        self.store_mut().adjust_balance(bidder, -additional_collateral)?;
        let bid_id = self
            .store_mut()
            .create_bid(bidder, additional_collateral / debt_covered);
        self.store_mut()
            .push_applied(AppliedOperation::BidCollateral(BidCollateralRecord {
                bid: bid_id,
                bidder,
                additional_collateral,
                debt_covered,
            }));
        Ok(Some(bid_id))
    }

    pub(crate) fn cancel_bid_inner(
        &mut self,
        id: BidId,
        create_virtual_op: bool,
    ) -> Result<(), MarketError> {
        let bid = self.store().bid(id)?.clone();
        self.store_mut()
            .adjust_balance(bid.bidder, bid.additional_collateral())?;
        if create_virtual_op {
            self.store_mut()
                .push_applied(AppliedOperation::BidCollateral(BidCollateralRecord {
                    bid: id,
                    bidder: bid.bidder,
                    additional_collateral: bid.additional_collateral(),
                    debt_covered: AssetAmount::zero(bid.debt_asset_id()),
                }));
        }
        self.store_mut().remove_bid(id)?;
        Ok(())
    }

    /// Turns a bid into a live call order carrying the bid collateral plus
    /// a share of the settlement fund.
    pub(crate) fn execute_bid(
        &mut self,
        bid_id: BidId,
        debt_covered: i64,
        collateral_from_fund: i64,
        feed: &PriceFeed,
    ) -> Result<CallOrderId, MarketError> {
        let bid = self.store().bid(bid_id)?.clone();
        let debt = AssetAmount::new(debt_covered, bid.debt_asset_id());
        let collateral = AssetAmount::new(
            bid.additional_collateral().amount + collateral_from_fund,
            bid.additional_collateral().asset_id,
        );
        let call_price =
            Price::call_price(debt, collateral, feed.maintenance_collateral_ratio);
        let call_id = self
            .store_mut()
            .create_call_order(bid.bidder, collateral, debt, call_price);

        if collateral.asset_id.is_reserve() {
            self.store_mut().modify_statistics(bid.bidder, |stats| {
                stats.total_reserve_in_orders += collateral.amount;
            });
        }

        self.store_mut()
            .push_applied(AppliedOperation::ExecuteBid(ExecuteBidRecord {
                bidder: bid.bidder,
                debt,
                collateral,
            }));
        self.store_mut().remove_bid(bid_id)?;
        Ok(call_id)
    }

    // ── Revival ─────────────────────────────────────────────────────────

    /// Revives a settled asset whose settlement fund suffices at the
    /// current feed: one synthetic zero-collateral bid from the issuer
    /// takes over the whole supply against the fund.
    pub fn revive_bitasset(&mut self, asset_id: AssetId) -> Result<(), MarketError> {
        self.transactional(|engine| engine.revive_bitasset_inner(asset_id))
    }

    pub(crate) fn revive_bitasset_inner(&mut self, asset_id: AssetId) -> Result<(), MarketError> {
        let bitasset = self
            .store()
            .bitasset(asset_id)
            .ok_or(MarketError::NotMarketIssued(asset_id))?
            .clone();
        if !bitasset.has_settlement() {
            return Err(MarketError::NotSettled(asset_id));
        }
        if bitasset.is_prediction_market {
            return Err(MarketError::PredictionMarket(asset_id));
        }
        if bitasset.current_feed.settlement_price.is_none() {
            return Err(MarketError::NoPriceFeed(asset_id));
        }

        let supply = self.store().dynamic_data(asset_id)?.current_supply;
        if supply > 0 {
            let issuer = self.store().asset(asset_id)?.issuer;
            let backing = bitasset.options.backing_asset;
            let pseudo_bid = self.store_mut().create_bid(
                issuer,
                AssetAmount::zero(backing) / AssetAmount::new(supply, asset_id),
            );
            self.execute_bid(
                pseudo_bid,
                supply,
                bitasset.settlement_fund,
                &bitasset.current_feed,
            )?;
        } else if bitasset.settlement_fund != 0 {
            return Err(MarketError::Invariant(
                "settlement fund must be empty when no supply remains",
            ));
        }

        self.cancel_bids_and_revive(asset_id)
    }

    /// Refunds every remaining bid and clears the settlement state.
    fn cancel_bids_and_revive(&mut self, asset_id: AssetId) -> Result<(), MarketError> {
        let backing = self
            .store()
            .bitasset(asset_id)
            .ok_or(MarketError::NotMarketIssued(asset_id))?
            .options
            .backing_asset;
        for bid_id in self.store().bid_ids_for(asset_id, backing) {
            self.cancel_bid_inner(bid_id, true)?;
        }
        self.store_mut().modify_bitasset(asset_id, |data| {
            data.settlement_price = None;
            data.settlement_fund = 0;
        })?;
        info!(asset = %asset_id, "revived");
        Ok(())
    }

    /// Attempts revival through the standing collateral bids: succeeds only
    /// when bids that stay above the maintenance ratio at the current feed
    /// cover the entire outstanding supply. Each executed bid receives a
    /// pro-rata share of the settlement fund, the last one the remainder.
    ///
    /// Returns `true` when the asset was revived.
    pub fn process_bids(&mut self, asset_id: AssetId) -> Result<bool, MarketError> {
        self.transactional(|engine| engine.process_bids_inner(asset_id))
    }

    fn process_bids_inner(&mut self, asset_id: AssetId) -> Result<bool, MarketError> {
        let bitasset = self
            .store()
            .bitasset(asset_id)
            .ok_or(MarketError::NotMarketIssued(asset_id))?
            .clone();
        if !bitasset.has_settlement() {
            return Err(MarketError::NotSettled(asset_id));
        }
        if bitasset.is_prediction_market {
            return Ok(false);
        }
        let Some(feed_price) = bitasset.current_feed.settlement_price else {
            return Ok(false);
        };
        let settlement_price = bitasset
            .settlement_price
            .expect("has_settlement checked above");
        let backing = bitasset.options.backing_asset;
        let mcr = bitasset.current_feed.maintenance_collateral_ratio;

        let supply = self.store().dynamic_data(asset_id)?.current_supply;
        if supply == 0 {
            self.cancel_bids_and_revive(asset_id)?;
            return Ok(true);
        }

        // First pass: walk bids best-first and count how much debt the
        // acceptable ones cover. A bid whose resulting position would be
        // instantly margin-callable stops the walk; every bid after it is
        // worse.
        let bid_ids = self.store().bid_ids_for(asset_id, backing);
        let mut accepted = 0usize;
        let mut covered: i64 = 0;
        for &bid_id in &bid_ids {
            if covered >= supply {
                break;
            }
            let bid = self.store().bid(bid_id)?.clone();
            let mut debt_in_bid = bid.debt_covered();
            if debt_in_bid.amount > supply {
                debt_in_bid.amount = supply;
            }
            let mut total_collateral = debt_in_bid.times(&settlement_price)?;
            total_collateral += bid.additional_collateral();
            let call_price = Price::call_price(debt_in_bid, total_collateral, mcr);
            if call_price.invert() >= feed_price {
                break;
            }
            covered += debt_in_bid.amount;
            accepted += 1;
        }
        if covered < supply {
            return Ok(false);
        }

        // Second pass: execute the accepted bids. Debt is capped at what is
        // left to cover; the bid that completes coverage takes the entire
        // remaining fund so no dust is stranded.
        let mut to_cover = supply;
        let mut remaining_fund = bitasset.settlement_fund;
        for &bid_id in bid_ids.iter().take(accepted) {
            let bid = self.store().bid(bid_id)?.clone();
            let mut debt = bid.debt_covered().amount.min(supply);
            let mut collateral = AssetAmount::new(debt, asset_id)
                .times(&settlement_price)?
                .amount;
            if debt >= to_cover {
                debt = to_cover;
                collateral = remaining_fund;
            }
            to_cover -= debt;
            remaining_fund -= collateral;
            self.execute_bid(bid_id, debt, collateral, &bitasset.current_feed)?;
        }
        if to_cover != 0 {
            return Err(MarketError::Invariant("bid coverage accounting broke"));
        }

        self.cancel_bids_and_revive(asset_id)?;
        Ok(true)
    }
}
