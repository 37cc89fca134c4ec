//! Market-fee computation and capture
//!
//! Market fees are charged on the asset a trade participant receives and
//! accumulate in that asset's `accumulated_fees`, owed to the issuer. Zero
//! fees never touch the store.

use types::prelude::*;

use crate::engine::MarketEngine;

impl MarketEngine {
    /// `min(max_market_fee, floor(amount * market_fee_percent / 100%))`
    /// in the traded asset, or zero when the asset charges no fees.
    pub fn calculate_market_fee(
        &self,
        trade_amount: &AssetAmount,
    ) -> Result<AssetAmount, MarketError> {
        let asset = self.store().asset(trade_amount.asset_id)?;
        let options = &asset.options;
        if !options.charge_market_fee || options.market_fee_percent == 0 {
            return Ok(AssetAmount::zero(trade_amount.asset_id));
        }

        let mut fee = trade_amount.amount as i128 * options.market_fee_percent as i128
            / FULL_PERCENT as i128;
        if fee > options.max_market_fee as i128 {
            fee = options.max_market_fee as i128;
        }
        Ok(AssetAmount::new(fee as i64, trade_amount.asset_id))
    }

    /// Computes the market fee on `receives` and credits it to the received
    /// asset's accumulated fees. Returns the fee withheld.
    pub(crate) fn pay_market_fees(
        &mut self,
        receives: &AssetAmount,
    ) -> Result<AssetAmount, MarketError> {
        let issuer_fees = self.calculate_market_fee(receives)?;
        debug_assert!(issuer_fees.amount <= receives.amount);

        if issuer_fees.amount > 0 {
            self.store_mut()
                .modify_dynamic_data(receives.asset_id, |data| {
                    data.accumulated_fees += issuer_fees.amount;
                })?;
        }
        Ok(issuer_fees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;

    fn engine_with_fee_asset(percent: u16, max_fee: i64) -> (MarketEngine, AssetId) {
        let mut engine = MarketEngine::new(EngineConfig::default());
        engine.create_asset("RESERVE", AccountId::new(0), AssetOptions::default());
        let asset = engine.create_asset(
            "FEES",
            AccountId::new(0),
            AssetOptions {
                market_fee_percent: percent,
                max_market_fee: max_fee,
                ..AssetOptions::default()
            },
        );
        (engine, asset)
    }

    #[test]
    fn test_market_fee_is_floored() {
        // 2% of 99 = 1.98, floored to 1
        let (engine, asset) = engine_with_fee_asset(200, 1_000);
        let fee = engine
            .calculate_market_fee(&AssetAmount::new(99, asset))
            .unwrap();
        assert_eq!(fee.amount, 1);
    }

    #[test]
    fn test_market_fee_capped() {
        let (engine, asset) = engine_with_fee_asset(1_000, 5);
        let fee = engine
            .calculate_market_fee(&AssetAmount::new(1_000, asset))
            .unwrap();
        assert_eq!(fee.amount, 5);
    }

    #[test]
    fn test_zero_percent_charges_nothing() {
        let (engine, asset) = engine_with_fee_asset(0, 1_000);
        let fee = engine
            .calculate_market_fee(&AssetAmount::new(1_000, asset))
            .unwrap();
        assert!(fee.is_zero());
    }
}
