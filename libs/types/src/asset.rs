//! Asset registry objects
//!
//! An asset is either the native reserve, a plain user-issued asset, or a
//! market-issued asset (MIA) collateralized by a backing asset. MIAs carry a
//! `BitassetData` record with the price feed and, after a global settlement,
//! the frozen settlement state. Objects reference each other by id through
//! the store, never by ownership.

use crate::ids::{AccountId, AssetId};
use crate::numeric::{AssetAmount, COLLATERAL_RATIO_DENOM, MAX_SHARE_SUPPLY};
use crate::price::Price;
use serde::{Deserialize, Serialize};

/// Per-asset market parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetOptions {
    /// Market fee in basis points of [`crate::numeric::FULL_PERCENT`],
    /// charged on the asset a taker receives.
    pub market_fee_percent: u16,
    /// Absolute cap on a single market fee, in shares of this asset.
    pub max_market_fee: i64,
    /// Whether trades in this asset pay market fees at all.
    pub charge_market_fee: bool,
    /// Whether collateral bids are accepted while globally settled.
    pub allow_collateral_bidding: bool,
}

impl Default for AssetOptions {
    fn default() -> Self {
        Self {
            market_fee_percent: 0,
            max_market_fee: MAX_SHARE_SUPPLY,
            charge_market_fee: true,
            allow_collateral_bidding: true,
        }
    }
}

/// A registered asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetObject {
    pub id: AssetId,
    pub symbol: String,
    pub issuer: AccountId,
    pub options: AssetOptions,
}

impl AssetObject {
    pub fn amount(&self, amount: i64) -> AssetAmount {
        AssetAmount::new(amount, self.id)
    }
}

/// Supply and fee counters for one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDynamicData {
    pub current_supply: i64,
    /// Market and cancellation fees collected in this asset, owed to the
    /// issuer.
    pub accumulated_fees: i64,
    /// Reserve shares backing fee payments made in this asset.
    pub fee_pool: i64,
}

/// Published price feed for a market-issued asset.
///
/// `settlement_price` is quoted debt / backing. `None` means no valid feed:
/// margin calls and call matching are disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeed {
    pub settlement_price: Option<Price>,
    /// Maintenance collateral ratio, per mille.
    pub maintenance_collateral_ratio: u16,
    /// Maximum short squeeze ratio, per mille.
    pub maximum_short_squeeze_ratio: u16,
}

impl Default for PriceFeed {
    fn default() -> Self {
        Self {
            settlement_price: None,
            maintenance_collateral_ratio: 1750,
            maximum_short_squeeze_ratio: 1100,
        }
    }
}

impl PriceFeed {
    /// The worst price at which margin calls may be matched:
    /// `feed / (mssr / 1000)`, reduced and halved under the supply cap like
    /// [`Price::call_price`]. `None` when there is no valid feed.
    pub fn max_short_squeeze_price(&self) -> Option<Price> {
        let feed = self.settlement_price?;
        let mut numer = feed.base.amount as i128 * COLLATERAL_RATIO_DENOM as i128;
        let mut denom = feed.quote.amount as i128 * self.maximum_short_squeeze_ratio as i128;
        let g = gcd(numer, denom);
        numer /= g;
        denom /= g;
        while numer > MAX_SHARE_SUPPLY as i128 || denom > MAX_SHARE_SUPPLY as i128 {
            numer = (numer >> 1) + 1;
            denom = (denom >> 1) + 1;
        }
        Some(Price::new(
            AssetAmount::new(numer as i64, feed.base.asset_id),
            AssetAmount::new(denom as i64, feed.quote.asset_id),
        ))
    }
}

/// Options fixed when a market-issued asset is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitassetOptions {
    /// The asset call orders post as collateral.
    pub backing_asset: AssetId,
}

/// Mutable market state of a market-issued asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitassetData {
    pub asset_id: AssetId,
    pub options: BitassetOptions,
    pub current_feed: PriceFeed,
    /// `Some` exactly while globally settled. Quoted `supply / collateral
    /// gathered`, i.e. debt per unit of backing — the *inverse* of the feed
    /// direction. Redemption against the fund multiplies a settled balance
    /// by this price directly.
    pub settlement_price: Option<Price>,
    /// Backing shares pooled at global settlement, drawn down by individual
    /// redemptions.
    pub settlement_fund: i64,
    /// Prediction markets never margin-call and never revive.
    pub is_prediction_market: bool,
}

impl BitassetData {
    pub fn new(asset_id: AssetId, backing_asset: AssetId, is_prediction_market: bool) -> Self {
        Self {
            asset_id,
            options: BitassetOptions { backing_asset },
            current_feed: PriceFeed::default(),
            settlement_price: None,
            settlement_fund: 0,
            is_prediction_market,
        }
    }

    pub fn has_settlement(&self) -> bool {
        self.settlement_price.is_some()
    }
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(base: i64, quote: i64, mssr: u16) -> PriceFeed {
        PriceFeed {
            settlement_price: Some(
                AssetAmount::new(base, AssetId::new(1)) / AssetAmount::new(quote, AssetId::RESERVE),
            ),
            maintenance_collateral_ratio: 1750,
            maximum_short_squeeze_ratio: mssr,
        }
    }

    #[test]
    fn test_max_short_squeeze_price() {
        // feed 10/1, MSSR 1.1 => 10 * 1000 / 1100 = 100 / 11
        let mssp = feed(10, 1, 1100).max_short_squeeze_price().unwrap();
        assert_eq!(mssp.base.amount, 100);
        assert_eq!(mssp.quote.amount, 11);
        assert_eq!(mssp.pair(), (AssetId::new(1), AssetId::RESERVE));
    }

    #[test]
    fn test_max_short_squeeze_price_is_below_feed() {
        let f = feed(7, 3, 1100);
        let mssp = f.max_short_squeeze_price().unwrap();
        assert!(mssp < f.settlement_price.unwrap());
    }

    #[test]
    fn test_no_feed_no_squeeze_price() {
        assert_eq!(PriceFeed::default().max_short_squeeze_price(), None);
    }

    #[test]
    fn test_has_settlement() {
        let mut data = BitassetData::new(AssetId::new(1), AssetId::RESERVE, false);
        assert!(!data.has_settlement());

        data.settlement_price = Some(
            AssetAmount::new(1, AssetId::new(1)) / AssetAmount::new(2, AssetId::RESERVE),
        );
        assert!(data.has_settlement());
    }
}
