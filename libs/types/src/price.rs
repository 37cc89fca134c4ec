//! Exact ratio prices
//!
//! A price is the exact ratio between two asset quantities, `base / quote`.
//! Prices are never reduced to a scalar: comparison uses 128-bit
//! cross-multiplication and conversion truncates toward zero, so every
//! replica computes bit-identical results.
//!
//! Prices whose `(base, quote)` asset pairs differ are not economically
//! comparable; the total order sorts by the pair first so that mixed-market
//! index keys stay grouped.

use crate::errors::ArithmeticError;
use crate::ids::AssetId;
use crate::numeric::{AssetAmount, COLLATERAL_RATIO_DENOM, MAX_SHARE_SUPPLY};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Div;

/// The ratio of two asset quantities, `base / quote`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Price {
    pub base: AssetAmount,
    pub quote: AssetAmount,
}

impl Price {
    pub fn new(base: AssetAmount, quote: AssetAmount) -> Self {
        Self { base, quote }
    }

    /// The smallest representable price in the `base / quote` direction.
    pub fn min_for(base: AssetId, quote: AssetId) -> Self {
        Self::new(
            AssetAmount::new(1, base),
            AssetAmount::new(MAX_SHARE_SUPPLY, quote),
        )
    }

    /// The largest representable price in the `base / quote` direction.
    pub fn max_for(base: AssetId, quote: AssetId) -> Self {
        Self::new(
            AssetAmount::new(MAX_SHARE_SUPPLY, base),
            AssetAmount::new(1, quote),
        )
    }

    /// The inverted price, `quote / base`.
    pub fn invert(self) -> Self {
        Self::new(self.quote, self.base)
    }

    /// The `(base, quote)` asset pair this price belongs to.
    pub fn pair(&self) -> (AssetId, AssetId) {
        (self.base.asset_id, self.quote.asset_id)
    }

    /// A price usable for matching: positive amounts within the supply cap
    /// on both sides, distinct assets.
    pub fn validate(&self) -> Result<(), ArithmeticError> {
        if self.base.asset_id == self.quote.asset_id {
            return Err(ArithmeticError::AssetMismatch);
        }
        if self.base.amount <= 0 || self.quote.amount <= 0 {
            return Err(ArithmeticError::NonPositiveAmount);
        }
        if self.base.amount > MAX_SHARE_SUPPLY || self.quote.amount > MAX_SHARE_SUPPLY {
            return Err(ArithmeticError::Overflow);
        }
        Ok(())
    }

    /// The price at which a short position with the given debt and
    /// collateral becomes subject to margin call, for a maintenance
    /// collateral ratio in units of [`COLLATERAL_RATIO_DENOM`].
    ///
    /// The ratio `debt * mcr / (collateral * 1000)` is normalized by gcd and
    /// halved (rounding up) until both sides fit the share-supply cap, then
    /// inverted so the result is quoted `collateral / debt` like the
    /// `by_price` index expects: the least-collateralized position sorts
    /// first.
    pub fn call_price(debt: AssetAmount, collateral: AssetAmount, mcr: u16) -> Self {
        debug_assert!(debt.amount > 0 && collateral.amount > 0);
        let mut numer = debt.amount as i128 * mcr as i128;
        let mut denom = collateral.amount as i128 * COLLATERAL_RATIO_DENOM as i128;
        let g = gcd(numer, denom);
        numer /= g;
        denom /= g;
        while numer > MAX_SHARE_SUPPLY as i128 || denom > MAX_SHARE_SUPPLY as i128 {
            numer = (numer >> 1) + 1;
            denom = (denom >> 1) + 1;
        }
        Self::new(
            AssetAmount::new(denom as i64, collateral.asset_id),
            AssetAmount::new(numer as i64, debt.asset_id),
        )
    }
}

// Total order: asset pair first (keeps index groups contiguous), then the
// cross-multiplied ratio. Equality means equal ratio, not equal encoding:
// 2/4 == 1/2.
impl Ord for Price {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pair().cmp(&other.pair()).then_with(|| {
            let lhs = self.base.amount as i128 * other.quote.amount as i128;
            let rhs = other.base.amount as i128 * self.quote.amount as i128;
            lhs.cmp(&rhs)
        })
    }
}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Price {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Price {}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.base, self.quote)
    }
}

/// Constructs the exact price `base / quote` from two quantities.
impl Div for AssetAmount {
    type Output = Price;

    fn div(self, rhs: AssetAmount) -> Price {
        assert_ne!(self.asset_id, rhs.asset_id, "price requires distinct assets");
        assert!(rhs.amount > 0, "price requires a positive quote amount");
        assert!(self.amount >= 0, "price requires a non-negative base amount");
        Price::new(self, rhs)
    }
}

impl AssetAmount {
    /// Converts this quantity to the opposite side of `price`.
    ///
    /// The multiplication is carried out in 128 bits and truncates toward
    /// zero. Callers choose the direction so the truncation always favors
    /// the maker.
    pub fn times(&self, price: &Price) -> Result<AssetAmount, ArithmeticError> {
        if self.asset_id == price.base.asset_id {
            if price.base.amount <= 0 {
                return Err(ArithmeticError::NonPositiveAmount);
            }
            let result =
                self.amount as i128 * price.quote.amount as i128 / price.base.amount as i128;
            if result > MAX_SHARE_SUPPLY as i128 {
                return Err(ArithmeticError::Overflow);
            }
            Ok(AssetAmount::new(result as i64, price.quote.asset_id))
        } else if self.asset_id == price.quote.asset_id {
            if price.quote.amount <= 0 {
                return Err(ArithmeticError::NonPositiveAmount);
            }
            let result =
                self.amount as i128 * price.base.amount as i128 / price.quote.amount as i128;
            if result > MAX_SHARE_SUPPLY as i128 {
                return Err(ArithmeticError::Overflow);
            }
            Ok(AssetAmount::new(result as i64, price.base.asset_id))
        } else {
            Err(ArithmeticError::AssetMismatch)
        }
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
    use proptest::prelude::*;

    const A: AssetId = AssetId::RESERVE;

    fn b() -> AssetId {
        AssetId::new(1)
    }

    fn amt(n: i64, id: AssetId) -> AssetAmount {
        AssetAmount::new(n, id)
    }

    fn p(base: i64, quote: i64) -> Price {
        amt(base, A) / amt(quote, b())
    }

    #[test]
    fn test_ordering_cross_multiplies() {
        // 1/2 < 2/3 < 1/1
        assert!(p(1, 2) < p(2, 3));
        assert!(p(2, 3) < p(1, 1));
        assert_eq!(p(2, 4), p(1, 2));
    }

    #[test]
    fn test_ordering_groups_by_pair() {
        let other = amt(1, AssetId::new(2)) / amt(1, AssetId::new(3));
        assert!(p(1_000_000, 1) < other);
    }

    #[test]
    fn test_min_max_bound_the_direction() {
        let lo = Price::min_for(A, b());
        let hi = Price::max_for(A, b());
        assert!(lo < p(1, 3));
        assert!(p(1_000_000, 1) <= hi);
    }

    #[test]
    fn test_invert() {
        let q = p(3, 7).invert();
        assert_eq!(q.base, amt(7, b()));
        assert_eq!(q.quote, amt(3, A));
    }

    #[test]
    fn test_times_truncates_toward_zero() {
        // 100 A at 11 A / 100 B => 909.09.. B, truncated to 909
        let price = amt(11, A) / amt(100, b());
        let out = amt(100, A).times(&price).unwrap();
        assert_eq!(out, amt(909, b()));

        // converting the opposite side uses the other ratio direction
        let back = amt(909, b()).times(&price).unwrap();
        assert_eq!(back, amt(99, A));
    }

    #[test]
    fn test_times_rejects_foreign_asset() {
        let price = p(1, 2);
        let foreign = amt(10, AssetId::new(9));
        assert!(matches!(
            foreign.times(&price),
            Err(ArithmeticError::AssetMismatch)
        ));
    }

    #[test]
    fn test_times_rejects_supply_overflow() {
        let price = amt(1, A) / amt(MAX_SHARE_SUPPLY, b());
        assert!(amt(2, A).times(&price).is_err());
    }

    #[test]
    fn test_call_price_direction() {
        // debt 100 A, collateral 20 B, MCR 1.75: trigger ratio is
        // collateral / (debt * 1.75) = 20 B / 175 A, reduced to 4 / 35.
        let cp = Price::call_price(amt(100, A), amt(20, b()), 1750);
        assert_eq!(cp.base, amt(4, b()));
        assert_eq!(cp.quote, amt(35, A));
    }

    #[test]
    fn test_call_price_orders_by_collateralization() {
        // Less collateral per unit of debt sorts first.
        let thin = Price::call_price(amt(100, A), amt(150, b()), 1750);
        let fat = Price::call_price(amt(100, A), amt(400, b()), 1750);
        assert!(thin < fat);
    }

    #[test]
    fn test_call_price_reduces_oversized_ratios() {
        let cp = Price::call_price(
            amt(MAX_SHARE_SUPPLY, A),
            amt(MAX_SHARE_SUPPLY - 1, b()),
            1750,
        );
        assert!(cp.base.amount <= MAX_SHARE_SUPPLY);
        assert!(cp.quote.amount <= MAX_SHARE_SUPPLY);
        cp.validate().unwrap();
    }

    #[test]
    fn test_validate() {
        assert!(p(1, 2).validate().is_ok());
        assert!(Price::new(amt(0, A), amt(2, b())).validate().is_err());
        assert!(Price::new(amt(1, A), amt(1, A)).validate().is_err());
    }

    proptest! {
        /// Truncation never manufactures value: converting a quantity to the
        /// other side of the ratio and back can only shrink it.
        #[test]
        fn prop_round_trip_never_gains(
            amount in 1i64..1_000_000_000,
            base in 1i64..1_000_000,
            quote in 1i64..1_000_000,
        ) {
            let price = amt(base, A) / amt(quote, b());
            let there = amt(amount, A).times(&price).unwrap();
            let back = there.times(&price).unwrap();
            prop_assert!(back.amount <= amount);
        }

        /// Cross-multiplied ordering agrees with exact rational ordering.
        #[test]
        fn prop_ordering_matches_rationals(
            b1 in 1i64..1_000_000, q1 in 1i64..1_000_000,
            b2 in 1i64..1_000_000, q2 in 1i64..1_000_000,
        ) {
            let lhs = p(b1, q1);
            let rhs = p(b2, q2);
            let expected = (b1 as i128 * q2 as i128).cmp(&(b2 as i128 * q1 as i128));
            prop_assert_eq!(lhs.cmp(&rhs), expected);
        }
    }
}
