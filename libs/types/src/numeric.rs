//! Integer share amounts
//!
//! All value in the engine is integer "shares" of some asset. There is no
//! floating point and no decimal type anywhere in the value path; every
//! intermediate that could exceed 64 bits is computed in `i128`.

use crate::errors::ArithmeticError;
use crate::ids::AssetId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Largest share count a single asset may ever have in existence.
pub const MAX_SHARE_SUPPLY: i64 = 1_000_000_000_000_000;

/// Denominator for percentage fields (basis points).
pub const FULL_PERCENT: u16 = 10_000;

/// Denominator for collateral ratio fields (per mille).
pub const COLLATERAL_RATIO_DENOM: u16 = 1_000;

/// A signed quantity of a specific asset.
///
/// Negative amounts appear only as balance deltas; objects in the store
/// always carry non-negative amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetAmount {
    pub amount: i64,
    pub asset_id: AssetId,
}

impl AssetAmount {
    pub fn new(amount: i64, asset_id: AssetId) -> Self {
        Self { amount, asset_id }
    }

    pub fn zero(asset_id: AssetId) -> Self {
        Self { amount: 0, asset_id }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Checked addition within the share-supply cap.
    pub fn checked_add(self, rhs: AssetAmount) -> Result<AssetAmount, ArithmeticError> {
        if self.asset_id != rhs.asset_id {
            return Err(ArithmeticError::AssetMismatch);
        }
        let sum = self
            .amount
            .checked_add(rhs.amount)
            .ok_or(ArithmeticError::Overflow)?;
        if sum > MAX_SHARE_SUPPLY {
            return Err(ArithmeticError::Overflow);
        }
        Ok(AssetAmount::new(sum, self.asset_id))
    }
}

// Same-asset arithmetic. Mixing assets in an operator is a caller bug.
impl Add for AssetAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        assert_eq!(self.asset_id, rhs.asset_id, "asset mismatch in addition");
        Self::new(self.amount + rhs.amount, self.asset_id)
    }
}

impl AddAssign for AssetAmount {
    fn add_assign(&mut self, rhs: Self) {
        assert_eq!(self.asset_id, rhs.asset_id, "asset mismatch in addition");
        self.amount += rhs.amount;
    }
}

impl Sub for AssetAmount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        assert_eq!(self.asset_id, rhs.asset_id, "asset mismatch in subtraction");
        Self::new(self.amount - rhs.amount, self.asset_id)
    }
}

impl SubAssign for AssetAmount {
    fn sub_assign(&mut self, rhs: Self) {
        assert_eq!(self.asset_id, rhs.asset_id, "asset mismatch in subtraction");
        self.amount -= rhs.amount;
    }
}

impl Neg for AssetAmount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.amount, self.asset_id)
    }
}

// Ordering is only defined between amounts of the same asset.
impl PartialOrd for AssetAmount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        debug_assert_eq!(self.asset_id, other.asset_id, "asset mismatch in comparison");
        if self.asset_id != other.asset_id {
            return None;
        }
        Some(self.amount.cmp(&other.amount))
    }
}

impl fmt::Display for AssetAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.asset_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(n: i64) -> AssetAmount {
        AssetAmount::new(n, AssetId::new(1))
    }

    #[test]
    fn test_add_sub() {
        assert_eq!(a(5) + a(7), a(12));
        assert_eq!(a(7) - a(5), a(2));

        let mut x = a(10);
        x += a(1);
        x -= a(4);
        assert_eq!(x, a(7));
    }

    #[test]
    #[should_panic(expected = "asset mismatch")]
    fn test_cross_asset_add_panics() {
        let _ = a(1) + AssetAmount::new(1, AssetId::new(2));
    }

    #[test]
    fn test_comparison() {
        assert!(a(1) < a(2));
        assert!(a(3) >= a(3));
    }

    #[test]
    fn test_checked_add_caps_at_max_supply() {
        let big = AssetAmount::new(MAX_SHARE_SUPPLY, AssetId::new(1));
        assert_eq!(big.checked_add(a(0)).unwrap(), big);
        assert!(big.checked_add(a(1)).is_err());
    }

    #[test]
    fn test_negation() {
        assert_eq!(-a(5), a(-5));
    }
}
