//! Fee schedule
//!
//! The engine consults the schedule for exactly one fee: the charge for
//! cancelling a limit order, quoted in the reserve asset. Submission fees
//! are collected by the outer operation frame and travel with the order as
//! deferred fees.

use crate::ids::AssetId;
use crate::numeric::AssetAmount;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Flat cancellation fee in reserve shares.
    pub limit_order_cancel: i64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self { limit_order_cancel: 0 }
    }
}

impl FeeSchedule {
    /// Fee for a limit-order cancellation. Always reserve-denominated; the
    /// caller prorates it into the originally-paid asset where needed.
    pub fn limit_order_cancel_fee(&self) -> AssetAmount {
        AssetAmount::new(self.limit_order_cancel, AssetId::RESERVE)
    }
}
