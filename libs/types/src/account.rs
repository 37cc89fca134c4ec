//! Account statistics
//!
//! Per-account counters the engine maintains alongside the balance ledger.
//! `total_reserve_in_orders` tracks reserve shares locked in limit orders
//! and call-order collateral, so balance-conservation checks can account for
//! value that is neither in a balance nor in a fee bucket.

use crate::ids::AccountId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatistics {
    pub owner: AccountId,
    /// Reserve shares currently locked in this account's orders.
    pub total_reserve_in_orders: i64,
    /// Fees paid, pending transfer to the network.
    pub pending_fees: i64,
    /// Fees small enough to vest immediately instead of entering cashback.
    pub pending_vested_fees: i64,
    pub lifetime_fees_paid: i64,
}

impl AccountStatistics {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            total_reserve_in_orders: 0,
            pending_fees: 0,
            pending_vested_fees: 0,
            lifetime_fees_paid: 0,
        }
    }

    /// Records a reserve fee payment. Fees above `vesting_threshold` enter
    /// the cashback-vesting bucket, smaller ones vest immediately.
    pub fn pay_fee(&mut self, amount: i64, vesting_threshold: i64) {
        debug_assert!(amount >= 0);
        if amount > vesting_threshold {
            self.pending_fees += amount;
        } else {
            self.pending_vested_fees += amount;
        }
        self.lifetime_fees_paid += amount;
    }

    /// Total fees held by this record, regardless of vesting bucket.
    pub fn fees_accrued(&self) -> i64 {
        self.pending_fees + self.pending_vested_fees
    }
}
