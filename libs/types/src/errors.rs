//! Error taxonomy
//!
//! Two layers: [`ArithmeticError`] for the value-path primitives, and
//! [`MarketError`] for engine operations. A black swan is a typed error so
//! the evaluator frame can distinguish "trigger global settlement" from a
//! plain precondition failure.

use crate::ids::{AccountId, AssetId};
use thiserror::Error;

/// Failures of the exact-ratio arithmetic primitives.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("result exceeds the maximum share supply")]
    Overflow,

    #[error("asset does not match either side of the price")]
    AssetMismatch,

    #[error("price has a non-positive amount on the divided side")]
    NonPositiveAmount,
}

/// Engine operation errors.
///
/// Every engine entry point runs inside an undo session; any of these
/// aborts the operation and restores the pre-call state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),

    /// Collateral is insufficient system-wide to honor a required payout.
    /// Callers that opted into global settlement never observe this.
    #[error("black swan: insufficient collateral to honor required payout for {0}")]
    BlackSwan(AssetId),

    #[error("{account} holds {available} of {asset}, needs {required}")]
    InsufficientBalance {
        account: AccountId,
        asset: AssetId,
        required: i64,
        available: i64,
    },

    #[error("{kind} {id} does not exist")]
    NotFound { kind: &'static str, id: u64 },

    #[error("{0} is not market-issued")]
    NotMarketIssued(AssetId),

    #[error("{0} is already globally settled")]
    AlreadySettled(AssetId),

    #[error("{0} is not globally settled")]
    NotSettled(AssetId),

    #[error("{0} has no valid price feed")]
    NoPriceFeed(AssetId),

    #[error("{0} is a prediction market")]
    PredictionMarket(AssetId),

    #[error("invalid operation: {0}")]
    Invalid(&'static str),

    #[error("store invariant violated: {0}")]
    Invariant(&'static str),
}

impl MarketError {
    pub fn not_found(kind: &'static str, id: u64) -> Self {
        Self::NotFound { kind, id }
    }
}
