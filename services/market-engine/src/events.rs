//! Applied-operation records
//!
//! Matching never returns trade data to its caller; instead every
//! user-visible effect appends a record here, in the exact order it was
//! produced. Downstream observers replaying the stream reconstruct
//! identical state.

use serde::{Deserialize, Serialize};
use types::ids::{AccountId, BidId, CallOrderId, LimitOrderId, SettlementId};
use types::numeric::AssetAmount;
use types::price::Price;

/// Which order an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderRef {
    Limit(LimitOrderId),
    Call(CallOrderId),
    Settlement(SettlementId),
}

/// One side of a pairwise fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillOrderRecord {
    pub order: OrderRef,
    pub owner: AccountId,
    pub pays: AssetAmount,
    pub receives: AssetAmount,
    /// Market fee deducted from `receives` before crediting the owner.
    pub fee: AssetAmount,
    pub fill_price: Price,
    pub is_maker: bool,
}

/// A limit order left the book without filling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrderCancelRecord {
    pub order: LimitOrderId,
    pub fee_paying_account: AccountId,
    /// Cancellation fee actually charged, in the asset it was charged in.
    pub fee: AssetAmount,
}

/// A forced-settlement order was cancelled and its balance refunded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSettleCancelRecord {
    pub settlement: SettlementId,
    pub account: AccountId,
    pub amount: AssetAmount,
}

/// A collateral bid was created or refunded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidCollateralRecord {
    pub bid: BidId,
    pub bidder: AccountId,
    pub additional_collateral: AssetAmount,
    /// Zero when the record represents a refund.
    pub debt_covered: AssetAmount,
}

/// A collateral bid became a call order during revival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteBidRecord {
    pub bidder: AccountId,
    pub debt: AssetAmount,
    pub collateral: AssetAmount,
}

/// The applied-operation stream element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppliedOperation {
    FillOrder(FillOrderRecord),
    LimitOrderCancel(LimitOrderCancelRecord),
    AssetSettleCancel(AssetSettleCancelRecord),
    BidCollateral(BidCollateralRecord),
    ExecuteBid(ExecuteBidRecord),
}

impl AppliedOperation {
    /// Convenience accessor for tests and observers that only care about
    /// fills.
    pub fn as_fill(&self) -> Option<&FillOrderRecord> {
        match self {
            AppliedOperation::FillOrder(record) => Some(record),
            _ => None,
        }
    }
}
