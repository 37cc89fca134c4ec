//! Unique identifier types for engine entities
//!
//! All ids are plain integers assigned sequentially by the object store, so
//! two replicas replaying the same operations assign identical ids. Nothing
//! here embeds wall-clock time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an asset.
///
/// The reserve asset always has id zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(u32);

impl AssetId {
    /// The native reserve asset.
    pub const RESERVE: AssetId = AssetId(0);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Whether this is the native reserve asset.
    pub const fn is_reserve(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset#{}", self.0)
    }
}

/// Unique identifier for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(u64);

impl AccountId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account#{}", self.0)
    }
}

macro_rules! order_id_type {
    ($(#[$doc:meta])* $name:ident, $tag:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, "#{}"), self.0)
            }
        }
    };
}

order_id_type!(
    /// Unique identifier for a limit order.
    LimitOrderId,
    "limit"
);
order_id_type!(
    /// Unique identifier for a call order (short position).
    CallOrderId,
    "call"
);
order_id_type!(
    /// Unique identifier for a forced-settlement order.
    SettlementId,
    "settlement"
);
order_id_type!(
    /// Unique identifier for a collateral bid.
    BidId,
    "bid"
);
