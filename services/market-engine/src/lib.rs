//! Market matching and collateral engine
//!
//! The single-writer core of the exchange: order insertion, pairwise
//! matching, margin calls against a price feed, black-swan global
//! settlement, and revival via collateral bids. Every operation is
//! deterministic, integer-exact, and transactional — it either commits
//! fully or the store rolls back to the pre-call state.
//!
//! # Modules
//! - `store`: in-memory transactional object store with ordered indexes
//! - `events`: applied-operation records consumed by downstream observers
//! - `engine`: the [`MarketEngine`] orchestrator and limit-order application
//! - `matching`: pairwise matchers returning the two-bit fill code
//! - `fill`: per-order-kind fill application
//! - `fees`: market-fee computation and capture
//! - `calls`: the margin-call sweep
//! - `settlement`: global settlement, collateral bids, and revival

pub mod calls;
pub mod engine;
pub mod events;
pub mod fees;
pub mod fill;
pub mod matching;
pub mod settlement;
pub mod store;

pub use engine::{EngineConfig, MarketEngine, PlaceOrderResult, SettleOutcome};
pub use events::AppliedOperation;
pub use store::{Checkpoint, Store};
