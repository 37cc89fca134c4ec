//! Limit-order matching, fee accounting, and cancellation behavior against
//! the public engine API.

use market_engine::events::{AppliedOperation, OrderRef};
use market_engine::{EngineConfig, MarketEngine};
use types::prelude::*;

const ALICE: AccountId = AccountId::new(1);
const BOB: AccountId = AccountId::new(2);
const ISSUER: AccountId = AccountId::new(9);

struct MarketFixture {
    engine: MarketEngine,
    reserve: AssetId,
    asset_a: AssetId,
}

fn market_fixture(config: EngineConfig) -> MarketFixture {
    let mut engine = MarketEngine::new(config);
    let reserve = engine.create_asset("CORE", ISSUER, AssetOptions::default());
    assert!(reserve.is_reserve());
    let asset_a = engine.create_asset("ALPHA", ISSUER, AssetOptions::default());

    engine.deposit(ALICE, AssetAmount::new(1_000_000, reserve)).unwrap();
    engine.deposit(BOB, AssetAmount::new(1_000_000, reserve)).unwrap();
    engine.deposit(ALICE, AssetAmount::new(1_000_000, asset_a)).unwrap();
    engine.deposit(BOB, AssetAmount::new(1_000_000, asset_a)).unwrap();

    MarketFixture { engine, reserve, asset_a }
}

fn no_fee() -> AssetAmount {
    AssetAmount::zero(AssetId::RESERVE)
}

fn fills(engine: &MarketEngine) -> Vec<&market_engine::events::FillOrderRecord> {
    engine
        .store()
        .applied()
        .iter()
        .filter_map(|op| op.as_fill())
        .collect()
}

#[test]
fn test_full_match_at_equal_price() {
    let MarketFixture { mut engine, reserve, asset_a } =
        market_fixture(EngineConfig::default());

    // Ask: 100 ALPHA for 11 CORE. Rests on the book.
    let ask = engine
        .place_limit_order(
            ALICE,
            AssetAmount::new(100, asset_a),
            AssetAmount::new(11, reserve),
            0,
            no_fee(),
        )
        .unwrap();
    assert!(!ask.consumed);

    // Bid: 11 CORE for 100 ALPHA. Matches completely.
    let bid = engine
        .place_limit_order(
            BOB,
            AssetAmount::new(11, reserve),
            AssetAmount::new(100, asset_a),
            0,
            no_fee(),
        )
        .unwrap();
    assert!(bid.consumed);

    assert_eq!(engine.store().balance(ALICE, reserve), 1_000_011);
    assert_eq!(engine.store().balance(ALICE, asset_a), 999_900);
    assert_eq!(engine.store().balance(BOB, reserve), 999_989);
    assert_eq!(engine.store().balance(BOB, asset_a), 1_000_100);
    assert_eq!(engine.store().limit_orders().count(), 0);

    let fills = fills(&engine);
    assert_eq!(fills.len(), 2);
    // Taker first, then maker, in emission order.
    assert!(!fills[0].is_maker);
    assert!(fills[1].is_maker);
    assert_eq!(fills[1].order, OrderRef::Limit(ask.order_id));
}

#[test]
fn test_partial_fill_at_maker_price() {
    let MarketFixture { mut engine, reserve, asset_a } =
        market_fixture(EngineConfig::default());

    // Ask: 100 ALPHA at 0.1 CORE each.
    let ask = engine
        .place_limit_order(
            ALICE,
            AssetAmount::new(100, asset_a),
            AssetAmount::new(10, reserve),
            0,
            no_fee(),
        )
        .unwrap();

    // Bid: 4 CORE for 32 ALPHA (0.125 each): fills at the maker's 0.1.
    let bid = engine
        .place_limit_order(
            BOB,
            AssetAmount::new(4, reserve),
            AssetAmount::new(32, asset_a),
            0,
            no_fee(),
        )
        .unwrap();
    assert!(bid.consumed);

    // Taker paid 4 CORE and received 40 ALPHA at the better price.
    assert_eq!(engine.store().balance(BOB, asset_a), 1_000_040);
    assert_eq!(engine.store().balance(BOB, reserve), 999_996);

    // The ask remains with 60 ALPHA still for sale.
    let rest = engine.store().limit_order(ask.order_id).unwrap();
    assert_eq!(rest.for_sale, 60);
}

#[test]
fn test_no_cross_rests_both() {
    let MarketFixture { mut engine, reserve, asset_a } =
        market_fixture(EngineConfig::default());

    engine
        .place_limit_order(
            ALICE,
            AssetAmount::new(100, asset_a),
            AssetAmount::new(20, reserve),
            0,
            no_fee(),
        )
        .unwrap();
    // Bid below the ask: 0.1 < 0.2, no match.
    let bid = engine
        .place_limit_order(
            BOB,
            AssetAmount::new(10, reserve),
            AssetAmount::new(100, asset_a),
            0,
            no_fee(),
        )
        .unwrap();
    assert!(!bid.consumed);
    assert_eq!(engine.store().limit_orders().count(), 2);
    assert!(fills(&engine).is_empty());
}

#[test]
fn test_only_front_of_book_matches() {
    let MarketFixture { mut engine, reserve, asset_a } =
        market_fixture(EngineConfig::default());

    // Two asks; the second is behind the first in the book, so a bid that
    // crosses both still fills against the cheaper one first.
    engine
        .place_limit_order(
            ALICE,
            AssetAmount::new(100, asset_a),
            AssetAmount::new(10, reserve),
            0,
            no_fee(),
        )
        .unwrap();
    let back = engine
        .place_limit_order(
            ALICE,
            AssetAmount::new(100, asset_a),
            AssetAmount::new(15, reserve),
            0,
            no_fee(),
        )
        .unwrap();
    assert!(!back.consumed);

    let bid = engine
        .place_limit_order(
            BOB,
            AssetAmount::new(25, reserve),
            AssetAmount::new(125, asset_a),
            0,
            no_fee(),
        )
        .unwrap();
    assert!(bid.consumed);

    // 10 CORE bought the whole first ask (100 ALPHA); the remaining
    // 15 CORE bought 100 ALPHA of the second at 0.15.
    assert_eq!(engine.store().balance(BOB, asset_a), 1_000_200);
    assert_eq!(engine.store().limit_orders().count(), 0);
}

#[test]
fn test_matching_continues_only_on_maker_fill() {
    let MarketFixture { mut engine, reserve, asset_a } =
        market_fixture(EngineConfig::default());

    // Small asks stacked at the same price.
    for _ in 0..3 {
        engine
            .place_limit_order(
                ALICE,
                AssetAmount::new(10, asset_a),
                AssetAmount::new(1, reserve),
                0,
                no_fee(),
            )
            .unwrap();
    }

    // A taker bigger than the first ask but smaller than all three keeps
    // matching while makers fill, then rests.
    let bid = engine
        .place_limit_order(
            BOB,
            AssetAmount::new(25, reserve),
            AssetAmount::new(250, asset_a),
            0,
            no_fee(),
        )
        .unwrap();
    assert!(!bid.consumed);

    // All three asks were consumed (30 ALPHA), and 22 CORE of the bid
    // remains on the book: each ask cost 1 CORE... each fill pays the ask
    // price exactly.
    assert_eq!(engine.store().balance(BOB, asset_a), 1_000_030);
    let rest = engine.store().limit_order(bid.order_id).unwrap();
    assert_eq!(rest.for_sale, 22);
}

#[test]
fn test_market_fee_charged_on_received_asset() {
    let mut engine = MarketEngine::new(EngineConfig::default());
    let reserve = engine.create_asset("CORE", ISSUER, AssetOptions::default());
    // 2% market fee on ALPHA, charged to whoever receives ALPHA.
    let asset_a = engine.create_asset(
        "ALPHA",
        ISSUER,
        AssetOptions {
            market_fee_percent: 200,
            max_market_fee: 1_000_000,
            ..AssetOptions::default()
        },
    );
    engine.deposit(ALICE, AssetAmount::new(1_000, asset_a)).unwrap();
    engine.deposit(BOB, AssetAmount::new(1_000, reserve)).unwrap();

    engine
        .place_limit_order(
            ALICE,
            AssetAmount::new(100, asset_a),
            AssetAmount::new(10, reserve),
            0,
            no_fee(),
        )
        .unwrap();
    engine
        .place_limit_order(
            BOB,
            AssetAmount::new(10, reserve),
            AssetAmount::new(100, asset_a),
            0,
            no_fee(),
        )
        .unwrap();

    // Bob received 100 ALPHA minus the 2% fee.
    assert_eq!(engine.store().balance(BOB, asset_a), 98);
    assert_eq!(engine.store().dynamic_data(asset_a).unwrap().accumulated_fees, 2);
    // Alice's CORE proceeds carry no fee (CORE charges none).
    assert_eq!(engine.store().balance(ALICE, reserve), 10);

    let fee_record = engine
        .store()
        .applied()
        .iter()
        .filter_map(|op| op.as_fill())
        .find(|fill| fill.receives.asset_id == asset_a)
        .unwrap();
    assert_eq!(fee_record.fee.amount, 2);
}

#[test]
fn test_cancel_restores_balance_exactly() {
    let MarketFixture { mut engine, reserve, asset_a } =
        market_fixture(EngineConfig::default());

    let before = engine.store().balance(ALICE, asset_a);
    let placed = engine
        .place_limit_order(
            ALICE,
            AssetAmount::new(500, asset_a),
            AssetAmount::new(100, reserve),
            0,
            no_fee(),
        )
        .unwrap();
    assert_eq!(engine.store().balance(ALICE, asset_a), before - 500);

    engine.cancel_limit_order(placed.order_id).unwrap();
    assert_eq!(engine.store().balance(ALICE, asset_a), before);
    assert!(engine.store().find_limit_order(placed.order_id).is_none());

    let cancels: Vec<_> = engine
        .store()
        .applied()
        .iter()
        .filter(|op| matches!(op, AppliedOperation::LimitOrderCancel(_)))
        .collect();
    assert_eq!(cancels.len(), 1);
}

#[test]
fn test_cancel_reserve_fee_refund() {
    let config = EngineConfig {
        fee_schedule: FeeSchedule { limit_order_cancel: 3 },
        ..EngineConfig::default()
    };
    let MarketFixture { mut engine, reserve, asset_a } = market_fixture(config);

    // Reserve-only bookkeeping: 10 CORE deferred fee travels with the
    // order; cancellation keeps 3 as the cancel fee and refunds 7.
    let reserve_before = engine.store().balance(ALICE, reserve);
    let placed = engine
        .place_limit_order(
            ALICE,
            AssetAmount::new(100, asset_a),
            AssetAmount::new(10, reserve),
            10,
            no_fee(),
        )
        .unwrap();
    assert_eq!(engine.store().balance(ALICE, reserve), reserve_before - 10);

    engine.cancel_limit_order(placed.order_id).unwrap();
    assert_eq!(engine.store().balance(ALICE, reserve), reserve_before - 3);
    let stats = engine.store().statistics(ALICE).unwrap();
    assert_eq!(stats.fees_accrued(), 3);
}

#[test]
fn test_cancel_prorates_fee_paid_in_other_asset() {
    let config = EngineConfig {
        fee_schedule: FeeSchedule { limit_order_cancel: 3 },
        ..EngineConfig::default()
    };
    let mut engine = MarketEngine::new(config);
    let reserve = engine.create_asset("CORE", ISSUER, AssetOptions::default());
    let asset_a = engine.create_asset("ALPHA", ISSUER, AssetOptions::default());
    let asset_x = engine.create_asset("XRAY", ISSUER, AssetOptions::default());

    engine.deposit(ALICE, AssetAmount::new(100, asset_a)).unwrap();
    engine.deposit(ALICE, AssetAmount::new(10, asset_x)).unwrap();
    engine.deposit(ISSUER, AssetAmount::new(100, reserve)).unwrap();
    engine.fund_fee_pool(ISSUER, asset_x, 10).unwrap();

    // Order fee: 10 XRAY units, reserve equivalent 10 (from XRAY's pool).
    let placed = engine
        .place_limit_order(
            ALICE,
            AssetAmount::new(100, asset_a),
            AssetAmount::new(10, reserve),
            10,
            AssetAmount::new(10, asset_x),
        )
        .unwrap();
    assert_eq!(engine.store().balance(ALICE, asset_x), 0);
    assert_eq!(engine.store().dynamic_data(asset_x).unwrap().fee_pool, 0);

    engine.cancel_limit_order(placed.order_id).unwrap();

    // Cancel fee 3 (reserve) prorated into XRAY: ceil(10 * 3 / 10) = 3.
    // Alice gets 7 XRAY back; the asset keeps 3 XRAY as accumulated fees
    // and recovers 7 reserve into its pool.
    assert_eq!(engine.store().balance(ALICE, asset_x), 7);
    assert_eq!(engine.store().balance(ALICE, asset_a), 100);
    let x_data = engine.store().dynamic_data(asset_x).unwrap();
    assert_eq!(x_data.accumulated_fees, 3);
    assert_eq!(x_data.fee_pool, 7);
    assert_eq!(engine.store().statistics(ALICE).unwrap().fees_accrued(), 3);
}

#[test]
fn test_dust_maker_is_culled_with_refund() {
    let MarketFixture { mut engine, reserve, asset_a } =
        market_fixture(EngineConfig::default());

    let alpha_before = engine.store().balance(ALICE, asset_a);
    // Ask 301 ALPHA for 2 CORE. Two 1-CORE takers leave it with 1 ALPHA,
    // whose receivable rounds to zero.
    engine
        .place_limit_order(
            ALICE,
            AssetAmount::new(301, asset_a),
            AssetAmount::new(2, reserve),
            0,
            no_fee(),
        )
        .unwrap();
    for _ in 0..2 {
        engine
            .place_limit_order(
                BOB,
                AssetAmount::new(1, reserve),
                AssetAmount::new(100, asset_a),
                0,
                no_fee(),
            )
            .unwrap();
    }

    // The dust remainder was refunded, not sold.
    assert_eq!(engine.store().limit_orders().count(), 0);
    assert_eq!(engine.store().balance(ALICE, asset_a), alpha_before - 300);
    assert_eq!(engine.store().balance(ALICE, reserve), 1_000_002);

    // The cull shows up as a cancellation, not a fill.
    let cancels = engine
        .store()
        .applied()
        .iter()
        .filter(|op| matches!(op, AppliedOperation::LimitOrderCancel(_)))
        .count();
    assert_eq!(cancels, 1);
    assert_eq!(fills(&engine).len(), 4);
}

#[test]
fn test_dust_cull_charges_no_cancel_fee() {
    // A partially filled order has already flushed its deferred fee, so
    // the cull-time cancellation fee caps at zero even when the schedule
    // charges for cancellations.
    let config = EngineConfig {
        fee_schedule: FeeSchedule { limit_order_cancel: 3 },
        ..EngineConfig::default()
    };
    let MarketFixture { mut engine, reserve, asset_a } = market_fixture(config);

    let reserve_before = engine.store().balance(ALICE, reserve);
    engine
        .place_limit_order(
            ALICE,
            AssetAmount::new(301, asset_a),
            AssetAmount::new(2, reserve),
            10,
            no_fee(),
        )
        .unwrap();
    for _ in 0..2 {
        engine
            .place_limit_order(
                BOB,
                AssetAmount::new(1, reserve),
                AssetAmount::new(100, asset_a),
                0,
                no_fee(),
            )
            .unwrap();
    }

    assert_eq!(engine.store().limit_orders().count(), 0);
    // -10 submission fee (charged on first fill), +2 sale proceeds; the
    // cull itself took nothing.
    assert_eq!(engine.store().balance(ALICE, reserve), reserve_before - 8);
    assert_eq!(engine.store().statistics(ALICE).unwrap().fees_accrued(), 10);
}

#[test]
fn test_failed_operation_rolls_back() {
    let MarketFixture { mut engine, reserve, asset_a } =
        market_fixture(EngineConfig::default());

    let applied_before = engine.store().applied().len();
    let result = engine.place_limit_order(
        ALICE,
        AssetAmount::new(2_000_000, asset_a), // more than Alice holds
        AssetAmount::new(10, reserve),
        0,
        no_fee(),
    );
    assert!(matches!(result, Err(MarketError::InsufficientBalance { .. })));

    assert_eq!(engine.store().balance(ALICE, asset_a), 1_000_000);
    assert_eq!(engine.store().limit_orders().count(), 0);
    assert_eq!(engine.store().applied().len(), applied_before);
}

#[test]
fn test_reserve_in_orders_tracks_locked_value() {
    let MarketFixture { mut engine, reserve, asset_a } =
        market_fixture(EngineConfig::default());

    let placed = engine
        .place_limit_order(
            BOB,
            AssetAmount::new(400, reserve),
            AssetAmount::new(4_000, asset_a),
            0,
            no_fee(),
        )
        .unwrap();
    assert_eq!(
        engine.store().statistics(BOB).unwrap().total_reserve_in_orders,
        400
    );

    engine.cancel_limit_order(placed.order_id).unwrap();
    assert_eq!(
        engine.store().statistics(BOB).unwrap().total_reserve_in_orders,
        0
    );
}
