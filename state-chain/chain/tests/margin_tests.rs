//! Margin machinery: collateral maintenance, margin calls, black swans,
//! target collateral ratios and force settlement.

mod common;

use common::TestChain;
use onyx_chain::objects::{CallOrderObject, ForceSettlementObject};
use onyx_primitives::{constants::MIN_COLLATERAL_RATIO, AssetId, ForceSettlementId, CORE_ASSET};
use onyx_protocol::{
	operations::{AssetPublishFeedOperation, AssetSettleOperation, CallOrderUpdateOperation},
	Asset, Operation, OperationResult, Price, PriceFeed,
};

const START_CORE: i64 = 1_000_000;

/// A bitasset at 1 USD : 5 CORE with alice short 100 USD against 1000 CORE
/// (collateralization 10; maintenance requirement 8.75).
fn margin_chain() -> (TestChain, AssetId) {
	let mut chain = TestChain::new(&["alice", "bob", "feeder", "issuer"], START_CORE);
	let usd = chain.create_bitasset("issuer", "USDB", "feeder");
	chain.publish_feed("feeder", usd, 1, 5);
	chain.apply_ok(
		"alice",
		vec![chain.borrow_op("alice", Asset::new(100, usd), Asset::core(1_000))],
	);
	(chain, usd)
}

fn call_of(chain: &TestChain, name: &str, usd: AssetId) -> Option<CallOrderObject> {
	chain.db.call_order_of(chain.account_id(name), usd).cloned()
}

#[test]
fn borrowing_mints_supply_against_collateral() {
	let (chain, usd) = margin_chain();
	assert_eq!(chain.balance("alice", usd), 100);
	assert_eq!(chain.core_balance("alice"), START_CORE - 1_000);
	let call = call_of(&chain, "alice", usd).expect("position exists");
	assert_eq!((call.collateral, call.debt), (1_000, 100));
	let asset = chain.db.asset(usd).unwrap().clone();
	assert_eq!(chain.db.asset_dynamic(&asset).unwrap().current_supply, 100);
}

#[test]
fn undercollateralized_positions_cannot_be_opened() {
	let (mut chain, usd) = margin_chain();
	// 8.75 CORE per USD is the floor; offer only 800 CORE for 100 USD.
	let result =
		chain.apply("bob", vec![chain.borrow_op("bob", Asset::new(100, usd), Asset::core(800))]);
	assert!(result.is_err());
	assert!(call_of(&chain, "bob", usd).is_none());
	chain.assert_supplies();
}

#[test]
fn call_update_round_trip_is_identity() {
	let (mut chain, usd) = margin_chain();
	chain.apply_ok(
		"alice",
		vec![chain.borrow_op("alice", Asset::new(50, usd), Asset::core(500))],
	);
	chain.apply_ok(
		"alice",
		vec![chain.borrow_op("alice", Asset::new(-50, usd), Asset::core(-500))],
	);
	let call = call_of(&chain, "alice", usd).expect("position survives");
	assert_eq!((call.collateral, call.debt), (1_000, 100));
	assert_eq!(chain.balance("alice", usd), 100);
	assert_eq!(chain.core_balance("alice"), START_CORE - 1_000);
}

#[test]
fn closing_requires_withdrawing_all_collateral() {
	let (mut chain, usd) = margin_chain();
	// Repay all debt but leave collateral behind: rejected.
	let partial =
		chain.apply("alice", vec![chain.borrow_op("alice", Asset::new(-100, usd), Asset::core(-400))]);
	assert!(partial.is_err());

	chain.apply_ok(
		"alice",
		vec![chain.borrow_op("alice", Asset::new(-100, usd), Asset::core(-1_000))],
	);
	assert!(call_of(&chain, "alice", usd).is_none());
	assert_eq!(chain.core_balance("alice"), START_CORE);
	assert_eq!(chain.balance("alice", usd), 0);
	let asset = chain.db.asset(usd).unwrap().clone();
	assert_eq!(chain.db.asset_dynamic(&asset).unwrap().current_supply, 0);
}

#[test]
fn feed_update_triggers_a_margin_call() {
	let (mut chain, usd) = margin_chain();
	// Bob supplies the ask book: 120 USD at 10 CORE per USD.
	chain.apply_ok(
		"bob",
		vec![chain.borrow_op("bob", Asset::new(200, usd), Asset::core(4_000))],
	);
	chain.apply_ok(
		"bob",
		vec![chain.limit_order_op("bob", Asset::new(120, usd), Asset::core(1_200), false)],
	);

	// Move the maintenance requirement to 15 CORE per USD: alice (at 10)
	// is called, bob (at 20) is safe.
	chain.publish_feed("feeder", usd, 7, 60);

	assert!(call_of(&chain, "alice", usd).is_none(), "called position must be closed");
	let bob_call = call_of(&chain, "bob", usd).expect("bob stays open");
	assert_eq!((bob_call.collateral, bob_call.debt), (4_000, 200));

	// The ask was consumed up to the call's needs: 100 USD at 10 CORE/USD.
	let bob_id = chain.account_id("bob");
	let bob_order_amount: i64 = chain
		.db
		.limit_orders()
		.filter(|order| order.seller == bob_id)
		.map(|order| order.for_sale)
		.sum();
	assert_eq!(bob_order_amount, 20);
	assert_eq!(chain.core_balance("bob"), START_CORE - 4_000 + 1_000);

	// No black swan.
	let asset = chain.db.asset(usd).unwrap().clone();
	assert!(!chain.db.asset_bitasset(&asset).unwrap().has_settlement());
	assert_eq!(chain.db.asset_dynamic(&asset).unwrap().current_supply, 200);
	chain.assert_supplies();
}

#[test]
fn unfillable_margin_call_is_a_black_swan() {
	let (mut chain, usd) = margin_chain();
	chain.apply_ok(
		"bob",
		vec![chain.borrow_op("bob", Asset::new(200, usd), Asset::core(4_000))],
	);
	// The only ask demands 20 CORE per USD, beyond the short-squeeze bound
	// of 12.857 at the new feed.
	chain.apply_ok(
		"bob",
		vec![chain.limit_order_op("bob", Asset::new(100, usd), Asset::core(2_000), false)],
	);

	chain.publish_feed("feeder", usd, 7, 60);

	let asset = chain.db.asset(usd).unwrap().clone();
	let bitasset = chain.db.asset_bitasset(&asset).unwrap().clone();
	assert!(bitasset.has_settlement());
	// Settled at the least-collateralized ratio, 100 USD : 1000 CORE.
	assert_eq!(
		bitasset.settlement_price,
		Price::new(Asset::new(100, usd), Asset::core(1_000))
	);
	// Alice's 1000 plus bob's 200 * 10 = 2000 collateral fund the pool;
	// bob's excess collateral came back to him.
	assert_eq!(bitasset.settlement_fund, 3_000);
	assert!(call_of(&chain, "alice", usd).is_none());
	assert!(call_of(&chain, "bob", usd).is_none());
	assert_eq!(chain.core_balance("bob"), START_CORE - 4_000 + 2_000);

	// Redemption now draws on the fund at the frozen price.
	let results = chain.apply_ok(
		"alice",
		vec![Operation::AssetSettle(AssetSettleOperation {
			fee: Asset::core(0),
			account: chain.account_id("alice"),
			amount: Asset::new(100, usd),
		})],
	);
	assert_eq!(results[0], OperationResult::Asset(Asset::core(1_000)));
	assert_eq!(chain.balance("alice", usd), 0);
	assert_eq!(chain.core_balance("alice"), START_CORE);
	chain.assert_supplies();
}

#[test]
fn target_collateral_ratio_covers_partially() {
	let mut chain = TestChain::new(&["alice", "bob", "feeder", "issuer"], 10_000_000);
	let usd = chain.create_bitasset("issuer", "USDB", "feeder");
	chain.publish_feed("feeder", usd, 1, 5);

	chain.apply_ok(
		"alice",
		vec![Operation::CallOrderUpdate(CallOrderUpdateOperation {
			fee: Asset::core(0),
			funding_account: chain.account_id("alice"),
			delta_collateral: Asset::core(10_000),
			delta_debt: Asset::new(1_000, usd),
			target_collateral_ratio: Some(2_000),
		})],
	);
	chain.apply_ok(
		"bob",
		vec![chain.borrow_op("bob", Asset::new(2_000, usd), Asset::core(40_000))],
	);
	// Deep ask book at 9 CORE per USD.
	chain.apply_ok(
		"bob",
		vec![chain.limit_order_op("bob", Asset::new(900, usd), Asset::core(8_100), false)],
	);

	// Feed to 1:8 puts alice (at 10) under the 14 CORE/USD requirement.
	chain.publish_feed("feeder", usd, 1, 8);

	let call = call_of(&chain, "alice", usd).expect("partial cover keeps the position");
	assert!(call.debt < 1_000, "some debt must be covered, has {}", call.debt);
	assert!(call.debt > 0);
	// The remainder sits at or above the target ratio of 2x at the feed:
	// collateral >= debt * 8 * 2.
	assert!(
		call.collateral as i128 >= call.debt as i128 * 16,
		"post-cover collateralization too low: {}/{}",
		call.collateral,
		call.debt
	);
	chain.assert_supplies();
}

#[test]
fn force_settlement_executes_at_maintenance() {
	let (mut chain, usd) = margin_chain();
	let results = chain.apply_ok(
		"alice",
		vec![Operation::AssetSettle(AssetSettleOperation {
			fee: Asset::core(0),
			account: chain.account_id("alice"),
			amount: Asset::new(50, usd),
		})],
	);
	let settlement_id = match results[0] {
		OperationResult::ObjectId(id) => ForceSettlementId::try_from(id).unwrap(),
		_ => panic!("settle queues an order"),
	};
	assert_eq!(chain.balance("alice", usd), 50);
	chain.assert_supplies();

	// The one-hour delay falls before the first maintenance.
	chain.produce_maintenance_block();

	assert!(chain.db.find::<ForceSettlementObject>(settlement_id.instance()).is_none());
	// Settled against alice's own position at 5 CORE per USD.
	assert_eq!(chain.core_balance("alice"), START_CORE - 1_000 + 250);
	let call = call_of(&chain, "alice", usd).expect("position partially covered");
	assert_eq!((call.collateral, call.debt), (750, 50));
	let asset = chain.db.asset(usd).unwrap().clone();
	assert_eq!(chain.db.asset_dynamic(&asset).unwrap().current_supply, 50);
	chain.assert_supplies();
}

#[test]
fn settlement_without_a_feed_cancels_with_exact_refund() {
	let mut chain = TestChain::new(&["alice", "feeder", "issuer"], START_CORE);
	// Feed dies after an hour; settlement waits thirty.
	let usd = chain.create_bitasset_with("issuer", "USDB", "feeder", 3_600, 30 * 3_600);
	chain.publish_feed("feeder", usd, 1, 5);
	chain.apply_ok(
		"alice",
		vec![chain.borrow_op("alice", Asset::new(100, usd), Asset::core(1_000))],
	);
	chain.apply_ok(
		"alice",
		vec![Operation::AssetSettle(AssetSettleOperation {
			fee: Asset::core(0),
			account: chain.account_id("alice"),
			amount: Asset::new(40, usd),
		})],
	);

	// First maintenance: the feed expires, the settlement is not yet due.
	chain.produce_maintenance_block();
	let asset = chain.db.asset(usd).unwrap().clone();
	assert!(!chain.db.asset_bitasset(&asset).unwrap().feed_is_valid());

	// Second maintenance: due but feedless, so it cancels and refunds.
	chain.produce_maintenance_block();
	assert_eq!(chain.balance("alice", usd), 100);
	let cancels = chain
		.db
		.applied_operations()
		.iter()
		.filter(|(op, _)| matches!(op, Operation::AssetSettleCancel(_)))
		.count();
	assert_eq!(cancels, 1);
	chain.assert_supplies();
}

#[test]
fn feed_ratio_bounds_are_enforced() {
	let (mut chain, usd) = margin_chain();
	let feeder = chain.account_id("feeder");
	let make_feed = move |mcr: u16| {
		Operation::AssetPublishFeed(AssetPublishFeedOperation {
			fee: Asset::core(0),
			publisher: feeder,
			asset_id: usd,
			feed: PriceFeed {
				settlement_price: Price::new(Asset::new(1, usd), Asset::core(5)),
				maintenance_collateral_ratio: mcr,
				maximum_short_squeeze_ratio: 1_500,
				core_exchange_rate: Price::new(Asset::new(1, usd), Asset::core(1)),
			},
		})
	};
	// The minimum ratio is accepted, one below is not.
	chain.apply_ok("feeder", vec![make_feed(MIN_COLLATERAL_RATIO)]);
	assert!(chain.apply("feeder", vec![make_feed(MIN_COLLATERAL_RATIO - 1)]).is_err());
}

#[test]
fn outsiders_cannot_publish_feeds() {
	let (mut chain, usd) = margin_chain();
	let op = Operation::AssetPublishFeed(AssetPublishFeedOperation {
		fee: Asset::core(0),
		publisher: chain.account_id("bob"),
		asset_id: usd,
		feed: PriceFeed {
			settlement_price: Price::new(Asset::new(1, usd), Asset::core(5)),
			maintenance_collateral_ratio: 1_750,
			maximum_short_squeeze_ratio: 1_500,
			core_exchange_rate: Price::new(Asset::new(1, usd), Asset::core(1)),
		},
	});
	assert!(chain.apply("bob", vec![op]).is_err());
}
