//! End-to-end chain behavior: transfers, fee distribution, scheduling and
//! order expiry at maintenance.

mod common;

use common::{single_key_authority, TestChain};
use onyx_chain::objects::LimitOrderObject;
use onyx_primitives::{TimePointSec, CORE_ASSET};
use onyx_protocol::{
	operations::{AccountCreateOperation, LimitOrderCreateOperation},
	Asset, Operation,
};

#[test]
fn simple_transfer_advances_one_slot() {
	let mut chain = TestChain::new(&["alice"], 1_000_000);
	// Register bob on-chain instead of at genesis so he starts from zero.
	chain.apply_ok(
		"init0",
		vec![Operation::AccountCreate(AccountCreateOperation {
			fee: Asset::core(0),
			registrar: chain.account_id("init0"),
			referrer: chain.account_id("init0"),
			referrer_percent: 0,
			name: "bob".into(),
			owner: single_key_authority("bob"),
			active: single_key_authority("bob"),
			options: Default::default(),
		})],
	);
	assert_eq!(chain.core_balance("bob"), 0);

	let head_before = chain.db.head_block_num();
	let tx = chain.signed_tx("alice", vec![chain.transfer_op("alice", "bob", Asset::core(250))]);
	let block = chain.produce_block_with(chain.db.get_slot_time(1), &[tx]);

	assert_eq!(chain.core_balance("alice"), 999_750);
	assert_eq!(chain.core_balance("bob"), 250);
	assert_eq!(chain.db.head_block_num(), head_before + 1);
	assert_eq!(chain.db.head_block_id(), block.id());
	// One applied operation, no virtuals.
	assert_eq!(chain.db.applied_operations().len(), 1);
}

#[test]
fn transfer_boundaries() {
	let mut chain = TestChain::new(&["alice", "bob"], 1_000);

	let mut zero = chain.transfer_op("alice", "bob", Asset::core(0));
	if let Operation::Transfer(op) = &mut zero {
		op.amount.amount = 0;
	}
	assert!(chain.apply("alice", vec![zero]).is_err());

	// Exactly the full balance is spendable with a zero fee.
	chain.apply_ok("alice", vec![chain.transfer_op("alice", "bob", Asset::core(1_000))]);
	assert_eq!(chain.core_balance("alice"), 0);

	let too_much = chain.transfer_op("bob", "alice", Asset::core(2_001));
	assert!(chain.apply("bob", vec![too_much]).is_err());
	// Failed transfers leave no residue.
	assert_eq!(chain.core_balance("bob"), 2_000);
	chain.assert_supplies();
}

#[test]
fn unsigned_transactions_are_rejected() {
	let mut chain = TestChain::new(&["alice", "bob"], 1_000);
	let mut tx = chain.signed_tx("alice", vec![chain.transfer_op("alice", "bob", Asset::core(10))]);
	tx.signatures.clear();
	assert!(chain.db.apply_transaction(&tx, onyx_chain::skip::NOTHING).is_err());
	// The wrong key is as useless as none.
	let mut tx = chain.signed_tx("bob", vec![chain.transfer_op("alice", "bob", Asset::core(10))]);
	tx.signatures.clear();
	tx.sign(&common::secret_for("bob"), chain.db.chain_id());
	assert!(chain.db.apply_transaction(&tx, onyx_chain::skip::NOTHING).is_err());
	assert_eq!(chain.core_balance("bob"), 1_000);
}

#[test]
fn fees_split_exactly_at_maintenance() {
	let mut chain = TestChain::new(&["alice", "bob"], 1_000_000);
	let mut transfer = chain.transfer_op("alice", "bob", Asset::core(250));
	if let Operation::Transfer(op) = &mut transfer {
		op.fee = Asset::core(100);
	}
	chain.apply_ok("alice", vec![transfer]);

	assert_eq!(chain.core_balance("alice"), 1_000_000 - 250 - 100);
	let stats = chain.db.account_statistics(chain.account_id("alice")).unwrap();
	assert_eq!(stats.pending_fees, 100);
	assert_eq!(stats.lifetime_fees_paid, 100);

	chain.produce_maintenance_block();

	// Defaults: 20% network (of which 20% burns), 30% lifetime referrer.
	// Alice is her own registrar and lifetime referrer, so everything but
	// the network share returns to her.
	assert_eq!(chain.core_balance("alice"), 1_000_000 - 250 - 100 + 30 + 50);
	let stats = chain.db.account_statistics(chain.account_id("alice")).unwrap();
	assert_eq!(stats.pending_fees, 0);
	let core = chain.db.asset(CORE_ASSET).unwrap().clone();
	assert_eq!(chain.db.asset_dynamic(&core).unwrap().accumulated_fees, 4);
	assert_eq!(chain.db.dynamic_global_properties().witness_budget, 16);

	// The budget pays the next block's witness.
	let producer = chain.produce_block();
	let witness_account =
		chain.db.witness(producer.witness).unwrap().witness_account;
	let paid = chain.db.get_balance(witness_account, CORE_ASSET).amount;
	assert!(paid >= 16, "witness should have collected the budget, has {paid}");
	assert_eq!(chain.db.dynamic_global_properties().witness_budget, 0);
	chain.assert_supplies();
}

#[test]
fn every_witness_appears_within_two_rounds() {
	let mut chain = TestChain::new(&[], 0);
	let mut seen = std::collections::BTreeSet::new();
	for _ in 0..10 {
		let block = chain.produce_block();
		seen.insert(block.witness);
	}
	let active = chain.db.global_properties().active_witnesses.clone();
	assert_eq!(active.len(), 5);
	for witness in active {
		assert!(seen.contains(&witness), "witness {witness} never produced in two rounds");
	}
}

#[test]
fn consecutive_slots_rotate_producers() {
	let mut chain = TestChain::new(&[], 0);
	let mut last_three: Vec<_> = Vec::new();
	for _ in 0..15 {
		let block = chain.produce_block();
		assert!(
			!last_three.contains(&block.witness),
			"witness {} produced twice within the separation window",
			block.witness
		);
		last_three.push(block.witness);
		if last_three.len() > 2 {
			last_three.remove(0);
		}
	}
}

#[test]
fn maintenance_blocks_skip_scheduler_slots() {
	let mut chain = TestChain::new(&[], 0);
	chain.produce_block();
	let block = chain.produce_maintenance_block();
	assert!(chain.db.dynamic_global_properties().head_is_maintenance_block());
	let interval = chain.db.block_interval() as u32;
	let skip_slots =
		chain.db.chain_parameters().maintenance_skip_slots as u32;
	assert_eq!(
		chain.db.get_slot_time(1),
		TimePointSec::new(block.timestamp.seconds() + (1 + skip_slots) * interval)
	);
	// And production still works across the gap.
	chain.produce_block();
	assert!(!chain.db.dynamic_global_properties().head_is_maintenance_block());
}

#[test]
fn limit_orders_expire_at_maintenance() {
	let mut chain = TestChain::new(&["alice", "bob"], 1_000_000);
	let usd = chain.create_uia("bob", "USDT");

	let now = chain.db.head_block_time();
	let results = chain.apply_ok(
		"alice",
		vec![Operation::LimitOrderCreate(LimitOrderCreateOperation {
			fee: Asset::core(0),
			seller: chain.account_id("alice"),
			amount_to_sell: Asset::core(500),
			min_to_receive: Asset::new(100, usd),
			expiration: now + 10,
			fill_or_kill: false,
		})],
	);
	let order_id = TestChain::order_id(&results);
	assert_eq!(chain.core_balance("alice"), 1_000_000 - 500);
	assert!(chain.db.find::<LimitOrderObject>(order_id.instance()).is_some());

	// The next maintenance lies far past the order's expiration.
	chain.produce_maintenance_block();

	assert!(chain.db.find::<LimitOrderObject>(order_id.instance()).is_none());
	assert_eq!(chain.core_balance("alice"), 1_000_000);
	let stats = chain.db.account_statistics(chain.account_id("alice")).unwrap();
	assert_eq!(stats.total_core_in_orders, 0);
	chain.assert_supplies();
}

#[test]
fn transactions_expired_or_unanchored_are_rejected() {
	let mut chain = TestChain::new(&["alice", "bob"], 1_000);
	chain.produce_block();

	let mut stale = chain.signed_tx("alice", vec![chain.transfer_op("alice", "bob", Asset::core(1))]);
	stale.transaction.expiration = TimePointSec::new(common::GENESIS_TIME - 1);
	stale.signatures.clear();
	stale.sign(&common::secret_for("alice"), chain.db.chain_id());
	assert!(chain.db.apply_transaction(&stale, onyx_chain::skip::NOTHING).is_err());

	// TaPoS: a prefix that matches no stored block summary.
	let mut forked = chain.signed_tx("alice", vec![chain.transfer_op("alice", "bob", Asset::core(1))]);
	forked.transaction.ref_block_prefix ^= 0xffff_ffff;
	forked.signatures.clear();
	forked.sign(&common::secret_for("alice"), chain.db.chain_id());
	assert!(chain.db.apply_transaction(&forked, onyx_chain::skip::NOTHING).is_err());
}
