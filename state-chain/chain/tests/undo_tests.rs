//! Undo-session properties: byte-identical rollback, nested merges, and
//! transaction atomicity.

mod common;

use common::TestChain;
use onyx_chain::skip;
use onyx_protocol::Asset;

#[test]
fn rolled_back_session_restores_the_exact_snapshot() {
	let mut chain = TestChain::new(&["alice", "bob"], 1_000_000);
	let before = chain.db.snapshot_bytes();

	{
		let mut session = chain.db.start_undo_session();
		let tx = {
			// Build inside the session scope against identical head state.
			let transfer = Asset::core(123);
			let mut tx = onyx_protocol::Transaction {
				expiration: session.head_block_time() + 600,
				operations: vec![onyx_protocol::Operation::Transfer(
					onyx_protocol::operations::TransferOperation {
						fee: Asset::core(7),
						from: session.account_by_name("alice").unwrap().id,
						to: session.account_by_name("bob").unwrap().id,
						amount: transfer,
						memo: None,
					},
				)],
				..Default::default()
			};
			tx.set_reference_block(session.head_block_id());
			let mut signed = onyx_protocol::SignedTransaction::new(tx);
			signed.sign(&common::secret_for("alice"), session.chain_id());
			signed
		};
		session.apply_transaction(&tx, skip::NOTHING).unwrap();
		assert_ne!(session.snapshot_bytes(), before, "the session must have effects");
		session.rollback().unwrap();
	}

	assert_eq!(chain.db.snapshot_bytes(), before);
	chain.assert_supplies();
}

#[test]
fn committed_sessions_keep_their_effects() {
	let mut chain = TestChain::new(&["alice", "bob"], 1_000);
	let before = chain.db.snapshot_bytes();
	chain.apply_ok("alice", vec![chain.transfer_op("alice", "bob", Asset::core(10))]);
	assert_ne!(chain.db.snapshot_bytes(), before);
	assert_eq!(chain.core_balance("bob"), 1_010);
}

#[test]
fn nested_sessions_merge_into_their_parent() {
	let mut chain = TestChain::new(&["alice", "bob"], 1_000_000);
	let before = chain.db.snapshot_bytes();
	let alice = chain.account_id("alice");
	let bob = chain.account_id("bob");

	{
		let mut outer = chain.db.start_undo_session();
		outer.adjust_balance(alice, Asset::core(-100)).unwrap();
		outer.adjust_balance(bob, Asset::core(100)).unwrap();
		{
			let mut inner = outer.start_undo_session();
			inner.adjust_balance(bob, Asset::core(-40)).unwrap();
			inner.adjust_balance(alice, Asset::core(40)).unwrap();
			inner.merge().unwrap();
		}
		// Rolling back the parent also unwinds the merged child.
		outer.rollback().unwrap();
	}

	assert_eq!(chain.db.snapshot_bytes(), before);
}

#[test]
fn dropped_sessions_roll_back_implicitly() {
	let mut chain = TestChain::new(&["alice", "bob"], 1_000_000);
	let before = chain.db.snapshot_bytes();
	let alice = chain.account_id("alice");
	{
		let mut session = chain.db.start_undo_session();
		session.adjust_balance(alice, Asset::core(-5)).unwrap();
		// No commit: the guard unwinds on scope exit.
	}
	assert_eq!(chain.db.snapshot_bytes(), before);
}

#[test]
fn a_failing_operation_rejects_the_whole_transaction() {
	let mut chain = TestChain::new(&["alice", "bob"], 1_000);
	let before = chain.db.snapshot_bytes();
	let result = chain.apply(
		"alice",
		vec![
			chain.transfer_op("alice", "bob", Asset::core(900)),
			// More than remains after the first operation.
			chain.transfer_op("alice", "bob", Asset::core(200)),
		],
	);
	assert!(result.is_err());
	assert_eq!(chain.db.snapshot_bytes(), before);
	assert_eq!(chain.core_balance("bob"), 1_000);
}

#[test]
fn created_objects_vanish_and_counters_rewind_on_rollback() {
	let mut chain = TestChain::new(&["alice", "bob", "issuer"], 1_000_000);
	let aaa = chain.create_uia("issuer", "AAA");
	chain.issue("issuer", Asset::new(100, aaa), "alice");
	let before = chain.db.snapshot_bytes();

	let order_id = {
		let mut session = chain.db.start_undo_session();
		let tx = {
			let mut tx = onyx_protocol::Transaction {
				expiration: session.head_block_time() + 600,
				operations: vec![onyx_protocol::Operation::LimitOrderCreate(
					onyx_protocol::operations::LimitOrderCreateOperation {
						fee: Asset::core(0),
						seller: session.account_by_name("alice").unwrap().id,
						amount_to_sell: Asset::new(10, aaa),
						min_to_receive: Asset::core(10),
						expiration: onyx_primitives::TimePointSec::MAX,
						fill_or_kill: false,
					},
				)],
				..Default::default()
			};
			tx.set_reference_block(session.head_block_id());
			let mut signed = onyx_protocol::SignedTransaction::new(tx);
			signed.sign(&common::secret_for("alice"), session.chain_id());
			signed
		};
		let results = session.apply_transaction(&tx, skip::NOTHING).unwrap();
		let id = TestChain::order_id(&results);
		session.rollback().unwrap();
		id
	};

	assert!(chain
		.db
		.find::<onyx_chain::objects::LimitOrderObject>(order_id.instance())
		.is_none());
	assert_eq!(chain.db.snapshot_bytes(), before);
	// The instance counter rewound: the next order reuses the number.
	let results = chain.apply_ok(
		"alice",
		vec![chain.limit_order_op("alice", Asset::new(10, aaa), Asset::core(10), false)],
	);
	assert_eq!(TestChain::order_id(&results), order_id);
}
