//! Fork-choice integration: two nodes on the same genesis diverge and the
//! shorter branch reorganizes onto the heavier one.

mod common;

use common::TestChain;
use onyx_chain::skip;
use onyx_protocol::Asset;

#[test]
fn heavier_fork_triggers_a_reorg_and_keeps_the_losers() {
	let mut node_a = TestChain::new(&["alice", "bob"], 1_000_000);
	let mut node_b = TestChain::new(&["alice", "bob"], 1_000_000);
	assert_eq!(node_a.db.chain_id(), node_b.db.chain_id());

	// Common prefix.
	let b1 = node_a.produce_block();
	node_b.db.push_block(&b1, skip::NOTHING).unwrap();
	assert_eq!(node_a.db.head_block_id(), node_b.db.head_block_id());

	// Branch X on node A: two more blocks, including a transfer.
	let tx = node_a.signed_tx("alice", vec![node_a.transfer_op("alice", "bob", Asset::core(100))]);
	let b2 = node_a.produce_block_with(node_a.db.get_slot_time(1), &[tx]);
	let b3 = node_a.produce_block();
	assert_eq!(node_a.core_balance("bob"), 1_000_100);

	// Branch Y on node B: three blocks, starting one slot later so the
	// branches differ.
	let b2y = node_b.produce_block_at(node_b.db.get_slot_time(2));
	let b3y = node_b.produce_block();
	let b4y = node_b.produce_block();

	// Feed branch Y to node A. Equal-length blocks only park as
	// candidates...
	assert!(!node_a.db.push_block(&b2y, skip::NOTHING).unwrap());
	assert!(!node_a.db.push_block(&b3y, skip::NOTHING).unwrap());
	assert_eq!(node_a.db.head_block_id(), b3.id());

	// ...until the fourth block outweighs the current head.
	assert!(node_a.db.push_block(&b4y, skip::NOTHING).unwrap());
	assert_eq!(node_a.db.head_block_id(), b4y.id());
	assert_eq!(node_a.db.head_block_num(), 4);
	assert_eq!(node_a.db.head_block_time(), b4y.timestamp);

	// The transfer of branch X was unwound with it.
	assert_eq!(node_a.core_balance("bob"), 1_000_000);
	node_a.assert_supplies();

	// The displaced blocks stay available as non-head fork candidates.
	assert!(node_a.db.fork_db().is_known_block(&b2.id()));
	assert!(node_a.db.fork_db().is_known_block(&b3.id()));
	assert_eq!(node_a.db.fork_db().head().unwrap().id, b4y.id());

	// Both nodes have converged.
	assert_eq!(node_a.db.snapshot_bytes(), node_b.db.snapshot_bytes());
}

#[test]
fn orphans_apply_once_their_parent_arrives() {
	let mut node_a = TestChain::new(&["alice"], 1_000);
	let mut node_b = TestChain::new(&["alice"], 1_000);

	let b1 = node_a.produce_block();
	let b2 = node_a.produce_block();

	// Child before parent: parked, head unmoved.
	assert!(!node_b.db.push_block(&b2, skip::NOTHING).unwrap());
	assert_eq!(node_b.db.head_block_num(), 0);

	// Parent arrives; the orphan is adopted and applied up to head.
	assert!(node_b.db.push_block(&b1, skip::NOTHING).unwrap());
	assert_eq!(node_b.db.head_block_num(), 2);
	assert_eq!(node_b.db.head_block_id(), b2.id());
}

#[test]
fn a_transaction_cannot_survive_onto_a_fork_that_lacks_its_anchor() {
	let mut node_a = TestChain::new(&["alice", "bob"], 1_000_000);
	let mut node_b = TestChain::new(&["alice", "bob"], 1_000_000);

	let b1 = node_a.produce_block();
	node_b.db.push_block(&b1, skip::NOTHING).unwrap();
	let _b2 = node_a.produce_block();

	// Anchor a transfer to block 2 of branch X.
	let tx = node_a.signed_tx("alice", vec![node_a.transfer_op("alice", "bob", Asset::core(5))]);
	assert_eq!(tx.ref_block_num, 2);

	// Node B never saw block 2; its TaPoS check rejects the transaction.
	assert!(node_b.db.apply_transaction(&tx, skip::NOTHING).is_err());
	// On node A it applies cleanly.
	node_a.db.apply_transaction(&tx, skip::NOTHING).unwrap();
}
