//! Transaction and block application, fork handling and block production.
//!
//! Blocks are atomic: every transaction applies inside a nested undo
//! session that merges into the block's outer session, so one bad
//! transaction unwinds the whole block. Committed per-block states stay on
//! the undo stack, which is what lets a reorganization pop whole blocks.

use super::Database;
use crate::{
	error::{ensure_policy, ensure_state, internal_assert},
	evaluators,
	objects::{dynamic_flags, BlockSummaryObject, WitnessObject},
	Error, Result,
};
use codec::Encode;
use onyx_primitives::{
	constants::{FULL_PERCENT, IRREVERSIBLE_THRESHOLD, MAX_SIG_CHECK_DEPTH},
	AccountId, BlockSummaryId, TimePointSec, WitnessId, CORE_ASSET,
};
use onyx_protocol::{
	block::calculate_merkle_root, operations::OperationResult, Asset, Authority, BlockHeader,
	PublicKey, SignedBlock, SignedTransaction,
};
use std::collections::BTreeSet;

/// Validation steps that replay and trusted-source paths may skip.
pub mod skip {
	pub const NOTHING: u32 = 0;
	pub const WITNESS_SIGNATURE: u32 = 1 << 0;
	pub const TRANSACTION_SIGNATURES: u32 = 1 << 1;
	pub const TAPOS_CHECK: u32 = 1 << 2;
	pub const AUTHORITY_CHECK: u32 = 1 << 3;
	pub const MERKLE_CHECK: u32 = 1 << 4;
	pub const WITNESS_SCHEDULE_CHECK: u32 = 1 << 5;
	pub const BLOCK_SIZE_CHECK: u32 = 1 << 6;

	/// What `--replay-blockchain` uses; `--force-validate` clears it.
	pub const REPLAY: u32 =
		WITNESS_SIGNATURE | TRANSACTION_SIGNATURES | TAPOS_CHECK | AUTHORITY_CHECK | MERKLE_CHECK;
}

impl Database {
	// ---- Transactions.

	/// Applies `tx` in its own undo session, merging into the enclosing
	/// session on success (or committing when called stand-alone).
	pub fn apply_transaction(
		&mut self,
		tx: &SignedTransaction,
		skip_flags: u32,
	) -> Result<Vec<OperationResult>> {
		let mut session = self.start_undo_session();
		let results = session.apply_transaction_inner(tx, skip_flags)?;
		if session.undo.active_sessions() >= 2 {
			session.merge()?;
		} else {
			session.commit()?;
		}
		Ok(results)
	}

	fn apply_transaction_inner(
		&mut self,
		tx: &SignedTransaction,
		skip_flags: u32,
	) -> Result<Vec<OperationResult>> {
		tx.validate()?;
		let params = self.chain_parameters();
		let max_expiration = params.maximum_time_until_expiration;
		let max_size = params.maximum_transaction_size;
		let now = self.head_block_time();

		ensure_policy!(tx.expiration >= now, "transaction expired at {}", tx.expiration);
		ensure_policy!(
			tx.expiration <= now + max_expiration,
			"transaction expiration {} too far in the future",
			tx.expiration
		);
		ensure_policy!(
			tx.transaction.encode().len() as u32 <= max_size,
			"transaction exceeds the size limit"
		);

		if skip_flags & skip::TAPOS_CHECK == 0 {
			let summary_id = tx.ref_block_num as u64;
			let referenced = self
				.find::<BlockSummaryObject>(summary_id)
				.map(|summary| summary.block_id)
				.unwrap_or_default();
			let prefix = u32::from_le_bytes([
				referenced.0[4],
				referenced.0[5],
				referenced.0[6],
				referenced.0[7],
			]);
			ensure_state!(
				prefix == tx.ref_block_prefix,
				"transaction references an unknown or forked-out block"
			);
		}

		if skip_flags & (skip::TRANSACTION_SIGNATURES | skip::AUTHORITY_CHECK) == 0 {
			self.verify_transaction_authority(tx)?;
		}

		let mut results = Vec::with_capacity(tx.operations.len());
		for (index, op) in tx.operations.iter().enumerate() {
			let slot = self.applied_operations.len();
			self.push_applied_operation(op.clone(), OperationResult::None);
			let result =
				evaluators::apply_operation(self, op).map_err(|e| e.in_operation(index))?;
			self.applied_operations[slot].1 = result.clone();
			results.push(result);
		}
		Ok(results)
	}

	/// Checks that the attached signatures satisfy every required
	/// authority, recursing through account auths up to
	/// `MAX_SIG_CHECK_DEPTH`.
	pub fn verify_transaction_authority(&self, tx: &SignedTransaction) -> Result<()> {
		let keys = tx.signature_keys(self.chain_id())?;
		let mut required_active: BTreeSet<AccountId> = BTreeSet::new();
		let mut required_owner: BTreeSet<AccountId> = BTreeSet::new();
		for op in &tx.operations {
			if let onyx_protocol::Operation::AccountUpdate(update) = op {
				if update.owner.is_some() {
					required_owner.insert(update.account);
					continue;
				}
			}
			required_active.insert(op.fee_payer());
		}
		for account_id in required_owner {
			let account = self.account(account_id)?;
			ensure_state!(
				self.authority_satisfied(&account.owner, &keys, 0),
				"missing required owner authority of account {}",
				account.name
			);
		}
		for account_id in required_active {
			let account = self.account(account_id)?;
			ensure_state!(
				self.authority_satisfied(&account.active, &keys, 0) ||
					self.authority_satisfied(&account.owner, &keys, 0),
				"missing required active authority of account {}",
				account.name
			);
		}
		Ok(())
	}

	fn authority_satisfied(
		&self,
		authority: &Authority,
		keys: &BTreeSet<PublicKey>,
		depth: u32,
	) -> bool {
		let mut total: u64 = 0;
		for (key, weight) in &authority.key_auths {
			if keys.contains(key) {
				total += *weight as u64;
				if total >= authority.weight_threshold as u64 {
					return true;
				}
			}
		}
		if depth >= MAX_SIG_CHECK_DEPTH {
			return false;
		}
		for (account_id, weight) in &authority.account_auths {
			if let Ok(member) = self.account(*account_id) {
				if self.authority_satisfied(&member.active, keys, depth + 1) {
					total += *weight as u64;
					if total >= authority.weight_threshold as u64 {
						return true;
					}
				}
			}
		}
		false
	}

	// ---- Blocks.

	/// Validates and applies a block that must extend the current head.
	/// The caller provides the enclosing undo session.
	pub(crate) fn apply_block(&mut self, block: &SignedBlock, skip_flags: u32) -> Result<()> {
		self.applied_operations.clear();

		let block_num = block.block_num();
		ensure_state!(
			block.previous == self.head_block_id(),
			"block {block_num} does not extend head {}",
			self.head_block_num()
		);
		if skip_flags & skip::BLOCK_SIZE_CHECK == 0 {
			ensure_policy!(
				(block.encode().len() as u32) <= self.chain_parameters().maximum_block_size,
				"block exceeds the size limit"
			);
		}

		let interval = self.block_interval() as u32;
		ensure_policy!(
			block.timestamp.seconds() % interval == 0,
			"block timestamp is not on a slot boundary"
		);
		let slot = self.get_slot_at_time(block.timestamp);
		ensure_policy!(slot > 0, "block timestamp {} is not past the head", block.timestamp);

		let scheduled = self.get_scheduled_witness(slot)?;
		if skip_flags & skip::WITNESS_SCHEDULE_CHECK == 0 {
			ensure_policy!(
				scheduled == block.witness,
				"witness {} produced out of turn; slot belongs to {scheduled}",
				block.witness
			);
		}
		let witness = self.witness(block.witness)?.clone();
		if skip_flags & skip::WITNESS_SIGNATURE == 0 {
			ensure_policy!(
				block.header.signer() == Some(witness.signing_key),
				"block signature does not match witness {}",
				block.witness
			);
		}
		if skip_flags & skip::MERKLE_CHECK == 0 {
			ensure_policy!(
				calculate_merkle_root(&block.transactions) == block.transaction_merkle_root,
				"merkle root mismatch"
			);
		}

		for tx in &block.transactions {
			self.apply_transaction(tx, skip_flags)?;
		}

		// Charge missed slots before advancing the absolute slot counter.
		for missed_slot in 1..slot {
			let absent = self.get_scheduled_witness(missed_slot)?;
			self.modify::<WitnessObject>(absent.instance(), |witness| {
				witness.total_missed += 1;
			})?;
		}

		self.update_global_dynamic_data(block, slot)?;
		self.update_block_summary(block_num, block.id())?;

		let maintenance_due = block.timestamp >= self.dynamic_global_properties().next_maintenance_time;
		if maintenance_due {
			self.perform_chain_maintenance(block)?;
		}
		self.modify_dynamic_globals(|dgp| {
			if maintenance_due {
				dgp.dynamic_flags |= dynamic_flags::MAINTENANCE;
			} else {
				dgp.dynamic_flags &= !dynamic_flags::MAINTENANCE;
			}
		})?;

		self.update_last_irreversible()?;
		self.notify_applied_block(block);
		Ok(())
	}

	fn update_global_dynamic_data(&mut self, block: &SignedBlock, slot: u32) -> Result<()> {
		let block_num = block.block_num();
		let missed = slot - 1;
		let new_aslot = self.dynamic_global_properties().current_aslot + slot as u64;

		self.modify_dynamic_globals(|dgp| {
			dgp.head_block_number = block_num;
			dgp.head_block_id = block.id();
			dgp.time = block.timestamp;
			dgp.current_witness = block.witness;
			dgp.current_aslot = new_aslot;
			dgp.recently_missed_count =
				if missed == 0 { 0 } else { dgp.recently_missed_count + missed };
			dgp.recent_slots_filled =
				if slot >= 128 { 1 } else { (dgp.recent_slots_filled << slot) | 1 };
		})?;

		self.modify::<WitnessObject>(block.witness.instance(), |witness| {
			witness.last_aslot = new_aslot;
			witness.last_confirmed_block_num = block_num;
		})?;

		// Witness pay draws on the budget refilled at maintenance.
		let pay = self
			.chain_parameters()
			.witness_pay_per_block
			.min(self.dynamic_global_properties().witness_budget);
		if pay > 0 {
			let witness_account = self.witness(block.witness)?.witness_account;
			self.modify_dynamic_globals(|dgp| dgp.witness_budget -= pay)?;
			self.adjust_balance(witness_account, Asset::new(pay, CORE_ASSET))?;
		}
		Ok(())
	}

	fn update_block_summary(&mut self, block_num: u32, id: onyx_protocol::BlockId) -> Result<()> {
		let instance = (block_num as u64) & 0xffff;
		if self.find::<BlockSummaryObject>(instance).is_some() {
			self.modify::<BlockSummaryObject>(instance, |summary| {
				summary.block_id = id;
			})
		} else {
			self.insert_at_instance(BlockSummaryObject {
				id: BlockSummaryId::new(instance),
				block_id: id,
			})
		}
	}

	fn update_last_irreversible(&mut self) -> Result<()> {
		let mut confirmations: Vec<u32> = self
			.active_witness_objects()?
			.iter()
			.map(|witness| witness.last_confirmed_block_num)
			.collect();
		if confirmations.is_empty() {
			return Ok(());
		}
		confirmations.sort_unstable();
		let offset = (FULL_PERCENT - IRREVERSIBLE_THRESHOLD) as usize * confirmations.len() /
			FULL_PERCENT as usize;
		let irreversible = confirmations[offset];
		self.modify_dynamic_globals(|dgp| {
			dgp.last_irreversible_block_num = dgp.last_irreversible_block_num.max(irreversible);
		})
	}

	/// Entry point for blocks from any source. The block lands in the fork
	/// database; whenever the fork head outweighs the applied head — by one
	/// block in the ordinary case, by several after a fork or orphan
	/// adoption — the state advances onto it. Returns true if head moved.
	pub fn push_block(&mut self, block: &SignedBlock, skip_flags: u32) -> Result<bool> {
		let linked = self.fork_db.push_block(block.clone())?;
		if !linked {
			return Ok(false);
		}
		let (new_head_id, new_head_num) = {
			let head = self
				.fork_db
				.head()
				.ok_or_else(|| Error::Internal("fork database lost its head".into()))?;
			(head.id, head.num)
		};
		if new_head_num <= self.head_block_num() {
			return Ok(false);
		}
		self.switch_forks(new_head_id, skip_flags).map(|()| true)
	}

	/// Pops blocks to the common ancestor and replays the heavier branch.
	/// If any block of the new branch fails, the old branch is restored and
	/// the failure surfaces.
	fn switch_forks(&mut self, new_head_id: onyx_protocol::BlockId, skip_flags: u32) -> Result<()> {
		let old_head_id = self.head_block_id();
		let (new_branch, old_branch) = if self.fork_db.is_known_block(&old_head_id) {
			self.fork_db.fetch_branch_from(new_head_id, old_head_id)?
		} else {
			// The applied head (possibly the genesis state) predates the
			// fork window; the new branch must descend directly onto it.
			(self.fork_db.collect_branch_to(new_head_id, old_head_id)?, Vec::new())
		};
		let common_ancestor = new_branch
			.last()
			.map(|item| item.previous)
			.ok_or_else(|| Error::Internal("empty reorg branch".into()))?;
		if !old_branch.is_empty() {
			tracing::info!(from = %old_head_id, to = %new_head_id, "switching forks");
		}

		while self.head_block_id() != common_ancestor {
			self.pop_block()?;
		}

		for (position, item) in new_branch.iter().rev().enumerate() {
			let result = (|| -> Result<()> {
				let mut session = self.start_undo_session();
				session.apply_block(&item.block, skip_flags)?;
				session.commit()?;
				Ok(())
			})();
			if let Err(error) = result {
				tracing::warn!(%error, block = %item.id, "reorg block failed; restoring old fork");
				// Drop the bad block and everything that built on it.
				for doomed in new_branch.iter().take(new_branch.len() - position) {
					self.fork_db.remove(&doomed.id);
				}
				while self.head_block_id() != common_ancestor {
					self.pop_block()?;
				}
				for item in old_branch.iter().rev() {
					let mut session = self.start_undo_session();
					session.apply_block(&item.block, skip::REPLAY | skip_flags)?;
					session.commit()?;
				}
				self.fork_db.set_head(old_head_id);
				return Err(error);
			}
			self.fork_db.set_head(item.id);
		}
		Ok(())
	}

	/// Rewinds the head block. State comes back via the undo stack; the
	/// block itself stays in the fork database as a non-head candidate.
	pub fn pop_block(&mut self) -> Result<()> {
		ensure_state!(self.head_block_num() > 0, "cannot pop the genesis state");
		internal_assert!(
			self.undo.active_sessions() == 0,
			"cannot pop a block while undo sessions are open"
		);
		self.pop_commit()?;
		self.fork_db.pop_block();
		Ok(())
	}

	/// Produces and applies the block for `when`. Pending transactions are
	/// applied speculatively to select the valid, fitting subset, then the
	/// speculation is rolled back and the signed block is pushed for real.
	pub fn generate_block(
		&mut self,
		when: TimePointSec,
		witness_id: WitnessId,
		signing_key: &secp256k1::SecretKey,
		pending: &[SignedTransaction],
		skip_flags: u32,
	) -> Result<SignedBlock> {
		let slot = self.get_slot_at_time(when);
		ensure_policy!(slot > 0, "generation time {when} is not past the head block");
		let scheduled = self.get_scheduled_witness(slot)?;
		ensure_policy!(
			scheduled == witness_id,
			"slot at {when} belongs to witness {scheduled}, not {witness_id}"
		);
		let witness = self.witness(witness_id)?;
		ensure_policy!(
			witness.signing_key == PublicKey::from_secret(signing_key),
			"signing key does not match witness {witness_id}"
		);

		let max_block_size = self.chain_parameters().maximum_block_size as usize;
		let mut included = Vec::new();
		{
			let mut speculation = self.start_undo_session();
			let mut total_size = 0usize;
			for tx in pending {
				let tx_size = tx.encode().len();
				if total_size + tx_size > max_block_size {
					continue;
				}
				match speculation.apply_transaction(tx, skip_flags) {
					Ok(_) => {
						total_size += tx_size;
						included.push(tx.clone());
					},
					Err(error) => {
						tracing::debug!(%error, "pending transaction left out of block");
					},
				}
			}
			// Session drops here, rolling back the speculation.
		}

		let header = BlockHeader {
			previous: self.head_block_id(),
			timestamp: when,
			witness: witness_id,
			transaction_merkle_root: Default::default(),
			extensions: Vec::new(),
		};
		let block = SignedBlock::new(header, included, signing_key);
		self.push_block(&block, skip_flags)?;
		Ok(block)
	}
}
