//! Holds candidate chain heads: recent linked blocks for cheap short
//! reorganizations, plus orphans parked until their parent arrives.

use crate::{error::ensure_state, Error, Result};
use onyx_protocol::{BlockId, SignedBlock};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug)]
pub struct ForkItem {
	pub block: SignedBlock,
	pub id: BlockId,
	pub num: u32,
	/// Parent link; null for the fork-db root.
	pub previous: BlockId,
}

/// Candidate-head tracking. The linked index is a tree rooted below the
/// retention window; the unlinked index parks blocks keyed by the parent id
/// they are waiting for.
#[derive(Default)]
pub struct ForkDatabase {
	items: BTreeMap<BlockId, ForkItem>,
	by_num: BTreeMap<u32, BTreeSet<BlockId>>,
	unlinked: BTreeMap<BlockId, Vec<SignedBlock>>,
	unlinked_by_num: BTreeMap<u32, BTreeSet<BlockId>>,
	head: Option<BlockId>,
	max_size: u32,
}

impl ForkDatabase {
	pub fn new(max_size: u32) -> Self {
		Self { max_size, ..Default::default() }
	}

	pub fn reset(&mut self) {
		*self = Self { max_size: self.max_size, ..Default::default() };
	}

	/// Seeds the database with a known-good block (the current head), e.g.
	/// after startup or replay.
	pub fn start_block(&mut self, block: SignedBlock) {
		let item = Self::item_of(block);
		self.head = Some(item.id);
		self.index_insert(item);
	}

	fn item_of(block: SignedBlock) -> ForkItem {
		ForkItem { id: block.id(), num: block.block_num(), previous: block.previous, block }
	}

	fn index_insert(&mut self, item: ForkItem) {
		self.by_num.entry(item.num).or_default().insert(item.id);
		self.items.insert(item.id, item);
	}

	pub fn head(&self) -> Option<&ForkItem> {
		self.head.and_then(|id| self.items.get(&id))
	}

	pub fn is_known_block(&self, id: &BlockId) -> bool {
		self.items.contains_key(id)
	}

	pub fn fetch_block(&self, id: &BlockId) -> Option<&ForkItem> {
		self.items.get(id)
	}

	pub fn fetch_block_by_number(&self, num: u32) -> Vec<&ForkItem> {
		self.by_num
			.get(&num)
			.into_iter()
			.flatten()
			.filter_map(|id| self.items.get(id))
			.collect()
	}

	/// Inserts `block`, linking it to its parent if known and adopting any
	/// orphans that were waiting for it. A block whose parent is unknown is
	/// parked and `Ok(false)` is returned; errors mean the block falls
	/// outside the retention window entirely.
	pub fn push_block(&mut self, block: SignedBlock) -> Result<bool> {
		let item = Self::item_of(block);
		if let Some(head) = self.head() {
			let horizon = head.num.saturating_sub(self.max_size);
			ensure_state!(
				item.num > horizon,
				"block {} is older than the fork window ending at {horizon}",
				item.num
			);
			ensure_state!(
				item.num < head.num + 32,
				"block {} is too far beyond head {}",
				item.num,
				head.num
			);
		}
		if !item.previous.is_null() && !self.items.contains_key(&item.previous) {
			tracing::warn!(id = %item.id, "pushing block that does not link; parking it");
			self.unlinked_by_num.entry(item.num).or_default().insert(item.id);
			self.unlinked.entry(item.previous).or_insert_with(Vec::new).push(item.block);
			return Ok(false);
		}
		self.insert_linked(item);
		Ok(true)
	}

	fn insert_linked(&mut self, item: ForkItem) {
		let (id, num) = (item.id, item.num);
		self.index_insert(item);
		let advance = match self.head() {
			None => true,
			// Highest number wins; lexicographically smaller id breaks ties.
			Some(head) => num > head.num || (num == head.num && id < head.id),
		};
		if advance {
			self.head = Some(id);
			let horizon = num.saturating_sub(self.max_size);
			self.prune_below(horizon);
		}
		// Adopt children that were waiting for this block, depth-first.
		let children = self.unlinked.remove(&id).unwrap_or_default();
		for child in children {
			let child_item = Self::item_of(child);
			if let Some(ids) = self.unlinked_by_num.get_mut(&child_item.num) {
				ids.remove(&child_item.id);
			}
			self.insert_linked(child_item);
		}
	}

	fn prune_below(&mut self, horizon: u32) {
		while let Some((&num, _)) = self.by_num.first_key_value() {
			if num >= horizon {
				break;
			}
			let ids = self.by_num.remove(&num).unwrap_or_default();
			for id in ids {
				self.items.remove(&id);
			}
		}
		while let Some((&num, _)) = self.unlinked_by_num.first_key_value() {
			if num >= horizon {
				break;
			}
			let ids = self.unlinked_by_num.remove(&num).unwrap_or_default();
			self.unlinked.retain(|_, blocks| {
				blocks.retain(|block| !ids.contains(&block.id()));
				!blocks.is_empty()
			});
		}
	}

	pub fn set_max_size(&mut self, max_size: u32) {
		self.max_size = max_size;
		if let Some(head_num) = self.head().map(|head| head.num) {
			self.prune_below(head_num.saturating_sub(max_size));
		}
	}

	pub fn set_head(&mut self, id: BlockId) {
		self.head = Some(id);
	}

	/// Rewinds head by one along the parent link.
	pub fn pop_block(&mut self) {
		if let Some(head) = self.head() {
			let previous = head.previous;
			self.head = self.items.contains_key(&previous).then_some(previous);
		}
	}

	pub fn remove(&mut self, id: &BlockId) {
		if let Some(item) = self.items.remove(id) {
			if let Some(ids) = self.by_num.get_mut(&item.num) {
				ids.remove(id);
			}
			if self.head == Some(*id) {
				self.head = None;
			}
		}
	}

	/// The branch from `from` down to (and including) the block whose
	/// parent is `ancestor`, newest-first. Fails if the walk leaves the
	/// fork database before reaching `ancestor`.
	pub fn collect_branch_to(
		&self,
		from: BlockId,
		ancestor: BlockId,
	) -> Result<Vec<ForkItem>> {
		let mut branch = Vec::new();
		let mut cursor = from;
		while cursor != ancestor {
			let item = self.items.get(&cursor).ok_or_else(|| {
				Error::Precondition(format!("block {from} does not descend from {ancestor}"))
			})?;
			branch.push(item.clone());
			cursor = item.previous;
		}
		Ok(branch)
	}

	/// Walks both ids toward their common ancestor. The first vector holds
	/// the branch from `first` down to (and including) the first block
	/// whose parent is shared; same for the second. Branches come back
	/// newest-first.
	pub fn fetch_branch_from(
		&self,
		first: BlockId,
		second: BlockId,
	) -> Result<(Vec<ForkItem>, Vec<ForkItem>)> {
		let fetch = |id: &BlockId| -> Result<&ForkItem> {
			self.items
				.get(id)
				.ok_or_else(|| Error::Precondition(format!("block {id} not in fork database")))
		};
		let mut first_item = fetch(&first)?;
		let mut second_item = fetch(&second)?;
		let mut first_branch = Vec::new();
		let mut second_branch = Vec::new();

		while first_item.num > second_item.num {
			first_branch.push(first_item.clone());
			first_item = fetch(&first_item.previous)?;
		}
		while second_item.num > first_item.num {
			second_branch.push(second_item.clone());
			second_item = fetch(&second_item.previous)?;
		}
		while first_item.previous != second_item.previous {
			first_branch.push(first_item.clone());
			second_branch.push(second_item.clone());
			first_item = fetch(&first_item.previous)?;
			second_item = fetch(&second_item.previous)?;
		}
		if first_item.id != second_item.id {
			first_branch.push(first_item.clone());
			second_branch.push(second_item.clone());
		}
		Ok((first_branch, second_branch))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use onyx_protocol::{BlockHeader, Digest};
	use onyx_primitives::{TimePointSec, WitnessId};

	fn secret() -> secp256k1::SecretKey {
		secp256k1::SecretKey::from_slice(&[11u8; 32]).unwrap()
	}

	fn make_block(previous: BlockId, seq: u32) -> SignedBlock {
		SignedBlock::new(
			BlockHeader {
				previous,
				timestamp: TimePointSec::new(seq * 5),
				witness: WitnessId::new(0),
				transaction_merkle_root: Digest::default(),
				extensions: Vec::new(),
			},
			Vec::new(),
			&secret(),
		)
	}

	fn chain_of(len: u32) -> (ForkDatabase, Vec<SignedBlock>) {
		let mut fork_db = ForkDatabase::new(64);
		let mut blocks = Vec::new();
		let mut previous = BlockId::default();
		for seq in 0..len {
			let block = make_block(previous, seq);
			previous = block.id();
			if seq == 0 {
				fork_db.start_block(block.clone());
			} else {
				fork_db.push_block(block.clone()).unwrap();
			}
			blocks.push(block);
		}
		(fork_db, blocks)
	}

	#[test]
	fn head_tracks_the_longest_branch() {
		let (fork_db, blocks) = chain_of(4);
		assert_eq!(fork_db.head().unwrap().id, blocks[3].id());
	}

	#[test]
	fn orphans_are_parked_then_adopted() {
		let (mut fork_db, blocks) = chain_of(2);
		let missing = make_block(blocks[1].id(), 2);
		let orphan = make_block(missing.id(), 3);
		assert!(!fork_db.push_block(orphan.clone()).unwrap());
		assert!(!fork_db.is_known_block(&orphan.id()));
		// Arrival of the parent links the child recursively.
		fork_db.push_block(missing.clone()).unwrap();
		assert!(fork_db.is_known_block(&orphan.id()));
		assert_eq!(fork_db.head().unwrap().id, orphan.id());
	}

	#[test]
	fn branch_walk_meets_at_the_common_ancestor() {
		let (mut fork_db, blocks) = chain_of(3);
		// Fork off block 1 with different timestamps.
		let b2a = blocks[2].clone();
		let mut previous = blocks[1].id();
		let mut branch = Vec::new();
		for seq in 10..13 {
			let block = make_block(previous, seq);
			previous = block.id();
			fork_db.push_block(block.clone()).unwrap();
			branch.push(block);
		}
		let (from_new, from_old) = fork_db
			.fetch_branch_from(branch.last().unwrap().id(), b2a.id())
			.unwrap();
		assert_eq!(from_new.len(), 3);
		assert_eq!(from_old.len(), 1);
		assert_eq!(from_new.last().unwrap().previous, blocks[1].id());
		assert_eq!(from_old.last().unwrap().previous, blocks[1].id());
	}

	#[test]
	fn every_item_links_back_to_the_root() {
		let (fork_db, blocks) = chain_of(6);
		let mut current = fork_db.head().unwrap();
		let mut steps = 0;
		while fork_db.is_known_block(&current.previous) {
			current = fork_db.fetch_block(&current.previous).unwrap();
			steps += 1;
		}
		assert_eq!(current.id, blocks[0].id());
		assert_eq!(steps, 5);
	}

	#[test]
	fn pruning_respects_the_window() {
		let mut fork_db = ForkDatabase::new(2);
		let mut previous = BlockId::default();
		let mut first_id = None;
		for seq in 0..6 {
			let block = make_block(previous, seq);
			previous = block.id();
			if seq == 0 {
				first_id = Some(block.id());
				fork_db.start_block(block);
			} else {
				fork_db.push_block(block).unwrap();
			}
		}
		assert!(!fork_db.is_known_block(&first_id.unwrap()));
	}

	#[test]
	fn pop_block_walks_the_parent_pointer() {
		let (mut fork_db, blocks) = chain_of(3);
		fork_db.pop_block();
		assert_eq!(fork_db.head().unwrap().id, blocks[1].id());
	}

	#[test]
	fn stale_blocks_are_rejected() {
		let (mut fork_db, _) = chain_of(40);
		fork_db.set_max_size(8);
		let stale = make_block(BlockId::default(), 99);
		assert!(fork_db.push_block(stale).is_err());
	}
}
