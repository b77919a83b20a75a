//! The append-only block log: a `blocks` file of concatenated serialized
//! blocks and an `index` file of fixed 32-byte little-endian records, one
//! per block number. A record with `block_size == 0` is a hole left by a
//! removed block.

use anyhow::{bail, Context};
use codec::{Decode, Encode};
use onyx_protocol::{BlockId, SignedBlock};
use std::{
	fs::{File, OpenOptions},
	io::{Read, Seek, SeekFrom, Write},
	path::Path,
};

const INDEX_ENTRY_SIZE: u64 = 8 + 4 + 20;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct IndexEntry {
	block_pos: u64,
	block_size: u32,
	block_id: BlockId,
}

impl IndexEntry {
	fn to_bytes(self) -> [u8; INDEX_ENTRY_SIZE as usize] {
		let mut bytes = [0u8; INDEX_ENTRY_SIZE as usize];
		bytes[..8].copy_from_slice(&self.block_pos.to_le_bytes());
		bytes[8..12].copy_from_slice(&self.block_size.to_le_bytes());
		bytes[12..].copy_from_slice(&self.block_id.0);
		bytes
	}

	fn from_bytes(bytes: [u8; INDEX_ENTRY_SIZE as usize]) -> Self {
		let mut id = [0u8; 20];
		id.copy_from_slice(&bytes[12..]);
		Self {
			block_pos: u64::from_le_bytes(bytes[..8].try_into().expect("8 bytes")),
			block_size: u32::from_le_bytes(bytes[8..12].try_into().expect("4 bytes")),
			block_id: BlockId(id),
		}
	}

	fn is_hole(&self) -> bool {
		self.block_size == 0
	}
}

pub struct BlockLog {
	blocks: File,
	index: File,
}

impl BlockLog {
	pub fn open(directory: &Path) -> anyhow::Result<Self> {
		std::fs::create_dir_all(directory)
			.with_context(|| format!("creating block log directory {}", directory.display()))?;
		let open = |name: &str| {
			OpenOptions::new()
				.read(true)
				.write(true)
				.create(true)
				.truncate(false)
				.open(directory.join(name))
				.with_context(|| format!("opening block log file {name}"))
		};
		Ok(Self { blocks: open("blocks")?, index: open("index")? })
	}

	fn read_entry(&mut self, block_num: u32) -> anyhow::Result<Option<IndexEntry>> {
		let position = INDEX_ENTRY_SIZE * block_num as u64;
		let len = self.index.seek(SeekFrom::End(0))?;
		if len < position + INDEX_ENTRY_SIZE {
			return Ok(None);
		}
		self.index.seek(SeekFrom::Start(position))?;
		let mut bytes = [0u8; INDEX_ENTRY_SIZE as usize];
		self.index.read_exact(&mut bytes)?;
		Ok(Some(IndexEntry::from_bytes(bytes)))
	}

	fn write_entry(&mut self, block_num: u32, entry: IndexEntry) -> anyhow::Result<()> {
		let position = INDEX_ENTRY_SIZE * block_num as u64;
		let len = self.index.seek(SeekFrom::End(0))?;
		// Backfill holes so record N always sits at offset N * 32.
		if len < position {
			let zeroes = vec![0u8; (position - len) as usize];
			self.index.write_all(&zeroes)?;
		}
		self.index.seek(SeekFrom::Start(position))?;
		self.index.write_all(&entry.to_bytes())?;
		Ok(())
	}

	/// Appends `block` and records it under its block number.
	pub fn store(&mut self, block: &SignedBlock) -> anyhow::Result<()> {
		let data = block.encode();
		let block_pos = self.blocks.seek(SeekFrom::End(0))?;
		self.blocks.write_all(&data)?;
		self.write_entry(
			block.block_num(),
			IndexEntry { block_pos, block_size: data.len() as u32, block_id: block.id() },
		)
	}

	/// Punches a hole where `id` was stored, if it still is.
	pub fn remove(&mut self, id: BlockId) -> anyhow::Result<()> {
		let block_num = id.num_from_id();
		let Some(mut entry) = self.read_entry(block_num)? else {
			bail!("block {id} is not in the block log");
		};
		if entry.block_id == id {
			entry.block_size = 0;
			self.write_entry(block_num, entry)?;
		}
		Ok(())
	}

	pub fn contains(&mut self, id: BlockId) -> anyhow::Result<bool> {
		Ok(self
			.read_entry(id.num_from_id())?
			.map(|entry| !entry.is_hole() && entry.block_id == id)
			.unwrap_or(false))
	}

	fn read_block(&mut self, entry: IndexEntry) -> anyhow::Result<SignedBlock> {
		let mut data = vec![0u8; entry.block_size as usize];
		self.blocks.seek(SeekFrom::Start(entry.block_pos))?;
		self.blocks.read_exact(&mut data)?;
		let block = SignedBlock::decode(&mut data.as_slice())
			.map_err(|e| anyhow::anyhow!("corrupt block at {}: {e}", entry.block_pos))?;
		if block.id() != entry.block_id {
			bail!("block at {} does not hash to its index entry", entry.block_pos);
		}
		Ok(block)
	}

	pub fn fetch_by_number(&mut self, block_num: u32) -> anyhow::Result<Option<SignedBlock>> {
		match self.read_entry(block_num)? {
			Some(entry) if !entry.is_hole() => Ok(Some(self.read_block(entry)?)),
			_ => Ok(None),
		}
	}

	pub fn fetch_optional(&mut self, id: BlockId) -> anyhow::Result<Option<SignedBlock>> {
		match self.read_entry(id.num_from_id())? {
			Some(entry) if !entry.is_hole() && entry.block_id == id =>
				Ok(Some(self.read_block(entry)?)),
			_ => Ok(None),
		}
	}

	/// The newest stored block, scanning backward over holes.
	pub fn last(&mut self) -> anyhow::Result<Option<SignedBlock>> {
		let len = self.index.seek(SeekFrom::End(0))?;
		let mut remaining = len / INDEX_ENTRY_SIZE;
		while remaining > 0 {
			remaining -= 1;
			let Some(entry) = self.read_entry(remaining as u32)? else { break };
			if !entry.is_hole() {
				return Ok(Some(self.read_block(entry)?));
			}
		}
		Ok(None)
	}

	pub fn flush(&mut self) -> anyhow::Result<()> {
		self.blocks.sync_data().context("flushing blocks file")?;
		self.index.sync_data().context("flushing index file")?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use onyx_primitives::{TimePointSec, WitnessId};
	use onyx_protocol::{BlockHeader, Digest};

	fn block(previous: BlockId, seconds: u32) -> SignedBlock {
		let secret = secp256k1::SecretKey::from_slice(&[3u8; 32]).unwrap();
		SignedBlock::new(
			BlockHeader {
				previous,
				timestamp: TimePointSec::new(seconds),
				witness: WitnessId::new(0),
				transaction_merkle_root: Digest::default(),
				extensions: Vec::new(),
			},
			Vec::new(),
			&secret,
		)
	}

	#[test]
	fn stores_and_fetches_blocks() {
		let dir = tempfile::tempdir().unwrap();
		let mut log = BlockLog::open(dir.path()).unwrap();
		let b1 = block(BlockId::default(), 5);
		let b2 = block(b1.id(), 10);
		log.store(&b1).unwrap();
		log.store(&b2).unwrap();

		assert_eq!(log.fetch_by_number(1).unwrap(), Some(b1.clone()));
		assert_eq!(log.fetch_optional(b2.id()).unwrap(), Some(b2.clone()));
		assert_eq!(log.last().unwrap(), Some(b2));
		assert!(log.contains(b1.id()).unwrap());
	}

	#[test]
	fn last_skips_holes() {
		let dir = tempfile::tempdir().unwrap();
		let mut log = BlockLog::open(dir.path()).unwrap();
		let b1 = block(BlockId::default(), 5);
		let b2 = block(b1.id(), 10);
		log.store(&b1).unwrap();
		log.store(&b2).unwrap();
		log.remove(b2.id()).unwrap();

		assert_eq!(log.fetch_by_number(2).unwrap(), None);
		assert_eq!(log.last().unwrap(), Some(b1));
	}

	#[test]
	fn survives_reopen() {
		let dir = tempfile::tempdir().unwrap();
		let b1 = block(BlockId::default(), 5);
		{
			let mut log = BlockLog::open(dir.path()).unwrap();
			log.store(&b1).unwrap();
			log.flush().unwrap();
		}
		let mut log = BlockLog::open(dir.path()).unwrap();
		assert_eq!(log.last().unwrap(), Some(b1));
	}
}
