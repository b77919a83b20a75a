//! Node assembly: database startup (snapshot or replay), the block log,
//! and the witness production loop.

use crate::block_log::BlockLog;
use anyhow::{bail, Context};
use onyx_chain::{initialize_from_genesis, skip, Database};
use onyx_primitives::TimePointSec;
use onyx_protocol::{GenesisState, PublicKey};
use std::{
	path::{Path, PathBuf},
	time::{SystemTime, UNIX_EPOCH},
};

pub struct NodeConfig {
	pub data_dir: PathBuf,
	pub genesis: GenesisState,
	pub replay_blockchain: bool,
	pub resync_blockchain: bool,
	pub force_validate: bool,
	pub signing_key: Option<secp256k1::SecretKey>,
}

pub struct Node {
	pub db: Database,
	pub block_log: BlockLog,
	data_dir: PathBuf,
	signing_key: Option<secp256k1::SecretKey>,
}

impl Node {
	/// Opens the data directory, builds genesis state and brings the
	/// database up to the block log's head.
	pub fn open(config: NodeConfig) -> anyhow::Result<Self> {
		let mut db = initialize_from_genesis(&config.genesis)
			.context("constructing genesis state")?;
		tracing::info!(chain_id = %db.chain_id(), "genesis state constructed");

		let snapshot_dir = config.data_dir.join("object_database");
		if config.resync_blockchain && snapshot_dir.exists() {
			tracing::info!("resync requested; wiping the object database snapshot");
			std::fs::remove_dir_all(&snapshot_dir).context("wiping snapshot")?;
		}

		let mut block_log = BlockLog::open(&config.data_dir.join("block_log"))?;
		let log_head = block_log.last()?;
		let log_head_id = log_head.as_ref().map(|b| b.id()).unwrap_or_default();

		let mut snapshot_usable = false;
		if !config.replay_blockchain && !config.resync_blockchain && snapshot_dir.exists() {
			match load_snapshot(&mut db, &snapshot_dir) {
				Ok(()) if db.head_block_id() == log_head_id => snapshot_usable = true,
				Ok(()) => {
					tracing::warn!("snapshot does not match the block log; replaying instead");
					db = initialize_from_genesis(&config.genesis)?;
				},
				Err(error) => {
					tracing::warn!(%error, "snapshot unreadable; replaying instead");
					db = initialize_from_genesis(&config.genesis)?;
				},
			}
		}
		if snapshot_usable {
			tracing::info!(head = db.head_block_num(), "started from object database snapshot");
			if let Some(head) = log_head {
				db.fork_db_mut().start_block(head);
			}
		} else if let Some(log_head) = log_head {
			let skip_flags =
				if config.force_validate { skip::NOTHING } else { skip::REPLAY };
			tracing::info!(target_head = log_head.block_num(), "replaying blockchain");
			for block_num in 1..=log_head.block_num() {
				let Some(block) = block_log.fetch_by_number(block_num)? else {
					bail!("block log has a hole at {block_num}; cannot replay");
				};
				db.push_block(&block, skip_flags)
					.with_context(|| format!("replaying block {block_num}"))?;
				if block_num % 10_000 == 0 {
					tracing::info!(block_num, "replay progress");
				}
			}
			tracing::info!(head = db.head_block_num(), "replay complete");
		}

		Ok(Self {
			db,
			block_log,
			data_dir: config.data_dir,
			signing_key: config.signing_key,
		})
	}

	/// Persists the object database for fast startup, then flushes the
	/// block log.
	pub fn close(mut self) -> anyhow::Result<()> {
		save_snapshot(&self.db, &self.data_dir.join("object_database"))?;
		self.block_log.flush()?;
		tracing::info!("node state persisted");
		Ok(())
	}

	/// Runs block production until shutdown is requested. Without a signing
	/// key this only sleeps, keeping the process alive for observers.
	pub async fn run(&mut self) -> anyhow::Result<()> {
		let interval = self.db.block_interval() as u64;
		loop {
			let next_slot_time = self.db.get_slot_time(1).seconds() as u64;
			let now = unix_now();
			let wait = next_slot_time.saturating_sub(now).max(1);
			tokio::select! {
				_ = tokio::signal::ctrl_c() => {
					tracing::info!("shutdown requested");
					return Ok(());
				},
				_ = tokio::time::sleep(std::time::Duration::from_secs(wait)) => {},
			}
			if let Err(error) = self.try_produce(interval) {
				tracing::warn!(%error, "block production failed");
			}
		}
	}

	fn try_produce(&mut self, interval: u64) -> anyhow::Result<()> {
		let Some(signing_key) = self.signing_key else { return Ok(()) };
		let now = unix_now();
		let slot = self.db.get_slot_at_time(TimePointSec::new(now as u32));
		if slot == 0 {
			return Ok(());
		}
		let slot_time = self.db.get_slot_time(slot);
		// Half the interval is the production deadline; after that the slot
		// is forfeited.
		if now > slot_time.seconds() as u64 + interval / 2 {
			tracing::debug!(slot, "missed the production deadline; skipping slot");
			return Ok(());
		}
		let scheduled = self.db.get_scheduled_witness(slot)?;
		let witness = self.db.witness(scheduled)?;
		if witness.signing_key != PublicKey::from_secret(&signing_key) {
			return Ok(());
		}
		let block =
			self.db
				.generate_block(slot_time, scheduled, &signing_key, &[], skip::NOTHING)?;
		self.block_log.store(&block)?;
		self.block_log.flush()?;
		tracing::info!(num = block.block_num(), id = %block.id(), "produced block");
		Ok(())
	}
}

fn unix_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).expect("clock before epoch").as_secs()
}

/// One file per `(space, type)` index under per-space directories.
pub fn save_snapshot(db: &Database, directory: &Path) -> anyhow::Result<()> {
	for ((space, ty), bytes) in db.snapshot_parts() {
		let dir = directory.join(space.to_string());
		std::fs::create_dir_all(&dir)?;
		std::fs::write(dir.join(ty.to_string()), bytes)?;
	}
	Ok(())
}

pub fn load_snapshot(db: &mut Database, directory: &Path) -> anyhow::Result<()> {
	for ((space, ty), _) in db.snapshot_parts() {
		let path = directory.join(space.to_string()).join(ty.to_string());
		let bytes = std::fs::read(&path)
			.with_context(|| format!("reading snapshot part {}", path.display()))?;
		db.load_snapshot_part((space, ty), &bytes)
			.map_err(|e| anyhow::anyhow!("loading snapshot part {space}.{ty}: {e}"))?;
	}
	Ok(())
}
