use codec::{Decode, Encode};
use onyx_primitives::{BlockSummaryId, ShareAmount, TimePointSec, WitnessId};
use onyx_protocol::{BlockId, ChainParameters};
use serde::{Deserialize, Serialize};

/// Singleton: committee-approved parameters and the active witness set.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct GlobalPropertiesObject {
	pub instance: u64,
	pub parameters: ChainParameters,
	/// Sorted by id; installed at maintenance from the vote tally.
	pub active_witnesses: Vec<WitnessId>,
}

pub mod dynamic_flags {
	/// Set while the head block is a maintenance block; the scheduler skips
	/// extra slots after one.
	pub const MAINTENANCE: u32 = 0x01;
}

/// Singleton: everything about chain state that changes every block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct DynamicGlobalPropertiesObject {
	pub instance: u64,
	pub head_block_number: u32,
	pub head_block_id: BlockId,
	pub time: TimePointSec,
	pub current_witness: WitnessId,
	pub next_maintenance_time: TimePointSec,
	/// Core available to pay witnesses, refilled from the network fee share
	/// at maintenance.
	pub witness_budget: ShareAmount,
	/// Absolute slot number of the head block since genesis.
	pub current_aslot: u64,
	/// Shift register of the last 128 slots; bit 0 is the head slot. Drives
	/// the participation rate.
	pub recent_slots_filled: u128,
	pub recently_missed_count: u32,
	pub dynamic_flags: u32,
	pub last_irreversible_block_num: u32,
}

impl DynamicGlobalPropertiesObject {
	pub fn head_is_maintenance_block(&self) -> bool {
		self.dynamic_flags & dynamic_flags::MAINTENANCE != 0
	}
}

/// One ring slot of the TaPoS window: the id of block
/// `n ≡ instance (mod 2^16)`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct BlockSummaryObject {
	pub id: BlockSummaryId,
	pub block_id: BlockId,
}
