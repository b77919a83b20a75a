//! Witness slot scheduling.
//!
//! Each witness gets an arbitration key `H(slot_time, witness_id)` from the
//! xorshift* generator; the eligible witness with the largest key takes the
//! slot. Witnesses that produced within the last `min_separation` absolute
//! slots of the round are filtered out, which spreads production without
//! locking in a fixed permutation.

use super::Database;
use crate::{objects::WitnessObject, Error, Result};
use onyx_primitives::{
	constants::{FULL_PERCENT, SCHEDULER_PRF_MULTIPLIER},
	TimePointSec, WitnessId,
};

impl Database {
	/// The witness scheduled for `slot_num` slots after the head block.
	/// Slot 0 is the head block itself.
	pub fn get_scheduled_witness(&self, slot_num: u32) -> Result<WitnessId> {
		let gpo = self.global_properties();
		let active = &gpo.active_witnesses;
		let n = active.len() as u64;
		if n == 0 {
			return Err(Error::Internal("no active witnesses".into()));
		}
		if n == 1 {
			return Ok(active[0]);
		}
		// For fewer than five witnesses the usual (n/2)+1 separation would
		// lock the rotation into one permutation; degrade to tabulated
		// values instead.
		let min_separation = match n {
			2 | 3 => 1,
			4 => 2,
			_ => n / 2 + 1,
		};

		let dpo = self.dynamic_global_properties();
		let current_aslot = dpo.current_aslot + slot_num as u64;

		if slot_num == 0 {
			// The witness that produced the head block.
			for id in active {
				if self.witness(*id)?.last_aslot >= current_aslot {
					return Ok(*id);
				}
			}
		}

		let start_of_round = current_aslot - current_aslot % n;
		// If current_aslot < min_separation then start_of_round is zero, so
		// the min() result is zero when the subtraction would underflow.
		let first_ineligible =
			start_of_round.min(current_aslot.saturating_sub(min_separation)).max(1);

		let now_hi = (self.get_slot_time(slot_num).seconds() as u64) << 32;
		let mut best: Option<(u64, WitnessId)> = None;
		for id in active {
			let witness = self.witness(*id)?;
			if witness.last_aslot >= first_ineligible {
				continue;
			}
			let mut k = now_hi ^ id.instance().wrapping_mul(SCHEDULER_PRF_MULTIPLIER);
			k ^= k >> 12;
			k ^= k << 25;
			k ^= k >> 27;
			k = k.wrapping_mul(SCHEDULER_PRF_MULTIPLIER);
			if best.map(|(best_k, _)| k >= best_k).unwrap_or(true) {
				best = Some((k, *id));
			}
		}
		// At most min_separation <= n witnesses can be filtered, so a miss
		// means last_aslot values are inconsistent or non-unique.
		best.map(|(_, id)| id).ok_or_else(|| {
			Error::Internal(format!(
				"no eligible witness for slot {slot_num} (aslot {current_aslot}, {n} active)"
			))
		})
	}

	/// Wall-clock time of the given future slot. Slot 0 is the head block's
	/// slot; slot 1 skips `maintenance_skip_slots` extra slots when the head
	/// block crossed a maintenance boundary.
	pub fn get_slot_time(&self, slot_num: u32) -> TimePointSec {
		if slot_num == 0 {
			return TimePointSec::default();
		}
		let interval = self.block_interval() as u32;
		let dpo = self.dynamic_global_properties();

		if dpo.head_block_number == 0 {
			// The first block is one slot past genesis time.
			return dpo.time + slot_num * interval;
		}

		let head_slot_time =
			TimePointSec::new(dpo.time.seconds() / interval * interval);
		let skip = if dpo.head_is_maintenance_block() {
			self.chain_parameters().maintenance_skip_slots as u32
		} else {
			0
		};
		head_slot_time + (slot_num + skip) * interval
	}

	/// The slot number `when` falls into; 0 if it is not past slot 1.
	pub fn get_slot_at_time(&self, when: TimePointSec) -> u32 {
		let first_slot_time = self.get_slot_time(1);
		if when < first_slot_time {
			return 0;
		}
		(when.seconds() - first_slot_time.seconds()) / self.block_interval() as u32 + 1
	}

	/// Fraction of the last 128 slots that produced a block, in basis
	/// points.
	pub fn witness_participation_rate(&self) -> u16 {
		let filled = self.dynamic_global_properties().recent_slots_filled.count_ones() as u64;
		(FULL_PERCENT as u64 * filled / 128) as u16
	}

	/// All witnesses, for schedule-sensitive maintenance bookkeeping.
	pub(crate) fn active_witness_objects(&self) -> Result<Vec<WitnessObject>> {
		self.global_properties()
			.active_witnesses
			.iter()
			.map(|id| self.witness(*id).cloned())
			.collect()
	}
}
