//! The fee schedule and the exact-split percentage arithmetic used when
//! fees are distributed at maintenance.

use codec::{Decode, Encode};
use onyx_primitives::{constants::FULL_PERCENT, ShareAmount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `floor(amount * percent / 10_000)` with exact degenerate cases. Splits
/// built from `cut` must route the residual to a designated party so the
/// parts always sum to the input.
pub fn cut(amount: ShareAmount, percent: u16) -> ShareAmount {
	if percent == 0 {
		return 0;
	}
	if percent >= FULL_PERCENT {
		return amount;
	}
	(amount as i128 * percent as i128 / FULL_PERCENT as i128) as ShareAmount
}

/// Fee parameters for one operation type.
#[derive(
	Copy, Clone, Debug, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize,
)]
pub struct FeeParameters {
	/// Flat fee in core minimal units.
	pub fee: u64,
	/// Additional fee per kilobyte of serialized payload, truncated toward
	/// zero.
	pub price_per_kbyte: u32,
}

/// The committee-maintained fee table, keyed by operation tag.
///
/// Tags absent from the table are free; `scale` is a global fixed-point
/// multiplier with denominator 10_000.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct FeeSchedule {
	pub parameters: BTreeMap<u8, FeeParameters>,
	pub scale: u32,
}

impl Default for FeeSchedule {
	fn default() -> Self {
		Self { parameters: BTreeMap::new(), scale: FULL_PERCENT as u32 }
	}
}

impl FeeSchedule {
	/// A schedule charging the same flat fee for every operation type.
	pub fn flat(fee: u64) -> Self {
		let parameters =
			crate::operations::ALL_OPERATION_TAGS
				.iter()
				.map(|tag| (*tag, FeeParameters { fee, price_per_kbyte: 0 }))
				.collect();
		Self { parameters, scale: FULL_PERCENT as u32 }
	}

	pub fn parameters_for(&self, tag: u8) -> FeeParameters {
		self.parameters.get(&tag).copied().unwrap_or_default()
	}

	/// The core-asset fee for `op` under this schedule.
	pub fn calculate_fee(&self, op: &crate::operations::Operation) -> ShareAmount {
		let params = self.parameters_for(op.tag());
		let mut fee = params.fee as i128;
		if params.price_per_kbyte > 0 {
			let size = op.encoded_size() as i128;
			fee += params.price_per_kbyte as i128 * size / 1024;
		}
		let scaled = fee * self.scale as i128 / FULL_PERCENT as i128;
		scaled.min(onyx_primitives::constants::MAX_SHARE_SUPPLY as i128) as ShareAmount
	}
}
