use crate::{ensure, fee::FeeSchedule, ValidationResult};
use codec::{Decode, Encode};
use onyx_primitives::{constants::*, ShareAmount};
use serde::{Deserialize, Serialize};

/// Committee-tunable chain parameters, installed at genesis and thereafter
/// only changed across a maintenance boundary.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct ChainParameters {
	pub current_fees: FeeSchedule,
	/// Seconds between slots.
	pub block_interval: u8,
	/// Seconds between maintenance intervals.
	pub maintenance_interval: u32,
	/// Slots skipped after a maintenance block.
	pub maintenance_skip_slots: u8,
	pub maximum_transaction_size: u32,
	pub maximum_block_size: u32,
	/// Furthest a transaction expiration may lie in the future.
	pub maximum_time_until_expiration: u32,
	pub maximum_witness_count: u16,
	pub maximum_authority_membership: u16,
	/// Share of fees taken by the network at maintenance (the burn comes
	/// out of this).
	pub network_percent_of_fee: u16,
	pub lifetime_referrer_percent_of_fee: u16,
	/// Portion of the network share that is burned into accumulated fees.
	pub burn_percent_of_fee: u16,
	pub witness_pay_per_block: ShareAmount,
	/// Bulk-discount rebate schedule: fees paid beyond `threshold_min`
	/// earn a linearly growing rebate, capped at `max_percent` from
	/// `threshold_max` onward.
	pub bulk_discount_threshold_min: ShareAmount,
	pub bulk_discount_threshold_max: ShareAmount,
	pub max_bulk_discount_percent: u16,
}

impl Default for ChainParameters {
	fn default() -> Self {
		Self {
			current_fees: FeeSchedule::default(),
			block_interval: DEFAULT_BLOCK_INTERVAL_SECS,
			maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL_SECS,
			maintenance_skip_slots: DEFAULT_MAINTENANCE_SKIP_SLOTS,
			maximum_transaction_size: DEFAULT_MAX_TRANSACTION_SIZE,
			maximum_block_size: DEFAULT_MAX_BLOCK_SIZE,
			maximum_time_until_expiration: DEFAULT_MAX_TIME_UNTIL_EXPIRATION_SECS,
			maximum_witness_count: DEFAULT_MAX_WITNESSES,
			maximum_authority_membership: DEFAULT_MAX_AUTHORITY_MEMBERSHIP,
			network_percent_of_fee: DEFAULT_NETWORK_PERCENT_OF_FEE,
			lifetime_referrer_percent_of_fee: DEFAULT_LIFETIME_REFERRER_PERCENT_OF_FEE,
			burn_percent_of_fee: DEFAULT_BURN_PERCENT_OF_FEE,
			witness_pay_per_block: DEFAULT_WITNESS_PAY_PER_BLOCK,
			bulk_discount_threshold_min: CORE_UNIT * 100,
			bulk_discount_threshold_max: CORE_UNIT * 10_000,
			max_bulk_discount_percent: 50 * ONE_PERCENT,
		}
	}
}

impl ChainParameters {
	pub fn validate(&self) -> ValidationResult {
		ensure!(
			(MIN_BLOCK_INTERVAL_SECS..=MAX_BLOCK_INTERVAL_SECS).contains(&self.block_interval),
			"block interval {} outside [{MIN_BLOCK_INTERVAL_SECS}, {MAX_BLOCK_INTERVAL_SECS}]",
			self.block_interval
		);
		ensure!(
			self.maintenance_interval >= self.block_interval as u32,
			"maintenance interval shorter than a block"
		);
		ensure!(
			self.maintenance_interval % self.block_interval as u32 == 0,
			"maintenance interval must be a multiple of the block interval"
		);
		ensure!(
			self.maximum_transaction_size >= MIN_TRANSACTION_SIZE_LIMIT,
			"maximum transaction size too small to operate"
		);
		ensure!(
			self.maximum_block_size >= MIN_BLOCK_SIZE_LIMIT,
			"maximum block size too small to operate"
		);
		ensure!(self.maximum_witness_count % 2 == 1, "maximum witness count must be odd");
		for (name, percent) in [
			("network_percent_of_fee", self.network_percent_of_fee),
			("lifetime_referrer_percent_of_fee", self.lifetime_referrer_percent_of_fee),
			("burn_percent_of_fee", self.burn_percent_of_fee),
			("max_bulk_discount_percent", self.max_bulk_discount_percent),
		] {
			ensure!(percent <= FULL_PERCENT, "{name} exceeds 100%");
		}
		ensure!(
			self.network_percent_of_fee as u32 + self.lifetime_referrer_percent_of_fee as u32 <=
				FULL_PERCENT as u32,
			"network and lifetime referrer shares exceed 100%"
		);
		ensure!(
			self.bulk_discount_threshold_min <= self.bulk_discount_threshold_max,
			"bulk discount thresholds out of order"
		);
		ensure!(self.bulk_discount_threshold_min > 0, "bulk discount threshold must be positive");
		Ok(())
	}
}
