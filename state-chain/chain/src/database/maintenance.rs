//! The maintenance interval: fee distribution, witness elections, force
//! settlements, feed refresh and order expiry.

use super::Database;
use crate::{
	objects::{
		AccountStatisticsObject, AssetBitassetDataObject, AssetDynamicDataObject,
		ForceSettlementObject, GlobalPropertiesObject, WitnessObject,
	},
	Result,
};
use onyx_primitives::{
	AccountId, AssetId, ForceSettlementId, ShareAmount, TimePointSec, WitnessId, CORE_ASSET,
};
use onyx_protocol::{
	fee::cut,
	operations::{FillOrderOperation, Operation, OperationResult},
	Asset, ChainParameters, SignedBlock,
};
use std::collections::BTreeMap;

/// The rebate percentage an account has earned through lifetime fees:
/// linear between the two thresholds, capped beyond.
fn bulk_discount_percent(params: &ChainParameters, lifetime_fees_paid: ShareAmount) -> u16 {
	if lifetime_fees_paid < params.bulk_discount_threshold_min {
		return 0;
	}
	if lifetime_fees_paid >= params.bulk_discount_threshold_max {
		return params.max_bulk_discount_percent;
	}
	let span =
		(params.bulk_discount_threshold_max - params.bulk_discount_threshold_min) as i128;
	let progress = (lifetime_fees_paid - params.bulk_discount_threshold_min) as i128;
	(params.max_bulk_discount_percent as i128 * progress / span) as u16
}

impl Database {
	pub(crate) fn perform_chain_maintenance(&mut self, block: &SignedBlock) -> Result<()> {
		tracing::info!(block = block.block_num(), "performing chain maintenance");
		self.distribute_pending_fees()?;
		self.update_active_witnesses()?;
		self.reset_settlement_volumes()?;
		self.process_force_settlements(block.timestamp)?;
		self.update_expired_feeds(block.timestamp)?;
		self.clear_expired_orders(block.timestamp)?;

		let interval = self.chain_parameters().maintenance_interval;
		self.modify_dynamic_globals(|dgp| {
			while dgp.next_maintenance_time <= block.timestamp {
				dgp.next_maintenance_time = dgp.next_maintenance_time + interval;
			}
		})
	}

	/// Splits every account's pending fee buckets exactly: bulk-discount
	/// rebate back to the payer, network share (partly burned, the rest
	/// funding witness pay), lifetime-referrer share, then the
	/// referrer/registrar split with the rounding residual landing on the
	/// registrar.
	fn distribute_pending_fees(&mut self) -> Result<()> {
		let params = self.chain_parameters().clone();
		let stats_ids: Vec<u64> = self
			.store
			.account_statistics
			.iter()
			.filter(|stats| stats.pending_fees + stats.pending_vested_fees > 0)
			.map(|stats| stats.id.instance())
			.collect();

		let mut burned_total: ShareAmount = 0;
		let mut budget_total: ShareAmount = 0;
		for instance in stats_ids {
			let stats = self.get::<AccountStatisticsObject>(instance)?.clone();
			let account = self.account(stats.owner)?.clone();
			let total = stats.pending_fees + stats.pending_vested_fees;

			let rebate = cut(total, bulk_discount_percent(&params, stats.lifetime_fees_paid));
			let after_rebate = total - rebate;
			let network = cut(after_rebate, params.network_percent_of_fee);
			let burned = cut(network, params.burn_percent_of_fee);
			let lifetime_share = cut(after_rebate, params.lifetime_referrer_percent_of_fee);
			let referral = after_rebate - network - lifetime_share;
			let referrer_share = cut(referral, account.referrer_rewards_percentage);
			let registrar_share = referral - referrer_share;

			self.adjust_balance(stats.owner, Asset::new(rebate, CORE_ASSET))?;
			self.adjust_balance(account.lifetime_referrer, Asset::new(lifetime_share, CORE_ASSET))?;
			self.adjust_balance(account.referrer, Asset::new(referrer_share, CORE_ASSET))?;
			self.adjust_balance(account.registrar, Asset::new(registrar_share, CORE_ASSET))?;
			burned_total += burned;
			budget_total += network - burned;

			self.modify::<AccountStatisticsObject>(instance, |stats| {
				stats.pending_fees = 0;
				stats.pending_vested_fees = 0;
			})?;
		}

		if burned_total > 0 {
			let core_dynamic = self.asset(CORE_ASSET)?.dynamic_data;
			self.modify::<AssetDynamicDataObject>(core_dynamic.instance(), |dynamic| {
				dynamic.accumulated_fees += burned_total;
			})?;
		}
		if budget_total > 0 {
			self.modify_dynamic_globals(|dgp| dgp.witness_budget += budget_total)?;
		}
		Ok(())
	}

	/// Stake-weighted witness election. Each account's core balance plus
	/// core locked in orders backs its votes (or its proxy's votes); the
	/// top witnesses by vote, bounded by the committee-voted maximum and
	/// forced odd, become the active set.
	fn update_active_witnesses(&mut self) -> Result<()> {
		let voters: Vec<(AccountId, Option<AccountId>)> = self
			.store
			.accounts
			.iter()
			.map(|account| (account.id, account.options.voting_account))
			.collect();

		let mut tally: BTreeMap<WitnessId, u64> = BTreeMap::new();
		for (voter, proxy) in voters {
			let stats = self.account_statistics(voter)?;
			let stake = (self.get_balance(voter, CORE_ASSET).amount +
				stats.total_core_in_orders) as u64;
			if stake == 0 {
				continue;
			}
			let ballot_holder = proxy.unwrap_or(voter);
			let votes = self.account(ballot_holder)?.options.witness_votes.clone();
			for witness in votes {
				*tally.entry(witness).or_default() += stake;
			}
		}

		let witness_ids: Vec<WitnessId> =
			self.store.witnesses.iter().map(|witness| witness.id).collect();
		for id in &witness_ids {
			let votes = tally.get(id).copied().unwrap_or(0);
			self.modify::<WitnessObject>(id.instance(), |witness| {
				witness.total_votes = votes;
			})?;
		}

		let mut ranked = witness_ids;
		ranked.sort_by_key(|id| (std::cmp::Reverse(tally.get(id).copied().unwrap_or(0)), *id));
		let mut count = ranked.len().min(self.chain_parameters().maximum_witness_count as usize);
		if count > 1 && count % 2 == 0 {
			count -= 1;
		}
		let mut active: Vec<WitnessId> = ranked.into_iter().take(count).collect();
		active.sort_unstable();

		self.modify::<GlobalPropertiesObject>(0, |gpo| {
			gpo.active_witnesses = active;
		})
	}

	fn reset_settlement_volumes(&mut self) -> Result<()> {
		let instances: Vec<u64> = self
			.store
			.asset_bitasset_data
			.iter()
			.filter(|bitasset| bitasset.force_settled_volume != 0)
			.map(|bitasset| bitasset.id.instance())
			.collect();
		for instance in instances {
			self.modify::<AssetBitassetDataObject>(instance, |bitasset| {
				bitasset.force_settled_volume = 0;
			})?;
		}
		Ok(())
	}

	/// Executes queued settlements whose date has arrived, FIFO per asset,
	/// bounded by the per-interval volume cap. Assets without a live feed
	/// cancel their queue; globally settled assets redeem from the fund.
	pub(crate) fn process_force_settlements(&mut self, now: TimePointSec) -> Result<()> {
		let mut due: BTreeMap<AssetId, Vec<ForceSettlementId>> = BTreeMap::new();
		for (asset_id, date, settlement_id) in self.store.settlement_by_date.iter() {
			if *date <= now {
				due.entry(*asset_id).or_default().push(*settlement_id);
			}
		}

		for (asset_id, settlement_ids) in due {
			let asset = self.asset(asset_id)?.clone();
			let bitasset = self.asset_bitasset(&asset)?.clone();

			if bitasset.has_settlement() {
				for id in settlement_ids {
					self.settle_from_fund(id)?;
				}
				continue;
			}
			if !bitasset.feed_is_valid() {
				tracing::warn!(asset = %asset.symbol, "no feed; cancelling queued settlements");
				for id in settlement_ids {
					self.cancel_force_settlement(id)?;
				}
				continue;
			}

			let supply = self.asset_dynamic(&asset)?.current_supply;
			let cap =
				(bitasset.max_force_settlement_volume(supply) - bitasset.force_settled_volume)
					.max(0);
			let settle_price = bitasset.current_feed.settlement_price;
			let offset = bitasset.options.force_settlement_offset_percent;

			let mut remaining = cap;
			for id in settlement_ids {
				if remaining <= 0 {
					break;
				}
				let settled = self.execute_force_settlement(id, settle_price, offset, remaining)?;
				if settled == 0 {
					break;
				}
				remaining -= settled;
			}
			let consumed = cap - remaining;
			if consumed > 0 {
				self.modify::<AssetBitassetDataObject>(
					asset.bitasset_data.expect("market issued").instance(),
					|bitasset| {
						bitasset.force_settled_volume += consumed;
					},
				)?;
			}
		}
		Ok(())
	}

	/// Redeems a queued settlement from a globally settled asset's fund.
	fn settle_from_fund(&mut self, settlement_id: ForceSettlementId) -> Result<()> {
		let settlement = self.force_settlement(settlement_id)?.clone();
		let asset = self.asset(settlement.balance.asset_id)?.clone();
		let bitasset = self.asset_bitasset(&asset)?.clone();
		let collateral = settlement
			.balance
			.multiply(&bitasset.settlement_price)?
			.amount
			.min(bitasset.settlement_fund);
		let backing = bitasset.options.short_backing_asset;

		self.modify::<AssetDynamicDataObject>(asset.dynamic_data.instance(), |dynamic| {
			dynamic.current_supply -= settlement.balance.amount;
		})?;
		self.modify::<AssetBitassetDataObject>(
			asset.bitasset_data.expect("market issued").instance(),
			|bitasset| {
				bitasset.settlement_fund -= collateral;
			},
		)?;
		if collateral > 0 {
			self.adjust_balance(settlement.owner, Asset::new(collateral, backing))?;
		}
		self.push_applied_operation(
			Operation::FillOrder(FillOrderOperation {
				fee: Asset::core(0),
				order_id: settlement_id.into(),
				account_id: settlement.owner,
				pays: settlement.balance,
				receives: Asset::new(collateral, backing),
				fill_price: bitasset.settlement_price,
				is_maker: false,
			}),
			OperationResult::None,
		);
		self.remove::<ForceSettlementObject>(settlement_id.instance())?;
		Ok(())
	}

	/// Recomputes every bitasset's median feed, dropping expired
	/// publications, then re-checks margin calls where a feed survives.
	pub(crate) fn update_expired_feeds(&mut self, now: TimePointSec) -> Result<()> {
		let entries: Vec<(u64, AssetId)> = self
			.store
			.asset_bitasset_data
			.iter()
			.map(|bitasset| (bitasset.id.instance(), bitasset.asset_id))
			.collect();
		for (instance, asset_id) in entries {
			self.modify::<AssetBitassetDataObject>(instance, |bitasset| {
				bitasset.update_median_feeds(now);
			})?;
			self.check_call_orders(asset_id, true)?;
		}
		Ok(())
	}
}
