//! Asset lifecycle evaluators: creation, issuance, feeds and settlement.

use crate::{
	error::{ensure_policy, ensure_state},
	objects::{
		AssetBitassetDataObject, AssetDynamicDataObject, AssetObject, ForceSettlementObject,
		PublishedFeed,
	},
	Database, Result,
};
use onyx_primitives::{
	constants::DEFAULT_MAX_ASSET_FEED_PUBLISHERS, AssetBitassetDataId, AssetDynamicDataId,
	AssetId, ForceSettlementId, CORE_ASSET,
};
use onyx_protocol::{
	operations::{
		asset_flags, AssetCreateOperation, AssetFundFeePoolOperation, AssetGlobalSettleOperation,
		AssetIssueOperation, AssetPublishFeedOperation, AssetReserveOperation,
		AssetSettleOperation, AssetUpdateBitassetOperation, AssetUpdateFeedProducersOperation,
		AssetUpdateOperation, OperationResult,
	},
	Asset,
};

pub(crate) fn create(db: &mut Database, op: &AssetCreateOperation) -> Result<OperationResult> {
	ensure_state!(
		db.asset_by_symbol(&op.symbol).is_none(),
		"asset symbol {} is already registered",
		op.symbol
	);
	if let Some(bitasset_opts) = &op.bitasset_options {
		let backing = db.asset(bitasset_opts.short_backing_asset)?;
		if backing.is_market_issued() {
			let backing_bitasset = db.asset_bitasset(backing)?;
			ensure_policy!(
				backing_bitasset.options.short_backing_asset == CORE_ASSET,
				"backing asset chains may be at most one level deep"
			);
		}
	}

	let next_asset = db.next_instance::<AssetObject>();
	let new_asset_id = AssetId::new(next_asset);
	let cer = &op.common_options.core_exchange_rate;
	ensure_policy!(
		(cer.base.asset_id == new_asset_id && cer.quote.asset_id == CORE_ASSET) ||
			(cer.quote.asset_id == new_asset_id && cer.base.asset_id == CORE_ASSET),
		"core exchange rate must relate the new asset to the core asset"
	);

	let dynamic = db.create::<AssetDynamicDataObject>(|instance| AssetDynamicDataObject {
		id: AssetDynamicDataId::new(instance),
		asset_id: new_asset_id,
		..Default::default()
	})?;
	let bitasset_id = match &op.bitasset_options {
		Some(bitasset_opts) => Some(
			db.create::<AssetBitassetDataObject>(|instance| {
				let mut data = AssetBitassetDataObject::new(
					AssetBitassetDataId::new(instance),
					new_asset_id,
					bitasset_opts.clone(),
				);
				data.is_prediction_market = op.is_prediction_market;
				data
			})?
			.id,
		),
		None => None,
	};
	let asset = db.create::<AssetObject>(|instance| AssetObject {
		id: AssetId::new(instance),
		symbol: op.symbol.clone(),
		precision: op.precision,
		issuer: op.issuer,
		options: op.common_options.clone(),
		dynamic_data: dynamic.id,
		bitasset_data: bitasset_id,
	})?;
	Ok(OperationResult::ObjectId(asset.id.into()))
}

fn require_issuer(asset: &AssetObject, claimed: onyx_primitives::AccountId) -> Result<()> {
	ensure_state!(
		asset.issuer == claimed,
		"account {claimed} is not the issuer of asset {}",
		asset.symbol
	);
	Ok(())
}

pub(crate) fn update(db: &mut Database, op: &AssetUpdateOperation) -> Result<OperationResult> {
	let asset = db.asset(op.asset_to_update)?.clone();
	require_issuer(&asset, op.issuer)?;
	ensure_policy!(
		op.new_options.flags & !asset.options.issuer_permissions == 0,
		"flags may not exceed the asset's issuer permissions"
	);
	ensure_policy!(
		op.new_options.issuer_permissions & !asset.options.issuer_permissions == 0,
		"permissions can only ever be narrowed"
	);
	let cer = &op.new_options.core_exchange_rate;
	ensure_policy!(
		(cer.base.asset_id == asset.id && cer.quote.asset_id == CORE_ASSET) ||
			(cer.quote.asset_id == asset.id && cer.base.asset_id == CORE_ASSET),
		"core exchange rate must relate {} to the core asset",
		asset.symbol
	);
	if let Some(new_issuer) = op.new_issuer {
		db.account(new_issuer)?;
	}
	db.modify::<AssetObject>(asset.id.instance(), |obj| {
		if let Some(new_issuer) = op.new_issuer {
			obj.issuer = new_issuer;
		}
		obj.options = op.new_options.clone();
	})?;
	Ok(OperationResult::None)
}

pub(crate) fn update_bitasset(
	db: &mut Database,
	op: &AssetUpdateBitassetOperation,
) -> Result<OperationResult> {
	let asset = db.asset(op.asset_to_update)?.clone();
	require_issuer(&asset, op.issuer)?;
	let bitasset = db.asset_bitasset(&asset)?.clone();
	if op.new_options.short_backing_asset != bitasset.options.short_backing_asset {
		let supply = db.asset_dynamic(&asset)?.current_supply;
		ensure_policy!(
			supply == 0,
			"cannot change the backing asset of {} while supply exists",
			asset.symbol
		);
		db.asset(op.new_options.short_backing_asset)?;
	}
	let now = db.head_block_time();
	db.modify::<AssetBitassetDataObject>(bitasset.id.instance(), |data| {
		data.options = op.new_options.clone();
		// A different lifetime or minimum may change the median.
		data.update_median_feeds(now);
	})?;
	db.check_call_orders(asset.id, true)?;
	Ok(OperationResult::None)
}

pub(crate) fn update_feed_producers(
	db: &mut Database,
	op: &AssetUpdateFeedProducersOperation,
) -> Result<OperationResult> {
	let asset = db.asset(op.asset_to_update)?.clone();
	require_issuer(&asset, op.issuer)?;
	ensure_policy!(
		!asset.options.flag(asset_flags::WITNESS_FED_ASSET),
		"{} is witness-fed; its producers are the active witnesses",
		asset.symbol
	);
	ensure_policy!(
		op.new_feed_producers.len() <= DEFAULT_MAX_ASSET_FEED_PUBLISHERS as usize,
		"too many feed producers"
	);
	for producer in &op.new_feed_producers {
		db.account(*producer)?;
	}
	let bitasset = db.asset_bitasset(&asset)?.clone();
	let now = db.head_block_time();
	db.modify::<AssetBitassetDataObject>(bitasset.id.instance(), |data| {
		data.feed_producers = op.new_feed_producers.clone();
		// Feeds from de-authorized publishers die with their authority.
		data.feeds.retain(|publisher, _| op.new_feed_producers.contains(publisher));
		data.update_median_feeds(now);
	})?;
	db.check_call_orders(asset.id, true)?;
	Ok(OperationResult::None)
}

pub(crate) fn issue(db: &mut Database, op: &AssetIssueOperation) -> Result<OperationResult> {
	let asset = db.asset(op.asset_to_issue.asset_id)?.clone();
	require_issuer(&asset, op.issuer)?;
	ensure_state!(
		!asset.is_market_issued(),
		"{} is market-issued; supply comes from margin positions",
		asset.symbol
	);
	let recipient = db.account(op.issue_to_account)?.clone();
	ensure_policy!(
		db.is_authorized_asset(&recipient, &asset),
		"account {} is not authorized to hold {}",
		recipient.name,
		asset.symbol
	);
	let new_supply = db.asset_dynamic(&asset)?.current_supply + op.asset_to_issue.amount;
	ensure_policy!(
		new_supply <= asset.options.max_supply,
		"issuing would exceed the maximum supply of {}",
		asset.symbol
	);
	let amount = op.asset_to_issue.amount;
	db.modify::<AssetDynamicDataObject>(asset.dynamic_data.instance(), |dynamic| {
		dynamic.current_supply += amount;
	})?;
	db.adjust_balance(op.issue_to_account, op.asset_to_issue)?;
	Ok(OperationResult::None)
}

pub(crate) fn reserve(db: &mut Database, op: &AssetReserveOperation) -> Result<OperationResult> {
	let asset = db.asset(op.amount_to_reserve.asset_id)?.clone();
	ensure_state!(
		!asset.is_market_issued(),
		"market-issued {} cannot be reserved; settle it instead",
		asset.symbol
	);
	db.adjust_balance(
		op.payer,
		Asset::new(-op.amount_to_reserve.amount, op.amount_to_reserve.asset_id),
	)?;
	let amount = op.amount_to_reserve.amount;
	db.modify::<AssetDynamicDataObject>(asset.dynamic_data.instance(), |dynamic| {
		dynamic.current_supply -= amount;
	})?;
	Ok(OperationResult::None)
}

pub(crate) fn fund_fee_pool(
	db: &mut Database,
	op: &AssetFundFeePoolOperation,
) -> Result<OperationResult> {
	let asset = db.asset(op.asset_id)?.clone();
	db.adjust_balance(op.from_account, Asset::new(-op.amount, CORE_ASSET))?;
	let amount = op.amount;
	db.modify::<AssetDynamicDataObject>(asset.dynamic_data.instance(), |dynamic| {
		dynamic.fee_pool += amount;
	})?;
	Ok(OperationResult::None)
}

pub(crate) fn settle(db: &mut Database, op: &AssetSettleOperation) -> Result<OperationResult> {
	let asset = db.asset(op.amount.asset_id)?.clone();
	ensure_state!(asset.is_market_issued(), "{} cannot be settled", asset.symbol);
	let bitasset = db.asset_bitasset(&asset)?.clone();
	let balance = db.get_balance(op.account, op.amount.asset_id);
	ensure_state!(
		balance.amount >= op.amount.amount,
		"cannot settle {} when only {} is held",
		op.amount.amount,
		balance.amount
	);

	if bitasset.has_settlement() {
		// Post-swan redemptions pay out of the settlement fund at once.
		let collateral = db.pay_settlement_from_fund(op.account, op.amount)?;
		return Ok(OperationResult::Asset(collateral));
	}

	ensure_policy!(
		!asset.options.flag(asset_flags::DISABLE_FORCE_SETTLE),
		"force settlement is disabled for {}",
		asset.symbol
	);
	db.adjust_balance(op.account, Asset::new(-op.amount.amount, op.amount.asset_id))?;
	let settlement_date = db.head_block_time() + bitasset.options.force_settlement_delay_secs;
	let settlement = db.create::<ForceSettlementObject>(|instance| ForceSettlementObject {
		id: ForceSettlementId::new(instance),
		owner: op.account,
		balance: op.amount,
		settlement_date,
	})?;
	Ok(OperationResult::ObjectId(settlement.id.into()))
}

pub(crate) fn global_settle(
	db: &mut Database,
	op: &AssetGlobalSettleOperation,
) -> Result<OperationResult> {
	let asset = db.asset(op.asset_to_settle)?.clone();
	require_issuer(&asset, op.issuer)?;
	ensure_policy!(
		asset.options.issuer_permissions & asset_flags::GLOBAL_SETTLE != 0,
		"issuer has no global-settle permission on {}",
		asset.symbol
	);
	let bitasset = db.asset_bitasset(&asset)?.clone();
	ensure_state!(!bitasset.has_settlement(), "{} is already settled", asset.symbol);
	ensure_policy!(
		op.settle_price.base.asset_id == asset.id &&
			op.settle_price.quote.asset_id == bitasset.options.short_backing_asset,
		"settle price must be quoted {}/backing",
		asset.symbol
	);
	db.globally_settle_asset(asset.id, op.settle_price)?;
	Ok(OperationResult::None)
}

pub(crate) fn publish_feed(
	db: &mut Database,
	op: &AssetPublishFeedOperation,
) -> Result<OperationResult> {
	let asset = db.asset(op.asset_id)?.clone();
	ensure_state!(asset.is_market_issued(), "cannot publish a feed for {}", asset.symbol);
	let bitasset = db.asset_bitasset(&asset)?.clone();

	if asset.options.flag(asset_flags::WITNESS_FED_ASSET) {
		let witness = db.witness_by_account(op.publisher);
		let is_active = witness
			.map(|w| db.global_properties().active_witnesses.contains(&w.id))
			.unwrap_or(false);
		ensure_policy!(
			is_active,
			"feeds for {} come from active witnesses only",
			asset.symbol
		);
	} else {
		ensure_policy!(
			bitasset.feed_producers.contains(&op.publisher),
			"account {} is not an authorized feed producer for {}",
			op.publisher,
			asset.symbol
		);
	}

	let sp = &op.feed.settlement_price;
	ensure_policy!(
		sp.base.asset_id == asset.id &&
			sp.quote.asset_id == bitasset.options.short_backing_asset,
		"feed price must be quoted {}/backing",
		asset.symbol
	);
	if !op.feed.core_exchange_rate.is_null() {
		let cer = &op.feed.core_exchange_rate;
		ensure_policy!(
			(cer.base.asset_id == asset.id && cer.quote.asset_id == CORE_ASSET) ||
				(cer.quote.asset_id == asset.id && cer.base.asset_id == CORE_ASSET),
			"feed core exchange rate must relate {} to core",
			asset.symbol
		);
	}

	let now = db.head_block_time();
	db.modify::<AssetBitassetDataObject>(bitasset.id.instance(), |data| {
		data.feeds
			.insert(op.publisher, PublishedFeed { publish_time: now, feed: op.feed });
		data.update_median_feeds(now);
	})?;
	// A moved median can trigger margin calls immediately.
	db.check_call_orders(asset.id, true)?;
	Ok(OperationResult::None)
}
