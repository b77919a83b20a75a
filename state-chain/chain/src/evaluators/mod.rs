//! Operation evaluators. Each operation is validated structurally, charged
//! its fee, then applied. Everything runs inside the transaction's undo
//! session, so a failure at any stage unwinds the fee along with the rest.

mod account;
mod asset;
mod market;
mod transfer;
mod witness;

use crate::{
	error::{ensure_policy, ensure_state},
	objects::{AccountStatisticsObject, AssetDynamicDataObject},
	Database, Error, Result,
};
use onyx_primitives::{AccountId, ShareAmount, CORE_ASSET};
use onyx_protocol::{
	operations::{Operation, OperationResult},
	Asset,
};

pub(crate) struct FeeContext {
	pub payer: AccountId,
	pub fee: Asset,
	/// The fee's value in core via the asset's core exchange rate.
	pub core_fee: ShareAmount,
}

/// Applies one operation: validate, charge the fee, dispatch.
pub(crate) fn apply_operation(db: &mut Database, op: &Operation) -> Result<OperationResult> {
	op.validate()?;
	let fee_context = prepare_fee(db, op)?;
	pay_fee(db, &fee_context)?;
	match op {
		Operation::Transfer(op) => transfer::apply(db, op),
		Operation::LimitOrderCreate(op) => market::limit_order_create(db, op),
		Operation::LimitOrderCancel(op) => market::limit_order_cancel(db, op),
		Operation::CallOrderUpdate(op) => market::call_order_update(db, op),
		Operation::AccountCreate(op) => account::create(db, op),
		Operation::AccountUpdate(op) => account::update(db, op),
		Operation::AccountWhitelist(op) => account::whitelist(db, op),
		Operation::AccountUpgrade(op) => account::upgrade(db, op),
		Operation::AssetCreate(op) => asset::create(db, op),
		Operation::AssetUpdate(op) => asset::update(db, op),
		Operation::AssetUpdateBitasset(op) => asset::update_bitasset(db, op),
		Operation::AssetUpdateFeedProducers(op) => asset::update_feed_producers(db, op),
		Operation::AssetIssue(op) => asset::issue(db, op),
		Operation::AssetReserve(op) => asset::reserve(db, op),
		Operation::AssetFundFeePool(op) => asset::fund_fee_pool(db, op),
		Operation::AssetSettle(op) => asset::settle(db, op),
		Operation::AssetGlobalSettle(op) => asset::global_settle(db, op),
		Operation::AssetPublishFeed(op) => asset::publish_feed(db, op),
		Operation::WitnessCreate(op) => witness::create(db, op),
		Operation::WitnessUpdate(op) => witness::update(db, op),
		Operation::FillOrder(_) | Operation::AssetSettleCancel(_) =>
			Err(Error::Validation("virtual operations cannot be applied directly".into())),
	}
}

/// Converts the offered fee to core value and checks it covers the
/// schedule.
fn prepare_fee(db: &Database, op: &Operation) -> Result<FeeContext> {
	let fee = *op.fee();
	let payer = op.fee_payer();
	let required = db.current_fee_schedule().calculate_fee(op);
	let core_fee = if fee.asset_id == CORE_ASSET {
		fee.amount
	} else {
		let fee_asset = db.asset(fee.asset_id)?;
		fee.multiply(&fee_asset.options.core_exchange_rate)?.amount
	};
	ensure_policy!(
		core_fee >= required,
		"insufficient fee: offered {core_fee} core-equivalent, schedule requires {required}"
	);
	Ok(FeeContext { payer, fee, core_fee })
}

/// Deducts the fee from the payer into the payer's pending bucket. A
/// non-core fee accrues to the fee asset's accumulated fees while the
/// asset's pool pays the core-equivalent.
fn pay_fee(db: &mut Database, ctx: &FeeContext) -> Result<()> {
	if ctx.fee.amount > 0 {
		db.adjust_balance(ctx.payer, Asset::new(-ctx.fee.amount, ctx.fee.asset_id))?;
	}
	if ctx.fee.asset_id != CORE_ASSET {
		let fee_asset = db.asset(ctx.fee.asset_id)?.clone();
		let pool = db.asset_dynamic(&fee_asset)?.fee_pool;
		ensure_state!(
			pool >= ctx.core_fee,
			"fee pool of asset {} holds {pool}, cannot cover {}",
			fee_asset.symbol,
			ctx.core_fee
		);
		let fee_amount = ctx.fee.amount;
		let core_fee = ctx.core_fee;
		db.modify::<AssetDynamicDataObject>(fee_asset.dynamic_data.instance(), |dynamic| {
			dynamic.accumulated_fees += fee_amount;
			dynamic.fee_pool -= core_fee;
		})?;
	}

	let account = db.account(ctx.payer)?.clone();
	let core_fee = ctx.core_fee;
	let vested = account.is_lifetime_member();
	db.modify::<AccountStatisticsObject>(account.statistics.instance(), |stats| {
		if vested {
			stats.pending_vested_fees += core_fee;
		} else {
			stats.pending_fees += core_fee;
		}
		stats.lifetime_fees_paid += core_fee;
		stats.total_ops += 1;
	})?;
	Ok(())
}
