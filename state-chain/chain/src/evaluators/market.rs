//! Market operation evaluators: limit order placement/cancellation and
//! margin position updates.

use crate::{
	database::market::{MATCH_MAKER_FILLED, MATCH_TAKER_FILLED},
	error::{ensure_policy, ensure_state},
	objects::{AccountStatisticsObject, AssetDynamicDataObject, CallOrderObject, LimitOrderObject},
	Database, Result,
};
use onyx_primitives::{LimitOrderId, CORE_ASSET};
use onyx_protocol::{
	operations::{
		CallOrderUpdateOperation, LimitOrderCancelOperation, LimitOrderCreateOperation,
		OperationResult,
	},
	Asset, Price,
};

pub(crate) fn limit_order_create(
	db: &mut Database,
	op: &LimitOrderCreateOperation,
) -> Result<OperationResult> {
	let seller = db.account(op.seller)?.clone();
	let sell_asset = db.asset(op.amount_to_sell.asset_id)?.clone();
	let receive_asset = db.asset(op.min_to_receive.asset_id)?.clone();
	let now = db.head_block_time();

	ensure_policy!(op.expiration >= now, "order expiration {} is in the past", op.expiration);
	if !sell_asset.options.whitelist_markets.is_empty() {
		ensure_policy!(
			sell_asset.options.whitelist_markets.contains(&receive_asset.id),
			"market {}/{} is not whitelisted",
			sell_asset.symbol,
			receive_asset.symbol
		);
	}
	ensure_policy!(
		!sell_asset.options.blacklist_markets.contains(&receive_asset.id),
		"market {}/{} is blacklisted",
		sell_asset.symbol,
		receive_asset.symbol
	);
	ensure_policy!(
		db.is_authorized_asset(&seller, &sell_asset) &&
			db.is_authorized_asset(&seller, &receive_asset),
		"account {} is not authorized on this market",
		seller.name
	);
	let balance = db.get_balance(op.seller, op.amount_to_sell.asset_id);
	ensure_state!(
		balance.amount >= op.amount_to_sell.amount,
		"insufficient balance: {} has {} of {}, order needs {}",
		seller.name,
		balance.amount,
		sell_asset.symbol,
		op.amount_to_sell.amount
	);

	if op.amount_to_sell.asset_id == CORE_ASSET {
		let amount = op.amount_to_sell.amount;
		db.modify::<AccountStatisticsObject>(seller.statistics.instance(), |stats| {
			stats.total_core_in_orders += amount;
		})?;
	}
	db.adjust_balance(
		op.seller,
		Asset::new(-op.amount_to_sell.amount, op.amount_to_sell.asset_id),
	)?;

	let order = db.create::<LimitOrderObject>(|instance| LimitOrderObject {
		id: LimitOrderId::new(instance),
		seller: op.seller,
		for_sale: op.amount_to_sell.amount,
		sell_price: op.price(),
		expiration: op.expiration,
	})?;
	let order_id = order.id;

	// The new order may be exactly what a pending margin call needs.
	db.check_call_orders_for_pair(sell_asset.id, receive_asset.id)?;

	// Match against the opposite side of the book while the order survives
	// and the top maker's price satisfies it.
	let min_price = op.price().invert();
	while db.find::<LimitOrderObject>(order_id.instance()).is_some() {
		let Some(maker_id) = db.store.best_limit_order(receive_asset.id, sell_asset.id, min_price)
		else {
			break;
		};
		let match_price = db.limit_order(maker_id)?.sell_price;
		let matched = db.match_limit_limit(order_id, maker_id, match_price)?;
		if matched & MATCH_TAKER_FILLED != 0 {
			break;
		}
		debug_assert!(matched & MATCH_MAKER_FILLED != 0);
	}

	// Fills may have freed or stranded margin calls on either asset.
	db.check_call_orders_for_pair(sell_asset.id, receive_asset.id)?;

	if op.fill_or_kill {
		ensure_policy!(
			db.find::<LimitOrderObject>(order_id.instance()).is_none(),
			"fill-or-kill order was not completely filled"
		);
	}
	Ok(OperationResult::ObjectId(order_id.into()))
}

pub(crate) fn limit_order_cancel(
	db: &mut Database,
	op: &LimitOrderCancelOperation,
) -> Result<OperationResult> {
	let order = db.limit_order(op.order)?.clone();
	ensure_state!(
		order.seller == op.fee_paying_account,
		"order {} belongs to another account",
		op.order
	);
	let refund = db.cancel_limit_order(op.order)?;
	// Removing book depth can strand a margin call.
	db.check_call_orders_for_pair(order.sell_asset_id(), order.receive_asset_id())?;
	Ok(OperationResult::Asset(refund))
}

pub(crate) fn call_order_update(
	db: &mut Database,
	op: &CallOrderUpdateOperation,
) -> Result<OperationResult> {
	let debt_asset = db.asset(op.delta_debt.asset_id)?.clone();
	ensure_state!(
		debt_asset.is_market_issued(),
		"unable to borrow {}: it is not a collateralized asset",
		debt_asset.symbol
	);
	let bitasset = db.asset_bitasset(&debt_asset)?.clone();
	// Once a settlement exists no new margin exposure may be taken and all
	// old positions are already closed.
	ensure_state!(
		!bitasset.has_settlement(),
		"asset {} is in global settlement",
		debt_asset.symbol
	);
	ensure_state!(
		op.delta_collateral.asset_id == bitasset.options.short_backing_asset,
		"collateral must be the backing asset of {}",
		debt_asset.symbol
	);
	if bitasset.is_prediction_market {
		ensure_state!(
			op.delta_collateral.amount == op.delta_debt.amount,
			"prediction markets are always fully collateralized"
		);
	} else {
		ensure_state!(
			bitasset.current_feed.has_feed(),
			"asset {} has no price feed",
			debt_asset.symbol
		);
	}

	if op.delta_debt.amount < 0 {
		let balance = db.get_balance(op.funding_account, op.delta_debt.asset_id);
		ensure_state!(
			balance.amount >= -op.delta_debt.amount,
			"cannot cover {} when the payer only has {}",
			-op.delta_debt.amount,
			balance.amount
		);
	}
	if op.delta_collateral.amount > 0 {
		let balance = db.get_balance(op.funding_account, op.delta_collateral.asset_id);
		ensure_state!(
			balance.amount >= op.delta_collateral.amount,
			"cannot add {} collateral when the payer only has {}",
			op.delta_collateral.amount,
			balance.amount
		);
	}

	if op.delta_debt.amount != 0 {
		let new_supply = db.asset_dynamic(&debt_asset)?.current_supply + op.delta_debt.amount;
		ensure_state!(new_supply >= 0, "supply of {} would go negative", debt_asset.symbol);
		ensure_policy!(
			new_supply <= debt_asset.options.max_supply,
			"borrowing would exceed the maximum supply of {}",
			debt_asset.symbol
		);
		db.adjust_balance(op.funding_account, op.delta_debt)?;
		let delta = op.delta_debt.amount;
		db.modify::<AssetDynamicDataObject>(debt_asset.dynamic_data.instance(), |dynamic| {
			dynamic.current_supply += delta;
		})?;
	}
	if op.delta_collateral.amount != 0 {
		db.adjust_balance(
			op.funding_account,
			Asset::new(-op.delta_collateral.amount, op.delta_collateral.asset_id),
		)?;
		if op.delta_collateral.asset_id == CORE_ASSET {
			let stats_id = db.account(op.funding_account)?.statistics;
			let delta = op.delta_collateral.amount;
			db.modify::<AccountStatisticsObject>(stats_id.instance(), |stats| {
				stats.total_core_in_orders += delta;
			})?;
		}
	}

	let mcr = bitasset.current_feed.maintenance_collateral_ratio;
	let existing = db.call_order_of(op.funding_account, op.delta_debt.asset_id).cloned();
	let call_id = match existing {
		None => {
			ensure_state!(
				op.delta_collateral.amount > 0 && op.delta_debt.amount > 0,
				"account {} has no open position in {}",
				op.funding_account,
				debt_asset.symbol
			);
			db.create::<CallOrderObject>(|instance| CallOrderObject {
				id: onyx_primitives::CallOrderId::new(instance),
				borrower: op.funding_account,
				collateral: op.delta_collateral.amount,
				debt: op.delta_debt.amount,
				collateral_asset: op.delta_collateral.asset_id,
				debt_asset: op.delta_debt.asset_id,
				call_price: Price::call_price(op.delta_debt, op.delta_collateral, mcr),
				target_collateral_ratio: op.target_collateral_ratio,
			})?
			.id
		},
		Some(call) => {
			let new_collateral = call.collateral + op.delta_collateral.amount;
			let new_debt = call.debt + op.delta_debt.amount;
			ensure_state!(
				new_collateral >= 0 && new_debt >= 0,
				"position update would overdraw the position"
			);
			if new_debt == 0 {
				ensure_policy!(
					new_collateral == 0,
					"closing a position requires withdrawing all of its collateral"
				);
				db.remove::<CallOrderObject>(call.id.instance())?;
				return Ok(OperationResult::None);
			}
			db.modify::<CallOrderObject>(call.id.instance(), |obj| {
				obj.collateral = new_collateral;
				obj.debt = new_debt;
				obj.call_price = Price::call_price(
					Asset::new(new_debt, obj.debt_asset),
					Asset::new(new_collateral, obj.collateral_asset),
					mcr,
				);
				obj.target_collateral_ratio = op.target_collateral_ratio;
			})?;
			call.id
		},
	};

	if !bitasset.is_prediction_market {
		// The updated position must stand on its own at the feed.
		let call = db.call_order(call_id)?.clone();
		ensure_policy!(
			call.collateralization() >= bitasset.current_feed.maintenance_collateralization(),
			"position would be immediately margin-callable: collateralization {:?}",
			call.collateralization()
		);
		// Margin calls on *other* positions may now be executable; black
		// swans are not acceptable as a side effect of a user update.
		if db.check_call_orders(debt_asset.id, false)? {
			ensure_policy!(
				db.find::<CallOrderObject>(call_id.instance()).is_none() ||
					db.call_order(call_id)?.collateralization() >=
						bitasset.current_feed.maintenance_collateralization(),
				"update triggered a margin call it could not fully cover"
			);
		}
	}
	Ok(OperationResult::ObjectId(call_id.into()))
}
