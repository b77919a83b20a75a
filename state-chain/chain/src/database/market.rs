//! The market engine: limit-order matching, margin calls, black-swan
//! global settlement and force-settlement execution.
//!
//! Orientation conventions: for a bitasset, feed and settlement prices are
//! quoted debt/collateral (base is the bitasset). A limit order that sells
//! the bitasset for its backing asset therefore shares that orientation,
//! and a higher price means more debt per unit of collateral, i.e. a better
//! deal for a margin call buying debt back.

use super::Database;
use crate::{
	error::{ensure_policy, internal_assert},
	objects::{
		AssetBitassetDataObject, AssetDynamicDataObject, AssetObject, CallOrderObject,
		ForceSettlementObject, LimitOrderObject,
	},
	Result,
};
use onyx_primitives::{
	AccountId, AssetId, CallOrderId, ForceSettlementId, LimitOrderId, ShareAmount, CORE_ASSET,
};
use onyx_protocol::{
	fee::cut,
	operations::{AssetSettleCancelOperation, FillOrderOperation, Operation, OperationResult},
	Asset, Price,
};

/// Bit set when the taker was removed from the book.
pub const MATCH_TAKER_FILLED: u32 = 0x1;
/// Bit set when the maker was removed from the book.
pub const MATCH_MAKER_FILLED: u32 = 0x2;

impl Database {
	fn adjust_core_in_orders(&mut self, account: AccountId, delta: ShareAmount) -> Result<()> {
		if delta == 0 {
			return Ok(());
		}
		let stats_id = self.account(account)?.statistics;
		self.modify::<crate::objects::AccountStatisticsObject>(stats_id.instance(), |stats| {
			stats.total_core_in_orders += delta;
		})
	}

	fn emit_fill(
		&mut self,
		order_id: onyx_primitives::ObjectId,
		account: AccountId,
		pays: Asset,
		receives: Asset,
		fill_price: Price,
		is_maker: bool,
	) {
		self.push_applied_operation(
			Operation::FillOrder(FillOrderOperation {
				fee: Asset::core(0),
				order_id,
				account_id: account,
				pays,
				receives,
				fill_price,
				is_maker,
			}),
			OperationResult::None,
		);
	}

	/// Removes `order` from the book, refunding the residual to the seller.
	pub fn cancel_limit_order(&mut self, order_id: LimitOrderId) -> Result<Asset> {
		let order = self.limit_order(order_id)?.clone();
		let refund = order.amount_for_sale();
		self.adjust_balance(order.seller, refund)?;
		if refund.asset_id == CORE_ASSET {
			self.adjust_core_in_orders(order.seller, -refund.amount)?;
		}
		self.remove::<LimitOrderObject>(order_id.instance())?;
		Ok(refund)
	}

	/// Settles one side of a fill against a limit order. Returns true when
	/// the order left the book (fully filled, or culled as dust).
	pub(crate) fn fill_limit_order(
		&mut self,
		order_id: LimitOrderId,
		pays: Asset,
		receives: Asset,
		cull_if_small: bool,
		fill_price: Price,
		is_maker: bool,
	) -> Result<bool> {
		let order = self.limit_order(order_id)?.clone();
		internal_assert!(
			pays.asset_id == order.sell_asset_id() &&
				receives.asset_id == order.receive_asset_id(),
			"fill assets disagree with order {order_id}"
		);
		internal_assert!(
			pays.amount > 0 && pays.amount <= order.for_sale,
			"order {order_id} pays {} of {} for sale",
			pays.amount,
			order.for_sale
		);

		let seller_receives = self.pay_market_fees(receives)?;
		self.adjust_balance(order.seller, seller_receives)?;
		if pays.asset_id == CORE_ASSET {
			self.adjust_core_in_orders(order.seller, -pays.amount)?;
		}
		self.emit_fill(order_id.into(), order.seller, pays, receives, fill_price, is_maker);

		if pays.amount == order.for_sale {
			self.remove::<LimitOrderObject>(order_id.instance())?;
			return Ok(true);
		}
		self.modify::<LimitOrderObject>(order_id.instance(), |obj| {
			obj.for_sale -= pays.amount;
		})?;
		if cull_if_small && self.limit_order(order_id)?.amount_to_receive().amount == 0 {
			self.cancel_limit_order(order_id)?;
			return Ok(true);
		}
		Ok(false)
	}

	/// Charges the receiving asset's market fee, accruing it to the asset's
	/// accumulated fees, and returns what the trader actually gets.
	fn pay_market_fees(&mut self, receives: Asset) -> Result<Asset> {
		let asset = self.asset(receives.asset_id)?;
		let fee = asset.market_fee(receives.amount);
		if fee == 0 {
			return Ok(receives);
		}
		let dynamic_id = asset.dynamic_data;
		self.modify::<AssetDynamicDataObject>(dynamic_id.instance(), |dynamic| {
			dynamic.accumulated_fees += fee;
		})?;
		Ok(Asset::new(receives.amount - fee, receives.asset_id))
	}

	/// Settles one side of a fill against a margin position: the position
	/// pays collateral and retires `receives` of its debt. Returns true
	/// when the position closed.
	pub(crate) fn fill_call_order(
		&mut self,
		call_id: CallOrderId,
		pays: Asset,
		receives: Asset,
		fill_price: Price,
		is_maker: bool,
	) -> Result<bool> {
		let call = self.call_order(call_id)?.clone();
		internal_assert!(
			pays.asset_id == call.collateral_asset && receives.asset_id == call.debt_asset,
			"fill assets disagree with call order {call_id}"
		);
		let new_debt = call.debt - receives.amount;
		let new_collateral = call.collateral - pays.amount;
		internal_assert!(
			new_debt >= 0 && new_collateral >= 0,
			"call order {call_id} overdrawn: debt {new_debt}, collateral {new_collateral}"
		);

		// Retiring debt shrinks the bitasset supply.
		let dynamic_id = self.asset(call.debt_asset)?.dynamic_data;
		self.modify::<AssetDynamicDataObject>(dynamic_id.instance(), |dynamic| {
			dynamic.current_supply -= receives.amount;
		})?;
		if pays.asset_id == CORE_ASSET {
			self.adjust_core_in_orders(call.borrower, -pays.amount)?;
		}
		self.emit_fill(call_id.into(), call.borrower, pays, receives, fill_price, is_maker);

		if new_debt == 0 {
			// Everything left over goes back to the borrower.
			if new_collateral > 0 {
				self.adjust_balance(call.borrower, Asset::new(new_collateral, call.collateral_asset))?;
				if call.collateral_asset == CORE_ASSET {
					self.adjust_core_in_orders(call.borrower, -new_collateral)?;
				}
			}
			self.remove::<CallOrderObject>(call_id.instance())?;
			return Ok(true);
		}

		let mcr = self
			.asset_bitasset(&self.asset(call.debt_asset)?.clone())?
			.current_feed
			.maintenance_collateral_ratio;
		self.modify::<CallOrderObject>(call_id.instance(), |obj| {
			obj.debt = new_debt;
			obj.collateral = new_collateral;
			obj.call_price = Price::call_price(
				Asset::new(new_debt, call.debt_asset),
				Asset::new(new_collateral, call.collateral_asset),
				mcr,
			);
		})?;
		Ok(false)
	}

	/// The match primitive: fills `taker` against the resting `maker` at
	/// `match_price` (the maker's price). Returns the `MATCH_*` bits; at
	/// least one side always fills.
	pub(crate) fn match_limit_limit(
		&mut self,
		taker_id: LimitOrderId,
		maker_id: LimitOrderId,
		match_price: Price,
	) -> Result<u32> {
		let taker = self.limit_order(taker_id)?.clone();
		let maker = self.limit_order(maker_id)?.clone();

		let taker_for_sale = taker.amount_for_sale();
		let maker_for_sale = maker.amount_for_sale();
		let taker_wants = taker_for_sale.multiply(&match_price)?;

		let (taker_pays, taker_receives) = if taker_wants.amount == 0 {
			// The taker's residual cannot buy a single unit at this price;
			// it is dust and leaves the book.
			self.cancel_limit_order(taker_id)?;
			return Ok(MATCH_TAKER_FILLED);
		} else if taker_wants <= maker_for_sale {
			(taker_for_sale, taker_wants)
		} else {
			(maker_for_sale.multiply(&match_price)?, maker_for_sale)
		};
		let (maker_pays, maker_receives) = (taker_receives, taker_pays);

		let mut result = 0;
		if self.fill_limit_order(taker_id, taker_pays, taker_receives, true, match_price, false)? {
			result |= MATCH_TAKER_FILLED;
		}
		if self.fill_limit_order(maker_id, maker_pays, maker_receives, true, match_price, true)? {
			result |= MATCH_MAKER_FILLED;
		}
		internal_assert!(result != 0, "match filled neither side");
		Ok(result)
	}

	/// Margin-call sweep for one asset. Repeatedly selects the least
	/// collateralized position; if it sits below the maintenance
	/// requirement it is matched against the best limit orders up to the
	/// short-squeeze bound. An uncoverable position triggers global
	/// settlement (a black swan) when `allow_black_swan` is set, and is an
	/// error otherwise.
	///
	/// Returns true if any fill happened.
	pub fn check_call_orders(&mut self, asset_id: AssetId, allow_black_swan: bool) -> Result<bool> {
		let asset = match self.find::<AssetObject>(asset_id.instance()) {
			Some(asset) if asset.is_market_issued() => asset.clone(),
			_ => return Ok(false),
		};
		let bitasset = self.asset_bitasset(&asset)?.clone();
		if bitasset.is_prediction_market ||
			bitasset.has_settlement() ||
			!bitasset.current_feed.has_feed()
		{
			return Ok(false);
		}
		let feed = bitasset.current_feed;
		let maintenance = feed.maintenance_collateralization();
		let max_squeeze = feed.max_short_squeeze_price();

		let mut filled_any = false;
		loop {
			let Some(call_id) = self.store.least_collateralized_call(asset_id) else { break };
			let call = self.call_order(call_id)?.clone();
			if call.collateralization() >= maintenance {
				break;
			}

			let best = self.store.best_limit_order(
				asset_id,
				bitasset.options.short_backing_asset,
				max_squeeze,
			);
			let swan_price = call.collateralization().invert();
			let swan = match best {
				None => true,
				// The best offer demands more collateral per unit of debt
				// than the position holds: it can never fully cover.
				Some(order_id) => self.limit_order(order_id)?.sell_price < swan_price,
			};
			if swan {
				ensure_policy!(
					allow_black_swan,
					"margin call on asset {} cannot be covered by the order book",
					asset.symbol
				);
				tracing::warn!(asset = %asset.symbol, price = ?swan_price, "black swan detected");
				self.globally_settle_asset(asset_id, swan_price)?;
				return Ok(true);
			}

			let order_id = best.expect("swan case handled above");
			let order = self.limit_order(order_id)?.clone();
			let match_price = order.sell_price;

			let (max_pay, max_cover) = call.max_sell_receive_pair(
				match_price,
				feed.settlement_price,
				feed.maintenance_collateral_ratio,
			);
			let order_for_sale = order.amount_for_sale();
			let (call_pays, call_receives) = if order_for_sale.amount < max_cover.amount {
				// The whole order is consumed and the position stays open.
				(order_for_sale.multiply_round_up(&match_price)?, order_for_sale)
			} else if max_cover.amount == call.debt {
				(max_cover.multiply_round_up(&match_price)?, max_cover)
			} else {
				(max_pay, max_cover)
			};
			if call_receives.amount == 0 {
				// Rounding produced an empty fill; nothing more can execute.
				break;
			}

			self.fill_call_order(call_id, call_pays, call_receives, match_price, false)?;
			self.fill_limit_order(order_id, call_receives, call_pays, true, match_price, true)?;
			filled_any = true;
		}
		Ok(filled_any)
	}

	/// Closes every margin position of `asset_id` into the settlement fund
	/// at `settle_price` (debt/collateral) and freezes the asset. All
	/// subsequent redemptions draw on the fund.
	pub fn globally_settle_asset(&mut self, asset_id: AssetId, settle_price: Price) -> Result<()> {
		let asset = self.asset(asset_id)?.clone();
		let bitasset = self.asset_bitasset(&asset)?.clone();
		internal_assert!(
			!bitasset.has_settlement(),
			"asset {} is already globally settled",
			asset.symbol
		);
		settle_price.validate().map_err(crate::Error::from)?;

		let call_ids: Vec<CallOrderId> = self
			.store
			.call_by_collateralization
			.range((asset_id, Price::min(AssetId::new(0), AssetId::new(0)), CallOrderId::new(0))..)
			.take_while(|(debt_asset, _, _)| *debt_asset == asset_id)
			.map(|(_, _, id)| *id)
			.collect();

		let mut fund: ShareAmount = 0;
		for call_id in call_ids {
			let call = self.call_order(call_id)?.clone();
			let owed = call.get_debt().multiply(&settle_price)?;
			let pays = owed.amount.min(call.collateral);
			let refund = call.collateral - pays;
			fund += pays;
			if refund > 0 {
				self.adjust_balance(call.borrower, Asset::new(refund, call.collateral_asset))?;
			}
			if call.collateral_asset == CORE_ASSET {
				self.adjust_core_in_orders(call.borrower, -call.collateral)?;
			}
			self.remove::<CallOrderObject>(call_id.instance())?;
		}

		self.modify::<AssetBitassetDataObject>(
			asset.bitasset_data.expect("market issued").instance(),
			|data| {
				data.settlement_price = settle_price;
				data.settlement_fund = fund;
			},
		)?;
		Ok(())
	}

	/// Redeems `amount` of a globally settled asset from its fund at the
	/// frozen settlement price. Returns the collateral paid out.
	pub(crate) fn pay_settlement_from_fund(
		&mut self,
		account: AccountId,
		amount: Asset,
	) -> Result<Asset> {
		let asset = self.asset(amount.asset_id)?.clone();
		let bitasset = self.asset_bitasset(&asset)?.clone();
		internal_assert!(bitasset.has_settlement(), "asset {} has no settlement fund", asset.symbol);

		let collateral = amount
			.multiply(&bitasset.settlement_price)?
			.amount
			.min(bitasset.settlement_fund);
		let backing = bitasset.options.short_backing_asset;

		self.adjust_balance(account, Asset::new(-amount.amount, amount.asset_id))?;
		self.modify::<AssetDynamicDataObject>(asset.dynamic_data.instance(), |dynamic| {
			dynamic.current_supply -= amount.amount;
		})?;
		self.modify::<AssetBitassetDataObject>(
			asset.bitasset_data.expect("market issued").instance(),
			|data| {
				data.settlement_fund -= collateral;
			},
		)?;
		if collateral > 0 {
			self.adjust_balance(account, Asset::new(collateral, backing))?;
		}
		Ok(Asset::new(collateral, backing))
	}

	/// Cancels a queued settlement, refunding the deposit. Emits the
	/// settle-cancel virtual operation.
	pub fn cancel_force_settlement(&mut self, settlement_id: ForceSettlementId) -> Result<Asset> {
		let settlement = self.force_settlement(settlement_id)?.clone();
		self.adjust_balance(settlement.owner, settlement.balance)?;
		self.remove::<ForceSettlementObject>(settlement_id.instance())?;
		self.push_applied_operation(
			Operation::AssetSettleCancel(AssetSettleCancelOperation {
				fee: Asset::core(0),
				settlement: settlement_id,
				account: settlement.owner,
				amount: settlement.balance,
			}),
			OperationResult::None,
		);
		Ok(settlement.balance)
	}

	/// Executes one queued settlement against the least-collateralized
	/// margin positions at `settle_price`, bounded by `cap`. Returns the
	/// amount actually settled.
	pub(crate) fn execute_force_settlement(
		&mut self,
		settlement_id: ForceSettlementId,
		settle_price: Price,
		offset_percent: u16,
		cap: ShareAmount,
	) -> Result<ShareAmount> {
		let settlement = self.force_settlement(settlement_id)?.clone();
		let mut remaining = settlement.balance.amount.min(cap);
		let mut settled_total: ShareAmount = 0;

		while remaining > 0 {
			let Some(call_id) = self.store.least_collateralized_call(settlement.balance.asset_id)
			else {
				break;
			};
			let call = self.call_order(call_id)?.clone();
			let covers = remaining.min(call.debt);
			let cover_asset = Asset::new(covers, settlement.balance.asset_id);
			let gross = cover_asset.multiply(&settle_price)?;
			// The settlement offset shaves the payout in the shorts' favor.
			let collateral_out = gross.amount - cut(gross.amount, offset_percent);
			let pays = Asset::new(collateral_out.min(call.collateral), call.collateral_asset);

			self.fill_call_order(call_id, pays, cover_asset, settle_price, true)?;
			self.adjust_balance(settlement.owner, pays)?;
			self.emit_fill(
				settlement_id.into(),
				settlement.owner,
				cover_asset,
				pays,
				settle_price,
				false,
			);

			remaining -= covers;
			settled_total += covers;
		}

		if settled_total == 0 {
			return Ok(0);
		}
		let new_balance = settlement.balance.amount - settled_total;
		if new_balance == 0 {
			self.remove::<ForceSettlementObject>(settlement_id.instance())?;
		} else {
			self.modify::<ForceSettlementObject>(settlement_id.instance(), |obj| {
				obj.balance.amount = new_balance;
			})?;
		}
		Ok(settled_total)
	}

	/// Expires limit orders due at or before `now`, refunding their
	/// sellers.
	pub(crate) fn clear_expired_orders(&mut self, now: onyx_primitives::TimePointSec) -> Result<()> {
		loop {
			let Some((expiration, order_id)) =
				self.store.limit_by_expiration.first().copied()
			else {
				break;
			};
			if expiration > now {
				break;
			}
			tracing::debug!(order = %order_id, "limit order expired");
			let order = self.limit_order(order_id)?.clone();
			self.cancel_limit_order(order_id)?;
			// Expiry can strand a margin call that was relying on this
			// order, or free one up.
			self.check_call_orders_for_pair(order.sell_asset_id(), order.receive_asset_id())?;
		}
		Ok(())
	}

	/// Used after operations that may strand or enable margin calls on
	/// either side of a market.
	pub(crate) fn check_call_orders_for_pair(&mut self, a: AssetId, b: AssetId) -> Result<bool> {
		let mut any = self.check_call_orders(a, true)?;
		any |= self.check_call_orders(b, true)?;
		Ok(any)
	}
}
