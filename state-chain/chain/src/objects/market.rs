use codec::{Decode, Encode};
use onyx_primitives::{
	constants::COLLATERAL_RATIO_DENOM, AccountId, AssetId, CallOrderId, ForceSettlementId,
	LimitOrderId, ShareAmount, TimePointSec, U256,
};
use onyx_protocol::{Asset, Price};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct LimitOrderObject {
	pub id: LimitOrderId,
	pub seller: AccountId,
	/// Remaining amount offered, denominated in `sell_price.base`.
	pub for_sale: ShareAmount,
	pub sell_price: Price,
	pub expiration: TimePointSec,
}

impl LimitOrderObject {
	pub fn sell_asset_id(&self) -> AssetId {
		self.sell_price.base.asset_id
	}

	pub fn receive_asset_id(&self) -> AssetId {
		self.sell_price.quote.asset_id
	}

	pub fn amount_for_sale(&self) -> Asset {
		Asset::new(self.for_sale, self.sell_asset_id())
	}

	/// What the residual would buy at the order's own price. Zero means the
	/// order is dust and must leave the book.
	pub fn amount_to_receive(&self) -> Asset {
		self.amount_for_sale()
			.multiply(&self.sell_price)
			.unwrap_or(Asset::new(0, self.receive_asset_id()))
	}
}

/// A collateralized debt position in a market-issued asset. At most one per
/// (borrower, debt asset).
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct CallOrderObject {
	pub id: CallOrderId,
	pub borrower: AccountId,
	/// Backing-asset amount locked in the position.
	pub collateral: ShareAmount,
	/// Outstanding debt in the bitasset.
	pub debt: ShareAmount,
	pub collateral_asset: AssetId,
	pub debt_asset: AssetId,
	/// Trigger price (collateral/debt) implied by the maintenance ratio at
	/// the last update.
	pub call_price: Price,
	/// If set, margin calls only cover down to this ratio.
	pub target_collateral_ratio: Option<u16>,
}

impl CallOrderObject {
	pub fn get_debt(&self) -> Asset {
		Asset::new(self.debt, self.debt_asset)
	}

	pub fn get_collateral(&self) -> Asset {
		Asset::new(self.collateral, self.collateral_asset)
	}

	/// The position's collateral/debt ratio as an exact price. Orders sort
	/// by this in the margin-call index; least collateralized first.
	pub fn collateralization(&self) -> Price {
		Price::new(self.get_collateral(), self.get_debt())
	}

	/// How much to sell (collateral) and cover (debt) when this order is
	/// margin called at `match_price`.
	///
	/// Without a target ratio the whole position goes. With one, solve for
	/// the least debt whose repayment restores the target; the division
	/// truncates, so when the truncated answer still leaves the position
	/// below target a bounded binary search finds the exact minimum.
	pub fn max_sell_receive_pair(
		&self,
		match_price: Price,
		feed_price: Price,
		maintenance_collateral_ratio: u16,
	) -> (Asset, Asset) {
		let whole = (self.get_collateral(), self.get_debt());
		let Some(tcr) = self.target_collateral_ratio else {
			return whole;
		};
		let tcr = tcr.max(maintenance_collateral_ratio) as u128;

		// Component amounts oriented debt/collateral regardless of how the
		// price objects are oriented.
		let orient = |price: &Price| -> (u128, u128) {
			if price.base.asset_id == self.debt_asset {
				(price.base.amount as u128, price.quote.amount as u128)
			} else {
				(price.quote.amount as u128, price.base.amount as u128)
			}
		};
		let (mp_debt, mp_coll) = orient(&match_price);
		let (fp_debt, fp_coll) = orient(&feed_price);
		let denom_u = COLLATERAL_RATIO_DENOM as u128;

		// numerator = fp_coll * mp_debt * debt * tcr
		//           - fp_debt * mp_debt * collateral * DENOM
		let pos = U256::from(fp_coll) * U256::from(mp_debt) * U256::from(self.debt as u128) *
			U256::from(tcr);
		let neg = U256::from(fp_debt) *
			U256::from(mp_debt) *
			U256::from(self.collateral as u128) *
			U256::from(denom_u);
		if pos <= neg {
			// Covering makes things worse: the position is beyond rescue at
			// this price.
			return whole;
		}
		let numerator = pos - neg;

		// denominator = fp_coll * mp_debt * tcr - fp_debt * mp_coll * DENOM
		let dpos = U256::from(fp_coll) * U256::from(mp_debt) * U256::from(tcr);
		let dneg = U256::from(fp_debt) * U256::from(mp_coll) * U256::from(denom_u);
		if dpos <= dneg {
			return whole;
		}
		let denominator = dpos - dneg;

		let to_cover_wide = numerator / denominator + U256::from(1u8);
		if to_cover_wide >= U256::from(self.debt as u128) {
			return whole;
		}
		let to_cover_amount = to_cover_wide.as_u64() as ShareAmount;

		// Round the collateral up, re-truncate the debt it buys.
		let Ok(mut to_pay) =
			Asset::new(to_cover_amount, self.debt_asset).multiply_round_up(&match_price)
		else {
			return whole;
		};
		let Ok(mut to_cover) = to_pay.multiply(&match_price) else { return whole };
		if to_cover.amount >= self.debt || to_pay.amount >= self.collateral {
			return whole;
		}

		let feed_collateralization = Price::new(
			Asset::new(fp_coll as ShareAmount, self.collateral_asset),
			Asset::new(fp_debt as ShareAmount, self.debt_asset),
		);
		let restored = |to_pay: Asset, to_cover: Asset| {
			Price::call_price(
				Asset::new(self.debt - to_cover.amount, self.debt_asset),
				Asset::new(self.collateral - to_pay.amount, self.collateral_asset),
				tcr as u16,
			) > feed_collateralization
		};
		if restored(to_pay, to_cover) {
			return (to_pay, to_cover);
		}

		// Truncation left the position below target; binary-search the
		// minimal sufficient cover between the first estimate and the whole
		// position.
		let mut min_pay = to_pay;
		let (mut max_pay, mut max_cover) = whole;
		let mut max_is_ok = false;
		loop {
			to_pay.amount = (min_pay.amount + max_pay.amount + 1) / 2;
			if to_pay.amount == max_pay.amount {
				to_cover = max_cover;
			} else {
				to_cover = match to_pay.multiply(&match_price) {
					Ok(v) => v,
					Err(_) => return whole,
				};
			}
			if to_pay.amount == max_pay.amount && max_is_ok {
				return (to_pay, to_cover);
			}
			if restored(to_pay, to_cover) {
				if to_pay.amount == max_pay.amount {
					return (to_pay, to_cover);
				}
				max_pay = to_pay;
				max_cover = to_cover;
				max_is_ok = true;
			} else {
				if to_pay.amount == max_pay.amount {
					return whole;
				}
				min_pay = to_pay;
			}
		}
	}
}

/// A queued redemption awaiting its settlement date.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct ForceSettlementObject {
	pub id: ForceSettlementId,
	pub owner: AccountId,
	pub balance: Asset,
	pub settlement_date: TimePointSec,
}

#[cfg(test)]
mod tests {
	use super::*;
	use onyx_primitives::CORE_ASSET;

	const USD: AssetId = AssetId::new(1);

	fn call(collateral: ShareAmount, debt: ShareAmount, tcr: Option<u16>) -> CallOrderObject {
		CallOrderObject {
			id: CallOrderId::new(0),
			borrower: AccountId::new(1),
			collateral,
			debt,
			collateral_asset: CORE_ASSET,
			debt_asset: USD,
			call_price: Price::call_price(
				Asset::new(debt, USD),
				Asset::new(collateral, CORE_ASSET),
				1750,
			),
			target_collateral_ratio: tcr,
		}
	}

	fn dc_price(debt: ShareAmount, collateral: ShareAmount) -> Price {
		Price::new(Asset::new(debt, USD), Asset::new(collateral, CORE_ASSET))
	}

	#[test]
	fn dust_residual_receives_nothing() {
		let order = LimitOrderObject {
			id: LimitOrderId::new(0),
			seller: AccountId::new(1),
			for_sale: 1,
			// 3 for 1: one unit cannot buy anything.
			sell_price: Price::new(Asset::new(3, USD), Asset::new(1, CORE_ASSET)),
			expiration: TimePointSec::MAX,
		};
		assert_eq!(order.amount_to_receive().amount, 0);
	}

	#[test]
	fn without_target_ratio_the_whole_position_is_sold() {
		let order = call(1000, 100, None);
		let (pay, cover) = order.max_sell_receive_pair(dc_price(1, 10), dc_price(1, 15), 1750);
		assert_eq!(pay, Asset::new(1000, CORE_ASSET));
		assert_eq!(cover, Asset::new(100, USD));
	}

	#[test]
	fn target_ratio_covers_only_what_restores_it() {
		// Collateralization 10, feed 1/8 (12.5% below water at MCR 1.75:
		// maintenance needs 8 * 1.75 = 14 CORE per USD).
		let order = call(10_000, 1000, Some(2000));
		let match_price = dc_price(1, 9);
		let feed_price = dc_price(1, 8);
		let (pay, cover) = order.max_sell_receive_pair(match_price, feed_price, 1750);
		assert!(cover.amount < 1000, "must not cover everything, covered {}", cover.amount);
		assert!(pay.amount < 10_000);
		// The remainder must sit at or above the target ratio: remaining
		// collateral / (remaining debt * 8) >= 2.0.
		let remaining_coll = 10_000 - pay.amount;
		let remaining_debt = 1000 - cover.amount;
		assert!(
			remaining_coll as i128 * 1000 >= remaining_debt as i128 * 8 * 2000,
			"post-cover ratio too low: {remaining_coll}/{remaining_debt}"
		);
	}

	#[test]
	fn hopeless_positions_sell_everything_despite_target() {
		// Debt exceeds what collateral can buy at any price.
		let order = call(100, 1000, Some(2000));
		let (pay, cover) = order.max_sell_receive_pair(dc_price(1, 1), dc_price(1, 1), 1750);
		assert_eq!(pay.amount, 100);
		assert_eq!(cover.amount, 1000);
	}
}
