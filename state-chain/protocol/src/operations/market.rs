use crate::{
	asset::{Asset, Price},
	ensure, ValidationResult,
};
use codec::{Decode, Encode};
use onyx_primitives::{
	constants::{MAX_COLLATERAL_RATIO, MIN_COLLATERAL_RATIO},
	AccountId, LimitOrderId, ObjectId, TimePointSec,
};
use serde::{Deserialize, Serialize};

/// Offers `amount_to_sell` and will accept nothing less than
/// `min_to_receive` in total; the implied price is their ratio.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct LimitOrderCreateOperation {
	pub fee: Asset,
	pub seller: AccountId,
	pub amount_to_sell: Asset,
	pub min_to_receive: Asset,
	/// The order is cancelled automatically at the first maintenance after
	/// this time.
	pub expiration: TimePointSec,
	/// If true the order must fill entirely in this very step or the
	/// operation fails.
	pub fill_or_kill: bool,
}

impl LimitOrderCreateOperation {
	pub fn price(&self) -> Price {
		Price::new(self.amount_to_sell, self.min_to_receive)
	}

	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		ensure!(self.amount_to_sell.amount > 0, "amount to sell must be positive");
		ensure!(self.min_to_receive.amount > 0, "minimum to receive must be positive");
		self.price().validate()
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct LimitOrderCancelOperation {
	pub fee: Asset,
	pub fee_paying_account: AccountId,
	pub order: LimitOrderId,
}

impl LimitOrderCancelOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		Ok(())
	}
}

/// Adjusts the payer's one margin position per bitasset by signed deltas.
/// Closing entirely requires both debt and collateral to reach zero.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct CallOrderUpdateOperation {
	pub fee: Asset,
	pub funding_account: AccountId,
	/// Collateral paid into (positive) or withdrawn from (negative) the
	/// position, denominated in the backing asset.
	pub delta_collateral: Asset,
	/// Debt drawn (positive) or covered (negative), denominated in the
	/// bitasset.
	pub delta_debt: Asset,
	/// If set, margin calls cover only enough debt to restore this
	/// collateral ratio instead of closing the whole position.
	pub target_collateral_ratio: Option<u16>,
}

impl CallOrderUpdateOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		ensure!(
			self.delta_collateral.amount != 0 || self.delta_debt.amount != 0,
			"useless update: both deltas are zero"
		);
		ensure!(
			self.delta_collateral.asset_id != self.delta_debt.asset_id,
			"collateral and debt must be distinct assets"
		);
		if let Some(tcr) = self.target_collateral_ratio {
			ensure!(
				(MIN_COLLATERAL_RATIO..=MAX_COLLATERAL_RATIO).contains(&tcr),
				"target collateral ratio {tcr} outside [{MIN_COLLATERAL_RATIO}, {MAX_COLLATERAL_RATIO}]"
			);
		}
		Ok(())
	}
}

/// Virtual operation recording one side of a fill. Never accepted on the
/// wire; emitted into the applied-operations trace.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct FillOrderOperation {
	pub fee: Asset,
	/// The filled limit or call order.
	pub order_id: ObjectId,
	pub account_id: AccountId,
	pub pays: Asset,
	pub receives: Asset,
	pub fill_price: Price,
	pub is_maker: bool,
}

#[cfg(test)]
mod tests {
	use super::*;
	use onyx_primitives::{AssetId, CORE_ASSET};

	#[test]
	fn limit_order_requires_a_real_price() {
		let op = LimitOrderCreateOperation {
			fee: Asset::core(0),
			seller: AccountId::new(1),
			amount_to_sell: Asset::core(100),
			min_to_receive: Asset::new(200, CORE_ASSET),
			expiration: TimePointSec::MAX,
			fill_or_kill: false,
		};
		// Same asset on both sides.
		assert!(op.validate().is_err());
	}

	#[test]
	fn call_update_rejects_double_zero() {
		let op = CallOrderUpdateOperation {
			fee: Asset::core(0),
			funding_account: AccountId::new(1),
			delta_collateral: Asset::core(0),
			delta_debt: Asset::new(0, AssetId::new(1)),
			target_collateral_ratio: None,
		};
		assert!(op.validate().is_err());
	}

	#[test]
	fn call_update_bounds_target_ratio() {
		let op = CallOrderUpdateOperation {
			fee: Asset::core(0),
			funding_account: AccountId::new(1),
			delta_collateral: Asset::core(10),
			delta_debt: Asset::new(1, AssetId::new(1)),
			target_collateral_ratio: Some(MIN_COLLATERAL_RATIO - 1),
		};
		assert!(op.validate().is_err());
	}
}
