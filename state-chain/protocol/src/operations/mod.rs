//! The operation catalog. The variant indexes are the wire protocol: they
//! never change and gaps stay reserved for operations this deployment does
//! not carry.

pub mod account;
pub mod asset_ops;
pub mod market;
pub mod transfer;
pub mod witness;

pub use account::{
	is_valid_account_name, listing, AccountCreateOperation, AccountOptions,
	AccountUpdateOperation, AccountUpgradeOperation, AccountWhitelistOperation,
};
pub use asset_ops::{
	asset_flags, is_valid_symbol, AssetCreateOperation, AssetFundFeePoolOperation,
	AssetGlobalSettleOperation, AssetIssueOperation, AssetOptions, AssetPublishFeedOperation,
	AssetReserveOperation, AssetSettleCancelOperation, AssetSettleOperation,
	AssetUpdateBitassetOperation, AssetUpdateFeedProducersOperation, AssetUpdateOperation,
	BitassetOptions,
};
pub use market::{
	CallOrderUpdateOperation, FillOrderOperation, LimitOrderCancelOperation,
	LimitOrderCreateOperation,
};
pub use transfer::{Memo, TransferOperation};
pub use witness::{WitnessCreateOperation, WitnessUpdateOperation};

use crate::{asset::Asset, ValidationError, ValidationResult};
use codec::{Decode, Encode};
use onyx_primitives::{AccountId, ObjectId};
use serde::{Deserialize, Serialize};

/// Every operation the chain accepts or emits, tagged with its protocol
/// number.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum Operation {
	#[codec(index = 0)]
	Transfer(TransferOperation),
	#[codec(index = 1)]
	LimitOrderCreate(LimitOrderCreateOperation),
	#[codec(index = 2)]
	LimitOrderCancel(LimitOrderCancelOperation),
	#[codec(index = 3)]
	CallOrderUpdate(CallOrderUpdateOperation),
	/// Virtual; rejected on the wire.
	#[codec(index = 4)]
	FillOrder(FillOrderOperation),
	#[codec(index = 5)]
	AccountCreate(AccountCreateOperation),
	#[codec(index = 6)]
	AccountUpdate(AccountUpdateOperation),
	#[codec(index = 7)]
	AccountWhitelist(AccountWhitelistOperation),
	#[codec(index = 8)]
	AccountUpgrade(AccountUpgradeOperation),
	// 9 reserved: account_transfer
	#[codec(index = 10)]
	AssetCreate(AssetCreateOperation),
	#[codec(index = 11)]
	AssetUpdate(AssetUpdateOperation),
	#[codec(index = 12)]
	AssetUpdateBitasset(AssetUpdateBitassetOperation),
	#[codec(index = 13)]
	AssetUpdateFeedProducers(AssetUpdateFeedProducersOperation),
	#[codec(index = 14)]
	AssetIssue(AssetIssueOperation),
	#[codec(index = 15)]
	AssetReserve(AssetReserveOperation),
	#[codec(index = 16)]
	AssetFundFeePool(AssetFundFeePoolOperation),
	#[codec(index = 17)]
	AssetSettle(AssetSettleOperation),
	#[codec(index = 18)]
	AssetGlobalSettle(AssetGlobalSettleOperation),
	#[codec(index = 19)]
	AssetPublishFeed(AssetPublishFeedOperation),
	#[codec(index = 20)]
	WitnessCreate(WitnessCreateOperation),
	#[codec(index = 21)]
	WitnessUpdate(WitnessUpdateOperation),
	/// Virtual; rejected on the wire.
	#[codec(index = 42)]
	AssetSettleCancel(AssetSettleCancelOperation),
}

/// All assigned tags, used to build complete fee schedules.
pub const ALL_OPERATION_TAGS: &[u8] =
	&[0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 42];

impl Operation {
	pub fn tag(&self) -> u8 {
		match self {
			Self::Transfer(_) => 0,
			Self::LimitOrderCreate(_) => 1,
			Self::LimitOrderCancel(_) => 2,
			Self::CallOrderUpdate(_) => 3,
			Self::FillOrder(_) => 4,
			Self::AccountCreate(_) => 5,
			Self::AccountUpdate(_) => 6,
			Self::AccountWhitelist(_) => 7,
			Self::AccountUpgrade(_) => 8,
			Self::AssetCreate(_) => 10,
			Self::AssetUpdate(_) => 11,
			Self::AssetUpdateBitasset(_) => 12,
			Self::AssetUpdateFeedProducers(_) => 13,
			Self::AssetIssue(_) => 14,
			Self::AssetReserve(_) => 15,
			Self::AssetFundFeePool(_) => 16,
			Self::AssetSettle(_) => 17,
			Self::AssetGlobalSettle(_) => 18,
			Self::AssetPublishFeed(_) => 19,
			Self::WitnessCreate(_) => 20,
			Self::WitnessUpdate(_) => 21,
			Self::AssetSettleCancel(_) => 42,
		}
	}

	/// Virtual operations are emitted by the chain itself and never
	/// accepted inside transactions.
	pub fn is_virtual(&self) -> bool {
		matches!(self, Self::FillOrder(_) | Self::AssetSettleCancel(_))
	}

	pub fn fee(&self) -> &Asset {
		match self {
			Self::Transfer(op) => &op.fee,
			Self::LimitOrderCreate(op) => &op.fee,
			Self::LimitOrderCancel(op) => &op.fee,
			Self::CallOrderUpdate(op) => &op.fee,
			Self::FillOrder(op) => &op.fee,
			Self::AccountCreate(op) => &op.fee,
			Self::AccountUpdate(op) => &op.fee,
			Self::AccountWhitelist(op) => &op.fee,
			Self::AccountUpgrade(op) => &op.fee,
			Self::AssetCreate(op) => &op.fee,
			Self::AssetUpdate(op) => &op.fee,
			Self::AssetUpdateBitasset(op) => &op.fee,
			Self::AssetUpdateFeedProducers(op) => &op.fee,
			Self::AssetIssue(op) => &op.fee,
			Self::AssetReserve(op) => &op.fee,
			Self::AssetFundFeePool(op) => &op.fee,
			Self::AssetSettle(op) => &op.fee,
			Self::AssetGlobalSettle(op) => &op.fee,
			Self::AssetPublishFeed(op) => &op.fee,
			Self::WitnessCreate(op) => &op.fee,
			Self::WitnessUpdate(op) => &op.fee,
			Self::AssetSettleCancel(op) => &op.fee,
		}
	}

	/// The account whose balance pays this operation's fee and whose active
	/// authority must sign.
	pub fn fee_payer(&self) -> AccountId {
		match self {
			Self::Transfer(op) => op.from,
			Self::LimitOrderCreate(op) => op.seller,
			Self::LimitOrderCancel(op) => op.fee_paying_account,
			Self::CallOrderUpdate(op) => op.funding_account,
			Self::FillOrder(op) => op.account_id,
			Self::AccountCreate(op) => op.registrar,
			Self::AccountUpdate(op) => op.account,
			Self::AccountWhitelist(op) => op.authorizing_account,
			Self::AccountUpgrade(op) => op.account_to_upgrade,
			Self::AssetCreate(op) => op.issuer,
			Self::AssetUpdate(op) => op.issuer,
			Self::AssetUpdateBitasset(op) => op.issuer,
			Self::AssetUpdateFeedProducers(op) => op.issuer,
			Self::AssetIssue(op) => op.issuer,
			Self::AssetReserve(op) => op.payer,
			Self::AssetFundFeePool(op) => op.from_account,
			Self::AssetSettle(op) => op.account,
			Self::AssetGlobalSettle(op) => op.issuer,
			Self::AssetPublishFeed(op) => op.publisher,
			Self::WitnessCreate(op) => op.witness_account,
			Self::WitnessUpdate(op) => op.witness_account,
			Self::AssetSettleCancel(op) => op.account,
		}
	}

	/// Structural validation; no chain state involved.
	pub fn validate(&self) -> ValidationResult {
		if self.is_virtual() {
			return Err(ValidationError(format!(
				"operation {} is virtual and cannot be submitted",
				self.tag()
			)));
		}
		match self {
			Self::Transfer(op) => op.validate(),
			Self::LimitOrderCreate(op) => op.validate(),
			Self::LimitOrderCancel(op) => op.validate(),
			Self::CallOrderUpdate(op) => op.validate(),
			Self::AccountCreate(op) => op.validate(),
			Self::AccountUpdate(op) => op.validate(),
			Self::AccountWhitelist(op) => op.validate(),
			Self::AccountUpgrade(op) => op.validate(),
			Self::AssetCreate(op) => op.validate(),
			Self::AssetUpdate(op) => op.validate(),
			Self::AssetUpdateBitasset(op) => op.validate(),
			Self::AssetUpdateFeedProducers(op) => op.validate(),
			Self::AssetIssue(op) => op.validate(),
			Self::AssetReserve(op) => op.validate(),
			Self::AssetFundFeePool(op) => op.validate(),
			Self::AssetSettle(op) => op.validate(),
			Self::AssetGlobalSettle(op) => op.validate(),
			Self::AssetPublishFeed(op) => op.validate(),
			Self::WitnessCreate(op) => op.validate(),
			Self::WitnessUpdate(op) => op.validate(),
			Self::FillOrder(_) | Self::AssetSettleCancel(_) => unreachable!("virtual"),
		}
	}

	pub fn encoded_size(&self) -> usize {
		self.encode().len()
	}
}

/// What an applied operation returns.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum OperationResult {
	#[codec(index = 0)]
	None,
	/// The id of a newly created object (order, account, asset, ...).
	#[codec(index = 1)]
	ObjectId(ObjectId),
	/// An amount, e.g. the refund of a cancelled order.
	#[codec(index = 2)]
	Asset(Asset),
}

#[cfg(test)]
mod tests {
	use super::*;
	use onyx_primitives::CORE_ASSET;

	fn transfer() -> Operation {
		Operation::Transfer(TransferOperation {
			fee: Asset::core(1),
			from: AccountId::new(1),
			to: AccountId::new(2),
			amount: Asset::new(250, CORE_ASSET),
			memo: None,
		})
	}

	#[test]
	fn wire_tag_is_the_first_byte() {
		assert_eq!(transfer().encode()[0], 0);
		let cancel = Operation::LimitOrderCancel(LimitOrderCancelOperation {
			fee: Asset::core(0),
			fee_paying_account: AccountId::new(1),
			order: onyx_primitives::LimitOrderId::new(3),
		});
		assert_eq!(cancel.encode()[0], 2);
		let feed = Operation::AssetPublishFeed(AssetPublishFeedOperation {
			fee: Asset::core(0),
			publisher: AccountId::new(1),
			asset_id: onyx_primitives::AssetId::new(1),
			feed: Default::default(),
		});
		assert_eq!(feed.encode()[0], 19);
	}

	#[test]
	fn operations_round_trip_through_codec() {
		let op = transfer();
		let decoded = Operation::decode(&mut op.encode().as_slice()).unwrap();
		assert_eq!(decoded, op);
	}

	#[test]
	fn virtual_operations_fail_validation() {
		let fill = Operation::FillOrder(FillOrderOperation {
			fee: Asset::core(0),
			order_id: ObjectId::new(0, 4, 1),
			account_id: AccountId::new(1),
			pays: Asset::core(1),
			receives: Asset::new(1, onyx_primitives::AssetId::new(1)),
			fill_price: Default::default(),
			is_maker: false,
		});
		assert!(fill.is_virtual());
		assert!(fill.validate().is_err());
	}

	#[test]
	fn tags_match_codec_indexes() {
		for op in [transfer()] {
			assert_eq!(op.encode()[0], op.tag());
		}
	}
}
