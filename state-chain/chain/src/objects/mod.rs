//! The entity catalog: every typed object the database stores, plus the
//! [`AnyObject`] sum the undo machinery and observers traffic in.

mod account;
mod asset;
mod global;
mod market;
mod witness;

pub use account::{AccountBalanceObject, AccountObject, AccountStatisticsObject};
pub use asset::{AssetBitassetDataObject, AssetDynamicDataObject, AssetObject, PublishedFeed};
pub use global::{
	dynamic_flags, BlockSummaryObject, DynamicGlobalPropertiesObject, GlobalPropertiesObject,
};
pub use market::{CallOrderObject, ForceSettlementObject, LimitOrderObject};
pub use witness::WitnessObject;

use codec::{Decode, Encode};
use onyx_db::DbObject;
use onyx_primitives::{implementation_type, protocol_type, space, ObjectId};
use serde::{Deserialize, Serialize};

/// A snapshot of any entity, as stored in undo states, handed to observers
/// and written into database snapshots. Serialization is canonical SCALE,
/// which is what makes undo round-trips byte-comparable.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum AnyObject {
	Account(AccountObject),
	AccountStatistics(AccountStatisticsObject),
	AccountBalance(AccountBalanceObject),
	Asset(AssetObject),
	AssetDynamicData(AssetDynamicDataObject),
	AssetBitassetData(AssetBitassetDataObject),
	LimitOrder(LimitOrderObject),
	CallOrder(CallOrderObject),
	ForceSettlement(ForceSettlementObject),
	Witness(WitnessObject),
	GlobalProperties(GlobalPropertiesObject),
	DynamicGlobalProperties(DynamicGlobalPropertiesObject),
	BlockSummary(BlockSummaryObject),
}

impl AnyObject {
	pub fn object_id(&self) -> ObjectId {
		match self {
			Self::Account(o) => o.object_id(),
			Self::AccountStatistics(o) => o.object_id(),
			Self::AccountBalance(o) => o.object_id(),
			Self::Asset(o) => o.object_id(),
			Self::AssetDynamicData(o) => o.object_id(),
			Self::AssetBitassetData(o) => o.object_id(),
			Self::LimitOrder(o) => o.object_id(),
			Self::CallOrder(o) => o.object_id(),
			Self::ForceSettlement(o) => o.object_id(),
			Self::Witness(o) => o.object_id(),
			Self::GlobalProperties(o) => o.object_id(),
			Self::DynamicGlobalProperties(o) => o.object_id(),
			Self::BlockSummary(o) => o.object_id(),
		}
	}
}

/// Ties an entity type to its `AnyObject` variant.
pub trait ChainObject: DbObject {
	fn into_any(self) -> AnyObject;
	fn from_any(any: AnyObject) -> Option<Self>;
}

macro_rules! impl_chain_object {
	($type:ty, $variant:ident, $space:expr, $ty:expr, |$obj:ident| $instance:expr) => {
		impl DbObject for $type {
			const SPACE: u8 = $space;
			const TYPE: u8 = $ty;

			fn instance(&self) -> u64 {
				let $obj = self;
				$instance
			}
		}

		impl ChainObject for $type {
			fn into_any(self) -> AnyObject {
				AnyObject::$variant(self)
			}

			fn from_any(any: AnyObject) -> Option<Self> {
				match any {
					AnyObject::$variant(obj) => Some(obj),
					_ => None,
				}
			}
		}
	};
}

impl_chain_object!(AccountObject, Account, space::PROTOCOL, protocol_type::ACCOUNT, |o| o
	.id
	.instance());
impl_chain_object!(AssetObject, Asset, space::PROTOCOL, protocol_type::ASSET, |o| o
	.id
	.instance());
impl_chain_object!(WitnessObject, Witness, space::PROTOCOL, protocol_type::WITNESS, |o| o
	.id
	.instance());
impl_chain_object!(
	LimitOrderObject,
	LimitOrder,
	space::PROTOCOL,
	protocol_type::LIMIT_ORDER,
	|o| o.id.instance()
);
impl_chain_object!(
	CallOrderObject,
	CallOrder,
	space::PROTOCOL,
	protocol_type::CALL_ORDER,
	|o| o.id.instance()
);
impl_chain_object!(
	ForceSettlementObject,
	ForceSettlement,
	space::PROTOCOL,
	protocol_type::FORCE_SETTLEMENT,
	|o| o.id.instance()
);
impl_chain_object!(
	GlobalPropertiesObject,
	GlobalProperties,
	space::IMPLEMENTATION,
	implementation_type::GLOBAL_PROPERTIES,
	|o| o.instance
);
impl_chain_object!(
	DynamicGlobalPropertiesObject,
	DynamicGlobalProperties,
	space::IMPLEMENTATION,
	implementation_type::DYNAMIC_GLOBAL_PROPERTIES,
	|o| o.instance
);
impl_chain_object!(
	AssetDynamicDataObject,
	AssetDynamicData,
	space::IMPLEMENTATION,
	implementation_type::ASSET_DYNAMIC_DATA,
	|o| o.id.instance()
);
impl_chain_object!(
	AssetBitassetDataObject,
	AssetBitassetData,
	space::IMPLEMENTATION,
	implementation_type::ASSET_BITASSET_DATA,
	|o| o.id.instance()
);
impl_chain_object!(
	AccountBalanceObject,
	AccountBalance,
	space::IMPLEMENTATION,
	implementation_type::ACCOUNT_BALANCE,
	|o| o.id.instance()
);
impl_chain_object!(
	AccountStatisticsObject,
	AccountStatistics,
	space::IMPLEMENTATION,
	implementation_type::ACCOUNT_STATISTICS,
	|o| o.id.instance()
);
impl_chain_object!(
	BlockSummaryObject,
	BlockSummary,
	space::IMPLEMENTATION,
	implementation_type::BLOCK_SUMMARY,
	|o| o.id.instance()
);
