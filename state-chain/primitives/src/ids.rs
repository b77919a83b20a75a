use codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Object spaces. Protocol-space entities appear in operation payloads and
/// are wire-stable; implementation-space entities are derived bookkeeping.
pub mod space {
	pub const PROTOCOL: u8 = 0;
	pub const IMPLEMENTATION: u8 = 1;
}

/// Type tags within the protocol space.
pub mod protocol_type {
	pub const ACCOUNT: u8 = 1;
	pub const ASSET: u8 = 2;
	pub const WITNESS: u8 = 3;
	pub const LIMIT_ORDER: u8 = 4;
	pub const CALL_ORDER: u8 = 5;
	pub const FORCE_SETTLEMENT: u8 = 6;
}

/// Type tags within the implementation space.
pub mod implementation_type {
	pub const GLOBAL_PROPERTIES: u8 = 0;
	pub const DYNAMIC_GLOBAL_PROPERTIES: u8 = 1;
	pub const ASSET_DYNAMIC_DATA: u8 = 2;
	pub const ASSET_BITASSET_DATA: u8 = 3;
	pub const ACCOUNT_BALANCE: u8 = 4;
	pub const ACCOUNT_STATISTICS: u8 = 5;
	pub const BLOCK_SUMMARY: u8 = 6;
}

/// Fully qualified identifier of a database object.
///
/// Instance counters are monotone per `(space, ty)` pair, only ever rewound
/// by undo.
#[derive(
	Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize,
	Deserialize,
)]
pub struct ObjectId {
	pub space: u8,
	pub ty: u8,
	pub instance: u64,
}

impl ObjectId {
	pub const fn new(space: u8, ty: u8, instance: u64) -> Self {
		Self { space, ty, instance }
	}

	/// The `(space, ty)` pair identifying the owning primary index.
	pub const fn index_key(self) -> (u8, u8) {
		(self.space, self.ty)
	}
}

impl fmt::Debug for ObjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}.{}", self.space, self.ty, self.instance)
	}
}

impl fmt::Display for ObjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}.{}", self.space, self.ty, self.instance)
	}
}

/// Defines a typed object id: a newtype over the instance number whose space
/// and type are carried in the type itself. On the wire only the instance is
/// encoded (compact), which is what makes protocol-space ids stable.
macro_rules! define_object_id {
	($(#[$doc:meta])* $name:ident, $space:expr, $ty:expr) => {
		$(#[$doc])*
		#[derive(
			Copy,
			Clone,
			Default,
			PartialEq,
			Eq,
			PartialOrd,
			Ord,
			Hash,
			Encode,
			Decode,
			Serialize,
			Deserialize,
		)]
		pub struct $name(#[codec(compact)] pub u64);

		impl $name {
			pub const SPACE: u8 = $space;
			pub const TYPE: u8 = $ty;

			pub const fn new(instance: u64) -> Self {
				Self(instance)
			}

			pub const fn instance(self) -> u64 {
				self.0
			}

			pub const fn object_id(self) -> ObjectId {
				ObjectId::new(Self::SPACE, Self::TYPE, self.0)
			}
		}

		impl From<$name> for ObjectId {
			fn from(id: $name) -> ObjectId {
				id.object_id()
			}
		}

		impl TryFrom<ObjectId> for $name {
			type Error = ObjectId;

			fn try_from(id: ObjectId) -> Result<Self, ObjectId> {
				if id.space == Self::SPACE && id.ty == Self::TYPE {
					Ok(Self(id.instance))
				} else {
					Err(id)
				}
			}
		}

		impl core::fmt::Debug for $name {
			fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
				write!(f, "{}.{}.{}", Self::SPACE, Self::TYPE, self.0)
			}
		}

		impl core::fmt::Display for $name {
			fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
				write!(f, "{}.{}.{}", Self::SPACE, Self::TYPE, self.0)
			}
		}
	};
}

define_object_id!(
	/// A registered account.
	AccountId,
	space::PROTOCOL,
	protocol_type::ACCOUNT
);
define_object_id!(
	/// An asset. Instance 0 is always the core asset.
	AssetId,
	space::PROTOCOL,
	protocol_type::ASSET
);
define_object_id!(
	/// A block-producing witness.
	WitnessId,
	space::PROTOCOL,
	protocol_type::WITNESS
);
define_object_id!(
	/// An open limit order.
	LimitOrderId,
	space::PROTOCOL,
	protocol_type::LIMIT_ORDER
);
define_object_id!(
	/// An open margin position.
	CallOrderId,
	space::PROTOCOL,
	protocol_type::CALL_ORDER
);
define_object_id!(
	/// A queued force settlement.
	ForceSettlementId,
	space::PROTOCOL,
	protocol_type::FORCE_SETTLEMENT
);

define_object_id!(
	AssetDynamicDataId,
	space::IMPLEMENTATION,
	implementation_type::ASSET_DYNAMIC_DATA
);
define_object_id!(
	AssetBitassetDataId,
	space::IMPLEMENTATION,
	implementation_type::ASSET_BITASSET_DATA
);
define_object_id!(
	AccountBalanceId,
	space::IMPLEMENTATION,
	implementation_type::ACCOUNT_BALANCE
);
define_object_id!(
	AccountStatisticsId,
	space::IMPLEMENTATION,
	implementation_type::ACCOUNT_STATISTICS
);
define_object_id!(
	BlockSummaryId,
	space::IMPLEMENTATION,
	implementation_type::BLOCK_SUMMARY
);

/// The id of the core asset.
pub const CORE_ASSET: AssetId = AssetId::new(0);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn typed_ids_round_trip_through_object_id() {
		let id = LimitOrderId::new(42);
		let raw: ObjectId = id.into();
		assert_eq!(raw, ObjectId::new(0, protocol_type::LIMIT_ORDER, 42));
		assert_eq!(LimitOrderId::try_from(raw), Ok(id));
		assert!(AccountId::try_from(raw).is_err());
	}

	#[test]
	fn object_ids_order_by_space_type_instance() {
		let a = ObjectId::new(0, 1, 9);
		let b = ObjectId::new(0, 2, 0);
		let c = ObjectId::new(1, 0, 0);
		assert!(a < b);
		assert!(b < c);
	}

	#[test]
	fn display_is_dotted_triple() {
		assert_eq!(AccountId::new(7).to_string(), "0.1.7");
		assert_eq!(ObjectId::new(1, 2, 3).to_string(), "1.2.3");
	}

	#[test]
	fn compact_encoding_only_carries_the_instance() {
		use codec::Encode;
		assert_eq!(AccountId::new(5).encode(), codec::Compact(5u64).encode());
	}
}
