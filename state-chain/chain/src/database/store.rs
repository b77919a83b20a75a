//! Primary indexes plus the sorted secondary keys the market engine and
//! evaluators query. Secondary indexes hold ids only, never values; they
//! are re-keyed through the `ObjectStore` hooks on every mutation.

use crate::objects::*;
use onyx_db::PrimaryIndex;
use onyx_primitives::{
	AccountBalanceId, AccountId, AssetId, CallOrderId, ForceSettlementId, LimitOrderId,
	TimePointSec, WitnessId,
};
use onyx_protocol::Price;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub struct Store {
	pub accounts: PrimaryIndex<AccountObject>,
	pub account_statistics: PrimaryIndex<AccountStatisticsObject>,
	pub account_balances: PrimaryIndex<AccountBalanceObject>,
	pub assets: PrimaryIndex<AssetObject>,
	pub asset_dynamic_data: PrimaryIndex<AssetDynamicDataObject>,
	pub asset_bitasset_data: PrimaryIndex<AssetBitassetDataObject>,
	pub limit_orders: PrimaryIndex<LimitOrderObject>,
	pub call_orders: PrimaryIndex<CallOrderObject>,
	pub force_settlements: PrimaryIndex<ForceSettlementObject>,
	pub witnesses: PrimaryIndex<WitnessObject>,
	pub global_properties: PrimaryIndex<GlobalPropertiesObject>,
	pub dynamic_global_properties: PrimaryIndex<DynamicGlobalPropertiesObject>,
	pub block_summaries: PrimaryIndex<BlockSummaryObject>,

	pub account_by_name: BTreeMap<String, AccountId>,
	pub asset_by_symbol: BTreeMap<String, AssetId>,
	pub balance_by_owner: BTreeMap<(AccountId, AssetId), AccountBalanceId>,
	/// Orders of one market direction cluster because `Price` orders by
	/// asset pair first; within a pair, ascending price. Iterated in
	/// reverse for best-price-first, which is why the id is stored reversed
	/// (earlier order wins a price tie).
	pub limit_by_price: BTreeSet<(Price, Reverse<LimitOrderId>)>,
	pub limit_by_expiration: BTreeSet<(TimePointSec, LimitOrderId)>,
	pub call_by_account: BTreeMap<(AccountId, AssetId), CallOrderId>,
	/// Least-collateralized first per debt asset: the margin-call scan
	/// order.
	pub call_by_collateralization: BTreeSet<(AssetId, Price, CallOrderId)>,
	/// FIFO per asset by settlement date, then id.
	pub settlement_by_date: BTreeSet<(AssetId, TimePointSec, ForceSettlementId)>,
	pub witness_by_account: BTreeMap<AccountId, WitnessId>,
}

/// Per-type access to a primary index plus the secondary-key bookkeeping
/// for that type.
pub trait ObjectStore<T: ChainObject> {
	fn index(&self) -> &PrimaryIndex<T>;
	fn index_mut(&mut self) -> &mut PrimaryIndex<T>;
	/// Called after `obj` landed in the primary index.
	fn on_inserted(&mut self, _obj: &T) {}
	/// Called while `obj` is still present, before removal or re-keying.
	fn on_removing(&mut self, _obj: &T) {}
}

macro_rules! impl_object_store {
	($type:ty, $field:ident) => {
		impl ObjectStore<$type> for Store {
			fn index(&self) -> &PrimaryIndex<$type> {
				&self.$field
			}

			fn index_mut(&mut self) -> &mut PrimaryIndex<$type> {
				&mut self.$field
			}
		}
	};
	($type:ty, $field:ident, |$self:ident, $obj:ident| add: $add:expr, del: $del:expr) => {
		impl ObjectStore<$type> for Store {
			fn index(&self) -> &PrimaryIndex<$type> {
				&self.$field
			}

			fn index_mut(&mut self) -> &mut PrimaryIndex<$type> {
				&mut self.$field
			}

			fn on_inserted(&mut self, obj: &$type) {
				let ($self, $obj) = (self, obj);
				$add;
			}

			fn on_removing(&mut self, obj: &$type) {
				let ($self, $obj) = (self, obj);
				$del;
			}
		}
	};
}

impl_object_store!(AccountStatisticsObject, account_statistics);
impl_object_store!(AssetDynamicDataObject, asset_dynamic_data);
impl_object_store!(AssetBitassetDataObject, asset_bitasset_data);
impl_object_store!(GlobalPropertiesObject, global_properties);
impl_object_store!(DynamicGlobalPropertiesObject, dynamic_global_properties);
impl_object_store!(BlockSummaryObject, block_summaries);

impl_object_store!(AccountObject, accounts, |store, obj|
	add: {
		store.account_by_name.insert(obj.name.clone(), obj.id);
	},
	del: {
		store.account_by_name.remove(&obj.name);
	}
);

impl_object_store!(AssetObject, assets, |store, obj|
	add: {
		store.asset_by_symbol.insert(obj.symbol.clone(), obj.id);
	},
	del: {
		store.asset_by_symbol.remove(&obj.symbol);
	}
);

impl_object_store!(AccountBalanceObject, account_balances, |store, obj|
	add: {
		store.balance_by_owner.insert((obj.owner, obj.asset_id), obj.id);
	},
	del: {
		store.balance_by_owner.remove(&(obj.owner, obj.asset_id));
	}
);

impl_object_store!(LimitOrderObject, limit_orders, |store, obj|
	add: {
		store.limit_by_price.insert((obj.sell_price, Reverse(obj.id)));
		store.limit_by_expiration.insert((obj.expiration, obj.id));
	},
	del: {
		store.limit_by_price.remove(&(obj.sell_price, Reverse(obj.id)));
		store.limit_by_expiration.remove(&(obj.expiration, obj.id));
	}
);

impl_object_store!(CallOrderObject, call_orders, |store, obj|
	add: {
		store.call_by_account.insert((obj.borrower, obj.debt_asset), obj.id);
		store
			.call_by_collateralization
			.insert((obj.debt_asset, obj.collateralization(), obj.id));
	},
	del: {
		store.call_by_account.remove(&(obj.borrower, obj.debt_asset));
		store
			.call_by_collateralization
			.remove(&(obj.debt_asset, obj.collateralization(), obj.id));
	}
);

impl_object_store!(ForceSettlementObject, force_settlements, |store, obj|
	add: {
		store
			.settlement_by_date
			.insert((obj.balance.asset_id, obj.settlement_date, obj.id));
	},
	del: {
		store
			.settlement_by_date
			.remove(&(obj.balance.asset_id, obj.settlement_date, obj.id));
	}
);

impl_object_store!(WitnessObject, witnesses, |store, obj|
	add: {
		store.witness_by_account.insert(obj.witness_account, obj.id);
	},
	del: {
		store.witness_by_account.remove(&obj.witness_account);
	}
);

impl Store {
	/// The best maker selling `sell` for `receive`: highest price first,
	/// oldest order breaking ties. Only orders at or above `min_price` (the
	/// taker's limit) qualify.
	pub fn best_limit_order(
		&self,
		sell: AssetId,
		receive: AssetId,
		min_price: Price,
	) -> Option<LimitOrderId> {
		let low = (Price::min(sell, receive), Reverse(LimitOrderId::new(u64::MAX)));
		let high = (Price::max(sell, receive), Reverse(LimitOrderId::new(0)));
		self.limit_by_price
			.range(low..=high)
			.next_back()
			.filter(|(price, _)| *price >= min_price)
			.map(|(_, Reverse(id))| *id)
	}

	/// The least-collateralized open position in `debt_asset`.
	pub fn least_collateralized_call(&self, debt_asset: AssetId) -> Option<CallOrderId> {
		let low = (
			debt_asset,
			Price::min(AssetId::new(0), AssetId::new(0)),
			CallOrderId::new(0),
		);
		self.call_by_collateralization
			.range(low..)
			.next()
			.filter(|(asset, _, _)| *asset == debt_asset)
			.map(|(_, _, id)| *id)
	}
}
