//! The chain database: a typed object store with multi-level undo, the
//! secondary indexes of [`store`], and the market/chain engines layered on
//! top in the sibling modules.

pub mod balance;
pub mod block;
pub mod maintenance;
pub mod market;
pub mod schedule;
#[doc(hidden)]
pub mod store;

use crate::{error::internal_assert, fork_database::ForkDatabase, objects::*, Error, Result};
use codec::{Decode, Encode};
use onyx_db::{IndexObserver, UndoStack, UndoState};
use onyx_primitives::{
	constants::DEFAULT_MAX_UNDO_HISTORY, implementation_type, protocol_type, space, AccountId,
	AssetId, CallOrderId, ForceSettlementId, LimitOrderId, ObjectId, TimePointSec, WitnessId,
};
use onyx_protocol::{
	operations::{Operation, OperationResult},
	BlockId, ChainId, ChainParameters, FeeSchedule, SignedBlock,
};
use store::{ObjectStore, Store};

/// Receives the applied-operation trace after every block, in application
/// order, virtual operations included.
pub trait BlockObserver {
	fn on_applied_block(&mut self, block: &SignedBlock, ops: &[(Operation, OperationResult)]);
}

pub struct Database {
	pub(crate) store: Store,
	pub(crate) undo: UndoStack<AnyObject>,
	pub(crate) fork_db: ForkDatabase,
	observers: Vec<Box<dyn IndexObserver<AnyObject>>>,
	block_observers: Vec<Box<dyn BlockObserver>>,
	pub(crate) applied_operations: Vec<(Operation, OperationResult)>,
	chain_id: ChainId,
}

impl Database {
	pub fn new(chain_id: ChainId) -> Self {
		Self {
			store: Store::default(),
			undo: UndoStack::new(DEFAULT_MAX_UNDO_HISTORY as usize),
			fork_db: ForkDatabase::new(DEFAULT_MAX_UNDO_HISTORY),
			observers: Vec::new(),
			block_observers: Vec::new(),
			applied_operations: Vec::new(),
			chain_id,
		}
	}

	pub fn chain_id(&self) -> &ChainId {
		&self.chain_id
	}

	pub fn fork_db(&self) -> &ForkDatabase {
		&self.fork_db
	}

	pub fn fork_db_mut(&mut self) -> &mut ForkDatabase {
		&mut self.fork_db
	}

	pub fn subscribe(&mut self, observer: Box<dyn IndexObserver<AnyObject>>) {
		self.observers.push(observer);
	}

	pub fn subscribe_blocks(&mut self, observer: Box<dyn BlockObserver>) {
		self.block_observers.push(observer);
	}

	// ---- Generic mutators. Everything flows through these so undo and
	// ---- secondary indexes can never drift from the primary data.

	pub fn create<T: ChainObject>(&mut self, ctor: impl FnOnce(u64) -> T) -> Result<T>
	where
		Store: ObjectStore<T>,
	{
		let next = ObjectStore::<T>::index(&self.store).next_instance();
		let obj = ObjectStore::<T>::index_mut(&mut self.store).create(ctor)?.clone();
		self.undo.on_create(obj.object_id(), next);
		self.store.on_inserted(&obj);
		self.notify_add(&obj.clone().into_any());
		Ok(obj)
	}

	/// Installs an object at a fixed instance outside the monotone counter,
	/// with full undo tracking. Only ring-structured entities (block
	/// summaries) use this.
	pub(crate) fn insert_at_instance<T: ChainObject>(&mut self, obj: T) -> Result<()>
	where
		Store: ObjectStore<T>,
	{
		let next = ObjectStore::<T>::index(&self.store).next_instance();
		ObjectStore::<T>::index_mut(&mut self.store).insert(obj.clone())?;
		self.undo.on_create(obj.object_id(), next);
		self.store.on_inserted(&obj);
		self.notify_add(&obj.into_any());
		Ok(())
	}

	pub fn find<T: ChainObject>(&self, instance: u64) -> Option<&T>
	where
		Store: ObjectStore<T>,
	{
		ObjectStore::<T>::index(&self.store).get(instance)
	}

	/// The instance the next `create::<T>` will be assigned. Evaluators use
	/// this to wire up mutually referencing objects.
	pub fn next_instance<T: ChainObject>(&self) -> u64
	where
		Store: ObjectStore<T>,
	{
		ObjectStore::<T>::index(&self.store).next_instance()
	}

	pub fn get<T: ChainObject>(&self, instance: u64) -> Result<&T>
	where
		Store: ObjectStore<T>,
	{
		self.find::<T>(instance).ok_or_else(|| {
			Error::Precondition(format!(
				"object {} not found",
				ObjectId::new(T::SPACE, T::TYPE, instance)
			))
		})
	}

	pub fn modify<T: ChainObject>(
		&mut self,
		instance: u64,
		mutator: impl FnOnce(&mut T),
	) -> Result<()>
	where
		Store: ObjectStore<T>,
	{
		let old = self.get::<T>(instance)?.clone();
		self.undo.on_modify(old.object_id(), || old.clone().into_any());
		self.store.on_removing(&old);
		ObjectStore::<T>::index_mut(&mut self.store).modify(instance, mutator)?;
		let new = ObjectStore::<T>::index(&self.store)
			.get(instance)
			.expect("modify keeps the object in place")
			.clone();
		self.store.on_inserted(&new);
		self.notify_modify(&new.into_any());
		Ok(())
	}

	pub fn remove<T: ChainObject>(&mut self, instance: u64) -> Result<T>
	where
		Store: ObjectStore<T>,
	{
		let obj = self.get::<T>(instance)?.clone();
		self.undo.on_remove(obj.object_id(), || obj.clone().into_any());
		self.store.on_removing(&obj);
		ObjectStore::<T>::index_mut(&mut self.store).remove(instance);
		self.notify_remove(&obj.clone().into_any());
		Ok(obj)
	}

	// ---- Raw mutators used when replaying undo states; they bypass undo
	// ---- recording (the stack is disabled) but keep secondary indexes and
	// ---- observers in sync.

	fn raw_upsert<T: ChainObject>(&mut self, obj: T) -> Result<()>
	where
		Store: ObjectStore<T>,
	{
		let instance = obj.instance();
		if ObjectStore::<T>::index(&self.store).contains(instance) {
			let old = ObjectStore::<T>::index(&self.store)
				.get(instance)
				.expect("checked contains")
				.clone();
			self.store.on_removing(&old);
			let replacement = obj.clone();
			ObjectStore::<T>::index_mut(&mut self.store)
				.modify(instance, move |slot| *slot = replacement)?;
			self.store.on_inserted(&obj);
			self.notify_modify(&obj.into_any());
		} else {
			ObjectStore::<T>::index_mut(&mut self.store).insert(obj.clone())?;
			self.store.on_inserted(&obj);
			self.notify_add(&obj.into_any());
		}
		Ok(())
	}

	fn raw_remove<T: ChainObject>(&mut self, instance: u64) -> Result<()>
	where
		Store: ObjectStore<T>,
	{
		if let Some(obj) = ObjectStore::<T>::index(&self.store).get(instance).cloned() {
			self.store.on_removing(&obj);
			ObjectStore::<T>::index_mut(&mut self.store).remove(instance);
			self.notify_remove(&obj.into_any());
		}
		Ok(())
	}

	fn raw_upsert_any(&mut self, any: AnyObject) -> Result<()> {
		match any {
			AnyObject::Account(o) => self.raw_upsert(o),
			AnyObject::AccountStatistics(o) => self.raw_upsert(o),
			AnyObject::AccountBalance(o) => self.raw_upsert(o),
			AnyObject::Asset(o) => self.raw_upsert(o),
			AnyObject::AssetDynamicData(o) => self.raw_upsert(o),
			AnyObject::AssetBitassetData(o) => self.raw_upsert(o),
			AnyObject::LimitOrder(o) => self.raw_upsert(o),
			AnyObject::CallOrder(o) => self.raw_upsert(o),
			AnyObject::ForceSettlement(o) => self.raw_upsert(o),
			AnyObject::Witness(o) => self.raw_upsert(o),
			AnyObject::GlobalProperties(o) => self.raw_upsert(o),
			AnyObject::DynamicGlobalProperties(o) => self.raw_upsert(o),
			AnyObject::BlockSummary(o) => self.raw_upsert(o),
		}
	}

	fn raw_remove_by_id(&mut self, id: ObjectId) -> Result<()> {
		match (id.space, id.ty) {
			(space::PROTOCOL, protocol_type::ACCOUNT) => self.raw_remove::<AccountObject>(id.instance),
			(space::PROTOCOL, protocol_type::ASSET) => self.raw_remove::<AssetObject>(id.instance),
			(space::PROTOCOL, protocol_type::WITNESS) =>
				self.raw_remove::<WitnessObject>(id.instance),
			(space::PROTOCOL, protocol_type::LIMIT_ORDER) =>
				self.raw_remove::<LimitOrderObject>(id.instance),
			(space::PROTOCOL, protocol_type::CALL_ORDER) =>
				self.raw_remove::<CallOrderObject>(id.instance),
			(space::PROTOCOL, protocol_type::FORCE_SETTLEMENT) =>
				self.raw_remove::<ForceSettlementObject>(id.instance),
			(space::IMPLEMENTATION, implementation_type::GLOBAL_PROPERTIES) =>
				self.raw_remove::<GlobalPropertiesObject>(id.instance),
			(space::IMPLEMENTATION, implementation_type::DYNAMIC_GLOBAL_PROPERTIES) =>
				self.raw_remove::<DynamicGlobalPropertiesObject>(id.instance),
			(space::IMPLEMENTATION, implementation_type::ASSET_DYNAMIC_DATA) =>
				self.raw_remove::<AssetDynamicDataObject>(id.instance),
			(space::IMPLEMENTATION, implementation_type::ASSET_BITASSET_DATA) =>
				self.raw_remove::<AssetBitassetDataObject>(id.instance),
			(space::IMPLEMENTATION, implementation_type::ACCOUNT_BALANCE) =>
				self.raw_remove::<AccountBalanceObject>(id.instance),
			(space::IMPLEMENTATION, implementation_type::ACCOUNT_STATISTICS) =>
				self.raw_remove::<AccountStatisticsObject>(id.instance),
			(space::IMPLEMENTATION, implementation_type::BLOCK_SUMMARY) =>
				self.raw_remove::<BlockSummaryObject>(id.instance),
			_ => Err(Error::Internal(format!("unknown object id {id}"))),
		}
	}

	fn set_next_instance(&mut self, key: (u8, u8), next: u64) -> Result<()> {
		match key {
			(space::PROTOCOL, protocol_type::ACCOUNT) =>
				ObjectStore::<AccountObject>::index_mut(&mut self.store).set_next_instance(next),
			(space::PROTOCOL, protocol_type::ASSET) =>
				ObjectStore::<AssetObject>::index_mut(&mut self.store).set_next_instance(next),
			(space::PROTOCOL, protocol_type::WITNESS) =>
				ObjectStore::<WitnessObject>::index_mut(&mut self.store).set_next_instance(next),
			(space::PROTOCOL, protocol_type::LIMIT_ORDER) =>
				ObjectStore::<LimitOrderObject>::index_mut(&mut self.store).set_next_instance(next),
			(space::PROTOCOL, protocol_type::CALL_ORDER) =>
				ObjectStore::<CallOrderObject>::index_mut(&mut self.store).set_next_instance(next),
			(space::PROTOCOL, protocol_type::FORCE_SETTLEMENT) =>
				ObjectStore::<ForceSettlementObject>::index_mut(&mut self.store)
					.set_next_instance(next),
			(space::IMPLEMENTATION, implementation_type::GLOBAL_PROPERTIES) =>
				ObjectStore::<GlobalPropertiesObject>::index_mut(&mut self.store)
					.set_next_instance(next),
			(space::IMPLEMENTATION, implementation_type::DYNAMIC_GLOBAL_PROPERTIES) =>
				ObjectStore::<DynamicGlobalPropertiesObject>::index_mut(&mut self.store)
					.set_next_instance(next),
			(space::IMPLEMENTATION, implementation_type::ASSET_DYNAMIC_DATA) =>
				ObjectStore::<AssetDynamicDataObject>::index_mut(&mut self.store)
					.set_next_instance(next),
			(space::IMPLEMENTATION, implementation_type::ASSET_BITASSET_DATA) =>
				ObjectStore::<AssetBitassetDataObject>::index_mut(&mut self.store)
					.set_next_instance(next),
			(space::IMPLEMENTATION, implementation_type::ACCOUNT_BALANCE) =>
				ObjectStore::<AccountBalanceObject>::index_mut(&mut self.store)
					.set_next_instance(next),
			(space::IMPLEMENTATION, implementation_type::ACCOUNT_STATISTICS) =>
				ObjectStore::<AccountStatisticsObject>::index_mut(&mut self.store)
					.set_next_instance(next),
			(space::IMPLEMENTATION, implementation_type::BLOCK_SUMMARY) =>
				ObjectStore::<BlockSummaryObject>::index_mut(&mut self.store)
					.set_next_instance(next),
			_ => return Err(Error::Internal(format!("unknown index {key:?}"))),
		}
		Ok(())
	}

	// ---- Undo sessions.

	pub fn start_undo_session(&mut self) -> UndoSession<'_> {
		self.undo.start_session();
		UndoSession { db: self, open: true }
	}

	pub(crate) fn enable_undo(&mut self) {
		self.undo.enable();
	}

	pub(crate) fn disable_undo(&mut self) {
		self.undo.disable();
	}

	fn apply_undo_state(&mut self, state: UndoState<AnyObject>) -> Result<()> {
		let was_disabled = self.undo.is_disabled();
		self.undo.disable();
		let result = (|| -> Result<()> {
			for (_, old) in state.old_values {
				self.raw_upsert_any(old)?;
			}
			for id in state.new_ids {
				self.raw_remove_by_id(id)?;
			}
			for (key, next) in state.old_index_next_ids {
				self.set_next_instance(key, next)?;
			}
			for (_, removed) in state.removed {
				self.raw_upsert_any(removed)?;
			}
			Ok(())
		})();
		if !was_disabled {
			self.undo.enable();
		}
		result
	}

	pub(crate) fn undo_innermost(&mut self) -> Result<()> {
		let state = self.undo.pop_for_undo()?;
		self.apply_undo_state(state)
	}

	/// Rewinds the newest committed session (one applied block) when no
	/// sessions are open.
	pub(crate) fn pop_commit(&mut self) -> Result<()> {
		let state = self.undo.pop_committed()?;
		self.apply_undo_state(state)
	}

	// ---- Observer plumbing. Observer failures are logged and suppressed;
	// ---- they must never influence consensus.

	fn notify_add(&mut self, any: &AnyObject) {
		for observer in &mut self.observers {
			if let Err(error) = observer.on_add(any) {
				tracing::warn!(%error, id = %any.object_id(), "observer failed in on_add");
			}
		}
	}

	fn notify_modify(&mut self, any: &AnyObject) {
		for observer in &mut self.observers {
			if let Err(error) = observer.on_modify(any) {
				tracing::warn!(%error, id = %any.object_id(), "observer failed in on_modify");
			}
		}
	}

	fn notify_remove(&mut self, any: &AnyObject) {
		for observer in &mut self.observers {
			if let Err(error) = observer.on_remove(any) {
				tracing::warn!(%error, id = %any.object_id(), "observer failed in on_remove");
			}
		}
	}

	pub(crate) fn notify_applied_block(&mut self, block: &SignedBlock) {
		let ops = std::mem::take(&mut self.applied_operations);
		for observer in &mut self.block_observers {
			observer.on_applied_block(block, &ops);
		}
		self.applied_operations = ops;
	}

	pub(crate) fn push_applied_operation(&mut self, op: Operation, result: OperationResult) {
		self.applied_operations.push((op, result));
	}

	pub fn applied_operations(&self) -> &[(Operation, OperationResult)] {
		&self.applied_operations
	}

	// ---- Singleton and typed accessors.

	pub fn global_properties(&self) -> &GlobalPropertiesObject {
		self.find::<GlobalPropertiesObject>(0).expect("initialized at genesis")
	}

	pub fn dynamic_global_properties(&self) -> &DynamicGlobalPropertiesObject {
		self.find::<DynamicGlobalPropertiesObject>(0).expect("initialized at genesis")
	}

	pub fn chain_parameters(&self) -> &ChainParameters {
		&self.global_properties().parameters
	}

	pub fn current_fee_schedule(&self) -> &FeeSchedule {
		&self.chain_parameters().current_fees
	}

	pub fn head_block_num(&self) -> u32 {
		self.dynamic_global_properties().head_block_number
	}

	pub fn head_block_id(&self) -> BlockId {
		self.dynamic_global_properties().head_block_id
	}

	pub fn head_block_time(&self) -> TimePointSec {
		self.dynamic_global_properties().time
	}

	pub fn block_interval(&self) -> u8 {
		self.chain_parameters().block_interval
	}

	pub fn modify_dynamic_globals(
		&mut self,
		mutator: impl FnOnce(&mut DynamicGlobalPropertiesObject),
	) -> Result<()> {
		self.modify::<DynamicGlobalPropertiesObject>(0, mutator)
	}

	pub fn account(&self, id: AccountId) -> Result<&AccountObject> {
		self.get::<AccountObject>(id.instance())
	}

	pub fn account_by_name(&self, name: &str) -> Option<&AccountObject> {
		let id = self.store.account_by_name.get(name)?;
		self.find::<AccountObject>(id.instance())
	}

	pub fn account_statistics(&self, id: AccountId) -> Result<&AccountStatisticsObject> {
		let stats_id = self.account(id)?.statistics;
		self.get::<AccountStatisticsObject>(stats_id.instance())
	}

	pub fn asset(&self, id: AssetId) -> Result<&AssetObject> {
		self.get::<AssetObject>(id.instance())
	}

	pub fn asset_by_symbol(&self, symbol: &str) -> Option<&AssetObject> {
		let id = self.store.asset_by_symbol.get(symbol)?;
		self.find::<AssetObject>(id.instance())
	}

	pub fn asset_dynamic(&self, asset: &AssetObject) -> Result<&AssetDynamicDataObject> {
		self.get::<AssetDynamicDataObject>(asset.dynamic_data.instance())
	}

	pub fn asset_bitasset(&self, asset: &AssetObject) -> Result<&AssetBitassetDataObject> {
		let id = asset.bitasset_data.ok_or_else(|| {
			Error::Precondition(format!("asset {} is not market-issued", asset.symbol))
		})?;
		self.get::<AssetBitassetDataObject>(id.instance())
	}

	pub fn witness(&self, id: WitnessId) -> Result<&WitnessObject> {
		self.get::<WitnessObject>(id.instance())
	}

	pub fn witness_by_account(&self, account: AccountId) -> Option<&WitnessObject> {
		let id = self.store.witness_by_account.get(&account)?;
		self.find::<WitnessObject>(id.instance())
	}

	pub fn limit_order(&self, id: LimitOrderId) -> Result<&LimitOrderObject> {
		self.get::<LimitOrderObject>(id.instance())
	}

	pub fn call_order(&self, id: CallOrderId) -> Result<&CallOrderObject> {
		self.get::<CallOrderObject>(id.instance())
	}

	pub fn call_order_of(&self, borrower: AccountId, debt_asset: AssetId) -> Option<&CallOrderObject> {
		let id = self.store.call_by_account.get(&(borrower, debt_asset))?;
		self.find::<CallOrderObject>(id.instance())
	}

	pub fn force_settlement(&self, id: ForceSettlementId) -> Result<&ForceSettlementObject> {
		self.get::<ForceSettlementObject>(id.instance())
	}

	pub fn limit_orders(&self) -> impl Iterator<Item = &LimitOrderObject> {
		self.store.limit_orders.iter()
	}

	pub fn call_orders(&self) -> impl Iterator<Item = &CallOrderObject> {
		self.store.call_orders.iter()
	}

	/// True iff `account` may hold/trade `asset` under its whitelist
	/// regime.
	pub fn is_authorized_asset(&self, account: &AccountObject, asset: &AssetObject) -> bool {
		for authority in &asset.options.blacklist_authorities {
			if account.blacklisted_by.contains(authority) {
				return false;
			}
		}
		if !asset.enforces_white_list() || asset.options.whitelist_authorities.is_empty() {
			return true;
		}
		asset
			.options
			.whitelist_authorities
			.iter()
			.any(|authority| account.whitelisted_by.contains(authority))
	}

	// ---- Deterministic snapshots, for startup shortcuts and for the undo
	// ---- round-trip property.

	fn snapshot_index<T: ChainObject + Encode>(&self) -> ((u8, u8), Vec<u8>)
	where
		Store: ObjectStore<T>,
	{
		let index = ObjectStore::<T>::index(&self.store);
		let objects: Vec<AnyObject> = index.iter().map(|obj| obj.clone().into_any()).collect();
		((T::SPACE, T::TYPE), (index.next_instance(), objects).encode())
	}

	pub fn snapshot_parts(&self) -> Vec<((u8, u8), Vec<u8>)> {
		vec![
			self.snapshot_index::<AccountObject>(),
			self.snapshot_index::<AssetObject>(),
			self.snapshot_index::<WitnessObject>(),
			self.snapshot_index::<LimitOrderObject>(),
			self.snapshot_index::<CallOrderObject>(),
			self.snapshot_index::<ForceSettlementObject>(),
			self.snapshot_index::<GlobalPropertiesObject>(),
			self.snapshot_index::<DynamicGlobalPropertiesObject>(),
			self.snapshot_index::<AssetDynamicDataObject>(),
			self.snapshot_index::<AssetBitassetDataObject>(),
			self.snapshot_index::<AccountBalanceObject>(),
			self.snapshot_index::<AccountStatisticsObject>(),
			self.snapshot_index::<BlockSummaryObject>(),
		]
	}

	/// One canonical byte string for the complete object state.
	pub fn snapshot_bytes(&self) -> Vec<u8> {
		let mut bytes = Vec::new();
		for (key, part) in self.snapshot_parts() {
			key.encode_to(&mut bytes);
			part.encode_to(&mut bytes);
		}
		bytes
	}

	/// Restores one `(space, type)` dump produced by [`snapshot_parts`].
	pub fn load_snapshot_part(&mut self, key: (u8, u8), bytes: &[u8]) -> Result<()> {
		let (next_instance, objects) = <(u64, Vec<AnyObject>)>::decode(&mut &bytes[..])
			.map_err(|e| Error::Internal(format!("corrupt snapshot for index {key:?}: {e}")))?;
		self.undo.disable();
		for any in objects {
			internal_assert!(
				any.object_id().index_key() == key,
				"snapshot object {} filed under index {key:?}",
				any.object_id()
			);
			self.raw_upsert_any(any)?;
		}
		self.set_next_instance(key, next_instance)?;
		self.undo.enable();
		Ok(())
	}

	/// The supply-conservation audit: recomputes every asset's ledger from
	/// first principles and compares against `current_supply`. Called by
	/// tests and on demand; a mismatch is a category-4 fault.
	pub fn check_asset_supplies(&self) -> Result<()> {
		use std::collections::BTreeMap;
		let mut total_balances: BTreeMap<AssetId, i128> = BTreeMap::new();
		let mut total_debts: BTreeMap<AssetId, i128> = BTreeMap::new();

		for balance in self.store.account_balances.iter() {
			*total_balances.entry(balance.asset_id).or_default() += balance.balance as i128;
		}
		for order in self.store.limit_orders.iter() {
			*total_balances.entry(order.sell_asset_id()).or_default() += order.for_sale as i128;
		}
		for call in self.store.call_orders.iter() {
			*total_balances.entry(call.collateral_asset).or_default() += call.collateral as i128;
			*total_debts.entry(call.debt_asset).or_default() += call.debt as i128;
		}
		for settlement in self.store.force_settlements.iter() {
			*total_balances.entry(settlement.balance.asset_id).or_default() +=
				settlement.balance.amount as i128;
		}
		for stats in self.store.account_statistics.iter() {
			*total_balances.entry(onyx_primitives::CORE_ASSET).or_default() +=
				(stats.pending_fees + stats.pending_vested_fees) as i128;
		}
		*total_balances.entry(onyx_primitives::CORE_ASSET).or_default() +=
			self.dynamic_global_properties().witness_budget as i128;
		for dynamic in self.store.asset_dynamic_data.iter() {
			*total_balances.entry(dynamic.asset_id).or_default() +=
				(dynamic.accumulated_fees + dynamic.confidential_supply) as i128;
			*total_balances.entry(onyx_primitives::CORE_ASSET).or_default() +=
				dynamic.fee_pool as i128;
		}
		for bitasset in self.store.asset_bitasset_data.iter() {
			*total_balances.entry(bitasset.options.short_backing_asset).or_default() +=
				bitasset.settlement_fund as i128;
		}

		for asset in self.store.assets.iter() {
			let dynamic = self.asset_dynamic(asset)?;
			let balance_sum = total_balances.remove(&asset.id).unwrap_or(0);
			internal_assert!(
				balance_sum == dynamic.current_supply as i128,
				"asset {}: ledger sums to {balance_sum}, supply says {}",
				asset.symbol,
				dynamic.current_supply
			);
			if asset.is_market_issued() {
				let bitasset = self.asset_bitasset(asset)?;
				if !bitasset.has_settlement() {
					let debt_sum = total_debts.remove(&asset.id).unwrap_or(0);
					internal_assert!(
						debt_sum == dynamic.current_supply as i128,
						"asset {}: debt sums to {debt_sum}, supply says {}",
						asset.symbol,
						dynamic.current_supply
					);
				}
			}
		}
		internal_assert!(
			total_balances.is_empty(),
			"balances recorded for unknown assets: {total_balances:?}"
		);
		Ok(())
	}
}

/// A scoped undo session. Rolls back on drop unless committed or merged;
/// that covers early returns and panics alike.
pub struct UndoSession<'a> {
	db: &'a mut Database,
	open: bool,
}

impl std::ops::Deref for UndoSession<'_> {
	type Target = Database;
	fn deref(&self) -> &Database {
		self.db
	}
}

impl std::ops::DerefMut for UndoSession<'_> {
	fn deref_mut(&mut self) -> &mut Database {
		self.db
	}
}

impl UndoSession<'_> {
	/// Keeps the session's effects. The recorded state stays on the stack
	/// so a whole committed block can still be popped during reorgs.
	pub fn commit(mut self) -> Result<()> {
		self.open = false;
		self.db.undo.commit()?;
		Ok(())
	}

	/// Folds this session's diffs into the parent session.
	pub fn merge(mut self) -> Result<()> {
		self.open = false;
		self.db.undo.merge()?;
		Ok(())
	}

	/// Explicitly rolls back now instead of at drop, surfacing any error.
	pub fn rollback(mut self) -> Result<()> {
		self.open = false;
		self.db.undo_innermost()
	}
}

impl Drop for UndoSession<'_> {
	fn drop(&mut self) {
		if self.open {
			if let Err(error) = self.db.undo_innermost() {
				tracing::error!(%error, "failed to roll back undo session");
			}
		}
	}
}
