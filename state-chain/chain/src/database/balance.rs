//! Account balance accounting. Balances live in their own objects so that
//! hot-path transfers snapshot only the two touched rows into undo states.

use super::Database;
use crate::{error::ensure_state, objects::AccountBalanceObject, Result};
use onyx_primitives::{AccountBalanceId, AccountId, AssetId};
use onyx_protocol::Asset;

impl Database {
	pub fn get_balance(&self, owner: AccountId, asset_id: AssetId) -> Asset {
		let amount = self
			.store
			.balance_by_owner
			.get(&(owner, asset_id))
			.and_then(|id| self.find::<AccountBalanceObject>(id.instance()))
			.map(|balance| balance.balance)
			.unwrap_or(0);
		Asset::new(amount, asset_id)
	}

	/// Applies a signed delta to `owner`'s balance in `delta.asset_id`,
	/// creating the balance row on first credit.
	pub fn adjust_balance(&mut self, owner: AccountId, delta: Asset) -> Result<()> {
		if delta.amount == 0 {
			return Ok(());
		}
		match self.store.balance_by_owner.get(&(owner, delta.asset_id)).copied() {
			Some(id) => {
				let current = self.get::<AccountBalanceObject>(id.instance())?.balance;
				let updated = current + delta.amount;
				ensure_state!(
					updated >= 0,
					"insufficient balance: account {owner} has {current} of asset {}, needs {}",
					delta.asset_id,
					-delta.amount
				);
				self.modify::<AccountBalanceObject>(id.instance(), |balance| {
					balance.balance = updated;
				})
			},
			None => {
				ensure_state!(
					delta.amount > 0,
					"insufficient balance: account {owner} has 0 of asset {}, needs {}",
					delta.asset_id,
					-delta.amount
				);
				self.create::<AccountBalanceObject>(|instance| AccountBalanceObject {
					id: AccountBalanceId::new(instance),
					owner,
					asset_id: delta.asset_id,
					balance: delta.amount,
				})?;
				Ok(())
			},
		}
	}
}
