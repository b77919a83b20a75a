use crate::{
	ensure,
	operations::is_valid_account_name,
	parameters::ChainParameters,
	types::{ChainId, Digest, PublicKey},
	ValidationResult,
};
use codec::{Decode, Encode};
use onyx_primitives::{constants::MAX_SHARE_SUPPLY, ShareAmount, TimePointSec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct GenesisAccount {
	pub name: String,
	pub owner_key: PublicKey,
	#[serde(default)]
	pub is_lifetime_member: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct GenesisBalance {
	/// Name of a genesis account.
	pub owner: String,
	/// Core-asset amount in minimal units.
	pub amount: ShareAmount,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct GenesisWitness {
	pub owner_name: String,
	pub block_signing_key: PublicKey,
}

/// Everything needed to deterministically construct block zero state. The
/// chain id is the hash of this structure's canonical serialization, so any
/// edit produces a different network.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct GenesisState {
	pub initial_timestamp: TimePointSec,
	pub max_core_supply: ShareAmount,
	pub initial_parameters: ChainParameters,
	pub initial_accounts: Vec<GenesisAccount>,
	pub initial_balances: Vec<GenesisBalance>,
	pub initial_witnesses: Vec<GenesisWitness>,
}

impl GenesisState {
	pub fn compute_chain_id(&self) -> ChainId {
		Digest::hash_encoded(self)
	}

	pub fn validate(&self) -> ValidationResult {
		self.initial_parameters.validate()?;
		ensure!(
			self.max_core_supply > 0 && self.max_core_supply <= MAX_SHARE_SUPPLY,
			"max core supply outside (0, {MAX_SHARE_SUPPLY}]"
		);
		ensure!(!self.initial_witnesses.is_empty(), "at least one witness is required");
		let mut names = BTreeSet::new();
		for account in &self.initial_accounts {
			ensure!(is_valid_account_name(&account.name), "invalid name '{}'", account.name);
			ensure!(names.insert(&account.name), "duplicate account '{}'", account.name);
		}
		let total: i128 = self.initial_balances.iter().map(|b| b.amount as i128).sum();
		ensure!(
			total <= self.max_core_supply as i128,
			"initial balances exceed the maximum core supply"
		);
		for balance in &self.initial_balances {
			ensure!(balance.amount > 0, "genesis balances must be positive");
			ensure!(
				names.contains(&balance.owner),
				"balance owner '{}' is not a genesis account",
				balance.owner
			);
		}
		for witness in &self.initial_witnesses {
			ensure!(
				names.contains(&witness.owner_name),
				"witness owner '{}' is not a genesis account",
				witness.owner_name
			);
			ensure!(!witness.block_signing_key.is_null(), "witness signing key is null");
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn genesis() -> GenesisState {
		let key = PublicKey([2u8; 33]);
		GenesisState {
			initial_timestamp: TimePointSec::new(1_600_000_000),
			max_core_supply: MAX_SHARE_SUPPLY,
			initial_parameters: ChainParameters::default(),
			initial_accounts: vec![GenesisAccount {
				name: "init0".into(),
				owner_key: key,
				is_lifetime_member: true,
			}],
			initial_balances: vec![GenesisBalance { owner: "init0".into(), amount: 1_000 }],
			initial_witnesses: vec![GenesisWitness {
				owner_name: "init0".into(),
				block_signing_key: key,
			}],
		}
	}

	#[test]
	fn valid_genesis_passes_and_hashes_stably() {
		let g = genesis();
		g.validate().unwrap();
		assert_eq!(g.compute_chain_id(), g.compute_chain_id());
		let mut other = g.clone();
		other.initial_timestamp = TimePointSec::new(1_600_000_001);
		assert_ne!(g.compute_chain_id(), other.compute_chain_id());
	}

	#[test]
	fn balances_must_reference_known_accounts() {
		let mut g = genesis();
		g.initial_balances[0].owner = "ghost".into();
		assert!(g.validate().is_err());
	}

	#[test]
	fn json_round_trip() {
		let g = genesis();
		let json = serde_json::to_string_pretty(&g).unwrap();
		assert_eq!(serde_json::from_str::<GenesisState>(&json).unwrap(), g);
	}
}
