use crate::{ensure, types::PublicKey, ValidationResult};
use codec::{Decode, Encode};
use onyx_primitives::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A weighted-threshold authority over keys and other accounts.
///
/// Satisfaction may recurse through `account_auths` up to
/// `MAX_SIG_CHECK_DEPTH`; the chain crate implements the recursive check.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Authority {
	pub weight_threshold: u32,
	pub account_auths: BTreeMap<AccountId, u16>,
	pub key_auths: BTreeMap<PublicKey, u16>,
}

impl Authority {
	/// An authority satisfied by a single key.
	pub fn single_key(key: PublicKey) -> Self {
		Self {
			weight_threshold: 1,
			account_auths: BTreeMap::new(),
			key_auths: BTreeMap::from([(key, 1)]),
		}
	}

	/// An authority nobody can satisfy. Assigned to accounts that must not
	/// be able to act (e.g. the null account).
	pub fn impossible() -> Self {
		Self { weight_threshold: 1, account_auths: BTreeMap::new(), key_auths: BTreeMap::new() }
	}

	pub fn num_auths(&self) -> usize {
		self.account_auths.len() + self.key_auths.len()
	}

	pub fn is_impossible(&self) -> bool {
		let total: u64 = self
			.account_auths
			.values()
			.chain(self.key_auths.values())
			.map(|weight| *weight as u64)
			.sum();
		total < self.weight_threshold as u64
	}

	pub fn validate(&self) -> ValidationResult {
		ensure!(self.weight_threshold > 0, "authority threshold must be positive");
		for weight in self.account_auths.values().chain(self.key_auths.values()) {
			ensure!(*weight > 0, "authority member weight must be positive");
		}
		Ok(())
	}
}
