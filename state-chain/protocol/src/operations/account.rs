use crate::{asset::Asset, authority::Authority, ensure, types::PublicKey, ValidationResult};
use codec::{Decode, Encode};
use onyx_primitives::{
	constants::{FULL_PERCENT, MAX_ACCOUNT_NAME_LENGTH, MIN_ACCOUNT_NAME_LENGTH},
	AccountId, WitnessId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Account names are lowercase labels separated by dots; each label starts
/// with a letter, ends with a letter or digit and may contain hyphens.
pub fn is_valid_account_name(name: &str) -> bool {
	if !(MIN_ACCOUNT_NAME_LENGTH..=MAX_ACCOUNT_NAME_LENGTH).contains(&name.len()) {
		return false;
	}
	name.split('.').all(|label| {
		let bytes = label.as_bytes();
		!bytes.is_empty() &&
			bytes[0].is_ascii_lowercase() &&
			(bytes[bytes.len() - 1].is_ascii_lowercase() ||
				bytes[bytes.len() - 1].is_ascii_digit()) &&
			bytes
				.iter()
				.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
	})
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AccountOptions {
	/// Key wallets use to encrypt memos addressed to this account.
	pub memo_key: PublicKey,
	/// If set, this account's stake votes follow the named proxy.
	pub voting_account: Option<AccountId>,
	pub witness_votes: BTreeSet<WitnessId>,
}

impl Default for AccountOptions {
	fn default() -> Self {
		Self { memo_key: PublicKey::default(), voting_account: None, witness_votes: BTreeSet::new() }
	}
}

impl AccountOptions {
	pub fn validate(&self) -> ValidationResult {
		Ok(())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AccountCreateOperation {
	pub fee: Asset,
	/// Pays the fee and becomes the new account's registrar for the fee
	/// split.
	pub registrar: AccountId,
	pub referrer: AccountId,
	/// Portion of the referral reward going to `referrer` rather than the
	/// registrar's lifetime referrer.
	pub referrer_percent: u16,
	pub name: String,
	pub owner: Authority,
	pub active: Authority,
	pub options: AccountOptions,
}

impl AccountCreateOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		ensure!(is_valid_account_name(&self.name), "invalid account name '{}'", self.name);
		ensure!(self.referrer_percent <= FULL_PERCENT, "referrer percent exceeds 100%");
		self.owner.validate()?;
		self.active.validate()?;
		self.options.validate()
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AccountUpdateOperation {
	pub fee: Asset,
	pub account: AccountId,
	pub owner: Option<Authority>,
	pub active: Option<Authority>,
	pub new_options: Option<AccountOptions>,
}

impl AccountUpdateOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		ensure!(
			self.owner.is_some() || self.active.is_some() || self.new_options.is_some(),
			"update must change something"
		);
		if let Some(owner) = &self.owner {
			owner.validate()?;
		}
		if let Some(active) = &self.active {
			active.validate()?;
		}
		if let Some(options) = &self.new_options {
			options.validate()?;
		}
		Ok(())
	}
}

/// Listing flags for [`AccountWhitelistOperation::new_listing`].
pub mod listing {
	pub const NO_LISTING: u8 = 0x0;
	pub const WHITE_LISTED: u8 = 0x1;
	pub const BLACK_LISTED: u8 = 0x2;
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AccountWhitelistOperation {
	pub fee: Asset,
	pub authorizing_account: AccountId,
	pub account_to_list: AccountId,
	pub new_listing: u8,
}

impl AccountWhitelistOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		ensure!(
			self.new_listing <= (listing::WHITE_LISTED | listing::BLACK_LISTED),
			"unknown listing flags"
		);
		Ok(())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AccountUpgradeOperation {
	pub fee: Asset,
	pub account_to_upgrade: AccountId,
	pub upgrade_to_lifetime_member: bool,
}

impl AccountUpgradeOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		Ok(())
	}
}
