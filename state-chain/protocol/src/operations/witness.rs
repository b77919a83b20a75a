use crate::{asset::Asset, ensure, types::PublicKey, ValidationResult};
use codec::{Decode, Encode};
use onyx_primitives::{AccountId, WitnessId};
use serde::{Deserialize, Serialize};

const MAX_URL_LENGTH: usize = 127;

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct WitnessCreateOperation {
	pub fee: Asset,
	/// The account standing for election.
	pub witness_account: AccountId,
	pub url: String,
	pub block_signing_key: PublicKey,
}

impl WitnessCreateOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		ensure!(self.url.len() <= MAX_URL_LENGTH, "witness url too long");
		ensure!(!self.block_signing_key.is_null(), "signing key must not be null");
		Ok(())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct WitnessUpdateOperation {
	pub fee: Asset,
	pub witness: WitnessId,
	pub witness_account: AccountId,
	pub new_url: Option<String>,
	pub new_signing_key: Option<PublicKey>,
}

impl WitnessUpdateOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		if let Some(url) = &self.new_url {
			ensure!(url.len() <= MAX_URL_LENGTH, "witness url too long");
		}
		if let Some(key) = &self.new_signing_key {
			ensure!(!key.is_null(), "signing key must not be null");
		}
		Ok(())
	}
}
