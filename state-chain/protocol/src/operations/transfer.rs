use crate::{asset::Asset, ensure, types::PublicKey, ValidationResult};
use codec::{Decode, Encode};
use onyx_primitives::AccountId;
use serde::{Deserialize, Serialize};

/// An encrypted memo. The cipher is a wallet concern; consensus only
/// carries the bytes and charges for their size.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Memo {
	pub from: PublicKey,
	pub to: PublicKey,
	pub nonce: u64,
	pub message: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct TransferOperation {
	pub fee: Asset,
	pub from: AccountId,
	pub to: AccountId,
	pub amount: Asset,
	pub memo: Option<Vec<u8>>,
}

impl TransferOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		ensure!(self.amount.amount > 0, "transfer amount must be positive");
		ensure!(self.from != self.to, "cannot transfer to self");
		Ok(())
	}
}
