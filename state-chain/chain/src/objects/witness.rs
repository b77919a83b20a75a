use codec::{Decode, Encode};
use onyx_primitives::{AccountId, WitnessId};
use onyx_protocol::PublicKey;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct WitnessObject {
	pub id: WitnessId,
	pub witness_account: AccountId,
	pub signing_key: PublicKey,
	pub url: String,
	/// Absolute slot of this witness's most recent block. Feeds both the
	/// scheduler's min-separation filter and participation accounting.
	pub last_aslot: u64,
	pub total_votes: u64,
	pub total_missed: u32,
	pub last_confirmed_block_num: u32,
}
