use crate::{
	transaction::SignedTransaction,
	types::{BlockId, CompactSignature, Digest, PublicKey},
};
use codec::{Decode, Encode};
use onyx_primitives::{TimePointSec, WitnessId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct BlockHeader {
	pub previous: BlockId,
	pub timestamp: TimePointSec,
	pub witness: WitnessId,
	pub transaction_merkle_root: Digest,
	pub extensions: Vec<u8>,
}

impl BlockHeader {
	/// Block numbers are dense: genesis's successor is 1 and every block is
	/// its parent's number plus one.
	pub fn block_num(&self) -> u32 {
		self.previous.num_from_id() + 1
	}

	pub fn digest(&self) -> Digest {
		Digest::hash_encoded(self)
	}

	pub fn id(&self) -> BlockId {
		BlockId::from_digest(self.digest(), self.block_num())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct SignedBlockHeader {
	pub header: BlockHeader,
	pub witness_signature: CompactSignature,
}

impl std::ops::Deref for SignedBlockHeader {
	type Target = BlockHeader;
	fn deref(&self) -> &BlockHeader {
		&self.header
	}
}

impl SignedBlockHeader {
	pub fn signer(&self) -> Option<PublicKey> {
		self.witness_signature.recover(&self.header.digest())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct SignedBlock {
	pub header: SignedBlockHeader,
	pub transactions: Vec<SignedTransaction>,
}

impl std::ops::Deref for SignedBlock {
	type Target = SignedBlockHeader;
	fn deref(&self) -> &SignedBlockHeader {
		&self.header
	}
}

impl SignedBlock {
	pub fn new(
		mut header: BlockHeader,
		transactions: Vec<SignedTransaction>,
		signing_key: &secp256k1::SecretKey,
	) -> Self {
		header.transaction_merkle_root = calculate_merkle_root(&transactions);
		let signature = CompactSignature::sign(&header.digest(), signing_key);
		Self { header: SignedBlockHeader { header, witness_signature: signature }, transactions }
	}

	pub fn id(&self) -> BlockId {
		self.header.header.id()
	}
}

/// Binary merkle root over transaction ids; an odd node is carried up
/// unhashed. The empty block has the zero root.
pub fn calculate_merkle_root(transactions: &[SignedTransaction]) -> Digest {
	if transactions.is_empty() {
		return Digest::default();
	}
	let mut layer: Vec<Digest> = transactions.iter().map(|tx| tx.transaction.id()).collect();
	while layer.len() > 1 {
		let mut next = Vec::with_capacity(layer.len().div_ceil(2));
		for pair in layer.chunks(2) {
			next.push(match pair {
				[left, right] => {
					let mut data = left.0.to_vec();
					data.extend_from_slice(&right.0);
					Digest::hash(&data)
				},
				[odd] => *odd,
				_ => unreachable!(),
			});
		}
		layer = next;
	}
	layer[0]
}

#[cfg(test)]
mod tests {
	use super::*;

	fn secret() -> secp256k1::SecretKey {
		secp256k1::SecretKey::from_slice(&[5u8; 32]).unwrap()
	}

	fn header(num: u32) -> BlockHeader {
		let mut previous = BlockId::default();
		previous.0[..4].copy_from_slice(&(num - 1).to_be_bytes());
		BlockHeader {
			previous,
			timestamp: TimePointSec::new(100),
			witness: WitnessId::new(1),
			transaction_merkle_root: Digest::default(),
			extensions: Vec::new(),
		}
	}

	#[test]
	fn block_ids_chain_numbers() {
		let block = SignedBlock::new(header(7), Vec::new(), &secret());
		assert_eq!(block.block_num(), 7);
		assert_eq!(block.id().num_from_id(), 7);
	}

	#[test]
	fn witness_signature_recovers_signing_key() {
		let block = SignedBlock::new(header(1), Vec::new(), &secret());
		assert_eq!(block.header.signer(), Some(PublicKey::from_secret(&secret())));
	}

	#[test]
	fn merkle_root_is_empty_for_empty_blocks() {
		assert_eq!(calculate_merkle_root(&[]), Digest::default());
	}

	#[test]
	fn tampering_with_transactions_changes_the_root() {
		use crate::{asset::Asset, operations::*, transaction::Transaction};
		let tx = |amount| {
			SignedTransaction::new(Transaction {
				operations: vec![Operation::Transfer(TransferOperation {
					fee: Asset::core(1),
					from: onyx_primitives::AccountId::new(1),
					to: onyx_primitives::AccountId::new(2),
					amount: Asset::core(amount),
					memo: None,
				})],
				..Default::default()
			})
		};
		let a = calculate_merkle_root(&[tx(1), tx(2)]);
		let b = calculate_merkle_root(&[tx(1), tx(3)]);
		assert_ne!(a, b);
		let odd = calculate_merkle_root(&[tx(1), tx(2), tx(3)]);
		assert_ne!(odd, a);
	}
}
