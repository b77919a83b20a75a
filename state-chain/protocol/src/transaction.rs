use crate::{
	ensure,
	operations::Operation,
	types::{ChainId, CompactSignature, Digest, PublicKey},
	ValidationResult,
};
use codec::{Decode, Encode};
use onyx_primitives::TimePointSec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An unsigned transaction. `ref_block_num`/`ref_block_prefix` tie it to a
/// recent block (TaPoS) so it cannot survive onto a fork that lacks that
/// block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Transaction {
	/// Low 16 bits of the referenced block number.
	pub ref_block_num: u16,
	/// Bytes 4..8 of the referenced block id, little-endian.
	pub ref_block_prefix: u32,
	pub expiration: TimePointSec,
	pub operations: Vec<Operation>,
	pub extensions: Vec<u8>,
}

impl Transaction {
	pub fn validate(&self) -> ValidationResult {
		ensure!(!self.operations.is_empty(), "transaction contains no operations");
		for op in &self.operations {
			op.validate()?;
		}
		Ok(())
	}

	/// Points this transaction at `block_id` for TaPoS.
	pub fn set_reference_block(&mut self, block_id: crate::types::BlockId) {
		self.ref_block_num = (block_id.num_from_id() & 0xffff) as u16;
		self.ref_block_prefix =
			u32::from_le_bytes([block_id.0[4], block_id.0[5], block_id.0[6], block_id.0[7]]);
	}

	/// The transaction id: a digest over the unsigned content.
	pub fn id(&self) -> Digest {
		Digest::hash_encoded(self)
	}

	/// The digest that signatures commit to; includes the chain id so
	/// signatures cannot be replayed across chains.
	pub fn signature_digest(&self, chain_id: &ChainId) -> Digest {
		let mut data = chain_id.0.to_vec();
		self.encode_to(&mut data);
		Digest::hash(&data)
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct SignedTransaction {
	pub transaction: Transaction,
	pub signatures: Vec<CompactSignature>,
}

impl std::ops::Deref for SignedTransaction {
	type Target = Transaction;
	fn deref(&self) -> &Transaction {
		&self.transaction
	}
}

impl SignedTransaction {
	pub fn new(transaction: Transaction) -> Self {
		Self { transaction, signatures: Vec::new() }
	}

	pub fn sign(&mut self, secret: &secp256k1::SecretKey, chain_id: &ChainId) {
		let digest = self.transaction.signature_digest(chain_id);
		self.signatures.push(CompactSignature::sign(&digest, secret));
	}

	/// Recovers the set of keys that produced the attached signatures.
	/// Fails on a malformed or duplicate signature.
	pub fn signature_keys(&self, chain_id: &ChainId) -> Result<BTreeSet<PublicKey>, crate::ValidationError> {
		let digest = self.transaction.signature_digest(chain_id);
		let mut keys = BTreeSet::new();
		for signature in &self.signatures {
			let key = signature
				.recover(&digest)
				.ok_or_else(|| crate::ValidationError("unrecoverable signature".into()))?;
			ensure!(keys.insert(key), "duplicate signature by {key}");
		}
		Ok(keys)
	}
}
