use codec::{Decode, Encode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A sha256 digest.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct Digest(pub [u8; 32]);

impl Digest {
	pub fn hash(data: &[u8]) -> Self {
		use sha2::{Digest as _, Sha256};
		Self(Sha256::digest(data).into())
	}

	pub fn hash_encoded<T: Encode>(value: &T) -> Self {
		Self::hash(&value.encode())
	}
}

/// The chain id: the sha256 of the canonically serialized genesis state.
pub type ChainId = Digest;

/// A 20-byte block id. The first four bytes carry the block number
/// big-endian so the number can be recovered from the id alone.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct BlockId(pub [u8; 20]);

impl BlockId {
	pub fn num_from_id(self) -> u32 {
		u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
	}

	pub fn is_null(self) -> bool {
		self == Self::default()
	}

	pub(crate) fn from_digest(digest: Digest, block_num: u32) -> Self {
		let mut bytes = [0u8; 20];
		bytes.copy_from_slice(&digest.0[..20]);
		bytes[..4].copy_from_slice(&block_num.to_be_bytes());
		Self(bytes)
	}
}

/// A compressed secp256k1 public key. The all-zero value is the null key.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct PublicKey(pub [u8; 33]);

impl Default for PublicKey {
	fn default() -> Self {
		Self([0u8; 33])
	}
}

impl PublicKey {
	pub fn is_null(&self) -> bool {
		self.0 == [0u8; 33]
	}

	pub fn from_secret(secret: &secp256k1::SecretKey) -> Self {
		Self(secret.public_key(secp256k1::SECP256K1).serialize())
	}
}

/// A 65-byte compact recoverable ECDSA signature: one recovery byte
/// followed by `r || s`.
#[derive(Copy, Clone, PartialEq, Eq, Encode, Decode)]
pub struct CompactSignature(pub [u8; 65]);

impl CompactSignature {
	pub fn sign(digest: &Digest, secret: &secp256k1::SecretKey) -> Self {
		let message = secp256k1::Message::from_digest(digest.0);
		let (recovery_id, data) = secp256k1::SECP256K1
			.sign_ecdsa_recoverable(&message, secret)
			.serialize_compact();
		let mut bytes = [0u8; 65];
		bytes[0] = recovery_id.to_i32() as u8;
		bytes[1..].copy_from_slice(&data);
		Self(bytes)
	}

	pub fn recover(&self, digest: &Digest) -> Option<PublicKey> {
		let recovery_id = secp256k1::ecdsa::RecoveryId::from_i32(self.0[0] as i32).ok()?;
		let signature =
			secp256k1::ecdsa::RecoverableSignature::from_compact(&self.0[1..], recovery_id).ok()?;
		let message = secp256k1::Message::from_digest(digest.0);
		let key = secp256k1::SECP256K1.recover_ecdsa(&message, &signature).ok()?;
		Some(PublicKey(key.serialize()))
	}
}

macro_rules! impl_hex_display_serde {
	($name:ident, $len:expr) => {
		impl fmt::Debug for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}(0x{})", stringify!($name), hex::encode(self.0))
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", hex::encode(self.0))
			}
		}

		impl Serialize for $name {
			fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
				serializer.serialize_str(&hex::encode(self.0))
			}
		}

		impl<'de> Deserialize<'de> for $name {
			fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
				let text = String::deserialize(deserializer)?;
				let raw = hex::decode(text.trim_start_matches("0x"))
					.map_err(serde::de::Error::custom)?;
				let bytes: [u8; $len] =
					raw.try_into().map_err(|_| serde::de::Error::custom("bad length"))?;
				Ok(Self(bytes))
			}
		}
	};
}

impl_hex_display_serde!(Digest, 32);
impl_hex_display_serde!(BlockId, 20);
impl_hex_display_serde!(PublicKey, 33);
impl_hex_display_serde!(CompactSignature, 65);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn block_id_embeds_the_block_number() {
		let id = BlockId::from_digest(Digest::hash(b"header"), 0xdeadbeef);
		assert_eq!(id.num_from_id(), 0xdeadbeef);
	}

	#[test]
	fn signatures_recover_the_signing_key() {
		let secret = secp256k1::SecretKey::from_slice(&[7u8; 32]).unwrap();
		let digest = Digest::hash(b"payload");
		let signature = CompactSignature::sign(&digest, &secret);
		assert_eq!(signature.recover(&digest), Some(PublicKey::from_secret(&secret)));
		assert_ne!(signature.recover(&Digest::hash(b"other")), Some(PublicKey::from_secret(&secret)));
	}

	#[test]
	fn digest_hex_round_trips_through_serde() {
		let digest = Digest::hash(b"x");
		let json = serde_json::to_string(&digest).unwrap();
		assert_eq!(serde_json::from_str::<Digest>(&json).unwrap(), digest);
	}
}
