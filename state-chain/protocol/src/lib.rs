//! Wire-level protocol types: everything that appears inside blocks and
//! operation payloads, plus the math those payloads imply (price rationals,
//! fee cuts). Nothing here touches chain state.

pub mod asset;
pub mod authority;
pub mod block;
pub mod fee;
pub mod genesis;
pub mod operations;
pub mod parameters;
pub mod transaction;
mod types;

pub use asset::{Asset, Price, PriceFeed};
pub use authority::Authority;
pub use block::{BlockHeader, SignedBlock, SignedBlockHeader};
pub use fee::{cut, FeeParameters, FeeSchedule};
pub use genesis::GenesisState;
pub use operations::{Operation, OperationResult};
pub use parameters::ChainParameters;
pub use transaction::{SignedTransaction, Transaction};
pub use types::{BlockId, ChainId, CompactSignature, Digest, PublicKey};

/// Structural validation errors, raised before any chain state is read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

pub type ValidationResult = Result<(), ValidationError>;

macro_rules! ensure {
	($cond:expr, $($arg:tt)*) => {
		if !$cond {
			return Err($crate::ValidationError(format!($($arg)*)));
		}
	};
}
pub(crate) use ensure;

/// Arithmetic failures inside price/amount math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
	#[error("amount overflow")]
	Overflow,
	#[error("asset id does not match either side of the price")]
	IncompatibleAsset,
	#[error("division by zero amount")]
	DivisionByZero,
}
