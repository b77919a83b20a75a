//! The chain error taxonomy.
//!
//! The first three categories abort the enclosing undo session and reject
//! the transaction (or, inside a block, the whole block). `Internal` means
//! the database can no longer be trusted; callers must halt rather than
//! diverge.

use onyx_db::{IndexError, UndoError};
use onyx_protocol::{MathError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Structurally malformed input, detected without reading state.
	#[error("validation failure: {0}")]
	Validation(String),
	/// Well-formed input the current state forbids.
	#[error("precondition failure: {0}")]
	Precondition(String),
	/// A business rule rejected the operation.
	#[error("policy failure: {0}")]
	Policy(String),
	/// A computed quantity violated a consensus invariant.
	#[error("internal invariant violation: {0}")]
	Internal(String),
	/// Context wrapper naming the failing operation within a transaction.
	#[error("operation {index}: {source}")]
	Operation {
		index: usize,
		#[source]
		source: Box<Error>,
	},
}

impl Error {
	pub fn is_internal(&self) -> bool {
		match self {
			Self::Internal(_) => true,
			Self::Operation { source, .. } => source.is_internal(),
			_ => false,
		}
	}

	pub fn in_operation(self, index: usize) -> Self {
		Self::Operation { index, source: Box::new(self) }
	}
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<ValidationError> for Error {
	fn from(e: ValidationError) -> Self {
		Self::Validation(e.0)
	}
}

impl From<IndexError> for Error {
	fn from(e: IndexError) -> Self {
		Self::Internal(e.to_string())
	}
}

impl From<UndoError> for Error {
	fn from(e: UndoError) -> Self {
		Self::Internal(e.to_string())
	}
}

impl From<MathError> for Error {
	fn from(e: MathError) -> Self {
		Self::Precondition(e.to_string())
	}
}

macro_rules! ensure_state {
	($cond:expr, $($arg:tt)*) => {
		if !$cond {
			return Err($crate::Error::Precondition(format!($($arg)*)));
		}
	};
}

macro_rules! ensure_policy {
	($cond:expr, $($arg:tt)*) => {
		if !$cond {
			return Err($crate::Error::Policy(format!($($arg)*)));
		}
	};
}

macro_rules! internal_assert {
	($cond:expr, $($arg:tt)*) => {
		if !$cond {
			return Err($crate::Error::Internal(format!($($arg)*)));
		}
	};
}

pub(crate) use ensure_policy;
pub(crate) use ensure_state;
pub(crate) use internal_assert;
