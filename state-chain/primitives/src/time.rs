use codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::{fmt, ops};

/// Seconds since the unix epoch, the only notion of time consensus code is
/// allowed to use. Wall clocks are read exclusively by block production.
#[derive(
	Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize,
	Deserialize,
)]
pub struct TimePointSec(pub u32);

impl TimePointSec {
	pub const fn new(secs: u32) -> Self {
		Self(secs)
	}

	pub const fn seconds(self) -> u32 {
		self.0
	}

	pub fn saturating_sub(self, other: Self) -> u32 {
		self.0.saturating_sub(other.0)
	}

	/// Largest representable time, used as "never expires".
	pub const MAX: Self = Self(u32::MAX);
}

impl ops::Add<u32> for TimePointSec {
	type Output = Self;
	fn add(self, secs: u32) -> Self {
		Self(self.0 + secs)
	}
}

impl ops::Sub<u32> for TimePointSec {
	type Output = Self;
	fn sub(self, secs: u32) -> Self {
		Self(self.0 - secs)
	}
}

impl fmt::Debug for TimePointSec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}s", self.0)
	}
}

impl fmt::Display for TimePointSec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}
