//! Primitive types shared by every layer of the Onyx state chain: object
//! identifiers, share amounts, protocol constants and wide integers.

pub mod constants;
mod ids;
mod time;
mod wide;

pub use ids::*;
pub use time::TimePointSec;
pub use wide::{U256, U512};

/// Share amounts are signed 64-bit integers denominated in an asset's
/// minimal units. Negative values only ever appear transiently in deltas.
pub type ShareAmount = i64;

/// Percentages and ratios are fixed point with a denominator of 10_000.
pub type Percent = u16;
