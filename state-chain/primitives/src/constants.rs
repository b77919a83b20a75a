//! Protocol constants. Committee-tunable parameters live in
//! `onyx_protocol::parameters::ChainParameters`; the values here are hard
//! limits baked into consensus.

use crate::ShareAmount;

/// Symbol and precision of the core asset.
pub const CORE_SYMBOL: &str = "ONX";
pub const CORE_PRECISION: u8 = 5;
/// One whole core asset in minimal units.
pub const CORE_UNIT: ShareAmount = 100_000;

/// No asset's `current_supply` may exceed this.
pub const MAX_SHARE_SUPPLY: ShareAmount = 1_000_000_000_000_000;

/// Percentage fields are fixed point with a denominator of 10_000.
pub const FULL_PERCENT: u16 = 10_000;
pub const ONE_PERCENT: u16 = FULL_PERCENT / 100;

/// Collateral ratios are fixed point with a denominator of 1000.
pub const COLLATERAL_RATIO_DENOM: u16 = 1000;
/// Lower than this could result in a divide by zero.
pub const MIN_COLLATERAL_RATIO: u16 = 1001;
/// Higher than this is unnecessary and may exceed 16-bit storage.
pub const MAX_COLLATERAL_RATIO: u16 = 32_000;
/// Call when collateral only pays off 175% of the debt.
pub const DEFAULT_MAINTENANCE_COLLATERAL_RATIO: u16 = 1750;
/// Stop calling when collateral only pays off 150% of the debt.
pub const DEFAULT_MAX_SHORT_SQUEEZE_RATIO: u16 = 1500;

pub const MIN_ACCOUNT_NAME_LENGTH: usize = 1;
pub const MAX_ACCOUNT_NAME_LENGTH: usize = 63;
pub const MIN_ASSET_SYMBOL_LENGTH: usize = 3;
pub const MAX_ASSET_SYMBOL_LENGTH: usize = 16;

pub const MAX_SIG_CHECK_DEPTH: u32 = 2;

pub const MIN_BLOCK_INTERVAL_SECS: u8 = 1;
pub const MAX_BLOCK_INTERVAL_SECS: u8 = 30;
pub const DEFAULT_BLOCK_INTERVAL_SECS: u8 = 5;

pub const MIN_TRANSACTION_SIZE_LIMIT: u32 = 1024;
pub const MIN_BLOCK_SIZE_LIMIT: u32 = MIN_TRANSACTION_SIZE_LIMIT * 5;
pub const DEFAULT_MAX_TRANSACTION_SIZE: u32 = 2048;
pub const DEFAULT_MAX_BLOCK_SIZE: u32 = 2_000_000;

pub const DEFAULT_MAX_TIME_UNTIL_EXPIRATION_SECS: u32 = 60 * 60 * 24;
pub const DEFAULT_MAINTENANCE_INTERVAL_SECS: u32 = 60 * 60 * 24;
pub const DEFAULT_MAINTENANCE_SKIP_SLOTS: u8 = 3;

pub const DEFAULT_FORCE_SETTLEMENT_DELAY_SECS: u32 = 60 * 60 * 24;
pub const DEFAULT_FORCE_SETTLEMENT_OFFSET: u16 = 0;
pub const DEFAULT_FORCE_SETTLEMENT_MAX_VOLUME: u16 = 20 * ONE_PERCENT;
pub const DEFAULT_PRICE_FEED_LIFETIME_SECS: u32 = 60 * 60 * 24;
pub const DEFAULT_MINIMUM_FEEDS: u8 = 7;

pub const DEFAULT_MAX_AUTHORITY_MEMBERSHIP: u16 = 10;
pub const DEFAULT_MAX_ASSET_WHITELIST_AUTHORITIES: u8 = 10;
pub const DEFAULT_MAX_ASSET_FEED_PUBLISHERS: u8 = 10;

/// SHOULD BE ODD.
pub const DEFAULT_MAX_WITNESSES: u16 = 1001;
pub const DEFAULT_MIN_WITNESS_COUNT: u16 = 11;

pub const DEFAULT_NETWORK_PERCENT_OF_FEE: u16 = 20 * ONE_PERCENT;
pub const DEFAULT_LIFETIME_REFERRER_PERCENT_OF_FEE: u16 = 30 * ONE_PERCENT;
pub const DEFAULT_BURN_PERCENT_OF_FEE: u16 = 20 * ONE_PERCENT;
pub const DEFAULT_WITNESS_PAY_PER_BLOCK: ShareAmount = CORE_UNIT * 10;

/// Blocks confirmed by this fraction of witnesses are irreversible.
pub const IRREVERSIBLE_THRESHOLD: u16 = 70 * ONE_PERCENT;

/// xorshift* multiplier keying the witness slot arbitration, see
/// <https://en.wikipedia.org/wiki/Xorshift#xorshift*>.
pub const SCHEDULER_PRF_MULTIPLIER: u64 = 2_685_821_657_736_338_717;

/// The TaPoS reference window: block summaries are kept in a ring of this
/// many slots.
pub const BLOCK_SUMMARY_WINDOW: u64 = 1 << 16;

/// Default number of blocks the fork database and undo history retain.
pub const DEFAULT_MAX_UNDO_HISTORY: u32 = 1024;
