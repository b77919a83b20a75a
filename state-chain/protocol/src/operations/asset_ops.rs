use crate::{
	asset::{Asset, Price, PriceFeed},
	ensure, ValidationResult,
};
use codec::{Decode, Encode};
use onyx_primitives::{
	constants::{
		FULL_PERCENT, MAX_ASSET_SYMBOL_LENGTH, MAX_SHARE_SUPPLY, MIN_ASSET_SYMBOL_LENGTH,
	},
	AccountId, AssetId, ForceSettlementId, ShareAmount,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Permission/flag bits on an asset. `issuer_permissions` bounds what the
/// issuer may ever enable; `flags` is what is currently enabled.
pub mod asset_flags {
	pub const CHARGE_MARKET_FEE: u16 = 0x01;
	pub const WHITE_LIST: u16 = 0x02;
	pub const OVERRIDE_AUTHORITY: u16 = 0x04;
	pub const TRANSFER_RESTRICTED: u16 = 0x08;
	pub const DISABLE_FORCE_SETTLE: u16 = 0x10;
	pub const GLOBAL_SETTLE: u16 = 0x20;
	pub const WITNESS_FED_ASSET: u16 = 0x40;

	pub const ALL: u16 = 0x7f;
}

pub fn is_valid_symbol(symbol: &str) -> bool {
	(MIN_ASSET_SYMBOL_LENGTH..=MAX_ASSET_SYMBOL_LENGTH).contains(&symbol.len()) &&
		symbol.as_bytes().first().is_some_and(u8::is_ascii_uppercase) &&
		symbol.as_bytes().last().is_some_and(u8::is_ascii_uppercase) &&
		symbol.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'.')
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetOptions {
	pub max_supply: ShareAmount,
	/// Percentage of every market fill received in this asset, accrued to
	/// the asset's accumulated fees.
	pub market_fee_percent: u16,
	pub max_market_fee: ShareAmount,
	pub issuer_permissions: u16,
	pub flags: u16,
	/// Rate the fee pool quotes for paying core fees in this asset.
	pub core_exchange_rate: Price,
	/// Accounts allowed to hold the asset when the white-list flag is set.
	pub whitelist_authorities: BTreeSet<AccountId>,
	pub blacklist_authorities: BTreeSet<AccountId>,
	/// If non-empty, the asset may only trade against these assets.
	pub whitelist_markets: BTreeSet<AssetId>,
	pub blacklist_markets: BTreeSet<AssetId>,
}

impl AssetOptions {
	pub fn validate(&self) -> ValidationResult {
		ensure!(
			self.max_supply > 0 && self.max_supply <= MAX_SHARE_SUPPLY,
			"max supply outside (0, {MAX_SHARE_SUPPLY}]"
		);
		ensure!(self.market_fee_percent <= FULL_PERCENT, "market fee percent exceeds 100%");
		ensure!(self.max_market_fee >= 0, "max market fee must not be negative");
		ensure!(self.flags & !self.issuer_permissions == 0, "flags exceed issuer permissions");
		ensure!(self.issuer_permissions & !asset_flags::ALL == 0, "unknown permission bits");
		self.core_exchange_rate.validate()
	}

	pub fn flag(&self, bit: u16) -> bool {
		self.flags & bit != 0
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct BitassetOptions {
	/// Feeds older than this are excluded from the median.
	pub feed_lifetime_secs: u32,
	/// Below this many live feeds the asset has no current feed.
	pub minimum_feeds: u8,
	pub force_settlement_delay_secs: u32,
	/// Offset applied against the feed when force settlements execute.
	pub force_settlement_offset_percent: u16,
	/// Maximum fraction of supply force-settled per maintenance interval.
	pub maximum_force_settlement_volume: u16,
	/// The asset collateralizing this one.
	pub short_backing_asset: AssetId,
}

impl BitassetOptions {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.minimum_feeds > 0, "minimum feeds must be positive");
		ensure!(self.feed_lifetime_secs > 0, "feed lifetime must be positive");
		ensure!(
			self.force_settlement_offset_percent <= FULL_PERCENT,
			"settlement offset exceeds 100%"
		);
		ensure!(
			self.maximum_force_settlement_volume <= FULL_PERCENT,
			"settlement volume cap exceeds 100%"
		);
		Ok(())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetCreateOperation {
	pub fee: Asset,
	pub issuer: AccountId,
	pub symbol: String,
	pub precision: u8,
	pub common_options: AssetOptions,
	/// Present iff the asset is market-issued.
	pub bitasset_options: Option<BitassetOptions>,
	pub is_prediction_market: bool,
}

impl AssetCreateOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		ensure!(is_valid_symbol(&self.symbol), "invalid asset symbol '{}'", self.symbol);
		ensure!(self.precision <= 12, "precision exceeds 12 digits");
		self.common_options.validate()?;
		if let Some(bitasset) = &self.bitasset_options {
			bitasset.validate()?;
		} else {
			ensure!(!self.is_prediction_market, "prediction markets must be market-issued");
		}
		Ok(())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetUpdateOperation {
	pub fee: Asset,
	pub issuer: AccountId,
	pub asset_to_update: AssetId,
	pub new_issuer: Option<AccountId>,
	pub new_options: AssetOptions,
}

impl AssetUpdateOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		self.new_options.validate()
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetUpdateBitassetOperation {
	pub fee: Asset,
	pub issuer: AccountId,
	pub asset_to_update: AssetId,
	pub new_options: BitassetOptions,
}

impl AssetUpdateBitassetOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		self.new_options.validate()
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetUpdateFeedProducersOperation {
	pub fee: Asset,
	pub issuer: AccountId,
	pub asset_to_update: AssetId,
	pub new_feed_producers: BTreeSet<AccountId>,
}

impl AssetUpdateFeedProducersOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		Ok(())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetIssueOperation {
	pub fee: Asset,
	pub issuer: AccountId,
	pub asset_to_issue: Asset,
	pub issue_to_account: AccountId,
}

impl AssetIssueOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		ensure!(self.asset_to_issue.amount > 0, "issue amount must be positive");
		Ok(())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetReserveOperation {
	pub fee: Asset,
	pub payer: AccountId,
	pub amount_to_reserve: Asset,
}

impl AssetReserveOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		ensure!(self.amount_to_reserve.amount > 0, "reserve amount must be positive");
		Ok(())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetFundFeePoolOperation {
	pub fee: Asset,
	pub from_account: AccountId,
	pub asset_id: AssetId,
	/// Core paid into the pool.
	pub amount: ShareAmount,
}

impl AssetFundFeePoolOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		ensure!(self.amount > 0, "pool funding must be positive");
		Ok(())
	}
}

/// Queues a redemption of a bitasset against its collateral at the feed
/// price prevailing when the settlement executes.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetSettleOperation {
	pub fee: Asset,
	pub account: AccountId,
	pub amount: Asset,
}

impl AssetSettleOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		ensure!(self.amount.amount >= 0, "settle amount must not be negative");
		Ok(())
	}
}

/// Issuer-initiated black-swan resolution: closes every margin position
/// into a settlement fund at `settle_price` and freezes the asset.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetGlobalSettleOperation {
	pub fee: Asset,
	pub issuer: AccountId,
	pub asset_to_settle: AssetId,
	pub settle_price: Price,
}

impl AssetGlobalSettleOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		self.settle_price.validate()
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetPublishFeedOperation {
	pub fee: Asset,
	pub publisher: AccountId,
	pub asset_id: AssetId,
	pub feed: PriceFeed,
}

impl AssetPublishFeedOperation {
	pub fn validate(&self) -> ValidationResult {
		ensure!(self.fee.amount >= 0, "fee must not be negative");
		self.feed.validate()
	}
}

/// Virtual operation recording the refund of an unexecuted settlement when
/// its asset loses its feed or settles globally.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetSettleCancelOperation {
	pub fee: Asset,
	pub settlement: ForceSettlementId,
	pub account: AccountId,
	pub amount: Asset,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn symbols() {
		assert!(is_valid_symbol("USD"));
		assert!(is_valid_symbol("BTC2.MARKET"));
		assert!(!is_valid_symbol("US"));
		assert!(!is_valid_symbol("usd"));
		assert!(!is_valid_symbol("USD."));
		assert!(!is_valid_symbol("TOOLONGSYMBOLXXXX2"));
	}

	#[test]
	fn flags_must_stay_within_permissions() {
		let options = AssetOptions {
			max_supply: 1000,
			market_fee_percent: 0,
			max_market_fee: 0,
			issuer_permissions: asset_flags::WHITE_LIST,
			flags: asset_flags::TRANSFER_RESTRICTED,
			core_exchange_rate: Price::new(
				Asset::new(1, AssetId::new(1)),
				Asset::new(1, onyx_primitives::CORE_ASSET),
			),
			whitelist_authorities: BTreeSet::new(),
			blacklist_authorities: BTreeSet::new(),
			whitelist_markets: BTreeSet::new(),
			blacklist_markets: BTreeSet::new(),
		};
		assert!(options.validate().is_err());
	}
}
