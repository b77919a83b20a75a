use codec::{Decode, Encode};
use onyx_primitives::{
	constants::FULL_PERCENT, AccountId, AssetBitassetDataId, AssetDynamicDataId, AssetId,
	ShareAmount, TimePointSec,
};
use onyx_protocol::{
	fee::cut,
	operations::{asset_flags, AssetOptions, BitassetOptions},
	Asset, Price, PriceFeed,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetObject {
	pub id: AssetId,
	pub symbol: String,
	pub precision: u8,
	pub issuer: AccountId,
	pub options: AssetOptions,
	pub dynamic_data: AssetDynamicDataId,
	/// Present iff the asset is market-issued.
	pub bitasset_data: Option<AssetBitassetDataId>,
}

impl AssetObject {
	pub fn is_market_issued(&self) -> bool {
		self.bitasset_data.is_some()
	}

	pub fn enforces_white_list(&self) -> bool {
		self.options.flag(asset_flags::WHITE_LIST)
	}

	pub fn is_transfer_restricted(&self) -> bool {
		self.options.flag(asset_flags::TRANSFER_RESTRICTED)
	}

	/// The market fee charged on `trade_amount` received in this asset.
	pub fn market_fee(&self, trade_amount: ShareAmount) -> ShareAmount {
		if !self.options.flag(asset_flags::CHARGE_MARKET_FEE) {
			return 0;
		}
		let percent_fee = cut(trade_amount, self.options.market_fee_percent);
		if self.options.max_market_fee > 0 {
			percent_fee.min(self.options.max_market_fee)
		} else {
			percent_fee
		}
	}
}

/// Frequently-mutated counters split off the asset object so fee churn does
/// not snapshot the whole option set into every undo state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetDynamicDataObject {
	pub id: AssetDynamicDataId,
	pub asset_id: AssetId,
	pub current_supply: ShareAmount,
	pub confidential_supply: ShareAmount,
	/// Market and operation fees accrued to the issuer, denominated in this
	/// asset.
	pub accumulated_fees: ShareAmount,
	/// Core held to pay core fees on behalf of users paying in this asset.
	pub fee_pool: ShareAmount,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct PublishedFeed {
	pub publish_time: TimePointSec,
	pub feed: PriceFeed,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AssetBitassetDataObject {
	pub id: AssetBitassetDataId,
	pub asset_id: AssetId,
	pub options: BitassetOptions,
	/// One feed per authorized publisher, newest wins.
	pub feeds: BTreeMap<AccountId, PublishedFeed>,
	/// The live median; null settlement price when too few feeds survive.
	pub current_feed: PriceFeed,
	pub current_feed_publication_time: TimePointSec,
	pub feed_producers: BTreeSet<AccountId>,
	pub is_prediction_market: bool,
	/// Set on global settlement: the price every position was closed at.
	/// Non-null means the asset is in settlement and no margin positions
	/// may exist.
	pub settlement_price: Price,
	/// Collateral backing post-settlement redemptions.
	pub settlement_fund: ShareAmount,
	/// Volume force-settled since the last maintenance.
	pub force_settled_volume: ShareAmount,
}

impl AssetBitassetDataObject {
	pub fn new(id: AssetBitassetDataId, asset_id: AssetId, options: BitassetOptions) -> Self {
		Self {
			id,
			asset_id,
			options,
			feeds: BTreeMap::new(),
			current_feed: PriceFeed::default(),
			current_feed_publication_time: TimePointSec::default(),
			feed_producers: BTreeSet::new(),
			is_prediction_market: false,
			settlement_price: Price::default(),
			settlement_fund: 0,
			force_settled_volume: 0,
		}
	}

	pub fn has_settlement(&self) -> bool {
		!self.settlement_price.is_null()
	}

	pub fn feed_is_valid(&self) -> bool {
		self.current_feed.has_feed()
	}

	/// The largest amount force-settleable this maintenance interval.
	pub fn max_force_settlement_volume(&self, current_supply: ShareAmount) -> ShareAmount {
		if self.options.maximum_force_settlement_volume == 0 {
			return 0;
		}
		if self.options.maximum_force_settlement_volume >= FULL_PERCENT {
			return current_supply;
		}
		(current_supply as i128 * self.options.maximum_force_settlement_volume as i128 /
			FULL_PERCENT as i128) as ShareAmount
	}

	/// Recomputes the median feed from publications still alive at `now`.
	/// Each component is medianized independently; with fewer than
	/// `minimum_feeds` live publications the asset has no feed.
	pub fn update_median_feeds(&mut self, now: TimePointSec) {
		let cutoff = TimePointSec::new(now.seconds().saturating_sub(self.options.feed_lifetime_secs));
		let mut live: Vec<&PriceFeed> = self
			.feeds
			.values()
			.filter(|published| published.publish_time >= cutoff && published.feed.has_feed())
			.map(|published| &published.feed)
			.collect();
		self.current_feed_publication_time = now;
		if (live.len() as u64) < self.options.minimum_feeds as u64 {
			self.current_feed = PriceFeed::default();
			return;
		}
		let mid = live.len() / 2;
		let mut median = PriceFeed::default();
		live.sort_by(|a, b| a.settlement_price.cmp(&b.settlement_price));
		median.settlement_price = live[mid].settlement_price;
		live.sort_by_key(|feed| feed.maintenance_collateral_ratio);
		median.maintenance_collateral_ratio = live[mid].maintenance_collateral_ratio;
		live.sort_by_key(|feed| feed.maximum_short_squeeze_ratio);
		median.maximum_short_squeeze_ratio = live[mid].maximum_short_squeeze_ratio;
		live.sort_by(|a, b| a.core_exchange_rate.cmp(&b.core_exchange_rate));
		median.core_exchange_rate = live[mid].core_exchange_rate;
		self.current_feed = median;
	}
}
