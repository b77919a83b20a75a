use codec::{Decode, Encode};
use onyx_primitives::{
	AccountBalanceId, AccountId, AccountStatisticsId, AssetId, ShareAmount, TimePointSec,
};
use onyx_protocol::{operations::AccountOptions, Authority};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AccountObject {
	pub id: AccountId,
	pub name: String,
	/// Receives the registrar share of this account's fees forever.
	pub registrar: AccountId,
	pub referrer: AccountId,
	/// The nearest lifetime member above the referrer chain.
	pub lifetime_referrer: AccountId,
	/// Of the referral reward, the portion going to `referrer` (the rest
	/// goes to `registrar`). Fixed at registration.
	pub referrer_rewards_percentage: u16,
	pub owner: Authority,
	pub active: Authority,
	pub options: AccountOptions,
	pub statistics: AccountStatisticsId,
	/// `TimePointSec::MAX` marks a lifetime member.
	pub membership_expiration_date: TimePointSec,
	/// Accounts that have white/blacklisted this one. Maintained by
	/// account_whitelist operations; consulted through asset authorities.
	pub whitelisted_by: BTreeSet<AccountId>,
	pub blacklisted_by: BTreeSet<AccountId>,
}

impl AccountObject {
	pub fn is_lifetime_member(&self) -> bool {
		self.membership_expiration_date == TimePointSec::MAX
	}
}

/// Per-account bookkeeping split off the hot account object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AccountStatisticsObject {
	pub id: AccountStatisticsId,
	pub owner: AccountId,
	/// Core currently locked in limit orders and call-order collateral.
	pub total_core_in_orders: ShareAmount,
	/// Fees accrued since the last maintenance, awaiting distribution.
	pub pending_fees: ShareAmount,
	/// Same, for lifetime members whose cashback vests.
	pub pending_vested_fees: ShareAmount,
	pub lifetime_fees_paid: ShareAmount,
	/// Count of operations this account has paid for.
	pub total_ops: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AccountBalanceObject {
	pub id: AccountBalanceId,
	pub owner: AccountId,
	pub asset_id: AssetId,
	pub balance: ShareAmount,
}
