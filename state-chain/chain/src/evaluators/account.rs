//! Account lifecycle evaluators.

use crate::{
	error::{ensure_policy, ensure_state},
	objects::{AccountObject, AccountStatisticsObject, WitnessObject},
	Database, Result,
};
use onyx_primitives::{AccountId, AccountStatisticsId, TimePointSec};
use onyx_protocol::operations::{
	listing, AccountCreateOperation, AccountOptions, AccountUpdateOperation,
	AccountUpgradeOperation, AccountWhitelistOperation, OperationResult,
};

fn validate_options_against_state(db: &Database, options: &AccountOptions) -> Result<()> {
	if let Some(proxy) = options.voting_account {
		db.account(proxy)?;
	}
	for witness in &options.witness_votes {
		ensure_state!(
			db.find::<WitnessObject>(witness.instance()).is_some(),
			"vote for unknown witness {witness}"
		);
	}
	Ok(())
}

pub(crate) fn create(db: &mut Database, op: &AccountCreateOperation) -> Result<OperationResult> {
	ensure_state!(
		db.account_by_name(&op.name).is_none(),
		"account name {} is already registered",
		op.name
	);
	db.account(op.registrar)?;
	let referrer = db.account(op.referrer)?.clone();
	let max_members = db.chain_parameters().maximum_authority_membership as usize;
	ensure_policy!(
		op.owner.num_auths() <= max_members && op.active.num_auths() <= max_members,
		"authority exceeds the maximum membership of {max_members}"
	);
	validate_options_against_state(db, &op.options)?;

	// The nearest lifetime member up the chain collects the lifetime
	// referral share of the new account's fees.
	let lifetime_referrer =
		if referrer.is_lifetime_member() { referrer.id } else { referrer.lifetime_referrer };

	let stats_instance = db.next_instance::<AccountStatisticsObject>();
	let account = db.create::<AccountObject>(|instance| AccountObject {
		id: AccountId::new(instance),
		name: op.name.clone(),
		registrar: op.registrar,
		referrer: op.referrer,
		lifetime_referrer,
		referrer_rewards_percentage: op.referrer_percent,
		owner: op.owner.clone(),
		active: op.active.clone(),
		options: op.options.clone(),
		statistics: AccountStatisticsId::new(stats_instance),
		membership_expiration_date: TimePointSec::default(),
		whitelisted_by: Default::default(),
		blacklisted_by: Default::default(),
	})?;
	let account_id = account.id;
	db.create::<AccountStatisticsObject>(|instance| AccountStatisticsObject {
		id: AccountStatisticsId::new(instance),
		owner: account_id,
		..Default::default()
	})?;
	Ok(OperationResult::ObjectId(account_id.into()))
}

pub(crate) fn update(db: &mut Database, op: &AccountUpdateOperation) -> Result<OperationResult> {
	let account = db.account(op.account)?.clone();
	let max_members = db.chain_parameters().maximum_authority_membership as usize;
	for authority in [&op.owner, &op.active].into_iter().flatten() {
		ensure_policy!(
			authority.num_auths() <= max_members,
			"authority exceeds the maximum membership of {max_members}"
		);
	}
	if let Some(options) = &op.new_options {
		validate_options_against_state(db, options)?;
	}
	db.modify::<AccountObject>(account.id.instance(), |obj| {
		if let Some(owner) = &op.owner {
			obj.owner = owner.clone();
		}
		if let Some(active) = &op.active {
			obj.active = active.clone();
		}
		if let Some(options) = &op.new_options {
			obj.options = options.clone();
		}
	})?;
	Ok(OperationResult::None)
}

pub(crate) fn whitelist(
	db: &mut Database,
	op: &AccountWhitelistOperation,
) -> Result<OperationResult> {
	let target = db.account(op.account_to_list)?.clone();
	let lister = op.authorizing_account;
	db.modify::<AccountObject>(target.id.instance(), |obj| {
		if op.new_listing & listing::WHITE_LISTED != 0 {
			obj.whitelisted_by.insert(lister);
		} else {
			obj.whitelisted_by.remove(&lister);
		}
		if op.new_listing & listing::BLACK_LISTED != 0 {
			obj.blacklisted_by.insert(lister);
		} else {
			obj.blacklisted_by.remove(&lister);
		}
	})?;
	Ok(OperationResult::None)
}

pub(crate) fn upgrade(db: &mut Database, op: &AccountUpgradeOperation) -> Result<OperationResult> {
	let account = db.account(op.account_to_upgrade)?.clone();
	ensure_policy!(op.upgrade_to_lifetime_member, "only lifetime upgrades are supported");
	ensure_state!(
		!account.is_lifetime_member(),
		"account {} is already a lifetime member",
		account.name
	);
	db.modify::<AccountObject>(account.id.instance(), |obj| {
		obj.membership_expiration_date = TimePointSec::MAX;
		// Lifetime members become their own referral sink.
		obj.lifetime_referrer = obj.id;
	})?;
	Ok(OperationResult::None)
}
