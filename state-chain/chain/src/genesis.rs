//! Deterministic construction of block-zero state from a genesis file.

use crate::{
	error::internal_assert,
	objects::{
		AccountObject, AccountStatisticsObject, AssetDynamicDataObject, AssetObject,
		BlockSummaryObject, DynamicGlobalPropertiesObject, GlobalPropertiesObject, WitnessObject,
	},
	Database, Result,
};
use onyx_primitives::{
	constants::{CORE_PRECISION, CORE_SYMBOL},
	AccountId, AccountStatisticsId, AssetDynamicDataId, AssetId, BlockSummaryId, ShareAmount,
	TimePointSec, WitnessId, CORE_ASSET,
};
use onyx_protocol::{
	operations::{AccountOptions, AssetOptions},
	Asset, Authority, GenesisState, Price,
};

/// Builds a fresh database holding exactly the genesis state. The caller
/// seeds the fork database and block log separately.
pub fn initialize_from_genesis(genesis: &GenesisState) -> Result<Database> {
	genesis.validate()?;
	let mut db = Database::new(genesis.compute_chain_id());
	// Genesis is the baseline; there is nothing to roll back to.
	db.disable_undo();

	let core_supply: ShareAmount = genesis.initial_balances.iter().map(|b| b.amount).sum();
	let core_dynamic = db.create::<AssetDynamicDataObject>(|instance| AssetDynamicDataObject {
		id: AssetDynamicDataId::new(instance),
		asset_id: CORE_ASSET,
		current_supply: core_supply,
		..Default::default()
	})?;
	let core = db.create::<AssetObject>(|instance| AssetObject {
		id: AssetId::new(instance),
		symbol: CORE_SYMBOL.into(),
		precision: CORE_PRECISION,
		issuer: AccountId::new(0),
		options: AssetOptions {
			max_supply: genesis.max_core_supply,
			market_fee_percent: 0,
			max_market_fee: 0,
			issuer_permissions: 0,
			flags: 0,
			core_exchange_rate: Price::new(Asset::core(1), Asset::core(1)),
			whitelist_authorities: Default::default(),
			blacklist_authorities: Default::default(),
			whitelist_markets: Default::default(),
			blacklist_markets: Default::default(),
		},
		dynamic_data: core_dynamic.id,
		bitasset_data: None,
	})?;
	internal_assert!(core.id == CORE_ASSET, "core asset must take instance zero");

	for genesis_account in &genesis.initial_accounts {
		let stats_instance = db.next_instance::<AccountStatisticsObject>();
		let membership = if genesis_account.is_lifetime_member {
			TimePointSec::MAX
		} else {
			TimePointSec::default()
		};
		let account = db.create::<AccountObject>(|instance| AccountObject {
			id: AccountId::new(instance),
			name: genesis_account.name.clone(),
			registrar: AccountId::new(instance),
			referrer: AccountId::new(instance),
			lifetime_referrer: AccountId::new(instance),
			referrer_rewards_percentage: 0,
			owner: Authority::single_key(genesis_account.owner_key),
			active: Authority::single_key(genesis_account.owner_key),
			options: AccountOptions {
				memo_key: genesis_account.owner_key,
				..Default::default()
			},
			statistics: AccountStatisticsId::new(stats_instance),
			membership_expiration_date: membership,
			whitelisted_by: Default::default(),
			blacklisted_by: Default::default(),
		})?;
		let owner = account.id;
		db.create::<AccountStatisticsObject>(|instance| AccountStatisticsObject {
			id: AccountStatisticsId::new(instance),
			owner,
			..Default::default()
		})?;
	}

	for balance in &genesis.initial_balances {
		let owner = db
			.account_by_name(&balance.owner)
			.expect("validated against initial accounts")
			.id;
		db.adjust_balance(owner, Asset::core(balance.amount))?;
	}

	let mut active_witnesses = Vec::new();
	for genesis_witness in &genesis.initial_witnesses {
		let owner = db
			.account_by_name(&genesis_witness.owner_name)
			.expect("validated against initial accounts")
			.id;
		let witness = db.create::<WitnessObject>(|instance| WitnessObject {
			id: WitnessId::new(instance),
			witness_account: owner,
			signing_key: genesis_witness.block_signing_key,
			url: String::new(),
			last_aslot: 0,
			total_votes: 0,
			total_missed: 0,
			last_confirmed_block_num: 0,
		})?;
		active_witnesses.push(witness.id);
	}

	db.create::<GlobalPropertiesObject>(|instance| GlobalPropertiesObject {
		instance,
		parameters: genesis.initial_parameters.clone(),
		active_witnesses: active_witnesses.clone(),
	})?;
	let first_witness = active_witnesses[0];
	let maintenance_interval = genesis.initial_parameters.maintenance_interval;
	db.create::<DynamicGlobalPropertiesObject>(|instance| DynamicGlobalPropertiesObject {
		instance,
		head_block_number: 0,
		head_block_id: Default::default(),
		time: genesis.initial_timestamp,
		current_witness: first_witness,
		next_maintenance_time: genesis.initial_timestamp + maintenance_interval,
		witness_budget: 0,
		current_aslot: 0,
		recent_slots_filled: u128::MAX,
		recently_missed_count: 0,
		dynamic_flags: 0,
		last_irreversible_block_num: 0,
	})?;
	db.create::<BlockSummaryObject>(|instance| BlockSummaryObject {
		id: BlockSummaryId::new(instance),
		block_id: Default::default(),
	})?;

	db.enable_undo();
	db.check_asset_supplies()?;
	Ok(db)
}
