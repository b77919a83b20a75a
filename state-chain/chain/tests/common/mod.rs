//! Shared fixture: a five-witness test chain with named accounts and
//! helpers for building, signing and applying operations.

#![allow(dead_code)]

use onyx_chain::{initialize_from_genesis, skip, Database};
use onyx_primitives::{
	AccountId, AssetId, LimitOrderId, ShareAmount, TimePointSec, WitnessId, CORE_ASSET,
};
use onyx_protocol::{
	genesis::{GenesisAccount, GenesisBalance, GenesisWitness},
	operations::*,
	Asset, Authority, ChainParameters, GenesisState, Operation, OperationResult, Price, PriceFeed,
	PublicKey, SignedBlock, SignedTransaction, Transaction,
};
use sha2::Digest as _;
use std::collections::BTreeMap;

pub const GENESIS_TIME: u32 = 1_600_000_000;
pub const WITNESS_NAMES: [&str; 5] = ["init0", "init1", "init2", "init3", "init4"];

pub fn secret_for(name: &str) -> secp256k1::SecretKey {
	let digest: [u8; 32] = sha2::Sha256::digest(name.as_bytes()).into();
	secp256k1::SecretKey::from_slice(&digest).expect("digest is a valid secret")
}

pub struct TestChain {
	pub db: Database,
	keys: BTreeMap<String, secp256k1::SecretKey>,
}

impl TestChain {
	/// A chain with five witnesses and the given extra accounts, each
	/// holding `balance` core.
	pub fn new(accounts: &[&str], balance: ShareAmount) -> Self {
		let mut initial_accounts = Vec::new();
		let mut initial_balances = Vec::new();
		let mut initial_witnesses = Vec::new();
		let mut keys = BTreeMap::new();

		for name in WITNESS_NAMES {
			let secret = secret_for(name);
			keys.insert(name.to_string(), secret);
			initial_accounts.push(GenesisAccount {
				name: name.into(),
				owner_key: PublicKey::from_secret(&secret),
				is_lifetime_member: true,
			});
			initial_witnesses.push(GenesisWitness {
				owner_name: name.into(),
				block_signing_key: PublicKey::from_secret(&secret),
			});
		}
		for name in accounts {
			let secret = secret_for(name);
			keys.insert((*name).into(), secret);
			initial_accounts.push(GenesisAccount {
				name: (*name).into(),
				owner_key: PublicKey::from_secret(&secret),
				is_lifetime_member: false,
			});
			if balance > 0 {
				initial_balances.push(GenesisBalance { owner: (*name).into(), amount: balance });
			}
		}

		let genesis = GenesisState {
			initial_timestamp: TimePointSec::new(GENESIS_TIME),
			max_core_supply: onyx_primitives::constants::MAX_SHARE_SUPPLY,
			initial_parameters: ChainParameters::default(),
			initial_accounts,
			initial_balances,
			initial_witnesses,
		};
		let db = initialize_from_genesis(&genesis).expect("genesis state is valid");
		Self { db, keys }
	}

	pub fn account_id(&self, name: &str) -> AccountId {
		self.db.account_by_name(name).expect("fixture account exists").id
	}

	pub fn balance(&self, name: &str, asset: AssetId) -> ShareAmount {
		self.db.get_balance(self.account_id(name), asset).amount
	}

	pub fn core_balance(&self, name: &str) -> ShareAmount {
		self.balance(name, CORE_ASSET)
	}

	pub fn signed_tx(&self, signer: &str, operations: Vec<Operation>) -> SignedTransaction {
		let mut tx = Transaction {
			expiration: self.db.head_block_time() + 600,
			operations,
			..Default::default()
		};
		tx.set_reference_block(self.db.head_block_id());
		let mut signed = SignedTransaction::new(tx);
		signed.sign(&self.keys[signer], self.db.chain_id());
		signed
	}

	/// Builds, signs and applies a transaction directly against head state.
	pub fn apply(
		&mut self,
		signer: &str,
		operations: Vec<Operation>,
	) -> onyx_chain::Result<Vec<OperationResult>> {
		let tx = self.signed_tx(signer, operations);
		self.db.apply_transaction(&tx, skip::NOTHING)
	}

	pub fn apply_ok(&mut self, signer: &str, operations: Vec<Operation>) -> Vec<OperationResult> {
		let result = self.apply(signer, operations).expect("operation should succeed");
		self.assert_supplies();
		result
	}

	fn key_for_witness(&self, witness: WitnessId) -> secp256k1::SecretKey {
		let account = self.db.witness(witness).expect("scheduled witness exists").witness_account;
		let name = self.db.account(account).expect("witness account exists").name.clone();
		self.keys[&name]
	}

	/// Produces the block for the next slot with the scheduled witness.
	pub fn produce_block(&mut self) -> SignedBlock {
		let when = self.db.get_slot_time(1);
		self.produce_block_at(when)
	}

	pub fn produce_block_at(&mut self, when: TimePointSec) -> SignedBlock {
		self.produce_block_with(when, &[])
	}

	pub fn produce_block_with(
		&mut self,
		when: TimePointSec,
		pending: &[SignedTransaction],
	) -> SignedBlock {
		let slot = self.db.get_slot_at_time(when);
		assert!(slot > 0, "{when} is not past the head block");
		let witness = self.db.get_scheduled_witness(slot).expect("witnesses are active");
		let key = self.key_for_witness(witness);
		let block = self
			.db
			.generate_block(when, witness, &key, pending, skip::NOTHING)
			.expect("block generation should succeed");
		self.assert_supplies();
		block
	}

	/// Advances past the next maintenance interval.
	pub fn produce_maintenance_block(&mut self) -> SignedBlock {
		let due = self.db.dynamic_global_properties().next_maintenance_time;
		let interval = self.db.block_interval() as u32;
		let aligned = due.seconds().div_ceil(interval) * interval;
		self.produce_block_at(TimePointSec::new(aligned))
	}

	pub fn assert_supplies(&self) {
		self.db.check_asset_supplies().expect("asset supplies must balance");
	}

	// ---- Operation builders. Fees are zero under the default (empty) fee
	// ---- schedule.

	pub fn transfer_op(&self, from: &str, to: &str, amount: Asset) -> Operation {
		Operation::Transfer(TransferOperation {
			fee: Asset::core(0),
			from: self.account_id(from),
			to: self.account_id(to),
			amount,
			memo: None,
		})
	}

	pub fn limit_order_op(
		&self,
		seller: &str,
		sell: Asset,
		receive: Asset,
		fill_or_kill: bool,
	) -> Operation {
		Operation::LimitOrderCreate(LimitOrderCreateOperation {
			fee: Asset::core(0),
			seller: self.account_id(seller),
			amount_to_sell: sell,
			min_to_receive: receive,
			expiration: TimePointSec::MAX,
			fill_or_kill,
		})
	}

	pub fn cancel_order_op(&self, seller: &str, order: LimitOrderId) -> Operation {
		Operation::LimitOrderCancel(LimitOrderCancelOperation {
			fee: Asset::core(0),
			fee_paying_account: self.account_id(seller),
			order,
		})
	}

	pub fn borrow_op(&self, who: &str, debt: Asset, collateral: Asset) -> Operation {
		Operation::CallOrderUpdate(CallOrderUpdateOperation {
			fee: Asset::core(0),
			funding_account: self.account_id(who),
			delta_collateral: collateral,
			delta_debt: debt,
			target_collateral_ratio: None,
		})
	}

	pub fn default_uia_options(&self, asset_id: AssetId) -> AssetOptions {
		AssetOptions {
			max_supply: onyx_primitives::constants::MAX_SHARE_SUPPLY,
			market_fee_percent: 0,
			max_market_fee: 0,
			issuer_permissions: asset_flags::ALL,
			flags: 0,
			core_exchange_rate: Price::new(Asset::new(1, asset_id), Asset::core(1)),
			whitelist_authorities: Default::default(),
			blacklist_authorities: Default::default(),
			whitelist_markets: Default::default(),
			blacklist_markets: Default::default(),
		}
	}

	/// Creates a user-issued asset and returns its id.
	pub fn create_uia(&mut self, issuer: &str, symbol: &str) -> AssetId {
		let next = AssetId::new(self.db.next_instance::<onyx_chain::objects::AssetObject>());
		let results = self.apply_ok(
			issuer,
			vec![Operation::AssetCreate(AssetCreateOperation {
				fee: Asset::core(0),
				issuer: self.account_id(issuer),
				symbol: symbol.into(),
				precision: 4,
				common_options: self.default_uia_options(next),
				bitasset_options: None,
				is_prediction_market: false,
			})],
		);
		match results[0] {
			OperationResult::ObjectId(id) => AssetId::try_from(id).expect("asset id"),
			_ => panic!("asset create returns an id"),
		}
	}

	/// Creates a core-backed bitasset with `feeder` as its sole feed
	/// producer and returns its id.
	pub fn create_bitasset(&mut self, issuer: &str, symbol: &str, feeder: &str) -> AssetId {
		self.create_bitasset_with(issuer, symbol, feeder, 60 * 60 * 48, 60 * 60)
	}

	pub fn create_bitasset_with(
		&mut self,
		issuer: &str,
		symbol: &str,
		feeder: &str,
		feed_lifetime_secs: u32,
		force_settlement_delay_secs: u32,
	) -> AssetId {
		let next = AssetId::new(self.db.next_instance::<onyx_chain::objects::AssetObject>());
		let results = self.apply_ok(
			issuer,
			vec![Operation::AssetCreate(AssetCreateOperation {
				fee: Asset::core(0),
				issuer: self.account_id(issuer),
				symbol: symbol.into(),
				precision: 4,
				common_options: self.default_uia_options(next),
				bitasset_options: Some(BitassetOptions {
					feed_lifetime_secs,
					minimum_feeds: 1,
					force_settlement_delay_secs,
					force_settlement_offset_percent: 0,
					maximum_force_settlement_volume: 10_000,
					short_backing_asset: CORE_ASSET,
				}),
				is_prediction_market: false,
			})],
		);
		let asset_id = match results[0] {
			OperationResult::ObjectId(id) => AssetId::try_from(id).expect("asset id"),
			_ => panic!("asset create returns an id"),
		};
		self.apply_ok(
			issuer,
			vec![Operation::AssetUpdateFeedProducers(AssetUpdateFeedProducersOperation {
				fee: Asset::core(0),
				issuer: self.account_id(issuer),
				asset_to_update: asset_id,
				new_feed_producers: [self.account_id(feeder)].into(),
			})],
		);
		asset_id
	}

	pub fn issue(&mut self, issuer: &str, asset: Asset, to: &str) {
		self.apply_ok(
			issuer,
			vec![Operation::AssetIssue(AssetIssueOperation {
				fee: Asset::core(0),
				issuer: self.account_id(issuer),
				asset_to_issue: asset,
				issue_to_account: self.account_id(to),
			})],
		);
	}

	/// Publishes a feed of `base` debt per `quote` core.
	pub fn publish_feed(
		&mut self,
		feeder: &str,
		asset_id: AssetId,
		base: ShareAmount,
		quote: ShareAmount,
	) {
		self.apply_ok(
			feeder,
			vec![Operation::AssetPublishFeed(AssetPublishFeedOperation {
				fee: Asset::core(0),
				publisher: self.account_id(feeder),
				asset_id,
				feed: PriceFeed {
					settlement_price: Price::new(
						Asset::new(base, asset_id),
						Asset::new(quote, CORE_ASSET),
					),
					maintenance_collateral_ratio: 1750,
					maximum_short_squeeze_ratio: 1500,
					core_exchange_rate: Price::new(Asset::new(1, asset_id), Asset::core(1)),
				},
			})],
		);
	}

	pub fn order_id(results: &[OperationResult]) -> LimitOrderId {
		match results[0] {
			OperationResult::ObjectId(id) => LimitOrderId::try_from(id).expect("limit order id"),
			_ => panic!("limit order create returns an id"),
		}
	}
}

pub fn single_key_authority(name: &str) -> Authority {
	Authority::single_key(PublicKey::from_secret(&secret_for(name)))
}
