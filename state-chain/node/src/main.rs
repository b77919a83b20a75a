//! The Onyx witness node binary.

mod application;
mod block_log;

use anyhow::{bail, Context};
use application::{Node, NodeConfig};
use clap::Parser;
use onyx_primitives::{constants::CORE_UNIT, TimePointSec};
use onyx_protocol::{
	genesis::{GenesisAccount, GenesisBalance, GenesisWitness},
	ChainParameters, GenesisState, PublicKey,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "onyx-node", about = "Onyx delegated-proof-of-stake witness node")]
struct Args {
	/// Directory holding the block log and object database snapshot.
	#[arg(long, value_name = "PATH", default_value = "onyx-data")]
	data_dir: PathBuf,

	/// Path to a genesis state JSON file.
	#[arg(long, value_name = "PATH", conflicts_with = "genesis_state")]
	genesis_json: Option<PathBuf>,

	/// Use the embedded development genesis state.
	#[arg(long)]
	genesis_state: bool,

	/// Reapply every block from the block log at startup.
	#[arg(long)]
	replay_blockchain: bool,

	/// Wipe derived state and rebuild it from the block log.
	#[arg(long)]
	resync_blockchain: bool,

	/// Do not skip signature checks while replaying.
	#[arg(long)]
	force_validate: bool,

	/// Hex-encoded 32-byte block signing secret. Enables production.
	#[arg(long, value_name = "HEX", env = "ONYX_SIGNING_KEY")]
	signing_key: Option<String>,
}

/// A single-witness network for development, keyed by a well-known secret.
fn dev_genesis() -> GenesisState {
	let secret = dev_signing_secret();
	let key = PublicKey::from_secret(&secret);
	GenesisState {
		initial_timestamp: TimePointSec::new(1_700_000_000),
		max_core_supply: onyx_primitives::constants::MAX_SHARE_SUPPLY,
		initial_parameters: ChainParameters::default(),
		initial_accounts: vec![GenesisAccount {
			name: "init0".into(),
			owner_key: key,
			is_lifetime_member: true,
		}],
		initial_balances: vec![GenesisBalance {
			owner: "init0".into(),
			amount: CORE_UNIT * 1_000_000,
		}],
		initial_witnesses: vec![GenesisWitness {
			owner_name: "init0".into(),
			block_signing_key: key,
		}],
	}
}

fn dev_signing_secret() -> secp256k1::SecretKey {
	secp256k1::SecretKey::from_slice(&[0xcf; 32]).expect("constant dev key is valid")
}

fn load_genesis(args: &Args) -> anyhow::Result<GenesisState> {
	match (&args.genesis_json, args.genesis_state) {
		(Some(path), _) => {
			let text = std::fs::read_to_string(path)
				.with_context(|| format!("reading genesis file {}", path.display()))?;
			let genesis: GenesisState =
				serde_json::from_str(&text).context("parsing genesis JSON")?;
			genesis.validate().map_err(|e| anyhow::anyhow!("invalid genesis: {e}"))?;
			Ok(genesis)
		},
		(None, true) => Ok(dev_genesis()),
		(None, false) => bail!("either --genesis-json or --genesis-state is required"),
	}
}

fn parse_signing_key(args: &Args) -> anyhow::Result<Option<secp256k1::SecretKey>> {
	let Some(text) = &args.signing_key else {
		// The embedded dev chain can always sign for itself.
		return Ok(args.genesis_state.then(dev_signing_secret));
	};
	let raw = hex::decode(text.trim_start_matches("0x")).context("signing key is not hex")?;
	Ok(Some(secp256k1::SecretKey::from_slice(&raw).context("signing key is not a valid secret")?))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let args = Args::parse();
	let genesis = load_genesis(&args)?;
	let signing_key = parse_signing_key(&args)?;

	let mut node = Node::open(NodeConfig {
		data_dir: args.data_dir.clone(),
		genesis,
		replay_blockchain: args.replay_blockchain,
		resync_blockchain: args.resync_blockchain,
		force_validate: args.force_validate,
		signing_key,
	})?;

	node.run().await?;
	node.close()?;
	Ok(())
}
