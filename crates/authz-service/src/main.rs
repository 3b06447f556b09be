//! Command-line front end for the gasless authorization manager.
//!
//! Loads the configuration, assembles the manager from the configured
//! backends and runs a single command against it. `watch` keeps the process
//! alive and purges expired authorizations in the background.

use alloy_primitives::{Address, B256};
use authz_config::Config;
use authz_core::{AuthzBuilder, AuthzFactories, ExecutionMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// Command-line arguments for the authorization manager.
#[derive(Parser, Debug)]
#[command(name = "authz", author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "AUTHZ_CONFIG", default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Sign a single-use transfer authorization
	SignTransfer {
		#[arg(long)]
		to: Address,
		/// Amount in whole tokens, e.g. 1.5
		#[arg(long)]
		amount: String,
		/// Unix timestamp before which the authorization cannot be used
		#[arg(long)]
		valid_after: Option<u64>,
		/// Seconds until the authorization expires
		#[arg(long)]
		valid_for: Option<u64>,
	},
	/// Sign a permit for the configured spender
	SignPermit {
		#[arg(long)]
		amount: String,
		#[arg(long)]
		spender: Option<Address>,
		/// Seconds until the permit can no longer be activated
		#[arg(long)]
		valid_for: Option<u64>,
	},
	/// List cached authorizations with their on-chain status
	List {
		/// Print records as JSON
		#[arg(long)]
		json: bool,
	},
	/// Execute a cached transfer authorization
	Execute {
		#[arg(long)]
		nonce: B256,
		/// relayed or self-paid
		#[arg(long, default_value = "relayed")]
		mode: ExecutionMode,
	},
	/// Activate a cached permit
	Activate {
		#[arg(long)]
		nonce: u64,
		#[arg(long, default_value = "relayed")]
		mode: ExecutionMode,
	},
	/// Cancel a cached transfer authorization on chain
	Cancel {
		#[arg(long)]
		nonce: B256,
	},
	/// Reset the spender's allowance with a zero-value permit
	Revoke {
		#[arg(long)]
		spender: Option<Address>,
	},
	/// Spend within the allowance set by an activated permit
	Transfer {
		#[arg(long)]
		to: Address,
		#[arg(long)]
		amount: String,
	},
	/// Approve the Permit2 contract to spend the holder's tokens (self-paid)
	ApprovePermit2 {
		/// Amount in whole tokens; unlimited when omitted
		#[arg(long)]
		amount: Option<String>,
	},
	/// Sign and relay a Permit2 signature transfer
	Permit2Transfer {
		#[arg(long)]
		to: Address,
		#[arg(long)]
		amount: String,
		#[arg(long, default_value_t = 0)]
		nonce: u64,
		#[arg(long)]
		valid_for: Option<u64>,
	},
	/// Show balance, allowances and permit nonce
	Balance,
	/// Remove expired authorizations from the cache
	Purge,
	/// Purge expired authorizations periodically until interrupted
	Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!(
		network = %config.deployment.network,
		chain_id = config.deployment.chain_id,
		"Loaded configuration"
	);

	let manager = AuthzBuilder::new(config)
		.build(AuthzFactories::builtin())
		.await?;

	commands::run(manager, args.command).await
}
