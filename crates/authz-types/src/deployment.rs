//! Deployment configuration.
//!
//! A process manages authorizations for exactly one token on one chain. The
//! deployment section names that chain, the token contract and its EIP-712
//! domain, and the spender (paymaster) that permits are issued to.

use alloy_primitives::{address, Address, B256};
use serde::{Deserialize, Serialize};

/// Canonical Permit2 deployment address, identical on every EVM chain.
pub const CANONICAL_PERMIT2_ADDRESS: Address = address!("000000000022D473030F116dDEE9F6B43aC78BA3");

/// The token contract and the EIP-712 domain it signs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
	pub address: Address,
	pub symbol: String,
	pub decimals: u8,
	/// EIP-712 domain `name` (e.g. "USD Coin" on Base mainnet, "USDC" on Base Sepolia).
	pub domain_name: String,
	/// EIP-712 domain `version`.
	pub domain_version: String,
}

/// Single-chain deployment settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
	pub chain_id: u64,
	/// Human-readable network name.
	pub network: String,
	pub rpc_url: String,
	pub token: TokenConfig,
	/// Account permits are issued to (the paymaster).
	pub spender: Address,
	#[serde(default = "default_permit2")]
	pub permit2: Address,
	/// Block explorer base URL without trailing slash.
	#[serde(default)]
	pub explorer_url: Option<String>,
}

fn default_permit2() -> Address {
	CANONICAL_PERMIT2_ADDRESS
}

impl DeploymentConfig {
	/// USDC on Base mainnet.
	pub fn base(rpc_url: impl Into<String>) -> Self {
		Self {
			chain_id: 8453,
			network: "Base".into(),
			rpc_url: rpc_url.into(),
			token: TokenConfig {
				address: address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
				symbol: "USDC".into(),
				decimals: 6,
				domain_name: "USD Coin".into(),
				domain_version: "2".into(),
			},
			spender: address!("217fe9B8129b830D50Bcd51b0eD831E61f6b571e"),
			permit2: CANONICAL_PERMIT2_ADDRESS,
			explorer_url: Some("https://basescan.org".into()),
		}
	}

	/// USDC on Base Sepolia.
	pub fn base_sepolia(rpc_url: impl Into<String>) -> Self {
		Self {
			chain_id: 84532,
			network: "Base Sepolia".into(),
			rpc_url: rpc_url.into(),
			token: TokenConfig {
				address: address!("036CbD53842c5426634e7929541eC2318f3dCF7e"),
				symbol: "USDC".into(),
				decimals: 6,
				domain_name: "USDC".into(),
				domain_version: "2".into(),
			},
			spender: address!("E004eB206f7D26CD0E3d69eDB85814Cc137Ae9D9"),
			permit2: CANONICAL_PERMIT2_ADDRESS,
			explorer_url: Some("https://sepolia.basescan.org".into()),
		}
	}

	/// Explorer link for a transaction, if an explorer is configured.
	pub fn tx_url(&self, hash: &B256) -> Option<String> {
		self.explorer_url
			.as_deref()
			.map(|base| format!("{}/tx/0x{}", base.trim_end_matches('/'), hex::encode(hash)))
	}

	/// Explorer link for an account, if an explorer is configured.
	pub fn address_url(&self, address: &Address) -> Option<String> {
		self.explorer_url
			.as_deref()
			.map(|base| format!("{}/address/{}", base.trim_end_matches('/'), address))
	}
}
