//! Configuration for the authorization manager.
//!
//! Configuration is a TOML document with one section per concern:
//!
//! - `[deployment]`: chain, token contract, EIP-712 domain, spender
//! - `[relayer]`, `[storage]`, `[account]`, `[delivery]`: pluggable backends,
//!   each naming a `primary` implementation and its options under
//!   `implementations.<name>`
//! - `[manager]`: lifecycle timings
//!
//! `${VAR}` and `${VAR:-default}` are substituted from the environment before
//! parsing. A file may split sections across others with
//! `include = ["relayer.toml", ...]`; every top-level section must be defined
//! exactly once across all files.

mod loader;

use authz_types::DeploymentConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.message().to_string())
	}
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub deployment: DeploymentConfig,
	pub relayer: BackendConfig,
	pub storage: BackendConfig,
	pub account: BackendConfig,
	pub delivery: DeliveryConfig,
	#[serde(default)]
	pub manager: ManagerConfig,
}

/// A pluggable backend: the selected implementation and every configured one.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

impl BackendConfig {
	/// Options table of the primary implementation.
	pub fn primary_config(&self) -> Option<&toml::Value> {
		self.implementations.get(&self.primary)
	}

	fn validate(&self, section: &str) -> Result<(), ConfigError> {
		if self.primary.is_empty() {
			return Err(ConfigError::Validation(format!(
				"{} primary implementation cannot be empty",
				section
			)));
		}
		if !self.implementations.contains_key(&self.primary) {
			return Err(ConfigError::Validation(format!(
				"Primary {} '{}' not found in implementations",
				section, self.primary
			)));
		}
		Ok(())
	}
}

/// Chain writer settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
	/// Blocks to wait on top of inclusion before a receipt counts.
	#[serde(default = "default_min_confirmations")]
	pub min_confirmations: u64,
	/// Upper bound on waiting for a receipt after submission.
	#[serde(default = "default_confirmation_timeout_seconds")]
	pub confirmation_timeout_seconds: u64,
}

impl DeliveryConfig {
	pub fn backend(&self) -> BackendConfig {
		BackendConfig {
			primary: self.primary.clone(),
			implementations: self.implementations.clone(),
		}
	}
}

fn default_min_confirmations() -> u64 {
	1
}

fn default_confirmation_timeout_seconds() -> u64 {
	120
}

/// Lifecycle manager settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManagerConfig {
	/// Period of the background purge of expired cache entries.
	#[serde(default = "default_refresh_interval_seconds")]
	pub refresh_interval_seconds: u64,
	/// Lifetime given to new authorizations when no expiry is requested.
	#[serde(default = "default_validity_seconds")]
	pub default_validity_seconds: u64,
}

impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			refresh_interval_seconds: default_refresh_interval_seconds(),
			default_validity_seconds: default_validity_seconds(),
		}
	}
}

fn default_refresh_interval_seconds() -> u64 {
	30
}

fn default_validity_seconds() -> u64 {
	3600
}

/// Substitutes `${VAR}` and `${VAR:-default}` with environment values.
///
/// Input is capped at 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut missing = None;
	let resolved = re.replace_all(input, |caps: &regex::Captures| {
		let name = &caps[1];
		match (std::env::var(name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| name.to_string());
				String::new()
			},
		}
	});

	if let Some(name) = missing {
		return Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			name
		)));
	}
	Ok(resolved.into_owned())
}

impl Config {
	/// Loads a configuration file, following `include` directives relative to
	/// its directory.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path = Path::new(path);
		let base_dir = path
			.parent()
			.filter(|p| !p.as_os_str().is_empty())
			.unwrap_or_else(|| Path::new("."));
		let file_name = path
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path.display())))?;

		loader::ConfigLoader::new(base_dir).load_config(file_name).await
	}

	fn validate(&self) -> Result<(), ConfigError> {
		let deployment = &self.deployment;
		if deployment.chain_id == 0 {
			return Err(ConfigError::Validation("deployment.chain_id cannot be 0".into()));
		}
		if deployment.network.is_empty() {
			return Err(ConfigError::Validation(
				"deployment.network cannot be empty".into(),
			));
		}
		if !(deployment.rpc_url.starts_with("http://") || deployment.rpc_url.starts_with("https://"))
		{
			return Err(ConfigError::Validation(format!(
				"deployment.rpc_url must be an http(s) URL, got '{}'",
				deployment.rpc_url
			)));
		}
		if deployment.token.domain_name.is_empty() || deployment.token.domain_version.is_empty() {
			return Err(ConfigError::Validation(
				"deployment.token domain_name and domain_version are required".into(),
			));
		}
		if deployment.token.decimals > 77 {
			return Err(ConfigError::Validation(format!(
				"deployment.token.decimals {} exceeds 77",
				deployment.token.decimals
			)));
		}
		if deployment.spender.is_zero() || deployment.token.address.is_zero() {
			return Err(ConfigError::Validation(
				"deployment token and spender addresses cannot be zero".into(),
			));
		}

		self.relayer.validate("relayer")?;
		self.storage.validate("storage")?;
		self.account.validate("account")?;
		self.delivery.backend().validate("delivery")?;

		if self.delivery.confirmation_timeout_seconds == 0
			|| self.delivery.confirmation_timeout_seconds > 3600
		{
			return Err(ConfigError::Validation(
				"delivery.confirmation_timeout_seconds must be between 1 and 3600".into(),
			));
		}
		if self.manager.refresh_interval_seconds == 0
			|| self.manager.refresh_interval_seconds > 86400
		{
			return Err(ConfigError::Validation(
				"manager.refresh_interval_seconds must be between 1 and 86400".into(),
			));
		}
		if self.manager.default_validity_seconds == 0 {
			return Err(ConfigError::Validation(
				"manager.default_validity_seconds must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

/// Parses a TOML string after resolving environment variables, then validates.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
pub(crate) const SAMPLE_CONFIG: &str = r#"
[deployment]
chain_id = 84532
network = "Base Sepolia"
rpc_url = "${AUTHZ_TEST_RPC_URL:-https://sepolia.base.org}"
spender = "0xE004eB206f7D26CD0E3d69eDB85814Cc137Ae9D9"
explorer_url = "https://sepolia.basescan.org"

[deployment.token]
address = "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
symbol = "USDC"
decimals = 6
domain_name = "USDC"
domain_version = "2"

[relayer]
primary = "http"
[relayer.implementations.http]
url = "http://localhost:3001"

[storage]
primary = "memory"
[storage.implementations.memory]

[account]
primary = "local"
[account.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[delivery]
primary = "evm_alloy"
[delivery.implementations.evm_alloy]
"#;
