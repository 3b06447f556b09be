//! Builder for assembling a manager from configuration.
//!
//! Each pluggable component (storage, account, delivery, relayer) is looked up
//! by the name of its configured primary implementation and created through
//! the matching factory.

use crate::{AuthorizationManager, Clock, SystemClock};
use authz_account::{AccountError, AccountFactory, AccountInterface, AccountService};
use authz_config::{BackendConfig, Config};
use authz_delivery::{DeliveryError, DeliveryFactory, DeliveryInterface, DeliveryService};
use authz_relay::{RelayError, RelayFactory, RelayInterface, RelayService};
use authz_storage::{StorageError, StorageFactory, StorageInterface, StorageService};
use authz_types::{DeploymentConfig, SecretString};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while assembling the manager.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by implementation name.
pub struct AuthzFactories<SF, AF, DF, RF> {
	pub storage_factories: HashMap<String, SF>,
	pub account_factories: HashMap<String, AF>,
	pub delivery_factories: HashMap<String, DF>,
	pub relay_factories: HashMap<String, RF>,
}

impl AuthzFactories<StorageFactory, AccountFactory, DeliveryFactory, RelayFactory> {
	/// Every implementation shipped with the workspace.
	pub fn builtin() -> Self {
		fn named<F>(implementations: Vec<(&'static str, F)>) -> HashMap<String, F> {
			implementations
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect()
		}

		Self {
			storage_factories: named(authz_storage::get_all_implementations()),
			account_factories: named(authz_account::get_all_implementations()),
			delivery_factories: named(authz_delivery::get_all_implementations()),
			relay_factories: named(authz_relay::get_all_implementations()),
		}
	}
}

/// Builds an [`AuthorizationManager`] from a validated [`Config`].
pub struct AuthzBuilder {
	config: Config,
	clock: Arc<dyn Clock>,
}

impl AuthzBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			clock: Arc::new(SystemClock),
		}
	}

	/// Replaces the wall clock.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	pub async fn build<SF, AF, DF, RF>(
		self,
		factories: AuthzFactories<SF, AF, DF, RF>,
	) -> Result<Arc<AuthorizationManager>, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		AF: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>,
		DF: Fn(
			&toml::Value,
			&DeploymentConfig,
			&SecretString,
		) -> Result<Box<dyn DeliveryInterface>, DeliveryError>,
		RF: Fn(&toml::Value) -> Result<Box<dyn RelayInterface>, RelayError>,
	{
		let config = self.config;

		let storage_backend = load_primary(
			"storage",
			&config.storage,
			&factories.storage_factories,
			|factory, options| factory(options),
		)?;
		let storage = Arc::new(StorageService::new(storage_backend));

		let account_impl = load_primary(
			"account",
			&config.account,
			&factories.account_factories,
			|factory, options| factory(options),
		)?;
		let account = Arc::new(AccountService::new(account_impl));

		let holder = account.get_address().await.map_err(|e| {
			tracing::error!(component = "account", error = %e, "Failed to get holder address");
			BuilderError::Config(format!("Failed to get holder address: {}", e))
		})?;

		let private_key = account.get_private_key();
		let delivery_impl = load_primary(
			"delivery",
			&config.delivery.backend(),
			&factories.delivery_factories,
			|factory, options| factory(options, &config.deployment, &private_key),
		)?;
		let delivery = Arc::new(DeliveryService::new(
			delivery_impl,
			config.deployment.token.address,
			config.delivery.min_confirmations,
			Duration::from_secs(config.delivery.confirmation_timeout_seconds),
		));

		let relay_impl = load_primary(
			"relayer",
			&config.relayer,
			&factories.relay_factories,
			|factory, options| factory(options),
		)?;
		let relay = Arc::new(RelayService::new(relay_impl));

		tracing::info!(
			holder = %holder,
			chain_id = config.deployment.chain_id,
			token = %config.deployment.token.symbol,
			"Authorization manager ready"
		);

		Ok(Arc::new(AuthorizationManager::new(
			config.deployment,
			config.manager,
			storage,
			account,
			delivery,
			relay,
			self.clock,
		)))
	}
}

/// Creates the primary implementation of one component.
fn load_primary<F, T: ?Sized, E: Display>(
	component: &'static str,
	backend: &BackendConfig,
	factories: &HashMap<String, F>,
	create: impl FnOnce(&F, &toml::Value) -> Result<Box<T>, E>,
) -> Result<Box<T>, BuilderError> {
	let name = &backend.primary;
	let options = backend.primary_config().ok_or_else(|| {
		BuilderError::Config(format!("Primary {} '{}' has no configuration", component, name))
	})?;
	let factory = factories.get(name).ok_or_else(|| {
		BuilderError::MissingComponent(format!("{} implementation '{}'", component, name))
	})?;

	match create(factory, options) {
		Ok(implementation) => {
			tracing::info!(component, implementation = %name, "Loaded");
			Ok(implementation)
		},
		Err(e) => {
			tracing::error!(
				component,
				implementation = %name,
				error = %e,
				"Failed to create implementation"
			);
			Err(BuilderError::Config(format!(
				"Failed to create {} implementation '{}': {}",
				component, name, e
			)))
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ManualClock;
	use alloy_primitives::address;
	use std::str::FromStr;

	const CONFIG: &str = r#"
[deployment]
chain_id = 84532
network = "Base Sepolia"
rpc_url = "http://localhost:8545"
spender = "0xE004eB206f7D26CD0E3d69eDB85814Cc137Ae9D9"

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

[manager]
default_validity_seconds = 600
"#;

	#[tokio::test]
	async fn test_builds_from_builtin_factories() {
		let config = Config::from_str(CONFIG).unwrap();
		let manager = AuthzBuilder::new(config)
			.with_clock(Arc::new(ManualClock::new(1_700_000_000)))
			.build(AuthzFactories::builtin())
			.await
			.unwrap();

		assert_eq!(
			manager.owner().await.unwrap(),
			address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
		);
		assert_eq!(manager.deployment().chain_id, 84532);
		assert_eq!(manager.config().default_validity_seconds, 600);
	}

	#[tokio::test]
	async fn test_unknown_implementation_is_missing() {
		let config = Config::from_str(CONFIG).unwrap();
		let mut factories = AuthzFactories::builtin();
		factories.relay_factories.clear();

		let result = AuthzBuilder::new(config).build(factories).await;
		assert!(matches!(result, Err(BuilderError::MissingComponent(msg)) if msg.contains("relayer")));
	}

	#[tokio::test]
	async fn test_factory_failure_is_config_error() {
		let config = Config::from_str(&CONFIG.replace(
			"private_key = \"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80\"",
			"private_key = \"0x1234\"",
		))
		.unwrap();

		let result = AuthzBuilder::new(config)
			.build(AuthzFactories::builtin())
			.await;
		assert!(matches!(result, Err(BuilderError::Config(msg)) if msg.contains("account")));
	}
}
