//! Alloy-based chain backend.
//!
//! Talks JSON-RPC over HTTP to the deployment's node. Transactions are signed by
//! the configured wallet key through the provider's wallet filler, with nonce,
//! gas and chain id filled in by the recommended fillers.

use crate::{DeliveryError, DeliveryFactory, DeliveryInterface, DeliveryRegistry};
use alloy_network::EthereumWallet;
use alloy_primitives::Bytes;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
use async_trait::async_trait;
use authz_types::{
	ConfigSchema, DeploymentConfig, Field, FieldType, ImplementationRegistry, Schema,
	SecretString, Transaction, TransactionHash, TransactionReceipt, ValidationError,
};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 2;

/// Alloy-based EVM delivery implementation for a single chain.
pub struct AlloyDelivery {
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
	poll_interval: Duration,
}

impl AlloyDelivery {
	pub fn new(
		rpc_url: &str,
		chain_id: u64,
		signer: PrivateKeySigner,
		poll_interval: Duration,
	) -> Result<Self, DeliveryError> {
		let url = rpc_url.parse().map_err(|e| {
			DeliveryError::Configuration(format!("Invalid RPC URL {}: {}", rpc_url, e))
		})?;

		let wallet = EthereumWallet::from(signer.with_chain_id(Some(chain_id)));
		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(wallet)
			.on_http(url);
		provider.client().set_poll_interval(poll_interval);

		Ok(Self {
			provider: Arc::new(provider),
			poll_interval,
		})
	}
}

/// Optional `poll_interval_seconds` (1 to 60) for receipt polling.
pub struct AlloyDeliverySchema;

impl ConfigSchema for AlloyDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"poll_interval_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(60),
				},
			)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AlloyDeliverySchema)
	}

	async fn call(&self, tx: &Transaction) -> Result<Bytes, DeliveryError> {
		let request = TransactionRequest::default()
			.to(tx.to)
			.input(tx.data.clone().into());

		self.provider
			.call(&request)
			.await
			.map_err(|e| DeliveryError::Network(format!("eth_call to {} failed: {}", tx.to, e)))
	}

	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		let request = TransactionRequest::default()
			.to(tx.to)
			.input(tx.data.into())
			.value(tx.value);

		// Gas estimation runs the call, so reverts surface here.
		let pending_tx = self
			.provider
			.send_transaction(request)
			.await
			.map_err(|e| DeliveryError::TransactionFailed(e.to_string()))?;

		Ok(TransactionHash(*pending_tx.tx_hash()))
	}

	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		tracing::debug!(tx_hash = %hash, confirmations, "Waiting for receipt");

		loop {
			let receipt = match self.provider.get_transaction_receipt(hash.0).await {
				Ok(Some(receipt)) => receipt,
				Ok(None) => {
					tokio::time::sleep(self.poll_interval).await;
					continue;
				},
				Err(e) => {
					return Err(DeliveryError::Network(format!("Failed to get receipt: {}", e)));
				},
			};

			let tx_block = receipt.block_number.unwrap_or(0);
			let current_block = self.provider.get_block_number().await.map_err(|e| {
				DeliveryError::Network(format!("Failed to get block number: {}", e))
			})?;

			// The inclusion block counts as the first confirmation.
			if current_block.saturating_sub(tx_block) + 1 >= confirmations {
				return Ok(TransactionReceipt {
					hash: TransactionHash(receipt.transaction_hash),
					block_number: tx_block,
					success: receipt.status(),
				});
			}

			tokio::time::sleep(self.poll_interval).await;
		}
	}
}

/// Factory function to create the alloy backend from configuration.
///
/// The RPC URL and chain id come from the deployment; `private_key` pays for
/// self-submitted transactions.
pub fn create_delivery(
	config: &toml::Value,
	deployment: &DeploymentConfig,
	private_key: &SecretString,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	AlloyDeliverySchema
		.validate(config)
		.map_err(|e| DeliveryError::Configuration(format!("Invalid configuration: {}", e)))?;

	let poll_interval = config
		.get("poll_interval_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_POLL_INTERVAL_SECONDS);

	let signer: PrivateKeySigner = private_key.with_exposed(|key| {
		key.parse::<PrivateKeySigner>()
			.map_err(|_| DeliveryError::Configuration("Invalid private key format".to_string()))
	})?;

	Ok(Box::new(AlloyDelivery::new(
		&deployment.rpc_url,
		deployment.chain_id,
		signer,
		Duration::from_secs(poll_interval),
	)?))
}

/// Registry for the alloy delivery implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "evm_alloy";
	type Factory = DeliveryFactory;

	fn factory() -> Self::Factory {
		create_delivery
	}
}

impl DeliveryRegistry for Registry {}
