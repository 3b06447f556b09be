//! Chain reader and writer for the verifying token contract.
//!
//! Implementations only move raw calls: `eth_call`, transaction submission and
//! receipt polling. [`DeliveryService`] encodes and decodes the token's ABI on
//! top, so the reads the lifecycle manager reconciles against
//! (`balanceOf`, `allowance`, `nonces`, `authorizationState`) and the writes it
//! performs (`transferWithAuthorization`, `permit`, `cancelAuthorization`,
//! `approve`) are the same regardless of backend.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use authz_codec::IAuthorizationToken;
use authz_types::{
	ConfigSchema, DeploymentConfig, ImplementationRegistry, PermitAuthorization, SecretString,
	SplitSignature, Transaction, TransactionHash, TransactionReceipt, TransferAuthorization,
};
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Errors that can occur during chain reads and transaction delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
	#[error("Network error: {0}")]
	Network(String),
	/// The node refused the transaction, e.g. gas estimation hit a revert.
	#[error("Transaction failed: {0}")]
	TransactionFailed(String),
	/// The transaction was mined but reverted.
	#[error("Transaction {0} reverted")]
	Reverted(TransactionHash),
	/// The transaction was accepted but no receipt arrived in time.
	#[error("Transaction {0} not confirmed in time")]
	Unconfirmed(TransactionHash),
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for chain backends.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Returns the configuration schema for this delivery implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Executes a read-only call and returns the raw return data.
	async fn call(&self, tx: &Transaction) -> Result<Bytes, DeliveryError>;

	/// Signs and broadcasts a transaction, returning its hash once accepted.
	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError>;

	/// Polls until the transaction is mined with `confirmations` blocks on top.
	///
	/// Callers bound the wait; implementations may poll indefinitely.
	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError>;
}

/// Type alias for delivery factory functions.
///
/// Receives the implementation's options table, the deployment it serves, and
/// the key that pays for self-submitted transactions.
pub type DeliveryFactory = fn(
	&toml::Value,
	&DeploymentConfig,
	&SecretString,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError>;

/// Registry trait for delivery implementations.
pub trait DeliveryRegistry: ImplementationRegistry<Factory = DeliveryFactory> {}

/// Get all registered delivery implementations.
pub fn get_all_implementations() -> Vec<(&'static str, DeliveryFactory)> {
	use implementations::evm::alloy;

	vec![(alloy::Registry::NAME, alloy::Registry::factory())]
}

/// Typed access to the token contract of one deployment.
pub struct DeliveryService {
	implementation: Box<dyn DeliveryInterface>,
	token: Address,
	min_confirmations: u64,
	confirmation_timeout: Duration,
}

impl DeliveryService {
	pub fn new(
		implementation: Box<dyn DeliveryInterface>,
		token: Address,
		min_confirmations: u64,
		confirmation_timeout: Duration,
	) -> Self {
		Self {
			implementation,
			token,
			min_confirmations,
			confirmation_timeout,
		}
	}

	async fn read<C: SolCall>(&self, call: C) -> Result<C::Return, DeliveryError> {
		let data = self
			.implementation
			.call(&Transaction::call(self.token, call.abi_encode()))
			.await?;
		C::abi_decode_returns(&data, true).map_err(|e| {
			DeliveryError::InvalidResponse(format!("Failed to decode {}: {}", C::SIGNATURE, e))
		})
	}

	pub async fn balance_of(&self, account: Address) -> Result<U256, DeliveryError> {
		Ok(self
			.read(IAuthorizationToken::balanceOfCall { account })
			.await?
			._0)
	}

	pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, DeliveryError> {
		Ok(self
			.read(IAuthorizationToken::allowanceCall { owner, spender })
			.await?
			._0)
	}

	/// Current ERC-2612 nonce of `owner`, i.e. the nonce the next permit must carry.
	pub async fn nonces(&self, owner: Address) -> Result<U256, DeliveryError> {
		Ok(self.read(IAuthorizationToken::noncesCall { owner }).await?._0)
	}

	/// Whether `nonce` has been consumed (used or cancelled) for `authorizer`.
	pub async fn authorization_state(
		&self,
		authorizer: Address,
		nonce: B256,
	) -> Result<bool, DeliveryError> {
		Ok(self
			.read(IAuthorizationToken::authorizationStateCall { authorizer, nonce })
			.await?
			._0)
	}

	pub async fn transfer_with_authorization(
		&self,
		auth: &TransferAuthorization,
	) -> Result<TransactionHash, DeliveryError> {
		let sig = auth.split_signature();
		let call = IAuthorizationToken::transferWithAuthorizationCall {
			from: auth.from,
			to: auth.to,
			value: auth.value,
			validAfter: U256::from(auth.valid_after),
			validBefore: U256::from(auth.valid_before),
			nonce: auth.nonce,
			v: sig.v,
			r: sig.r,
			s: sig.s,
		};
		self.deliver(call.abi_encode()).await
	}

	pub async fn permit(&self, permit: &PermitAuthorization) -> Result<TransactionHash, DeliveryError> {
		let sig = permit.split_signature();
		let call = IAuthorizationToken::permitCall {
			owner: permit.owner,
			spender: permit.spender,
			value: permit.value,
			deadline: U256::from(permit.deadline),
			v: sig.v,
			r: sig.r,
			s: sig.s,
		};
		self.deliver(call.abi_encode()).await
	}

	pub async fn cancel_authorization(
		&self,
		authorizer: Address,
		nonce: B256,
		signature: &SplitSignature,
	) -> Result<TransactionHash, DeliveryError> {
		let call = IAuthorizationToken::cancelAuthorizationCall {
			authorizer,
			nonce,
			v: signature.v,
			r: signature.r,
			s: signature.s,
		};
		self.deliver(call.abi_encode()).await
	}

	/// Plain ERC-20 `approve` paid by the holder.
	pub async fn approve(&self, spender: Address, value: U256) -> Result<TransactionHash, DeliveryError> {
		let call = IAuthorizationToken::approveCall { spender, value };
		self.deliver(call.abi_encode()).await
	}

	async fn deliver(&self, data: Vec<u8>) -> Result<TransactionHash, DeliveryError> {
		let hash = self
			.implementation
			.submit(Transaction::call(self.token, data))
			.await?;
		tracing::info!(tx_hash = %hash, token = %self.token, "Submitted transaction");
		Ok(hash)
	}

	/// Waits for the configured confirmations, bounded by the confirmation
	/// timeout. A mined but reverted transaction is an error.
	pub async fn confirm(&self, hash: &TransactionHash) -> Result<TransactionReceipt, DeliveryError> {
		let receipt = tokio::time::timeout(
			self.confirmation_timeout,
			self.implementation
				.wait_for_confirmation(hash, self.min_confirmations),
		)
		.await
		.map_err(|_| {
			tracing::warn!(
				tx_hash = %hash,
				timeout_secs = self.confirmation_timeout.as_secs(),
				"Timed out waiting for receipt"
			);
			DeliveryError::Unconfirmed(*hash)
		})??;

		if !receipt.success {
			return Err(DeliveryError::Reverted(receipt.hash));
		}
		tracing::info!(tx_hash = %hash, block = receipt.block_number, "Transaction confirmed");
		Ok(receipt)
	}
}
