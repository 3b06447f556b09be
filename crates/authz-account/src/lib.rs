//! Wallet seam for the gasless authorization system.
//!
//! The holder's wallet supplies an address and signs EIP-712 digests built by
//! the codec. A wallet may decline a request, which surfaces as
//! [`AccountError::SigningRejected`] and is never retried.

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use authz_types::{ConfigSchema, ImplementationRegistry, SecretString};
use thiserror::Error;

/// Built-in wallets.
pub mod implementations {
	pub mod local;
}

/// Errors raised by the holder's wallet.
#[derive(Debug, Error)]
pub enum AccountError {
	/// The signer failed to produce a signature.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// The holder declined the signing request.
	#[error("Signing rejected: {0}")]
	SigningRejected(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// A wallet able to sign on behalf of the holder.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Returns the configuration schema for this account implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Address of the holder.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs a precomputed EIP-712 digest and returns the 65-byte `r ‖ s ‖ v`
	/// signature with `v` in {27, 28}.
	async fn sign_typed_hash(&self, digest: &B256) -> Result<Bytes, AccountError>;

	/// Returns the private key as a SecretString with 0x prefix.
	///
	/// Used by the chain writer to sign self-paid transactions.
	fn get_private_key(&self) -> SecretString;
}

/// Creates a wallet from its `[account.implementations.<name>]` table.
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// Every built-in wallet as `(name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Front for the configured wallet.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	/// Signs an EIP-712 digest with the managed account.
	pub async fn sign_typed_hash(&self, digest: &B256) -> Result<Bytes, AccountError> {
		let signature = self.implementation.sign_typed_hash(digest).await?;
		tracing::debug!(digest = %digest, "Signed typed data");
		Ok(signature)
	}

	pub fn get_private_key(&self) -> SecretString {
		self.implementation.get_private_key()
	}
}
