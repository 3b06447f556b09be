//! Private-key wallet.
//!
//! Reads a hex private key from configuration and signs without prompting, so
//! it never declines a request.

use crate::{AccountError, AccountFactory, AccountInterface, AccountRegistry};
use alloy_primitives::{Address, Bytes, B256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use authz_types::{
	with_0x_prefix, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SecretString,
	ValidationError,
};

/// Wallet backed by an in-process private key.
pub struct LocalWallet {
	signer: PrivateKeySigner,
	private_key: SecretString,
}

impl LocalWallet {
	pub fn new(private_key: SecretString) -> Result<Self, AccountError> {
		let signer: PrivateKeySigner = private_key
			.with_exposed(|key| key.parse::<PrivateKeySigner>())
			.map_err(|_| AccountError::InvalidKey("Invalid private key format".into()))?;
		let private_key = private_key.with_exposed(|key| SecretString::new(with_0x_prefix(key)));

		Ok(Self {
			signer,
			private_key,
		})
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalWalletSchema)
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	async fn sign_typed_hash(&self, digest: &B256) -> Result<Bytes, AccountError> {
		let signature = self
			.signer
			.sign_hash(digest)
			.await
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;
		Ok(Bytes::from(signature.as_bytes().to_vec()))
	}

	fn get_private_key(&self) -> SecretString {
		self.private_key.clone()
	}
}

/// Requires `private_key`: 64 hex characters, optionally 0x-prefixed.
pub struct LocalWalletSchema;

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("private_key", FieldType::String).with_validator(|value| {
				let key = value.as_str().unwrap_or_default();
				let hex_part = key.strip_prefix("0x").unwrap_or(key);
				if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
					return Err("Private key must be 64 hex characters".to_string());
				}
				Ok(())
			})],
			vec![],
		);
		schema.validate(config)
	}
}

/// Factory function to create a local wallet from configuration.
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalWalletSchema
		.validate(config)
		.map_err(|e| AccountError::InvalidKey(format!("Invalid configuration: {}", e)))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AccountError::InvalidKey("private_key is required".into()))?;

	Ok(Box::new(LocalWallet::new(SecretString::from(private_key))?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl AccountRegistry for Registry {}
