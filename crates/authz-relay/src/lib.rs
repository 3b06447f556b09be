//! Relayer client.
//!
//! The relayer is an untrusted third party that pays gas for signed
//! authorizations. Each submission is a single request: there are no retries,
//! and the relayer's error message is surfaced verbatim.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use authz_types::{
	ConfigSchema, ImplementationRegistry, PermitAuthorization, TransactionHash,
	TransferAuthorization,
};
use thiserror::Error;

pub mod types;

/// Re-export implementations
pub mod implementations {
	pub mod http;
}

pub use types::{
	AllowanceTransferRequest, Permit2TransferRequest, PermitRelayRequest, TransferRelayRequest,
};

/// Errors returned by relayer submissions.
#[derive(Debug, Error)]
pub enum RelayError {
	/// The relayer answered with a non-success status.
	#[error("Relayer rejected request: {0}")]
	Rejected(String),
	/// The relayer could not be reached.
	#[error("Relayer unavailable: {0}")]
	Unavailable(String),
	/// A success status without a usable transaction hash.
	#[error("Invalid relayer response: {0}")]
	InvalidResponse(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for relayer backends.
#[async_trait]
pub trait RelayInterface: Send + Sync {
	/// Returns the configuration schema for this relay implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// `POST /relay`: executes a `transferWithAuthorization`.
	async fn submit_transfer(
		&self,
		request: &TransferRelayRequest,
	) -> Result<TransactionHash, RelayError>;

	/// `POST /permit`: activates a permit on chain.
	async fn submit_permit(&self, request: &PermitRelayRequest)
		-> Result<TransactionHash, RelayError>;

	/// `POST /permit2/transfer`: executes a Permit2 signature transfer.
	async fn submit_permit2_transfer(
		&self,
		request: &Permit2TransferRequest,
	) -> Result<TransactionHash, RelayError>;

	/// `POST /transfer`: spends within an activated allowance.
	async fn submit_allowance_transfer(
		&self,
		request: &AllowanceTransferRequest,
	) -> Result<TransactionHash, RelayError>;
}

/// Type alias for relay factory functions.
pub type RelayFactory = fn(&toml::Value) -> Result<Box<dyn RelayInterface>, RelayError>;

/// Registry trait for relay implementations.
pub trait RelayRegistry: ImplementationRegistry<Factory = RelayFactory> {}

/// Get all registered relay implementations.
pub fn get_all_implementations() -> Vec<(&'static str, RelayFactory)> {
	use implementations::http;

	vec![(http::Registry::NAME, http::Registry::factory())]
}

/// Service that submits signed authorizations to the relayer.
pub struct RelayService {
	implementation: Box<dyn RelayInterface>,
}

impl RelayService {
	pub fn new(implementation: Box<dyn RelayInterface>) -> Self {
		Self { implementation }
	}

	pub async fn relay_transfer(
		&self,
		auth: &TransferAuthorization,
	) -> Result<TransactionHash, RelayError> {
		let hash = self
			.implementation
			.submit_transfer(&TransferRelayRequest::from(auth))
			.await?;
		tracing::info!(tx_hash = %hash, from = %auth.from, "Relayed transfer authorization");
		Ok(hash)
	}

	pub async fn relay_permit(
		&self,
		permit: &PermitAuthorization,
	) -> Result<TransactionHash, RelayError> {
		let hash = self
			.implementation
			.submit_permit(&PermitRelayRequest::from(permit))
			.await?;
		tracing::info!(tx_hash = %hash, owner = %permit.owner, "Relayed permit");
		Ok(hash)
	}

	pub async fn relay_permit2_transfer(
		&self,
		request: &Permit2TransferRequest,
	) -> Result<TransactionHash, RelayError> {
		let hash = self.implementation.submit_permit2_transfer(request).await?;
		tracing::info!(tx_hash = %hash, owner = %request.owner, "Relayed Permit2 transfer");
		Ok(hash)
	}

	pub async fn relay_allowance_transfer(
		&self,
		from: Address,
		to: Address,
		value: U256,
	) -> Result<TransactionHash, RelayError> {
		let hash = self
			.implementation
			.submit_allowance_transfer(&AllowanceTransferRequest { from, to, value })
			.await?;
		tracing::info!(tx_hash = %hash, from = %from, "Relayed allowance transfer");
		Ok(hash)
	}
}

/// Parses the `hash` field of a success reply.
pub(crate) fn parse_hash(hash: Option<&str>) -> Result<TransactionHash, RelayError> {
	let hash = hash.ok_or_else(|| RelayError::InvalidResponse("missing hash".into()))?;
	hash.parse::<B256>()
		.map(TransactionHash)
		.map_err(|e| RelayError::InvalidResponse(format!("bad hash '{}': {}", hash, e)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_hash() {
		let hex = format!("0x{}", "ab".repeat(32));
		assert_eq!(
			parse_hash(Some(&hex)).unwrap(),
			TransactionHash(B256::repeat_byte(0xab))
		);
		assert!(matches!(parse_hash(None), Err(RelayError::InvalidResponse(_))));
		assert!(matches!(
			parse_hash(Some("0x1234")),
			Err(RelayError::InvalidResponse(_))
		));
	}
}
