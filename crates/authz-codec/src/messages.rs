//! EIP-712 message types and their builders.
//!
//! Token messages are signed under the token's own domain
//! `{name, version, chainId, verifyingContract}`. Permit2 messages are signed
//! under the Permit2 domain, which carries no version.

use crate::{generate_nonce, CodecError, TypedMessage};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, Eip712Domain};
use authz_types::DeploymentConfig;
use std::borrow::Cow;

sol! {
	#[derive(Debug, PartialEq, Eq)]
	struct TransferWithAuthorization {
		address from;
		address to;
		uint256 value;
		uint256 validAfter;
		uint256 validBefore;
		bytes32 nonce;
	}

	#[derive(Debug, PartialEq, Eq)]
	struct ReceiveWithAuthorization {
		address from;
		address to;
		uint256 value;
		uint256 validAfter;
		uint256 validBefore;
		bytes32 nonce;
	}

	#[derive(Debug, PartialEq, Eq)]
	struct CancelAuthorization {
		address authorizer;
		bytes32 nonce;
	}

	#[derive(Debug, PartialEq, Eq)]
	struct Permit {
		address owner;
		address spender;
		uint256 value;
		uint256 nonce;
		uint256 deadline;
	}

	#[derive(Debug, PartialEq, Eq)]
	struct TokenPermissions {
		address token;
		uint256 amount;
	}

	#[derive(Debug, PartialEq, Eq)]
	struct PermitTransferFrom {
		TokenPermissions permitted;
		address spender;
		uint256 nonce;
		uint256 deadline;
	}
}

/// EIP-712 domain of an ERC-3009 / ERC-2612 token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDomain {
	pub name: String,
	pub version: String,
	pub chain_id: u64,
	pub verifying_contract: Address,
}

impl TokenDomain {
	pub fn new(
		name: impl Into<String>,
		version: impl Into<String>,
		chain_id: u64,
		verifying_contract: Address,
	) -> Self {
		Self {
			name: name.into(),
			version: version.into(),
			chain_id,
			verifying_contract,
		}
	}

	pub fn from_deployment(deployment: &DeploymentConfig) -> Self {
		Self::new(
			deployment.token.domain_name.clone(),
			deployment.token.domain_version.clone(),
			deployment.chain_id,
			deployment.token.address,
		)
	}

	pub fn eip712_domain(&self) -> Eip712Domain {
		Eip712Domain::new(
			Some(Cow::Owned(self.name.clone())),
			Some(Cow::Owned(self.version.clone())),
			Some(U256::from(self.chain_id)),
			Some(self.verifying_contract),
			None,
		)
	}

	/// Builds a `TransferWithAuthorization` message.
	///
	/// A fresh random nonce is drawn when `nonce` is `None`. The validity window
	/// must be non-empty (`valid_after < valid_before`).
	pub fn build_transfer_authorization(
		&self,
		from: Address,
		to: Address,
		value: U256,
		valid_after: u64,
		valid_before: u64,
		nonce: Option<B256>,
	) -> Result<TypedMessage, CodecError> {
		check_window(valid_after, valid_before)?;
		let message = TransferWithAuthorization {
			from,
			to,
			value,
			validAfter: U256::from(valid_after),
			validBefore: U256::from(valid_before),
			nonce: nonce.unwrap_or_else(generate_nonce),
		};
		Ok(TypedMessage::new(self.eip712_domain(), message.into()))
	}

	/// Builds a `ReceiveWithAuthorization` message, redeemable only by `to`.
	pub fn build_receive_authorization(
		&self,
		from: Address,
		to: Address,
		value: U256,
		valid_after: u64,
		valid_before: u64,
		nonce: Option<B256>,
	) -> Result<TypedMessage, CodecError> {
		check_window(valid_after, valid_before)?;
		let message = ReceiveWithAuthorization {
			from,
			to,
			value,
			validAfter: U256::from(valid_after),
			validBefore: U256::from(valid_before),
			nonce: nonce.unwrap_or_else(generate_nonce),
		};
		Ok(TypedMessage::new(self.eip712_domain(), message.into()))
	}

	pub fn build_cancel_authorization(&self, authorizer: Address, nonce: B256) -> TypedMessage {
		TypedMessage::new(
			self.eip712_domain(),
			CancelAuthorization { authorizer, nonce }.into(),
		)
	}

	/// Builds an ERC-2612 `Permit` at the owner's current sequential nonce.
	pub fn build_permit(
		&self,
		owner: Address,
		spender: Address,
		value: U256,
		nonce: U256,
		deadline: u64,
	) -> TypedMessage {
		let message = Permit {
			owner,
			spender,
			value,
			nonce,
			deadline: U256::from(deadline),
		};
		TypedMessage::new(self.eip712_domain(), message.into())
	}
}

/// EIP-712 domain of the Permit2 contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit2Domain {
	pub chain_id: u64,
	pub permit2: Address,
}

impl Permit2Domain {
	pub fn from_deployment(deployment: &DeploymentConfig) -> Self {
		Self {
			chain_id: deployment.chain_id,
			permit2: deployment.permit2,
		}
	}

	pub fn eip712_domain(&self) -> Eip712Domain {
		Eip712Domain::new(
			Some(Cow::Borrowed("Permit2")),
			None,
			Some(U256::from(self.chain_id)),
			Some(self.permit2),
			None,
		)
	}

	/// Builds a signature-transfer `PermitTransferFrom` for a single token.
	pub fn build_permit2_transfer(
		&self,
		token: Address,
		amount: U256,
		spender: Address,
		nonce: U256,
		deadline: u64,
	) -> TypedMessage {
		let message = PermitTransferFrom {
			permitted: TokenPermissions { token, amount },
			spender,
			nonce,
			deadline: U256::from(deadline),
		};
		TypedMessage::new(self.eip712_domain(), message.into())
	}
}

fn check_window(valid_after: u64, valid_before: u64) -> Result<(), CodecError> {
	if valid_after >= valid_before {
		return Err(CodecError::InvalidValidityWindow {
			valid_after,
			valid_before,
		});
	}
	Ok(())
}
