//! Transfer executors.
//!
//! [`AuthorizationExecutor`] puts a signed authorization on chain, either by
//! paying gas from the holder's account or by handing it to the relayer.
//! [`AllowanceExecutor`] spends within an allowance a permit has already set.
//! Neither touches the cache or the session state; the manager does that.

use crate::AuthorizationError;
use alloy_primitives::{Address, B256, U256};
use authz_delivery::{DeliveryError, DeliveryService};
use authz_relay::RelayService;
use authz_types::{
	AuthorizationKey, PermitAuthorization, SplitSignature, TransactionHash, TransferAuthorization,
};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Who pays for the transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
	/// Submitted from the holder's account, which pays gas.
	SelfPaid,
	/// Handed to the relayer, which pays gas.
	#[default]
	Relayed,
}

impl FromStr for ExecutionMode {
	type Err = AuthorizationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"self" | "self-paid" | "self_paid" | "direct" => Ok(ExecutionMode::SelfPaid),
			"relay" | "relayed" | "gasless" => Ok(ExecutionMode::Relayed),
			other => Err(AuthorizationError::Validation(format!(
				"Unknown execution mode '{}' (expected 'self-paid' or 'relayed')",
				other
			))),
		}
	}
}

impl fmt::Display for ExecutionMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ExecutionMode::SelfPaid => write!(f, "self-paid"),
			ExecutionMode::Relayed => write!(f, "relayed"),
		}
	}
}

/// Puts signed authorizations on chain.
pub struct AuthorizationExecutor {
	delivery: Arc<DeliveryService>,
	relay: Arc<RelayService>,
}

impl AuthorizationExecutor {
	pub fn new(delivery: Arc<DeliveryService>, relay: Arc<RelayService>) -> Self {
		Self { delivery, relay }
	}

	/// Executes a `transferWithAuthorization`.
	///
	/// On the self-paid path the call returns once the receipt is confirmed.
	/// The relayed path returns the relayer's hash without waiting.
	pub async fn execute_transfer(
		&self,
		auth: &TransferAuthorization,
		mode: ExecutionMode,
	) -> Result<TransactionHash, AuthorizationError> {
		match mode {
			ExecutionMode::SelfPaid => {
				let outcome = match self.delivery.transfer_with_authorization(auth).await {
					Ok(hash) => self.confirm_accepted(hash).await,
					Err(e) => Err(e),
				};
				match outcome {
					Ok(hash) => Ok(hash),
					Err(e) => Err(self.classify_transfer_failure(auth.from, auth.nonce, e).await),
				}
			},
			ExecutionMode::Relayed => Ok(self.relay.relay_transfer(auth).await?),
		}
	}

	/// Submits a permit so that the spender's allowance is set.
	pub async fn activate_permit(
		&self,
		permit: &PermitAuthorization,
		mode: ExecutionMode,
	) -> Result<TransactionHash, AuthorizationError> {
		match mode {
			ExecutionMode::SelfPaid => {
				let outcome = match self.delivery.permit(permit).await {
					Ok(hash) => self.confirm_accepted(hash).await,
					Err(e) => Err(e),
				};
				match outcome {
					Ok(hash) => Ok(hash),
					Err(e) => Err(self.classify_permit_failure(permit, e).await),
				}
			},
			ExecutionMode::Relayed => Ok(self.relay.relay_permit(permit).await?),
		}
	}

	/// Submits `cancelAuthorization` from the holder's account and waits for it.
	pub async fn cancel(
		&self,
		authorizer: Address,
		nonce: B256,
		signature: &SplitSignature,
	) -> Result<TransactionHash, AuthorizationError> {
		let outcome = match self
			.delivery
			.cancel_authorization(authorizer, nonce, signature)
			.await
		{
			Ok(hash) => self.confirm_accepted(hash).await,
			Err(e) => Err(e),
		};
		match outcome {
			Ok(hash) => Ok(hash),
			Err(e) => Err(self.classify_transfer_failure(authorizer, nonce, e).await),
		}
	}

	/// Approves `spender` from the holder's account and waits for the receipt.
	pub async fn approve(
		&self,
		spender: Address,
		amount: U256,
	) -> Result<TransactionHash, AuthorizationError> {
		let hash = self.delivery.approve(spender, amount).await?;
		Ok(self.confirm_accepted(hash).await?)
	}

	/// Waits for the receipt of a transaction the node has accepted.
	///
	/// Only a mined revert is a definite failure. Losing the receipt for any
	/// other reason leaves the transaction outstanding as `Unconfirmed`.
	async fn confirm_accepted(&self, hash: TransactionHash) -> Result<TransactionHash, DeliveryError> {
		match self.delivery.confirm(&hash).await {
			Ok(receipt) => Ok(receipt.hash),
			Err(e @ (DeliveryError::Reverted(_) | DeliveryError::Unconfirmed(_))) => Err(e),
			Err(e) => {
				tracing::warn!(tx_hash = %hash, error = %e, "Lost track of submitted transaction");
				Err(DeliveryError::Unconfirmed(hash))
			},
		}
	}

	/// Tells a consumed nonce apart from other failures by asking the contract.
	async fn classify_transfer_failure(
		&self,
		authorizer: Address,
		nonce: B256,
		err: DeliveryError,
	) -> AuthorizationError {
		if !is_rejection(&err) {
			return err.into();
		}
		let key = AuthorizationKey::transfer(authorizer, nonce);
		match self.delivery.authorization_state(authorizer, nonce).await {
			Ok(true) => {
				tracing::warn!(key = %key, error = %err, "Authorization nonce already used");
				AuthorizationError::NonceAlreadyUsed(key.to_string())
			},
			Ok(false) => err.into(),
			Err(read_err) => {
				tracing::debug!(key = %key, error = %read_err, "Could not read authorization state");
				err.into()
			},
		}
	}

	async fn classify_permit_failure(
		&self,
		permit: &PermitAuthorization,
		err: DeliveryError,
	) -> AuthorizationError {
		if !is_rejection(&err) {
			return err.into();
		}
		let key = AuthorizationKey::permit(permit.owner, permit.nonce);
		match self.delivery.nonces(permit.owner).await {
			Ok(chain_nonce) if chain_nonce > permit.nonce => {
				tracing::warn!(key = %key, chain_nonce = %chain_nonce, "Permit nonce already used");
				AuthorizationError::NonceAlreadyUsed(key.to_string())
			},
			Ok(_) => err.into(),
			Err(read_err) => {
				tracing::debug!(key = %key, error = %read_err, "Could not read permit nonce");
				err.into()
			},
		}
	}
}

/// Failures the contract itself produced, as opposed to transport faults.
fn is_rejection(err: &DeliveryError) -> bool {
	matches!(err, DeliveryError::TransactionFailed(_) | DeliveryError::Reverted(_))
}

/// Client-side allowance guard.
///
/// Only saves a doomed request; the token contract enforces the real limit.
pub fn ensure_within_allowance(amount: U256, known: U256) -> Result<(), AuthorizationError> {
	if amount.is_zero() {
		return Err(AuthorizationError::Validation("Amount must be greater than zero".into()));
	}
	if amount > known {
		return Err(AuthorizationError::Validation(format!(
			"Amount {} exceeds the current allowance {}",
			amount, known
		)));
	}
	Ok(())
}

/// Spends within an activated allowance through the relayer.
pub struct AllowanceExecutor {
	relay: Arc<RelayService>,
}

impl AllowanceExecutor {
	pub fn new(relay: Arc<RelayService>) -> Self {
		Self { relay }
	}

	pub async fn transfer_within_allowance(
		&self,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<TransactionHash, AuthorizationError> {
		Ok(self
			.relay
			.relay_allowance_transfer(from, to, amount)
			.await?)
	}
}
