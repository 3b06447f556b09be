//! Lifecycle manager for gasless token authorizations.
//!
//! Ties the codec, the holder's wallet, the chain, the relayer and the local
//! cache together. Signing only touches the wallet and the cache; executing,
//! activating, cancelling and revoking are the only operations that change
//! chain state, each at most once per call.

use authz_account::AccountError;
use authz_codec::CodecError;
use authz_delivery::DeliveryError;
use authz_relay::RelayError;
use authz_types::{AuthorizationState, DerivedStatus, TransactionHash};
use thiserror::Error;

pub mod builder;
pub mod clock;
pub mod executor;
pub mod manager;
pub mod scheduler;
pub mod selection;
pub mod state;
pub mod status;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::{AuthzBuilder, AuthzFactories, BuilderError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use executor::{
	ensure_within_allowance, AllowanceExecutor, AuthorizationExecutor, ExecutionMode,
};
pub use manager::{
	AuthorizationManager, Permit2Request, PermitRequest, RefreshReport, TransferRequest,
};
pub use scheduler::MaintenanceScheduler;
pub use selection::{ActiveSelection, SelectedAuthorization};
pub use state::{InFlightGuard, LifecycleTracker};
pub use status::{
	derive_permit_status, derive_transfer_status, PermitSnapshot, TransferSnapshot,
};

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Error)]
pub enum AuthorizationError {
	/// Malformed input, detected before any signing or network call.
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Signing rejected: {0}")]
	SigningRejected(String),
	#[error("Signer error: {0}")]
	Signer(String),
	/// The derived status forbids the requested action.
	#[error("Authorization {key} is {status}")]
	StaleAuthorization { key: String, status: DerivedStatus },
	/// The session lifecycle forbids the requested action.
	#[error("Authorization {key} is in state {state:?}")]
	InvalidState {
		key: String,
		state: AuthorizationState,
	},
	#[error("Relayer rejected: {0}")]
	RelayRejected(String),
	#[error("Relayer unavailable: {0}")]
	RelayUnavailable(String),
	/// The relayer accepted the request without saying what it submitted.
	#[error("Relayer outcome unknown: {0}")]
	RelayOutcomeUnknown(String),
	#[error("Chain call failed: {0}")]
	ChainCall(String),
	/// The contract reports the nonce as already consumed.
	#[error("Nonce already used: {0}")]
	NonceAlreadyUsed(String),
	/// Accepted by the chain but no receipt arrived in time.
	#[error("Transaction {tx_hash} submitted but not confirmed")]
	Unconfirmed { tx_hash: TransactionHash },
	#[error("Operation already in progress for {0}")]
	AlreadyInProgress(String),
	#[error("Malformed signature: {0}")]
	MalformedSignature(String),
}

impl AuthorizationError {
	/// True when the submission may have reached the chain anyway.
	pub fn is_outcome_unknown(&self) -> bool {
		matches!(
			self,
			AuthorizationError::Unconfirmed { .. } | AuthorizationError::RelayOutcomeUnknown(_)
		)
	}
}

impl From<CodecError> for AuthorizationError {
	fn from(err: CodecError) -> Self {
		match err {
			CodecError::MalformedSignature(msg) => AuthorizationError::MalformedSignature(msg),
			other => AuthorizationError::Validation(other.to_string()),
		}
	}
}

impl From<AccountError> for AuthorizationError {
	fn from(err: AccountError) -> Self {
		match err {
			AccountError::SigningRejected(msg) => AuthorizationError::SigningRejected(msg),
			other => AuthorizationError::Signer(other.to_string()),
		}
	}
}

impl From<RelayError> for AuthorizationError {
	fn from(err: RelayError) -> Self {
		match err {
			RelayError::Rejected(msg) => AuthorizationError::RelayRejected(msg),
			RelayError::Unavailable(msg) => AuthorizationError::RelayUnavailable(msg),
			RelayError::InvalidResponse(msg) => AuthorizationError::RelayOutcomeUnknown(msg),
			RelayError::Configuration(msg) => AuthorizationError::Validation(msg),
		}
	}
}

impl From<DeliveryError> for AuthorizationError {
	fn from(err: DeliveryError) -> Self {
		match err {
			DeliveryError::Unconfirmed(tx_hash) => AuthorizationError::Unconfirmed { tx_hash },
			other => AuthorizationError::ChainCall(other.to_string()),
		}
	}
}
