//! Statuses derived from cached entries and chain state.
//!
//! None of these are persisted. They are recomputed on every read from the
//! cached record, a fresh chain snapshot and the current time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Usability of a single-use transfer authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
	/// Inside its validity window and not yet consumed.
	Valid,
	/// `valid_after` is still in the future.
	NotYetValid,
	/// The contract reports the nonce as consumed (executed or cancelled).
	Used,
	/// `valid_before` has passed.
	Expired,
}

impl TransferStatus {
	/// Only a valid authorization may be submitted.
	pub fn is_executable(&self) -> bool {
		matches!(self, TransferStatus::Valid)
	}
}

impl fmt::Display for TransferStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			TransferStatus::Valid => "valid",
			TransferStatus::NotYetValid => "not-yet-valid",
			TransferStatus::Used => "used",
			TransferStatus::Expired => "expired",
		};
		f.write_str(label)
	}
}

/// Lifecycle position of a permit relative to the owner's on-chain nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitStatus {
	/// Nonce not yet consumed; the permit can still be activated.
	Pending,
	/// Nonce consumed and the spender holds a non-zero allowance.
	///
	/// Inferred: the allowance may also come from a later permit or an
	/// `approve` call.
	Activated,
	/// Nonce consumed and the allowance is exhausted.
	Used,
	/// Deadline has passed.
	Expired,
}

impl PermitStatus {
	pub fn is_activatable(&self) -> bool {
		matches!(self, PermitStatus::Pending)
	}
}

impl fmt::Display for PermitStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			PermitStatus::Pending => "pending",
			PermitStatus::Activated => "activated",
			PermitStatus::Used => "used",
			PermitStatus::Expired => "expired",
		};
		f.write_str(label)
	}
}

/// Status of either kind, used where both are reported together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DerivedStatus {
	Transfer(TransferStatus),
	Permit(PermitStatus),
}

impl fmt::Display for DerivedStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DerivedStatus::Transfer(status) => status.fmt(f),
			DerivedStatus::Permit(status) => status.fmt(f),
		}
	}
}

impl From<TransferStatus> for DerivedStatus {
	fn from(status: TransferStatus) -> Self {
		DerivedStatus::Transfer(status)
	}
}

impl From<PermitStatus> for DerivedStatus {
	fn from(status: PermitStatus) -> Self {
		DerivedStatus::Permit(status)
	}
}

/// Per-key lifecycle state tracked by the manager for the current session.
///
/// ```text
/// None -> Signing -> Signed -> Submitting -> Submitted
///                           -> Cancelling -> Cancelled
///                           -> Expired
/// Submitting -> Indeterminate (accepted, receipt timed out)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationState {
	None,
	Signing,
	Signed,
	Submitting,
	Submitted,
	Cancelling,
	Cancelled,
	Expired,
	Indeterminate,
}

impl AuthorizationState {
	/// Transient states during which another mutation of the same key is refused.
	pub fn is_busy(&self) -> bool {
		matches!(
			self,
			AuthorizationState::Signing
				| AuthorizationState::Submitting
				| AuthorizationState::Cancelling
		)
	}

	/// States with no outgoing transition.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			AuthorizationState::Submitted
				| AuthorizationState::Cancelled
				| AuthorizationState::Expired
				| AuthorizationState::Indeterminate
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_only_valid_and_pending_are_actionable() {
		assert!(TransferStatus::Valid.is_executable());
		for status in [
			TransferStatus::NotYetValid,
			TransferStatus::Used,
			TransferStatus::Expired,
		] {
			assert!(!status.is_executable());
		}

		assert!(PermitStatus::Pending.is_activatable());
		assert!(!PermitStatus::Activated.is_activatable());
	}

	#[test]
	fn test_state_classification() {
		assert!(AuthorizationState::Submitting.is_busy());
		assert!(!AuthorizationState::Signed.is_busy());
		assert!(AuthorizationState::Indeterminate.is_terminal());
		assert!(!AuthorizationState::Signed.is_terminal());
	}

	#[test]
	fn test_derived_status_display() {
		assert_eq!(DerivedStatus::from(TransferStatus::NotYetValid).to_string(), "not-yet-valid");
		assert_eq!(
			serde_json::to_string(&DerivedStatus::from(PermitStatus::Activated)).unwrap(),
			"\"activated\""
		);
	}
}
