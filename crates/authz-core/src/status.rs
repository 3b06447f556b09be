//! Read-time reconciliation of cached authorizations against chain state.
//!
//! A cached record only says what was signed. Whether it can still be used is
//! decided here, on every read, from a fresh chain snapshot and the current
//! time. Cached flags never override the chain.

use alloy_primitives::U256;
use authz_types::{PermitAuthorization, PermitStatus, TransferAuthorization, TransferStatus};

/// Chain facts needed to classify a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermitSnapshot {
	/// The owner's current ERC-2612 nonce.
	pub chain_nonce: U256,
	/// Current allowance from the owner to the permit's spender.
	pub allowance: U256,
}

/// Chain facts needed to classify a single-use authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSnapshot {
	/// `authorizationState(from, nonce)`: true once used or cancelled.
	pub used: bool,
}

/// Classifies a permit.
///
/// A consumed nonce with a remaining allowance is reported as activated. The
/// allowance may equally come from a later permit or an `approve`, so this is
/// a best-effort reading.
pub fn derive_permit_status(
	permit: &PermitAuthorization,
	snapshot: &PermitSnapshot,
	now: u64,
) -> PermitStatus {
	if now >= permit.deadline {
		PermitStatus::Expired
	} else if permit.nonce < snapshot.chain_nonce {
		if snapshot.allowance > U256::ZERO {
			PermitStatus::Activated
		} else {
			PermitStatus::Used
		}
	} else {
		PermitStatus::Pending
	}
}

/// Classifies a single-use authorization.
pub fn derive_transfer_status(
	auth: &TransferAuthorization,
	snapshot: &TransferSnapshot,
	now: u64,
) -> TransferStatus {
	if snapshot.used {
		TransferStatus::Used
	} else if now >= auth.valid_before {
		TransferStatus::Expired
	} else if now < auth.valid_after {
		TransferStatus::NotYetValid
	} else {
		TransferStatus::Valid
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, Bytes, B256};

	fn permit(nonce: u64, deadline: u64) -> PermitAuthorization {
		PermitAuthorization {
			owner: Address::repeat_byte(1),
			spender: Address::repeat_byte(2),
			value: U256::from(1_000_000u64),
			nonce: U256::from(nonce),
			deadline,
			signature: Bytes::new(),
			v: 27,
			r: B256::ZERO,
			s: B256::ZERO,
			saved_at: 0,
			tx_hash: None,
		}
	}

	fn transfer(valid_after: u64, valid_before: u64) -> TransferAuthorization {
		TransferAuthorization {
			from: Address::repeat_byte(1),
			to: Address::repeat_byte(2),
			value: U256::from(1u64),
			valid_after,
			valid_before,
			nonce: B256::repeat_byte(7),
			signature: Bytes::new(),
			v: 27,
			r: B256::ZERO,
			s: B256::ZERO,
			saved_at: 0,
			tx_hash: None,
		}
	}

	#[test]
	fn test_consumed_permit_nonce_with_allowance_is_activated() {
		let entry = permit(5, 2_000);
		let mut snapshot = PermitSnapshot {
			chain_nonce: U256::from(6u64),
			allowance: U256::from(1u64),
		};
		assert_eq!(derive_permit_status(&entry, &snapshot, 1_000), PermitStatus::Activated);

		snapshot.allowance = U256::ZERO;
		assert_eq!(derive_permit_status(&entry, &snapshot, 1_000), PermitStatus::Used);
	}

	#[test]
	fn test_unconsumed_permit_is_pending_until_deadline() {
		let entry = permit(6, 2_000);
		let snapshot = PermitSnapshot {
			chain_nonce: U256::from(6u64),
			allowance: U256::ZERO,
		};
		assert_eq!(derive_permit_status(&entry, &snapshot, 1_999), PermitStatus::Pending);
		assert_eq!(derive_permit_status(&entry, &snapshot, 2_000), PermitStatus::Expired);
	}

	#[test]
	fn test_deadline_wins_over_activation() {
		let snapshot = PermitSnapshot {
			chain_nonce: U256::from(9u64),
			allowance: U256::from(1u64),
		};
		assert_eq!(
			derive_permit_status(&permit(5, 100), &snapshot, 100),
			PermitStatus::Expired
		);
	}

	#[test]
	fn test_transfer_window() {
		let entry = transfer(100, 200);
		let unused = TransferSnapshot { used: false };

		assert_eq!(derive_transfer_status(&entry, &unused, 99), TransferStatus::NotYetValid);
		assert_eq!(derive_transfer_status(&entry, &unused, 100), TransferStatus::Valid);
		assert_eq!(derive_transfer_status(&entry, &unused, 199), TransferStatus::Valid);
		assert_eq!(derive_transfer_status(&entry, &unused, 200), TransferStatus::Expired);
	}

	#[test]
	fn test_chain_usage_overrides_window() {
		let entry = transfer(0, 200);
		let used = TransferSnapshot { used: true };
		assert_eq!(derive_transfer_status(&entry, &used, 50), TransferStatus::Used);
		assert_eq!(derive_transfer_status(&entry, &used, 500), TransferStatus::Used);
	}
}
