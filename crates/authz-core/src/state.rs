//! Per-key lifecycle tracking and the in-flight guard.
//!
//! States live for the current session only. An entry loaded from the cache
//! that this session has not touched yet is adopted as `Signed`, or as
//! `Indeterminate` when it carries the hash of a submission nobody saw settle.

use crate::AuthorizationError;
use alloy_primitives::B256;
use authz_types::{AuthorizationKey, AuthorizationState};
use dashmap::{DashMap, DashSet};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Allowed transitions; states without an entry are terminal.
static TRANSITIONS: Lazy<HashMap<AuthorizationState, HashSet<AuthorizationState>>> =
	Lazy::new(|| {
		use AuthorizationState::*;

		let mut m = HashMap::new();
		m.insert(None, HashSet::from([Signing]));
		// A declined signature returns the key to None.
		m.insert(Signing, HashSet::from([Signed, None]));
		m.insert(Signed, HashSet::from([Submitting, Cancelling, Expired]));
		// A failed submission leaves the authorization signed and usable.
		m.insert(Submitting, HashSet::from([Submitted, Signed, Indeterminate]));
		m.insert(Cancelling, HashSet::from([Cancelled, Signed, Indeterminate]));
		m
	});

/// Session state of every key the manager has touched.
#[derive(Default)]
pub struct LifecycleTracker {
	states: DashMap<AuthorizationKey, AuthorizationState>,
	in_flight: Arc<DashSet<AuthorizationKey>>,
}

impl LifecycleTracker {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn state(&self, key: &AuthorizationKey) -> AuthorizationState {
		self.states
			.get(key)
			.map(|state| *state)
			.unwrap_or(AuthorizationState::None)
	}

	/// Takes over a cached entry from an earlier session.
	///
	/// `unsettled` is the hash of a submission whose outcome was never learned.
	/// Keys this session already tracks keep their state.
	pub fn adopt(&self, key: &AuthorizationKey, unsettled: Option<B256>) {
		let adopted = match unsettled {
			Some(hash) => {
				tracing::debug!(key = %key, tx_hash = %hash, "Adopting unsettled submission");
				AuthorizationState::Indeterminate
			},
			None => AuthorizationState::Signed,
		};
		self.states
			.entry(key.clone())
			.and_modify(|state| {
				if *state == AuthorizationState::None {
					*state = adopted;
				}
			})
			.or_insert(adopted);
	}

	/// Drops whatever this session recorded for `key`.
	///
	/// Permit keys repeat while the owner's chain nonce stands still, so a new
	/// signature at the same nonce starts over from `None`.
	pub fn forget(&self, key: &AuthorizationKey) {
		self.states.remove(key);
	}

	/// Moves `key` to `to`, refusing transitions outside the lifecycle.
	pub fn transition(
		&self,
		key: &AuthorizationKey,
		to: AuthorizationState,
	) -> Result<(), AuthorizationError> {
		let mut entry = self
			.states
			.entry(key.clone())
			.or_insert(AuthorizationState::None);
		let from = *entry;

		let allowed = TRANSITIONS
			.get(&from)
			.map(|next| next.contains(&to))
			.unwrap_or(false);
		if !allowed {
			return Err(AuthorizationError::InvalidState {
				key: key.to_string(),
				state: from,
			});
		}

		*entry = to;
		tracing::debug!(key = %key, from = ?from, to = ?to, "State transition");
		Ok(())
	}

	/// Claims `key` for a state-mutating operation.
	///
	/// Fails fast with `AlreadyInProgress` while another claim on the same key
	/// is alive. The claim is released when the guard drops.
	pub fn begin(&self, key: &AuthorizationKey) -> Result<InFlightGuard, AuthorizationError> {
		if !self.in_flight.insert(key.clone()) {
			tracing::warn!(key = %key, "Operation already in progress");
			return Err(AuthorizationError::AlreadyInProgress(key.to_string()));
		}
		Ok(InFlightGuard {
			keys: self.in_flight.clone(),
			key: key.clone(),
		})
	}
}

/// Releases an in-flight claim on drop.
#[must_use = "the claim is released as soon as the guard is dropped"]
pub struct InFlightGuard {
	keys: Arc<DashSet<AuthorizationKey>>,
	key: AuthorizationKey,
}

impl Drop for InFlightGuard {
	fn drop(&mut self) {
		self.keys.remove(&self.key);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::Address;

	fn key(byte: u8) -> AuthorizationKey {
		AuthorizationKey::transfer(Address::repeat_byte(1), B256::repeat_byte(byte))
	}

	#[test]
	fn test_happy_path_and_terminal_state() {
		let tracker = LifecycleTracker::new();
		let k = key(1);

		for next in [
			AuthorizationState::Signing,
			AuthorizationState::Signed,
			AuthorizationState::Submitting,
			AuthorizationState::Submitted,
		] {
			tracker.transition(&k, next).unwrap();
		}
		assert_eq!(tracker.state(&k), AuthorizationState::Submitted);

		assert!(matches!(
			tracker.transition(&k, AuthorizationState::Submitting),
			Err(AuthorizationError::InvalidState { state: AuthorizationState::Submitted, .. })
		));
	}

	#[test]
	fn test_adopt_only_fills_unknown_keys() {
		let tracker = LifecycleTracker::new();
		let k = key(2);

		tracker.adopt(&k, None);
		assert_eq!(tracker.state(&k), AuthorizationState::Signed);
		tracker.transition(&k, AuthorizationState::Cancelling).unwrap();

		tracker.adopt(&k, None);
		assert_eq!(tracker.state(&k), AuthorizationState::Cancelling);
	}

	#[test]
	fn test_unsettled_entry_is_adopted_indeterminate() {
		let tracker = LifecycleTracker::new();
		let k = key(5);

		tracker.adopt(&k, Some(B256::repeat_byte(0xaa)));
		assert_eq!(tracker.state(&k), AuthorizationState::Indeterminate);
		assert!(tracker
			.transition(&k, AuthorizationState::Submitting)
			.is_err());
	}

	#[test]
	fn test_forget_restarts_lifecycle() {
		let tracker = LifecycleTracker::new();
		let k = key(4);
		tracker.adopt(&k, None);
		tracker.transition(&k, AuthorizationState::Expired).unwrap();
		assert!(tracker.transition(&k, AuthorizationState::Signing).is_err());

		tracker.forget(&k);
		tracker.transition(&k, AuthorizationState::Signing).unwrap();
	}

	#[test]
	fn test_cannot_submit_unsigned() {
		let tracker = LifecycleTracker::new();
		assert!(tracker
			.transition(&key(3), AuthorizationState::Submitting)
			.is_err());
	}

	#[test]
	fn test_guard_is_exclusive_per_key() {
		let tracker = LifecycleTracker::new();

		let first = tracker.begin(&key(1)).unwrap();
		assert!(matches!(
			tracker.begin(&key(1)),
			Err(AuthorizationError::AlreadyInProgress(_))
		));
		let other = tracker.begin(&key(2)).unwrap();

		drop(first);
		let again = tracker.begin(&key(1)).unwrap();
		drop(again);
		drop(other);
	}
}
