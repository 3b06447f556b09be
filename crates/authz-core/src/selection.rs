//! The authorization currently in focus.

use authz_types::{
	AuthorizationKey, CachedAuthorization, PermitAuthorization, TransferAuthorization,
};

/// A cached record of either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectedAuthorization {
	Transfer(TransferAuthorization),
	Permit(PermitAuthorization),
}

impl SelectedAuthorization {
	pub fn key(&self) -> AuthorizationKey {
		match self {
			SelectedAuthorization::Transfer(auth) => auth.key(),
			SelectedAuthorization::Permit(permit) => permit.key(),
		}
	}
}

/// Which authorization the next execute or activate applies to.
///
/// Signing replaces the selection with the new entry; picking a cached entry
/// replaces whatever was freshly signed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActiveSelection {
	#[default]
	None,
	FreshlySigned(SelectedAuthorization),
	Picked(SelectedAuthorization),
}

impl ActiveSelection {
	pub fn current(&self) -> Option<&SelectedAuthorization> {
		match self {
			ActiveSelection::None => None,
			ActiveSelection::FreshlySigned(entry) | ActiveSelection::Picked(entry) => Some(entry),
		}
	}

	/// Drops the selection if it refers to `key`.
	pub fn release(&mut self, key: &AuthorizationKey) {
		if self.current().map(|entry| &entry.key() == key).unwrap_or(false) {
			*self = ActiveSelection::None;
		}
	}
}
