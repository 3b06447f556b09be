//! Storage collection keys.

use std::str::FromStr;

/// Logical collections persisted through the storage service.
///
/// The two authorization kinds are kept in separate collections and never
/// mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Signed ERC-3009 transfer authorizations.
	TransferAuthorizations,
	/// Signed ERC-2612 permits.
	Permits,
}

impl StorageKey {
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::TransferAuthorizations => "transfer_authorizations",
			StorageKey::Permits => "permits",
		}
	}

	pub fn all() -> impl Iterator<Item = Self> {
		[Self::TransferAuthorizations, Self::Permits].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_storage_key_names_parse_back() {
		for key in StorageKey::all() {
			assert_eq!(key.as_str().parse::<StorageKey>(), Ok(key));
		}
		assert!("orders".parse::<StorageKey>().is_err());
	}
}
