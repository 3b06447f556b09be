//! Signed authorization records.
//!
//! Two kinds of off-chain authorization are tracked: single-use ERC-3009
//! transfer authorizations (random 32-byte nonce, validity window) and ERC-2612
//! permits (sequential per-owner nonce, deadline). Both are identified by the
//! `(owner, nonce)` pair, which is also the dedup key of the local cache.
//!
//! Large integers are serialized as decimal strings so that persisted records
//! never lose precision.

use crate::storage::StorageKey;
use crate::utils::serde_decimal;
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

/// The two authorization kinds handled by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationKind {
	/// Single-use `transferWithAuthorization` (ERC-3009).
	Transfer,
	/// Allowance-setting `permit` (ERC-2612).
	Permit,
}

impl AuthorizationKind {
	/// Storage collection holding records of this kind.
	pub fn storage_key(&self) -> StorageKey {
		match self {
			AuthorizationKind::Transfer => StorageKey::TransferAuthorizations,
			AuthorizationKind::Permit => StorageKey::Permits,
		}
	}
}

impl fmt::Display for AuthorizationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AuthorizationKind::Transfer => write!(f, "transfer"),
			AuthorizationKind::Permit => write!(f, "permit"),
		}
	}
}

/// Dedup key of an authorization: the authorizing account plus its nonce.
///
/// Rendered as `"{owner_lowercase}_{nonce}"`, where the nonce is 0x-prefixed
/// hex for transfer authorizations and decimal for permits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthorizationKey {
	owner: Address,
	nonce: String,
}

impl AuthorizationKey {
	/// Key for a single-use authorization.
	pub fn transfer(owner: Address, nonce: B256) -> Self {
		Self {
			owner,
			nonce: format!("0x{}", hex::encode(nonce)),
		}
	}

	/// Key for a permit.
	pub fn permit(owner: Address, nonce: U256) -> Self {
		Self {
			owner,
			nonce: nonce.to_string(),
		}
	}

	pub fn owner(&self) -> Address {
		self.owner
	}

	pub fn nonce(&self) -> &str {
		&self.nonce
	}
}

impl fmt::Display for AuthorizationKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}_{}", hex::encode(self.owner), self.nonce)
	}
}

/// ECDSA signature decomposed into the `(v, r, s)` triple verifying contracts expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSignature {
	/// Recovery id, always 27 or 28.
	pub v: u8,
	pub r: B256,
	pub s: B256,
}

/// Behaviour shared by cached authorization records.
///
/// Implemented by both record kinds so that the cache can be generic over
/// them. Only the transaction hash is mutable; everything else is covered by
/// the signature.
pub trait CachedAuthorization:
	Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
	/// Kind of this record.
	const KIND: AuthorizationKind;

	/// Dedup key of this record.
	fn key(&self) -> AuthorizationKey;

	/// Account that signed the authorization.
	fn owner(&self) -> Address;

	/// Unix timestamp (seconds) at which the authorization stops being usable.
	fn expires_at(&self) -> u64;

	/// Unix timestamp (milliseconds) at which the record was cached.
	fn saved_at(&self) -> u64;

	/// Hash of the transaction that consumed or activated the authorization, if known.
	fn tx_hash(&self) -> Option<B256>;

	/// Attaches (or clears) the transaction hash.
	fn set_tx_hash(&mut self, hash: Option<B256>);

	/// Returns true once the expiry timestamp has been reached.
	fn is_expired_at(&self, now: u64) -> bool {
		self.expires_at() <= now
	}
}

/// A signed ERC-3009 transfer authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAuthorization {
	pub from: Address,
	pub to: Address,
	#[serde(with = "serde_decimal::u256")]
	pub value: U256,
	#[serde(with = "serde_decimal::u64")]
	pub valid_after: u64,
	#[serde(with = "serde_decimal::u64")]
	pub valid_before: u64,
	pub nonce: B256,
	/// Full 65-byte signature.
	pub signature: Bytes,
	pub v: u8,
	pub r: B256,
	pub s: B256,
	#[serde(with = "serde_decimal::u64", default)]
	pub saved_at: u64,
	#[serde(default)]
	pub tx_hash: Option<B256>,
}

impl TransferAuthorization {
	/// Returns true when `valid_after <= now < valid_before`.
	pub fn is_valid_at(&self, now: u64) -> bool {
		self.valid_after <= now && now < self.valid_before
	}

	/// The `(v, r, s)` triple of the signature.
	pub fn split_signature(&self) -> SplitSignature {
		SplitSignature {
			v: self.v,
			r: self.r,
			s: self.s,
		}
	}
}

impl CachedAuthorization for TransferAuthorization {
	const KIND: AuthorizationKind = AuthorizationKind::Transfer;

	fn key(&self) -> AuthorizationKey {
		AuthorizationKey::transfer(self.from, self.nonce)
	}

	fn owner(&self) -> Address {
		self.from
	}

	fn expires_at(&self) -> u64 {
		self.valid_before
	}

	fn saved_at(&self) -> u64 {
		self.saved_at
	}

	fn tx_hash(&self) -> Option<B256> {
		self.tx_hash
	}

	fn set_tx_hash(&mut self, hash: Option<B256>) {
		self.tx_hash = hash;
	}
}

/// A signed ERC-2612 permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitAuthorization {
	pub owner: Address,
	pub spender: Address,
	#[serde(with = "serde_decimal::u256")]
	pub value: U256,
	#[serde(with = "serde_decimal::u256")]
	pub nonce: U256,
	#[serde(with = "serde_decimal::u64")]
	pub deadline: u64,
	pub signature: Bytes,
	pub v: u8,
	pub r: B256,
	pub s: B256,
	#[serde(with = "serde_decimal::u64", default)]
	pub saved_at: u64,
	/// Activation transaction hash, filled in after submission.
	#[serde(default)]
	pub tx_hash: Option<B256>,
}

impl PermitAuthorization {
	pub fn split_signature(&self) -> SplitSignature {
		SplitSignature {
			v: self.v,
			r: self.r,
			s: self.s,
		}
	}
}

impl CachedAuthorization for PermitAuthorization {
	const KIND: AuthorizationKind = AuthorizationKind::Permit;

	fn key(&self) -> AuthorizationKey {
		AuthorizationKey::permit(self.owner, self.nonce)
	}

	fn owner(&self) -> Address {
		self.owner
	}

	fn expires_at(&self) -> u64 {
		self.deadline
	}

	fn saved_at(&self) -> u64 {
		self.saved_at
	}

	fn tx_hash(&self) -> Option<B256> {
		self.tx_hash
	}

	fn set_tx_hash(&mut self, hash: Option<B256>) {
		self.tx_hash = hash;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	fn sample_permit(nonce: u64) -> PermitAuthorization {
		PermitAuthorization {
			owner: address!("d1122c8c941fe716c8b0c57b832c90acb4401a05"),
			spender: address!("217fe9b8129b830d50bcd51b0ed831e61f6b571e"),
			value: U256::MAX,
			nonce: U256::from(nonce),
			deadline: 1_700_000_000,
			signature: Bytes::from(vec![0u8; 65]),
			v: 27,
			r: B256::repeat_byte(1),
			s: B256::repeat_byte(2),
			saved_at: 1_699_999_000_000,
			tx_hash: None,
		}
	}

	#[test]
	fn test_key_is_lowercase_owner_and_nonce() {
		let permit = sample_permit(5);
		assert_eq!(
			permit.key().to_string(),
			"0xd1122c8c941fe716c8b0c57b832c90acb4401a05_5"
		);

		let transfer_key = AuthorizationKey::transfer(permit.owner, B256::repeat_byte(0xab));
		assert!(transfer_key.to_string().ends_with(&format!("_0x{}", "ab".repeat(32))));
	}

	#[test]
	fn test_permit_serializes_integers_as_decimal_strings() {
		let permit = sample_permit(7);
		let json = serde_json::to_value(&permit).unwrap();

		assert_eq!(json["value"], U256::MAX.to_string());
		assert_eq!(json["nonce"], "7");
		assert_eq!(json["deadline"], "1700000000");

		let restored: PermitAuthorization = serde_json::from_value(json).unwrap();
		assert_eq!(restored, permit);
	}

	#[test]
	fn test_transfer_validity_window() {
		let auth = TransferAuthorization {
			from: Address::repeat_byte(1),
			to: Address::repeat_byte(2),
			value: U256::from(1_000_000u64),
			valid_after: 100,
			valid_before: 200,
			nonce: B256::repeat_byte(3),
			signature: Bytes::from(vec![0u8; 65]),
			v: 28,
			r: B256::ZERO,
			s: B256::ZERO,
			saved_at: 0,
			tx_hash: None,
		};

		assert!(!auth.is_valid_at(99));
		assert!(auth.is_valid_at(100));
		assert!(auth.is_valid_at(199));
		assert!(!auth.is_valid_at(200));
		assert!(auth.is_expired_at(200));
		assert!(!auth.is_expired_at(199));
	}
}
