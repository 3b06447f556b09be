//! Local authorization cache.
//!
//! Each authorization kind lives in its own collection, stored as one JSON list
//! per deployment scope (the chain id). The cache is a hint: it remembers what
//! was signed so that it can be submitted or cancelled later, but the chain is
//! always consulted before a value-moving decision.
//!
//! Storage faults never surface to callers. A missing, unreadable or corrupted
//! collection is logged and treated as empty, and a failed write is logged and
//! dropped.

use crate::{StorageError, StorageService};
use alloy_primitives::{Address, B256};
use authz_types::{AuthorizationKey, CachedAuthorization};
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors raised when building a field update.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
	/// The field is covered by the signature and cannot change.
	#[error("Field '{0}' is immutable")]
	ImmutableField(String),
	#[error("Unknown field '{0}'")]
	UnknownField(String),
	#[error("Invalid value for '{field}': {message}")]
	InvalidValue { field: String, message: String },
}

/// Fields that are part of the signed message or the record identity.
const IMMUTABLE_FIELDS: &[&str] = &[
	"from",
	"to",
	"owner",
	"spender",
	"value",
	"validAfter",
	"valid_after",
	"validBefore",
	"valid_before",
	"nonce",
	"deadline",
	"signature",
	"v",
	"r",
	"s",
	"savedAt",
	"saved_at",
];

/// A change to a mutable, non-identity field of a cached record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
	/// Attach or clear the submission transaction hash.
	TxHash(Option<B256>),
}

impl FieldUpdate {
	/// Parses `field = value` as supplied by an operator.
	///
	/// An empty value (or `none`) clears an optional field.
	pub fn parse(field: &str, value: &str) -> Result<Self, CacheError> {
		match field {
			"txHash" | "tx_hash" => {
				let value = value.trim();
				if value.is_empty() || value.eq_ignore_ascii_case("none") {
					return Ok(FieldUpdate::TxHash(None));
				}
				value
					.parse::<B256>()
					.map(|hash| FieldUpdate::TxHash(Some(hash)))
					.map_err(|e| CacheError::InvalidValue {
						field: field.to_string(),
						message: e.to_string(),
					})
			},
			f if IMMUTABLE_FIELDS.contains(&f) => Err(CacheError::ImmutableField(f.to_string())),
			f => Err(CacheError::UnknownField(f.to_string())),
		}
	}

	fn apply<T: CachedAuthorization>(&self, entry: &mut T) {
		match self {
			FieldUpdate::TxHash(hash) => entry.set_tx_hash(*hash),
		}
	}
}

/// Sorts entries most recently saved first.
pub fn sort_newest_first<T: CachedAuthorization>(entries: &mut [T]) {
	entries.sort_by_key(|entry| std::cmp::Reverse(entry.saved_at()));
}

/// Dedup-keyed collection of one authorization kind.
pub struct AuthorizationCache<T: CachedAuthorization> {
	storage: Arc<StorageService>,
	scope: String,
	/// Serializes read-modify-write cycles within the process.
	write_lock: Mutex<()>,
	_kind: PhantomData<fn() -> T>,
}

impl<T: CachedAuthorization> AuthorizationCache<T> {
	/// Creates a cache over `storage`; `scope` separates deployments.
	pub fn new(storage: Arc<StorageService>, scope: impl Into<String>) -> Self {
		Self {
			storage,
			scope: scope.into(),
			write_lock: Mutex::new(()),
			_kind: PhantomData,
		}
	}

	async fn load(&self) -> Vec<T> {
		match self
			.storage
			.retrieve::<Vec<T>>(T::KIND.storage_key(), &self.scope)
			.await
		{
			Ok(entries) => entries,
			Err(StorageError::NotFound) => Vec::new(),
			Err(e) => {
				tracing::warn!(
					kind = %T::KIND,
					scope = %self.scope,
					error = %e,
					"Authorization cache unreadable, treating as empty"
				);
				Vec::new()
			},
		}
	}

	async fn persist(&self, entries: &[T]) -> bool {
		match self
			.storage
			.store(T::KIND.storage_key(), &self.scope, &entries)
			.await
		{
			Ok(()) => true,
			Err(e) => {
				tracing::warn!(
					kind = %T::KIND,
					scope = %self.scope,
					error = %e,
					"Failed to persist authorization cache"
				);
				false
			},
		}
	}

	/// Inserts `entry` unless one with the same dedup key exists.
	///
	/// Returns true when the entry was added. An existing entry is never
	/// overwritten.
	pub async fn save(&self, entry: T) -> bool {
		let _guard = self.write_lock.lock().await;
		let mut entries = self.load().await;
		let key = entry.key();
		if entries.iter().any(|existing| existing.key() == key) {
			tracing::debug!(kind = %T::KIND, key = %key, "Authorization already cached");
			return false;
		}
		entries.push(entry);
		let saved = self.persist(&entries).await;
		if saved {
			tracing::debug!(kind = %T::KIND, key = %key, "Cached authorization");
		}
		saved
	}

	/// Deletes the entry with `key`. Returns false if there was none.
	pub async fn remove(&self, key: &AuthorizationKey) -> bool {
		let _guard = self.write_lock.lock().await;
		let mut entries = self.load().await;
		let before = entries.len();
		entries.retain(|entry| &entry.key() != key);
		if entries.len() == before {
			return false;
		}
		self.persist(&entries).await
	}

	pub async fn get(&self, key: &AuthorizationKey) -> Option<T> {
		self.load()
			.await
			.into_iter()
			.find(|entry| &entry.key() == key)
	}

	/// Entries signed by `owner`, in storage order.
	pub async fn list_by_owner(&self, owner: Address) -> Vec<T> {
		self.load()
			.await
			.into_iter()
			.filter(|entry| entry.owner() == owner)
			.collect()
	}

	pub async fn list_all(&self) -> Vec<T> {
		self.load().await
	}

	/// Removes every entry whose expiry is at or before `now`.
	///
	/// Returns how many entries were removed.
	pub async fn purge_expired(&self, now: u64) -> usize {
		let _guard = self.write_lock.lock().await;
		let mut entries = self.load().await;
		let before = entries.len();
		entries.retain(|entry| !entry.is_expired_at(now));
		let removed = before - entries.len();
		if removed == 0 {
			return 0;
		}
		if !self.persist(&entries).await {
			return 0;
		}
		tracing::debug!(kind = %T::KIND, removed, "Purged expired authorizations");
		removed
	}

	/// Applies `update` to the entry with `key`. Returns false if there was none.
	pub async fn update_field(&self, key: &AuthorizationKey, update: FieldUpdate) -> bool {
		let _guard = self.write_lock.lock().await;
		let mut entries = self.load().await;
		let Some(entry) = entries.iter_mut().find(|entry| &entry.key() == key) else {
			return false;
		};
		update.apply(entry);
		self.persist(&entries).await
	}

	/// Drops the whole collection.
	pub async fn clear(&self) {
		let _guard = self.write_lock.lock().await;
		if let Err(e) = self
			.storage
			.remove(T::KIND.storage_key(), &self.scope)
			.await
		{
			tracing::warn!(kind = %T::KIND, error = %e, "Failed to clear authorization cache");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStorage;
	use crate::StorageInterface;
	use alloy_primitives::{Bytes, U256};
	use async_trait::async_trait;
	use authz_types::{ConfigSchema, PermitAuthorization, Schema, TransferAuthorization};

	fn permit(owner: Address, nonce: u64, deadline: u64, saved_at: u64) -> PermitAuthorization {
		PermitAuthorization {
			owner,
			spender: Address::repeat_byte(0xee),
			value: U256::MAX,
			nonce: U256::from(nonce),
			deadline,
			signature: Bytes::from(vec![0u8; 65]),
			v: 27,
			r: B256::repeat_byte(1),
			s: B256::repeat_byte(2),
			saved_at,
			tx_hash: None,
		}
	}

	fn transfer(from: Address, nonce: u8, valid_before: u64) -> TransferAuthorization {
		TransferAuthorization {
			from,
			to: Address::repeat_byte(0xdd),
			value: U256::from(1_000_000u64),
			valid_after: 0,
			valid_before,
			nonce: B256::repeat_byte(nonce),
			signature: Bytes::from(vec![0u8; 65]),
			v: 28,
			r: B256::repeat_byte(3),
			s: B256::repeat_byte(4),
			saved_at: 0,
			tx_hash: None,
		}
	}

	fn service() -> Arc<StorageService> {
		Arc::new(StorageService::new(Box::new(MemoryStorage::new())))
	}

	#[tokio::test]
	async fn test_save_is_dedup_and_keeps_original() {
		let cache = AuthorizationCache::<PermitAuthorization>::new(service(), "8453");
		let owner = Address::repeat_byte(1);

		assert!(cache.save(permit(owner, 5, 100, 1)).await);
		let mut duplicate = permit(owner, 5, 999, 2);
		duplicate.value = U256::from(1u64);
		assert!(!cache.save(duplicate).await);

		let all = cache.list_all().await;
		assert_eq!(all.len(), 1);
		assert_eq!(all[0].deadline, 100);
		assert_eq!(all[0].value, U256::MAX);
	}

	#[tokio::test]
	async fn test_collections_and_scopes_are_separate() {
		let storage = service();
		let permits = AuthorizationCache::<PermitAuthorization>::new(storage.clone(), "8453");
		let transfers = AuthorizationCache::<TransferAuthorization>::new(storage.clone(), "8453");
		let other_chain = AuthorizationCache::<PermitAuthorization>::new(storage, "84532");
		let owner = Address::repeat_byte(1);

		permits.save(permit(owner, 0, 100, 0)).await;
		transfers.save(transfer(owner, 9, 100)).await;

		assert_eq!(permits.list_all().await.len(), 1);
		assert_eq!(transfers.list_all().await.len(), 1);
		assert!(other_chain.list_all().await.is_empty());
	}

	#[tokio::test]
	async fn test_list_by_owner_and_remove() {
		let cache = AuthorizationCache::<TransferAuthorization>::new(service(), "1");
		let alice = Address::repeat_byte(0xa1);
		let bob = Address::repeat_byte(0xb0);

		cache.save(transfer(alice, 1, 100)).await;
		cache.save(transfer(alice, 2, 100)).await;
		cache.save(transfer(bob, 1, 100)).await;

		assert_eq!(cache.list_by_owner(alice).await.len(), 2);
		assert_eq!(cache.list_by_owner(bob).await.len(), 1);

		let key = AuthorizationKey::transfer(alice, B256::repeat_byte(1));
		assert!(cache.remove(&key).await);
		assert!(!cache.remove(&key).await);
		assert!(cache.get(&key).await.is_none());
		assert_eq!(cache.list_by_owner(alice).await.len(), 1);
	}

	#[tokio::test]
	async fn test_purge_expired_boundary_and_idempotence() {
		let cache = AuthorizationCache::<PermitAuthorization>::new(service(), "1");
		let owner = Address::repeat_byte(1);
		cache.save(permit(owner, 0, 99, 0)).await;
		cache.save(permit(owner, 1, 100, 0)).await;
		cache.save(permit(owner, 2, 101, 0)).await;

		assert_eq!(cache.purge_expired(100).await, 2);
		assert_eq!(cache.purge_expired(100).await, 0);

		let remaining = cache.list_all().await;
		assert_eq!(remaining.len(), 1);
		assert_eq!(remaining[0].deadline, 101);
	}

	#[tokio::test]
	async fn test_large_values_survive_persistence() {
		let storage = service();
		let cache = AuthorizationCache::<PermitAuthorization>::new(storage.clone(), "1");
		let owner = Address::repeat_byte(1);
		let mut entry = permit(owner, 0, u64::MAX, 0);
		entry.nonce = U256::MAX - U256::from(1u64);
		cache.save(entry.clone()).await;

		let reopened = AuthorizationCache::<PermitAuthorization>::new(storage, "1");
		assert_eq!(reopened.list_all().await, vec![entry]);
	}

	#[tokio::test]
	async fn test_update_field_only_touches_tx_hash() {
		let cache = AuthorizationCache::<PermitAuthorization>::new(service(), "1");
		let owner = Address::repeat_byte(1);
		cache.save(permit(owner, 3, 100, 0)).await;
		let key = AuthorizationKey::permit(owner, U256::from(3u64));

		let hash = B256::repeat_byte(0x77);
		let update = FieldUpdate::parse("txHash", &format!("0x{}", "77".repeat(32))).unwrap();
		assert_eq!(update, FieldUpdate::TxHash(Some(hash)));
		assert!(cache.update_field(&key, update).await);
		assert_eq!(cache.get(&key).await.unwrap().tx_hash, Some(hash));

		let missing = AuthorizationKey::permit(owner, U256::from(4u64));
		assert!(!cache.update_field(&missing, FieldUpdate::TxHash(None)).await);

		assert_eq!(
			FieldUpdate::parse("nonce", "5"),
			Err(CacheError::ImmutableField("nonce".into()))
		);
		assert_eq!(
			FieldUpdate::parse("signature", "0x"),
			Err(CacheError::ImmutableField("signature".into()))
		);
		assert!(matches!(
			FieldUpdate::parse("color", "red"),
			Err(CacheError::UnknownField(_))
		));
		assert!(matches!(
			FieldUpdate::parse("tx_hash", "0x12"),
			Err(CacheError::InvalidValue { .. })
		));
		assert_eq!(FieldUpdate::parse("tx_hash", ""), Ok(FieldUpdate::TxHash(None)));
	}

	#[tokio::test]
	async fn test_sort_newest_first() {
		let owner = Address::repeat_byte(1);
		let mut entries = vec![
			permit(owner, 0, 100, 10),
			permit(owner, 1, 100, 30),
			permit(owner, 2, 100, 20),
		];
		sort_newest_first(&mut entries);
		let order: Vec<u64> = entries.iter().map(|e| e.saved_at).collect();
		assert_eq!(order, vec![30, 20, 10]);
	}

	#[tokio::test]
	async fn test_corrupted_collection_reads_as_empty() {
		let storage = service();
		storage
			.store(authz_types::StorageKey::Permits, "1", &"garbage")
			.await
			.unwrap();
		let cache = AuthorizationCache::<PermitAuthorization>::new(storage, "1");

		assert!(cache.list_all().await.is_empty());
		assert!(cache.save(permit(Address::repeat_byte(1), 0, 100, 0)).await);
		assert_eq!(cache.list_all().await.len(), 1);
	}

	struct UnavailableStorage;

	#[async_trait]
	impl StorageInterface for UnavailableStorage {
		async fn get_bytes(&self, _key: &str) -> Result<Vec<u8>, StorageError> {
			Err(StorageError::Backend("disk unavailable".into()))
		}

		async fn set_bytes(&self, _key: &str, _value: Vec<u8>) -> Result<(), StorageError> {
			Err(StorageError::Backend("disk unavailable".into()))
		}

		async fn delete(&self, _key: &str) -> Result<(), StorageError> {
			Err(StorageError::Backend("disk unavailable".into()))
		}

		async fn exists(&self, _key: &str) -> Result<bool, StorageError> {
			Err(StorageError::Backend("disk unavailable".into()))
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			struct Empty;
			impl ConfigSchema for Empty {
				fn validate(&self, config: &toml::Value) -> Result<(), authz_types::ValidationError> {
					Schema::new(vec![], vec![]).validate(config)
				}
			}
			Box::new(Empty)
		}
	}

	#[tokio::test]
	async fn test_unavailable_storage_degrades_silently() {
		let storage = Arc::new(StorageService::new(Box::new(UnavailableStorage)));
		let cache = AuthorizationCache::<TransferAuthorization>::new(storage, "1");
		let owner = Address::repeat_byte(1);

		assert!(!cache.save(transfer(owner, 1, 100)).await);
		assert!(cache.list_by_owner(owner).await.is_empty());
		assert_eq!(cache.purge_expired(1_000).await, 0);
		assert!(!cache.remove(&AuthorizationKey::transfer(owner, B256::ZERO)).await);
		cache.clear().await;
	}
}
