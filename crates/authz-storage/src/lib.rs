//! Storage for the local authorization cache.
//!
//! Two layers live here. Backends implement the byte-level
//! [`StorageInterface`] (a `file` backend for persistence across runs and a
//! `memory` backend for tests and dry runs); [`StorageService`] adds JSON
//! (de)serialization on top. The [`cache`] module builds the typed,
//! dedup-keyed authorization collections on the service.

use async_trait::async_trait;
use authz_types::{ConfigSchema, ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod cache;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

pub use cache::{sort_newest_first, AuthorizationCache, CacheError, FieldUpdate};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Stored bytes exist but cannot be trusted (bad header or truncated payload).
	#[error("Corrupted data: {0}")]
	Corrupted(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Byte-level key-value backend.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves the bytes stored under `key`, or `NotFound`.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores `value` under `key`, replacing any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes `key`. Deleting a missing key succeeds.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Factory signature every storage backend provides.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// All built-in storage backends as `(name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// JSON-typed access to a storage backend.
///
/// Values are addressed by a collection and an id, combined into the backend
/// key `"{collection}:{id}"`.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(collection: StorageKey, id: &str) -> String {
		format!("{}:{}", collection.as_str(), id)
	}

	/// Serializes `data` and stores it, overwriting any existing value.
	pub async fn store<T: Serialize>(
		&self,
		collection: StorageKey,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&Self::key(collection, id), bytes).await
	}

	/// Loads and deserializes a value.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		collection: StorageKey,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(collection, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	pub async fn remove(&self, collection: StorageKey, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(collection, id)).await
	}

	pub async fn exists(&self, collection: StorageKey, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(collection, id)).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;

	#[tokio::test]
	async fn test_service_namespaces_by_collection() {
		let service = StorageService::new(Box::new(MemoryStorage::new()));

		service
			.store(StorageKey::Permits, "8453", &vec![1u32, 2, 3])
			.await
			.unwrap();

		let permits: Vec<u32> = service.retrieve(StorageKey::Permits, "8453").await.unwrap();
		assert_eq!(permits, vec![1, 2, 3]);
		assert!(!service
			.exists(StorageKey::TransferAuthorizations, "8453")
			.await
			.unwrap());

		service.remove(StorageKey::Permits, "8453").await.unwrap();
		assert!(matches!(
			service.retrieve::<Vec<u32>>(StorageKey::Permits, "8453").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_retrieve_wrong_shape_is_serialization_error() {
		let service = StorageService::new(Box::new(MemoryStorage::new()));
		service
			.store(StorageKey::Permits, "1", &"not a list")
			.await
			.unwrap();

		assert!(matches!(
			service.retrieve::<Vec<u32>>(StorageKey::Permits, "1").await,
			Err(StorageError::Serialization(_))
		));
	}

	#[test]
	fn test_registered_backends() {
		let names: Vec<_> = get_all_implementations().into_iter().map(|(n, _)| n).collect();
		assert_eq!(names, vec!["file", "memory"]);
	}
}
