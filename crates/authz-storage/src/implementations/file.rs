//! File-backed storage.
//!
//! Each key is one file under `storage_path`. Files start with a small header
//! so that truncated or foreign files are reported as corrupted instead of
//! being parsed as an empty collection.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use authz_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use std::path::PathBuf;
use tokio::fs;

const DEFAULT_STORAGE_PATH: &str = "./data/authorizations";

/// Header layout (16 bytes):
/// - [0-3]: magic "AZCS"
/// - [4-5]: format version (u16, little-endian)
/// - [6-13]: payload length (u64, little-endian)
/// - [14-15]: reserved
struct FileHeader {
	payload_len: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"AZCS";
	const VERSION: u16 = 1;
	const SIZE: usize = 16;

	fn encode(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&Self::VERSION.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.payload_len.to_le_bytes());
		bytes
	}

	fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Corrupted(format!(
				"file is {} bytes, shorter than the header",
				bytes.len()
			)));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Corrupted("unrecognized file header".into()));
		}
		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Corrupted(format!(
				"unsupported format version {}",
				version
			)));
		}
		let mut len = [0u8; 8];
		len.copy_from_slice(&bytes[6..14]);
		Ok(Self {
			payload_len: u64::from_le_bytes(len),
		})
	}
}

/// Storage rooted at a directory.
pub struct FileStorage {
	base_path: PathBuf,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	fn file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', ':', '\\'], "_");
		self.base_path.join(format!("{}.json.bin", safe_key))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.file_path(key);
		let data = match fs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(StorageError::NotFound)
			},
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let header = FileHeader::decode(&data)?;
		let payload = &data[FileHeader::SIZE..];
		if payload.len() as u64 != header.payload_len {
			return Err(StorageError::Corrupted(format!(
				"{} declares {} payload bytes, found {}",
				path.display(),
				header.payload_len,
				payload.len()
			)));
		}
		Ok(payload.to_vec())
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.file_path(key);
		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		let header = FileHeader {
			payload_len: value.len() as u64,
		};
		let mut contents = Vec::with_capacity(FileHeader::SIZE + value.len());
		contents.extend_from_slice(&header.encode());
		contents.extend_from_slice(&value);

		// Write-then-rename so readers never observe a partial file.
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, contents)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		tracing::trace!(key, path = %path.display(), "Stored file");
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.file_path(key)).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		fs::try_exists(self.file_path(key))
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for [`FileStorage`].
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("storage_path", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some("") => Err("storage_path must not be empty".into()),
					_ => Ok(()),
				}
			})],
		);
		schema.validate(config)
	}
}

/// Creates file storage from `[storage.implementations.file]`.
///
/// Options:
/// - `storage_path`: directory holding the cache files (default `./data/authorizations`)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
