//! Process-local storage backend.
//!
//! Contents live only as long as the process. Used in tests and for local
//! development.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use order_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Key-value map guarded by an async read-write lock.
#[derive(Default)]
pub struct MemoryStorage {
	entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.entries
			.read()
			.await
			.get(key)
			.cloned()
			.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		self.entries.write().await.insert(key.to_owned(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.entries.write().await.remove(key).is_some())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.entries.read().await.contains_key(key))
	}

	async fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let entries = self.entries.read().await;
		let matching = entries
			.iter()
			.filter(|(key, _)| key.starts_with(prefix))
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect();
		Ok(matching)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// The memory backend takes no settings; any table is accepted.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(Vec::new(), Vec::new()).validate(config)
	}
}

pub fn create_storage(_config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	Ok(Box::new(MemoryStorage::new()))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_set_get_delete() {
		let storage = MemoryStorage::new();
		storage.set_bytes("orders:a", b"ramen".to_vec()).await.unwrap();

		assert_eq!(storage.get_bytes("orders:a").await.unwrap(), b"ramen");
		assert!(storage.exists("orders:a").await.unwrap());

		assert!(storage.delete("orders:a").await.unwrap());
		assert!(!storage.delete("orders:a").await.unwrap());
		assert!(!storage.exists("orders:a").await.unwrap());
		assert!(matches!(
			storage.get_bytes("orders:a").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_set_replaces_value() {
		let storage = MemoryStorage::new();
		storage.set_bytes("orders:a", b"ramen".to_vec()).await.unwrap();
		storage.set_bytes("orders:a", b"udon".to_vec()).await.unwrap();
		assert_eq!(storage.get_bytes("orders:a").await.unwrap(), b"udon");
	}

	#[tokio::test]
	async fn test_scan_by_prefix() {
		let storage = MemoryStorage::new();
		storage.set_bytes("orders:1", b"a".to_vec()).await.unwrap();
		storage.set_bytes("orders:2", b"b".to_vec()).await.unwrap();
		storage.set_bytes("archive:1", b"c".to_vec()).await.unwrap();

		let mut entries = storage.scan("orders:").await.unwrap();
		entries.sort();
		assert_eq!(
			entries,
			vec![
				("orders:1".to_string(), b"a".to_vec()),
				("orders:2".to_string(), b"b".to_vec()),
			]
		);
	}

	#[test]
	fn test_registry_name() {
		assert_eq!(Registry::NAME, "memory");
		let config = toml::Value::Table(toml::map::Map::new());
		assert!(MemoryStorageSchema.validate(&config).is_ok());
		assert!((Registry::factory())(&config).is_ok());
	}
}
