//! Storage module for the order desk.
//!
//! This module provides the persistence gateway used by every request handler.
//! It is split in two layers: [`StorageInterface`] is a low-level byte store
//! that backends (in-memory, file-based) implement, and [`OrderCollection`] is
//! the typed gateway that performs document operations on one collection of
//! orders, each bounded by the configured operation timeout.

use async_trait::async_trait;
use order_types::{
	ApiError, ConfigSchema, DeleteResult, ImplementationRegistry, InsertResult, Order,
	OrderFields, OrderId, UpdateResult,
};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs when inserting a document whose id is already taken.
	#[error("Duplicate id: {0}")]
	Duplicate(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// Error that occurs when an operation exceeds the operation timeout.
	#[error("Operation '{operation}' timed out after {after:?}")]
	Timeout {
		operation: &'static str,
		after: Duration,
	},
}

impl From<StorageError> for ApiError {
	fn from(err: StorageError) -> Self {
		ApiError::Persistence(err.to_string())
	}
}

/// Trait defining the low-level interface for storage backends.
///
/// Values are opaque bytes addressed by string keys. Implementations must be
/// safe to share between concurrent requests.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, overwriting any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	/// Returns whether a value was removed.
	async fn delete(&self, key: &str) -> Result<bool, StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Returns every key/value pair whose key starts with `prefix`.
	async fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Selects which documents a find operation returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
	/// Exact waiter name to match. `None` matches every document.
	pub server: Option<String>,
}

impl OrderFilter {
	/// Matches every document in the collection.
	pub fn all() -> Self {
		Self::default()
	}

	/// Matches documents whose server equals `name` exactly.
	pub fn by_server(name: impl Into<String>) -> Self {
		Self {
			server: Some(name.into()),
		}
	}

	pub fn matches(&self, order: &Order) -> bool {
		match &self.server {
			Some(name) => order.server.as_deref() == Some(name.as_str()),
			None => true,
		}
	}
}

/// Typed gateway over a single collection of order documents.
///
/// Every operation runs under the operation timeout and fails with
/// [`StorageError::Timeout`] when the backend takes longer. Mutating operations
/// hold the write lock across their read-check-write sequence.
pub struct OrderCollection {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
	/// Collection name, used as the key namespace.
	collection: String,
	/// Upper bound on a single operation.
	operation_timeout: Duration,
	/// Serializes mutating operations.
	write_lock: Mutex<()>,
}

impl OrderCollection {
	/// Creates a gateway over the named collection of the given backend.
	pub fn new(
		backend: Box<dyn StorageInterface>,
		collection: impl Into<String>,
		operation_timeout: Duration,
	) -> Self {
		Self {
			backend,
			collection: collection.into(),
			operation_timeout,
			write_lock: Mutex::new(()),
		}
	}

	pub fn collection(&self) -> &str {
		&self.collection
	}

	pub fn operation_timeout(&self) -> Duration {
		self.operation_timeout
	}

	/// Inserts a new document.
	///
	/// Fails with [`StorageError::Duplicate`] if a document with the same id exists.
	pub async fn insert(&self, order: &Order) -> Result<InsertResult, StorageError> {
		let key = self.key(&order.id);
		let bytes = encode(order)?;

		self.bounded("insert", async {
			let _guard = self.write_lock.lock().await;
			if self.backend.exists(&key).await? {
				return Err(StorageError::Duplicate(order.id.to_hex()));
			}
			self.backend.set_bytes(&key, bytes).await?;
			Ok(InsertResult {
				inserted_id: order.id,
			})
		})
		.await
	}

	/// Returns every document matching the filter, ordered by id.
	pub async fn find(&self, filter: &OrderFilter) -> Result<Vec<Order>, StorageError> {
		let prefix = format!("{}:", self.collection);

		self.bounded("find", async {
			let entries = self.backend.scan(&prefix).await?;
			let mut orders = Vec::with_capacity(entries.len());
			for (_, bytes) in entries {
				let order = decode(&bytes)?;
				if filter.matches(&order) {
					orders.push(order);
				}
			}
			orders.sort_by_key(|order| order.id);
			Ok::<_, StorageError>(orders)
		})
		.await
	}

	/// Returns the document with the given id.
	///
	/// Fails with [`StorageError::NotFound`] if there is none.
	pub async fn find_by_id(&self, id: &OrderId) -> Result<Order, StorageError> {
		let key = self.key(id);

		self.bounded("find_one", async {
			let bytes = self.backend.get_bytes(&key).await?;
			decode(&bytes)
		})
		.await
	}

	/// Sets the server field of one document, leaving every other field untouched.
	pub async fn update_server(
		&self,
		id: &OrderId,
		server: Option<String>,
	) -> Result<UpdateResult, StorageError> {
		let key = self.key(id);

		self.bounded("update_one", async {
			let _guard = self.write_lock.lock().await;
			let Some(mut order) = self.load(&key).await? else {
				return Ok::<_, StorageError>(UpdateResult::UNMATCHED);
			};
			if order.server == server {
				return Ok(unmodified());
			}
			order.server = server;
			self.backend.set_bytes(&key, encode(&order)?).await?;
			Ok(modified())
		})
		.await
	}

	/// Replaces every field of one document except its id.
	///
	/// Fields absent from `fields` are cleared.
	pub async fn replace(
		&self,
		id: &OrderId,
		fields: OrderFields,
	) -> Result<UpdateResult, StorageError> {
		let key = self.key(id);
		let replacement = Order::new(*id, fields);

		self.bounded("replace_one", async {
			let _guard = self.write_lock.lock().await;
			let Some(current) = self.load(&key).await? else {
				return Ok::<_, StorageError>(UpdateResult::UNMATCHED);
			};
			if current == replacement {
				return Ok(unmodified());
			}
			self.backend.set_bytes(&key, encode(&replacement)?).await?;
			Ok(modified())
		})
		.await
	}

	/// Removes one document.
	pub async fn delete(&self, id: &OrderId) -> Result<DeleteResult, StorageError> {
		let key = self.key(id);

		self.bounded("delete_one", async {
			let _guard = self.write_lock.lock().await;
			let removed = self.backend.delete(&key).await?;
			Ok::<_, StorageError>(DeleteResult {
				deleted_count: u64::from(removed),
			})
		})
		.await
	}

	fn key(&self, id: &OrderId) -> String {
		format!("{}:{}", self.collection, id)
	}

	async fn load(&self, key: &str) -> Result<Option<Order>, StorageError> {
		match self.backend.get_bytes(key).await {
			Ok(bytes) => decode(&bytes).map(Some),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StorageError>
	where
		F: Future<Output = Result<T, StorageError>>,
	{
		match tokio::time::timeout(self.operation_timeout, fut).await {
			Ok(result) => result,
			Err(_) => Err(StorageError::Timeout {
				operation,
				after: self.operation_timeout,
			}),
		}
	}
}

fn modified() -> UpdateResult {
	UpdateResult {
		matched_count: 1,
		modified_count: 1,
	}
}

fn unmodified() -> UpdateResult {
	UpdateResult {
		matched_count: 1,
		modified_count: 0,
	}
}

fn encode(order: &Order) -> Result<Vec<u8>, StorageError> {
	serde_json::to_vec(order).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Order, StorageError> {
	serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use order_types::ConfigSchema;

	fn collection() -> OrderCollection {
		OrderCollection::new(
			Box::new(MemoryStorage::new()),
			"orders",
			Duration::from_secs(5),
		)
	}

	fn fields(dish: &str, server: &str) -> OrderFields {
		OrderFields {
			dish: Some(dish.to_string()),
			price: Some(9.5),
			server: Some(server.to_string()),
			table: Some("T1".to_string()),
		}
	}

	async fn add(collection: &OrderCollection, dish: &str, server: &str) -> Order {
		let order = Order::new(OrderId::new(), fields(dish, server));
		collection.insert(&order).await.unwrap();
		order
	}

	#[tokio::test]
	async fn test_insert_then_find_by_id() {
		let collection = collection();
		let order = Order::new(OrderId::new(), fields("Pasta", "Alice"));

		let result = collection.insert(&order).await.unwrap();
		assert_eq!(result.inserted_id, order.id);

		let found = collection.find_by_id(&order.id).await.unwrap();
		assert_eq!(found, order);
	}

	#[tokio::test]
	async fn test_insert_duplicate_id_fails() {
		let collection = collection();
		let order = add(&collection, "Pasta", "Alice").await;

		let result = collection.insert(&order).await;
		assert!(matches!(result, Err(StorageError::Duplicate(_))));
	}

	#[tokio::test]
	async fn test_find_on_empty_collection() {
		let collection = collection();
		let orders = collection.find(&OrderFilter::all()).await.unwrap();
		assert!(orders.is_empty());
	}

	#[tokio::test]
	async fn test_find_returns_creation_order() {
		let collection = collection();
		let first = add(&collection, "Soup", "Alice").await;
		let second = add(&collection, "Steak", "Bob").await;
		let third = add(&collection, "Cake", "Alice").await;

		let orders = collection.find(&OrderFilter::all()).await.unwrap();
		assert_eq!(orders, vec![first, second, third]);
	}

	#[tokio::test]
	async fn test_find_by_server_is_exact() {
		let collection = collection();
		let alice = add(&collection, "Soup", "Alice").await;
		add(&collection, "Steak", "alice").await;
		add(&collection, "Cake", "Alice ").await;
		let mut unassigned = Order::new(OrderId::new(), fields("Tea", "x"));
		unassigned.server = None;
		collection.insert(&unassigned).await.unwrap();

		let orders = collection.find(&OrderFilter::by_server("Alice")).await.unwrap();
		assert_eq!(orders, vec![alice]);

		let none = collection.find(&OrderFilter::by_server("Carol")).await.unwrap();
		assert!(none.is_empty());
	}

	#[tokio::test]
	async fn test_collections_are_isolated() {
		let backend = MemoryStorage::new();
		let order = Order::new(OrderId::new(), fields("Pasta", "Alice"));
		backend
			.set_bytes(&format!("archive:{}", order.id), encode(&order).unwrap())
			.await
			.unwrap();

		let collection =
			OrderCollection::new(Box::new(backend), "orders", Duration::from_secs(5));
		assert!(collection.find(&OrderFilter::all()).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_find_by_missing_id_is_not_found() {
		let collection = collection();
		let result = collection.find_by_id(&OrderId::ZERO).await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_update_server_is_partial() {
		let collection = collection();
		let order = add(&collection, "Pasta", "Alice").await;

		let result = collection
			.update_server(&order.id, Some("Bob".to_string()))
			.await
			.unwrap();
		assert_eq!(result.modified_count, 1);

		let updated = collection.find_by_id(&order.id).await.unwrap();
		assert_eq!(updated.server.as_deref(), Some("Bob"));
		assert_eq!(updated.dish, order.dish);
		assert_eq!(updated.price, order.price);
		assert_eq!(updated.table, order.table);
	}

	#[tokio::test]
	async fn test_update_server_same_value_is_unmodified() {
		let collection = collection();
		let order = add(&collection, "Pasta", "Alice").await;

		let result = collection
			.update_server(&order.id, Some("Alice".to_string()))
			.await
			.unwrap();
		assert_eq!(result.matched_count, 1);
		assert_eq!(result.modified_count, 0);
	}

	#[tokio::test]
	async fn test_update_server_unknown_id() {
		let collection = collection();
		let result = collection
			.update_server(&OrderId::new(), Some("Bob".to_string()))
			.await
			.unwrap();
		assert_eq!(result, UpdateResult::UNMATCHED);
	}

	#[tokio::test]
	async fn test_replace_clears_absent_fields() {
		let collection = collection();
		let order = add(&collection, "Pasta", "Alice").await;

		let result = collection
			.replace(
				&order.id,
				OrderFields {
					dish: Some("Risotto".to_string()),
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert_eq!(result.modified_count, 1);

		let replaced = collection.find_by_id(&order.id).await.unwrap();
		assert_eq!(replaced.id, order.id);
		assert_eq!(replaced.dish.as_deref(), Some("Risotto"));
		assert_eq!(replaced.price, None);
		assert_eq!(replaced.server, None);
		assert_eq!(replaced.table, None);
	}

	#[tokio::test]
	async fn test_replace_identical_is_unmodified() {
		let collection = collection();
		let order = add(&collection, "Pasta", "Alice").await;

		let result = collection.replace(&order.id, order.fields()).await.unwrap();
		assert_eq!(result.matched_count, 1);
		assert_eq!(result.modified_count, 0);
	}

	#[tokio::test]
	async fn test_replace_unknown_id_does_not_insert() {
		let collection = collection();
		let id = OrderId::new();
		let result = collection.replace(&id, fields("Pasta", "Alice")).await.unwrap();
		assert_eq!(result, UpdateResult::UNMATCHED);
		assert!(collection.find(&OrderFilter::all()).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_delete_counts() {
		let collection = collection();
		let order = add(&collection, "Pasta", "Alice").await;

		assert_eq!(collection.delete(&order.id).await.unwrap().deleted_count, 1);
		assert_eq!(collection.delete(&order.id).await.unwrap().deleted_count, 0);
		assert!(matches!(
			collection.find_by_id(&order.id).await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_concurrent_partial_updates_are_not_lost() {
		let collection = std::sync::Arc::new(collection());
		let mut ids = Vec::new();
		for i in 0..20 {
			ids.push(add(&collection, &format!("Dish {}", i), "Alice").await.id);
		}

		let mut handles = Vec::new();
		for id in ids.clone() {
			let collection = collection.clone();
			handles.push(tokio::spawn(async move {
				collection.update_server(&id, Some("Bob".to_string())).await
			}));
		}
		for handle in handles {
			assert_eq!(handle.await.unwrap().unwrap().modified_count, 1);
		}

		let bobs = collection.find(&OrderFilter::by_server("Bob")).await.unwrap();
		assert_eq!(bobs.len(), ids.len());
	}

	/// Backend that stalls on every call.
	struct StalledStorage;

	#[async_trait]
	impl StorageInterface for StalledStorage {
		async fn get_bytes(&self, _key: &str) -> Result<Vec<u8>, StorageError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Err(StorageError::NotFound)
		}

		async fn set_bytes(&self, _key: &str, _value: Vec<u8>) -> Result<(), StorageError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(())
		}

		async fn delete(&self, _key: &str) -> Result<bool, StorageError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(false)
		}

		async fn exists(&self, _key: &str) -> Result<bool, StorageError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(false)
		}

		async fn scan(&self, _prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(Vec::new())
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(implementations::memory::MemoryStorageSchema)
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_operations_time_out() {
		let collection =
			OrderCollection::new(Box::new(StalledStorage), "orders", Duration::from_millis(100));

		let err = collection.find(&OrderFilter::all()).await.unwrap_err();
		assert!(matches!(err, StorageError::Timeout { operation: "find", .. }));

		let err = collection.delete(&OrderId::new()).await.unwrap_err();
		assert!(matches!(err, StorageError::Timeout { operation: "delete_one", .. }));

		let order = Order::new(OrderId::new(), fields("Pasta", "Alice"));
		let err = collection.insert(&order).await.unwrap_err();
		assert!(err.to_string().contains("timed out"));
	}

	#[test]
	fn test_storage_error_maps_to_persistence() {
		let err = ApiError::from(StorageError::NotFound);
		assert!(matches!(err, ApiError::Persistence(ref m) if m == "Not found"));
	}

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<_> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["file", "memory"]);
	}
}
