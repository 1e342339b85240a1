//! Factory registry for storage implementations.
//!
//! Backends are looked up by the name used under `storage.implementations`
//! in the configuration file.

use order_config::StorageConfig;
use order_storage::{OrderCollection, StorageError, StorageFactory};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Registry of every storage factory compiled into the service.
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
		}
	}

	/// Register a storage implementation
	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	/// Names of the registered storage implementations, sorted.
	pub fn storage_names(&self) -> Vec<String> {
		let mut names: Vec<_> = self.storage.keys().cloned().collect();
		names.sort();
		names
	}
}

impl Default for FactoryRegistry {
	fn default() -> Self {
		Self::new()
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Get the global factory registry, registering every backend on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();
		for (name, factory) in order_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}
		registry
	})
}

/// Builds the order collection gateway for the configured primary backend.
pub fn build_collection(config: &StorageConfig) -> Result<OrderCollection, StorageError> {
	let registry = get_registry();

	let factory = registry.storage.get(&config.primary).ok_or_else(|| {
		StorageError::Configuration(format!(
			"Unknown storage implementation '{}'. Available: [{}]",
			config.primary,
			registry.storage_names().join(", ")
		))
	})?;
	let implementation = config.primary_config().ok_or_else(|| {
		StorageError::Configuration(format!(
			"Missing configuration for storage implementation '{}'",
			config.primary
		))
	})?;

	let backend = factory(implementation)?;
	backend
		.config_schema()
		.validate(implementation)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	tracing::info!(
		"Using '{}' storage for collection '{}' (timeout {:?})",
		config.primary,
		config.collection,
		config.operation_timeout()
	);

	Ok(OrderCollection::new(
		backend,
		config.collection.clone(),
		config.operation_timeout(),
	))
}
