//! Configuration builder for creating test and development configurations.

use crate::{ApiConfig, Config, CorsConfig, ServiceConfig, StorageConfig};
use order_types::{DEFAULT_COLLECTION, DEFAULT_OPERATION_TIMEOUT_MS};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to an in-memory store and the standard API settings.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	storage_primary: String,
	storage_implementation: toml::Value,
	collection: String,
	operation_timeout_ms: u64,
	api: ApiConfig,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			service_id: "test-order-desk".to_string(),
			storage_primary: "memory".to_string(),
			storage_implementation: toml::Value::Table(toml::map::Map::new()),
			collection: DEFAULT_COLLECTION.to_string(),
			operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
			api: ApiConfig::default(),
		}
	}

	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	/// Sets the primary storage implementation and its configuration table.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.storage_primary = primary.into();
		self.storage_implementation = config;
		self
	}

	pub fn collection(mut self, collection: impl Into<String>) -> Self {
		self.collection = collection.into();
		self
	}

	pub fn operation_timeout_ms(mut self, timeout: u64) -> Self {
		self.operation_timeout_ms = timeout;
		self
	}

	pub fn strict_ids(mut self, strict: bool) -> Self {
		self.api.strict_ids = strict;
		self
	}

	pub fn cors(mut self, cors: CorsConfig) -> Self {
		self.api.cors = Some(cors);
		self
	}

	pub fn api(mut self, api: ApiConfig) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` without running validation.
	pub fn build(self) -> Config {
		let mut implementations = HashMap::new();
		implementations.insert(self.storage_primary.clone(), self.storage_implementation);

		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations,
				collection: self.collection,
				operation_timeout_ms: self.operation_timeout_ms,
			},
			api: self.api,
		}
	}
}
