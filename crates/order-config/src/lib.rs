//! Configuration for the order desk service.
//!
//! A configuration is one TOML document with `[service]`, `[storage]` and an
//! optional `[api]` section. The root file may pull sections from other files
//! with `include = ["storage.toml", ...]`; every top-level section must come
//! from exactly one file.
//!
//! Values may reference environment variables as `${VAR}` or
//! `${VAR:-default}`. Every parsed configuration is validated before use.

#[cfg(feature = "testing")]
pub mod builders {
	pub mod config;
}
mod loader;

#[cfg(feature = "testing")]
pub use builders::config::ConfigBuilder;

use order_types::{DEFAULT_COLLECTION, DEFAULT_OPERATION_TIMEOUT_MS};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Upper bound accepted for `storage.operation_timeout_ms` (10 minutes).
pub const MAX_OPERATION_TIMEOUT_MS: u64 = 600_000;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// The document is not valid TOML or does not match the expected shape.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// The document parsed but a value is out of range or inconsistent.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// message() omits the echoed source document
		ConfigError::Parse(err.message().to_string())
	}
}

/// Complete service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub service: ServiceConfig,
	pub storage: StorageConfig,
	#[serde(default)]
	pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Identifier reported in logs and by the health endpoint.
	pub id: String,
}

/// Storage backend selection and gateway settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Backend to open; must be a key of `implementations`.
	pub primary: String,
	/// Backend name to backend-specific table.
	pub implementations: HashMap<String, toml::Value>,
	/// Name of the order collection.
	#[serde(default = "default_collection")]
	pub collection: String,
	/// Upper bound on a single store operation, in milliseconds.
	#[serde(default = "default_operation_timeout_ms")]
	pub operation_timeout_ms: u64,
}

impl StorageConfig {
	pub fn operation_timeout(&self) -> Duration {
		Duration::from_millis(self.operation_timeout_ms)
	}

	/// Returns the configuration table of the primary implementation.
	pub fn primary_config(&self) -> Option<&toml::Value> {
		self.implementations.get(&self.primary)
	}
}

fn default_collection() -> String {
	DEFAULT_COLLECTION.to_string()
}

fn default_operation_timeout_ms() -> u64 {
	DEFAULT_OPERATION_TIMEOUT_MS
}

/// HTTP listener and request handling settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Largest accepted request body, in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// Reject malformed id path segments with 400 instead of looking up the zero id.
	#[serde(default)]
	pub strict_ids: bool,
	/// CORS configuration. Permissive when absent.
	pub cors: Option<CorsConfig>,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			host: default_api_host(),
			port: default_api_port(),
			max_request_size: default_max_request_size(),
			strict_ids: false,
			cors: None,
		}
	}
}

/// Cross-origin policy.
///
/// A `"*"` entry allows anything for that list. Empty header and method
/// lists also allow anything.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	pub allowed_origins: Vec<String>,
	#[serde(default)]
	pub allowed_headers: Vec<String>,
	#[serde(default)]
	pub allowed_methods: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	8000
}

// 1 MiB
fn default_max_request_size() -> usize {
	1 << 20
}

/// Largest document `resolve_env_vars` will scan.
const MAX_DOCUMENT_SIZE: usize = 1 << 20;

/// Substitutes `${VAR}` and `${VAR:-default}` references in a document.
///
/// A reference to an unset variable without a default is an error.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	if input.len() > MAX_DOCUMENT_SIZE {
		return Err(ConfigError::Validation(format!(
			"configuration document is {} bytes, limit is {}",
			input.len(),
			MAX_DOCUMENT_SIZE
		)));
	}

	let pattern = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("env reference pattern: {}", e)))?;

	let mut missing = None;
	let resolved = pattern.replace_all(input, |caps: &regex::Captures| {
		let name = &caps[1];
		match (std::env::var(name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| name.to_string());
				String::new()
			},
		}
	});

	match missing {
		Some(name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' is not set and has no default",
			name
		))),
		None => Ok(resolved.into_owned()),
	}
}

impl Config {
	/// Loads the configuration rooted at `path`, following its includes.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Builds a validated configuration from a table whose environment
	/// references are already resolved.
	fn from_resolved_table(table: toml::Table) -> Result<Self, ConfigError> {
		let config: Config = toml::Value::Table(table).try_into()?;
		config.validate()?;
		Ok(config)
	}

	/// Checks cross-field consistency and value ranges.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(invalid("service.id cannot be empty"));
		}
		self.storage.validate()?;
		self.api.validate()
	}
}

impl StorageConfig {
	fn validate(&self) -> Result<(), ConfigError> {
		if self.implementations.is_empty() {
			return Err(invalid("storage.implementations needs at least one backend"));
		}
		if self.primary_config().is_none() {
			return Err(invalid(format!(
				"Primary storage '{}' not found in implementations",
				self.primary
			)));
		}
		let collection = self.collection.trim();
		if collection.is_empty() || self.collection.contains(':') {
			return Err(invalid(format!(
				"storage.collection '{}' must be non-empty and free of ':'",
				self.collection
			)));
		}
		if !(1..=MAX_OPERATION_TIMEOUT_MS).contains(&self.operation_timeout_ms) {
			return Err(invalid(format!(
				"storage.operation_timeout_ms must be within 1..={}, got {}",
				MAX_OPERATION_TIMEOUT_MS, self.operation_timeout_ms
			)));
		}
		Ok(())
	}
}

impl ApiConfig {
	fn validate(&self) -> Result<(), ConfigError> {
		if self.port == 0 {
			return Err(invalid("api.port cannot be 0"));
		}
		if self.max_request_size == 0 {
			return Err(invalid("api.max_request_size must be positive"));
		}
		if self
			.cors
			.as_ref()
			.is_some_and(|cors| cors.allowed_origins.is_empty())
		{
			return Err(invalid("api.cors.allowed_origins cannot be empty"));
		}
		Ok(())
	}
}

fn invalid(message: impl Into<String>) -> ConfigError {
	ConfigError::Validation(message.into())
}

/// Resolves environment references, parses and validates.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Config::from_resolved_table(toml::from_str(&resolve_env_vars(s)?)?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[service]
id = "order-desk"

[storage]
primary = "memory"
[storage.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("ORDER_TEST_HOST", "localhost");
		std::env::set_var("ORDER_TEST_PORT", "5432");

		let input = "host = \"${ORDER_TEST_HOST}:${ORDER_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("ORDER_TEST_HOST");
		std::env::remove_var("ORDER_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${ORDER_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${ORDER_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("ORDER_MISSING_VAR"));
	}

	#[test]
	fn test_minimal_config_defaults() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.service.id, "order-desk");
		assert_eq!(config.storage.collection, "orders");
		assert_eq!(
			config.storage.operation_timeout(),
			Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS)
		);
		assert_eq!(config.api.host, "127.0.0.1");
		assert_eq!(config.api.port, 8000);
		assert_eq!(config.api.max_request_size, 1024 * 1024);
		assert!(!config.api.strict_ids);
		assert!(config.api.cors.is_none());
	}

	#[test]
	fn test_port_from_env_with_default() {
		let config_str = r#"
[service]
id = "order-desk"

[storage]
primary = "memory"
[storage.implementations.memory]

[api]
port = ${ORDER_TEST_UNSET_PORT:-8123}
strict_ids = true
"#;
		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.api.port, 8123);
		assert!(config.api.strict_ids);
	}

	#[test]
	fn test_primary_must_be_configured() {
		let config_str = r#"
[service]
id = "order-desk"

[storage]
primary = "file"
[storage.implementations.memory]
"#;
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Primary storage 'file'"));
	}

	#[test]
	fn test_timeout_bounds() {
		let config_str = r#"
[service]
id = "order-desk"

[storage]
primary = "memory"
operation_timeout_ms = 0
[storage.implementations.memory]
"#;
		assert!(config_str.parse::<Config>().is_err());

		let config_str = r#"
[service]
id = "order-desk"

[storage]
primary = "memory"
operation_timeout_ms = 600001
[storage.implementations.memory]
"#;
		assert!(config_str.parse::<Config>().is_err());
	}

	#[test]
	fn test_empty_service_id_rejected() {
		let config_str = MINIMAL.replace("id = \"order-desk\"", "id = \"\"");
		assert!(config_str.parse::<Config>().is_err());
	}

	#[test]
	fn test_cors_section() {
		let config_str = format!(
			"{}\n[api.cors]\nallowed_origins = [\"http://localhost:3000\"]\nallowed_methods = [\"GET\"]\n",
			MINIMAL
		);
		let config: Config = config_str.parse().unwrap();
		let cors = config.api.cors.unwrap();
		assert_eq!(cors.allowed_origins, vec!["http://localhost:3000"]);
		assert!(cors.allowed_headers.is_empty());
	}

	#[test]
	fn test_parse_error_is_reported() {
		let err = "[service\nid = 1".parse::<Config>().unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)));
	}
}
