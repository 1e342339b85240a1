//! File-based storage backend implementation.
//!
//! Each key is stored as its own file under the base directory. File names are
//! a reversible encoding of the key, so a directory listing is enough to
//! answer prefix scans. Writes go to a temporary file that is renamed into
//! place, so readers never observe a partially written value.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use order_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

const EXTENSION: &str = "doc";
const TEMP_EXTENSION: &str = "tmp";
const DEFAULT_STORAGE_PATH: &str = "./data/storage";

/// Fixed-size header written in front of every value.
///
/// Binary layout (16 bytes total):
/// - [0-3]: Magic bytes "ODSK"
/// - [4-5]: Version (u16, little-endian)
/// - [6-13]: Payload length (u64, little-endian)
/// - [14-15]: Reserved
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileHeader {
	version: u16,
	payload_len: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"ODSK";
	const VERSION: u16 = 1;
	const SIZE: usize = 16;

	fn for_payload(payload: &[u8]) -> Self {
		Self {
			version: Self::VERSION,
			payload_len: payload.len() as u64,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.payload_len.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Unrecognized file format".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut len_bytes = [0u8; 8];
		len_bytes.copy_from_slice(&bytes[6..14]);

		Ok(Self {
			version,
			payload_len: u64::from_le_bytes(len_bytes),
		})
	}
}

/// Splits file contents into header and payload, rejecting truncated files.
fn read_payload(data: Vec<u8>) -> Result<Vec<u8>, StorageError> {
	let header = FileHeader::deserialize(&data)?;
	let payload = &data[FileHeader::SIZE..];
	if payload.len() as u64 != header.payload_len {
		return Err(StorageError::Backend(format!(
			"Truncated file: expected {} payload bytes, found {}",
			header.payload_len,
			payload.len()
		)));
	}
	Ok(payload.to_vec())
}

/// Encodes a key as a file stem. Bytes outside `[A-Za-z0-9-]` become `_xx`.
fn encode_key(key: &str) -> String {
	let mut stem = String::with_capacity(key.len());
	for byte in key.bytes() {
		if byte.is_ascii_alphanumeric() || byte == b'-' {
			stem.push(byte as char);
		} else {
			stem.push_str(&format!("_{:02x}", byte));
		}
	}
	stem
}

/// Inverse of [`encode_key`]. Returns `None` for stems it could not have produced.
fn decode_key(stem: &str) -> Option<String> {
	let bytes = stem.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'_' {
			let hex = stem.get(i + 1..i + 3)?;
			out.push(u8::from_str_radix(hex, 16).ok()?);
			i += 3;
		} else {
			out.push(bytes[i]);
			i += 1;
		}
	}
	String::from_utf8(out).ok()
}

/// File-based storage implementation.
///
/// This implementation stores data as binary files on the filesystem,
/// providing simple persistence without requiring external dependencies.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// Distinguishes temporary files of concurrent writes.
	temp_counter: AtomicU64,
}

impl FileStorage {
	/// Creates a new FileStorage instance rooted at the given directory.
	///
	/// Temporary files left behind by writes that never completed are removed.
	pub fn new(base_path: PathBuf) -> Self {
		remove_stale_temp_files(&base_path);
		Self {
			base_path,
			temp_counter: AtomicU64::new(0),
		}
	}

	pub fn base_path(&self) -> &Path {
		&self.base_path
	}

	fn get_file_path(&self, key: &str) -> PathBuf {
		self.base_path
			.join(format!("{}.{}", encode_key(key), EXTENSION))
	}

	fn temp_file_path(&self, key: &str) -> PathBuf {
		let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
		self.base_path
			.join(format!("{}.{}.{}", encode_key(key), n, TEMP_EXTENSION))
	}
}

fn remove_stale_temp_files(base_path: &Path) {
	let Ok(entries) = std::fs::read_dir(base_path) else {
		return;
	};
	for path in entries.flatten().map(|entry| entry.path()) {
		if path.extension() != Some(std::ffi::OsStr::new(TEMP_EXTENSION)) {
			continue;
		}
		match std::fs::remove_file(&path) {
			Ok(()) => tracing::debug!("Removed stale temporary file {:?}", path),
			Err(e) => tracing::warn!("Cannot remove stale temporary file {:?}: {}", path, e),
		}
	}
}

/// Removes its temporary file on drop unless the file was renamed into place.
///
/// Covers both failed renames and writes whose future is dropped midway.
struct TempFile {
	path: PathBuf,
	persisted: bool,
}

impl TempFile {
	fn new(path: PathBuf) -> Self {
		Self {
			path,
			persisted: false,
		}
	}

	async fn persist(mut self, target: &Path) -> std::io::Result<()> {
		fs::rename(&self.path, target).await?;
		self.persisted = true;
		Ok(())
	}
}

impl Drop for TempFile {
	fn drop(&mut self) {
		if !self.persisted {
			let _ = std::fs::remove_file(&self.path);
		}
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);

		let data = match fs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(StorageError::NotFound)
			},
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		read_payload(data)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		let header = FileHeader::for_payload(&value);
		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&header.serialize());
		file_data.extend_from_slice(&value);

		let temp = TempFile::new(self.temp_file_path(key));
		fs::write(&temp.path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		temp.persist(&self.get_file_path(key))
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<bool, StorageError> {
		let path = self.get_file_path(key);

		match fs::remove_file(&path).await {
			Ok(_) => Ok(true),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		fs::try_exists(self.get_file_path(key))
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut found = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new(EXTENSION)) {
				continue;
			}
			let Some(key) = path
				.file_stem()
				.and_then(|stem| stem.to_str())
				.and_then(decode_key)
			else {
				tracing::debug!("Skipping file {:?}: name is not an encoded key", path);
				continue;
			};
			if !key.starts_with(prefix) {
				continue;
			}

			match fs::read(&path).await {
				Ok(data) => found.push((key, read_payload(data)?)),
				// Removed between listing and reading.
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
				Err(e) => return Err(StorageError::Backend(e.to_string())),
			}
		}

		Ok(found)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("storage_path", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(path) if path.trim().is_empty() => {
						Err("storage_path cannot be empty".to_string())
					},
					_ => Ok(()),
				}
			})],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
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

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
