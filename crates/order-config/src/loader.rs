//! Multi-file configuration.
//!
//! A root file may list other files under `include`. The included files
//! contribute top-level sections; a section may be defined by one file only.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Reads a root configuration file and merges its includes.
pub struct ConfigLoader {
	/// Directory relative include paths are resolved against.
	root_dir: PathBuf,
	/// Canonical paths already read, for cycle detection.
	visited: HashSet<PathBuf>,
	/// File that defined each top-level section.
	owners: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(root_dir: impl AsRef<Path>) -> Self {
		Self {
			root_dir: root_dir.as_ref().to_path_buf(),
			visited: HashSet::new(),
			owners: HashMap::new(),
		}
	}

	/// Loads, merges, parses and validates the configuration rooted at `path`.
	pub async fn load_config(&mut self, path: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let root_path = self.locate(path.as_ref())?;
		let source = self.read(&root_path).await?;
		let mut root: toml::Table = toml::from_str(&source)?;

		let includes = include_list(&root)?;
		if includes.is_empty() {
			return Config::from_resolved_table(root);
		}

		root.remove("include");
		self.claim_sections(&root, &root_path)
			.map_err(ConfigError::Validation)?;

		for include in includes {
			let include_path = self.locate(&include)?;
			let included: toml::Table = toml::from_str(&self.read(&include_path).await?)?;
			if included.contains_key("include") {
				return Err(ConfigError::Validation(format!(
					"{} has its own include list; includes do not nest",
					include_path.display()
				)));
			}
			self.claim_sections(&included, &include_path)
				.map_err(ConfigError::Validation)?;
			root.extend(included);
		}

		Config::from_resolved_table(root)
	}

	/// Records `file` as the owner of every section in `table`.
	///
	/// Fails when another file already owns one of them.
	fn claim_sections(&mut self, table: &toml::Table, file: &Path) -> Result<(), String> {
		for section in table.keys() {
			if let Some(owner) = self.owners.get(section) {
				return Err(format!(
					"Duplicate section '{}' found in {} and {}",
					section,
					owner.display(),
					file.display()
				));
			}
			self.owners.insert(section.clone(), file.to_path_buf());
		}
		Ok(())
	}

	async fn read(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await?;
		if !self.visited.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"include cycle: {} already loaded",
				canonical.display()
			)));
		}
		resolve_env_vars(&tokio::fs::read_to_string(&canonical).await?)
	}

	fn locate(&self, path: &Path) -> Result<PathBuf, ConfigError> {
		let candidate = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.root_dir.join(path)
		};
		if candidate.exists() {
			Ok(candidate)
		} else {
			Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("config file {} does not exist", candidate.display()),
			)))
		}
	}
}

/// Reads the `include` key, which may be a single path or a list of paths.
fn include_list(table: &toml::Table) -> Result<Vec<PathBuf>, ConfigError> {
	match table.get("include") {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.iter()
			.map(|item| {
				item.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("include entries must be strings".into())
				})
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"include must be a path or a list of paths".into(),
		)),
	}
}
