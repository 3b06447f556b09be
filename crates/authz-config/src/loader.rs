//! Multi-file configuration loading.
//!
//! A root file may pull sections from other files through `include`. Included
//! files do not themselves follow includes, and each top-level section has a
//! single owning file.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub(crate) struct ConfigLoader {
	base_path: PathBuf,
	loaded_files: HashSet<PathBuf>,
	/// Owning file of every top-level section seen so far.
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub(crate) fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	pub(crate) async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let root_path = self.resolve_path(config_path)?;
		let root_content = self.load_file(&root_path).await?;
		let mut root: toml::Value = toml::from_str(&root_content)?;

		let includes = extract_includes(&root)?;
		if includes.is_empty() {
			return root_content.parse();
		}

		if let Some(table) = root.as_table_mut() {
			table.remove("include");
			for section in table.keys() {
				self.section_sources.insert(section.clone(), root_path.clone());
			}
		}

		for include in includes {
			let path = self.resolve_path(&include)?;
			let content = self.load_file(&path).await?;
			let included: toml::Value = toml::from_str(&content)?;
			self.merge(&mut root, included, &path)?;
		}

		let combined = toml::to_string(&root).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		combined.parse()
	}

	fn merge(
		&mut self,
		root: &mut toml::Value,
		included: toml::Value,
		source: &Path,
	) -> Result<(), ConfigError> {
		let toml::Value::Table(included) = included else {
			return Ok(());
		};
		let Some(root) = root.as_table_mut() else {
			return Err(ConfigError::Parse("Root configuration is not a table".into()));
		};

		for (section, value) in included {
			if let Some(existing) = self.section_sources.get(&section) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					section,
					existing.display(),
					source.display()
				)));
			}
			self.section_sources.insert(section.clone(), source.to_path_buf());
			root.insert(section, value);
		}
		Ok(())
	}

	/// Reads a file once per load and resolves environment variables in it.
	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}
		Ok(resolved)
	}
}

fn extract_includes(toml: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match toml.get("include") {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.iter()
			.map(|item| {
				item.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("Include array must contain only strings".into())
				})
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}
