//! Populate configuration.
//!
//! Configuration is static: the fixture files to load, the classes to
//! truncate and, optionally, declarative record type descriptions.
//!
//! ```toml
//! database_url = "sqlite://dev.db"
//! include_yaml_fixtures = ["fixtures/pages.yml"]
//! truncate_objects = ["Page", "File"]
//!
//! [record_types.SiteTree]
//! stages = ["Stage", "Live"]
//! fields = ["Title", "ParentID"]
//!
//! [record_types.Page]
//! parent = "SiteTree"
//!
//! [record_types.File]
//! file_storage = "assets"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{PopulateError, PopulateResult};
use crate::schema::{RecordType, Schema, Versioning};
use crate::storage::LocalFileStorage;

/// Declarative description of a record type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordTypeConfig {
	/// Physical table name, defaults to the class name.
	pub table: Option<String>,
	/// Parent class sharing this class's records.
	pub parent: Option<String>,
	/// Columns owned by this class's table.
	pub fields: Vec<String>,
	/// Versioned stages, draft stage first.
	pub stages: Option<Vec<String>>,
	/// Directory holding binary payloads.
	pub file_storage: Option<PathBuf>,
	/// Column holding the payload path.
	pub filename_column: Option<String>,
}

impl RecordTypeConfig {
	fn to_record_type(&self, name: &str) -> PopulateResult<RecordType> {
		let mut record_type = RecordType::new(name).with_fields(self.fields.iter().cloned());
		if let Some(table) = &self.table {
			record_type = record_type.with_table(table);
		}
		if let Some(parent) = &self.parent {
			record_type = record_type.with_parent(parent);
		}
		if let Some(stages) = &self.stages {
			if stages.is_empty() {
				return Err(PopulateError::ConfigError(format!(
					"Record type '{}' declares an empty stage list",
					name
				)));
			}
			record_type = record_type.versioned(Versioning::new(stages.iter().cloned()));
		}
		if let Some(root) = &self.file_storage {
			let mut storage = LocalFileStorage::new(root);
			if let Some(column) = &self.filename_column {
				storage = storage.with_column(column);
			}
			record_type = record_type.with_file_storage(Arc::new(storage));
		}
		Ok(record_type)
	}
}

/// Configuration of a populate run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PopulateConfig {
	/// Database to populate, overridden by the command line.
	pub database_url: Option<String>,
	/// Fixture files to load, in order.
	pub include_yaml_fixtures: Vec<PathBuf>,
	/// Logical classes to truncate before loading, in order.
	pub truncate_objects: Vec<String>,
	/// Record type declarations keyed by class name.
	pub record_types: IndexMap<String, RecordTypeConfig>,
}

impl PopulateConfig {
	/// Creates an empty configuration.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses a configuration from TOML text.
	pub fn from_toml_str(content: &str) -> PopulateResult<Self> {
		Ok(toml::from_str(content)?)
	}

	/// Loads a configuration file.
	///
	/// Relative fixture and storage paths are resolved against the directory
	/// containing the file.
	pub fn from_file(path: impl AsRef<Path>) -> PopulateResult<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				PopulateError::FileNotFound(path.display().to_string())
			} else {
				PopulateError::IoError(e)
			}
		})?;

		let mut config = Self::from_toml_str(&content).map_err(|e| {
			PopulateError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
		})?;
		if let Some(base) = path.parent() {
			config.resolve_paths(base);
		}
		Ok(config)
	}

	/// Resolves relative paths against `base`.
	pub fn resolve_paths(&mut self, base: &Path) {
		for fixture in &mut self.include_yaml_fixtures {
			if fixture.is_relative() {
				*fixture = base.join(&*fixture);
			}
		}
		for record_type in self.record_types.values_mut() {
			if let Some(root) = &mut record_type.file_storage
				&& root.is_relative()
			{
				*root = base.join(&*root);
			}
		}
	}

	/// Appends a fixture file.
	pub fn with_fixture(mut self, path: impl Into<PathBuf>) -> Self {
		self.include_yaml_fixtures.push(path.into());
		self
	}

	/// Appends a class to truncate.
	pub fn with_truncate(mut self, class: impl Into<String>) -> Self {
		self.truncate_objects.push(class.into());
		self
	}

	/// Declares a record type.
	pub fn with_record_type(mut self, name: impl Into<String>, record_type: RecordTypeConfig) -> Self {
		self.record_types.insert(name.into(), record_type);
		self
	}

	/// Builds the schema described by `record_types`.
	///
	/// # Errors
	///
	/// Fails if a declaration is invalid or the hierarchy does not validate.
	pub fn schema(&self) -> PopulateResult<Schema> {
		let mut schema = Schema::new();
		for (name, record_type) in &self.record_types {
			schema.register(record_type.to_record_type(name)?);
		}
		schema.validate()?;
		Ok(schema)
	}
}
