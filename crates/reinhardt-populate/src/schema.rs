//! Record type descriptions.
//!
//! A [`Schema`] maps logical class names to their physical tables and records
//! which optional capabilities each class opts into. Capabilities are
//! declared up front rather than discovered while a run is in progress.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::error::{PopulateError, PopulateResult};
use crate::storage::FileStorage;

/// Suffix of the history table kept for versioned record types.
pub const VERSIONS_SUFFIX: &str = "Versions";

/// Versioning capability of a record type.
///
/// The first stage is the draft stage and lives in the base table. Every
/// other stage `S` is stored in `<table>_S`; history rows go to
/// `<table>_Versions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioning {
	stages: Vec<String>,
}

impl Versioning {
	/// Creates a versioning capability with the given ordered stages.
	pub fn new<I, S>(stages: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut unique = IndexSet::new();
		for stage in stages {
			unique.insert(stage.into());
		}
		Self {
			stages: unique.into_iter().collect(),
		}
	}

	/// Returns the ordered set of stage names.
	pub fn list_stages(&self) -> &[String] {
		&self.stages
	}

	/// Returns the stages stored outside the base table.
	pub fn published_stages(&self) -> impl Iterator<Item = &str> {
		self.stages.iter().skip(1).map(String::as_str)
	}
}

impl Default for Versioning {
	fn default() -> Self {
		Self::new(["Stage", "Live"])
	}
}

/// Description of a logical record class.
#[derive(Debug, Clone)]
pub struct RecordType {
	name: String,
	table: String,
	parent: Option<String>,
	fields: Vec<String>,
	versioning: Option<Versioning>,
	file_storage: Option<Arc<dyn FileStorage>>,
}

impl RecordType {
	/// Creates a record type stored in a table of the same name.
	pub fn new(name: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			table: name.clone(),
			name,
			parent: None,
			fields: Vec::new(),
			versioning: None,
			file_storage: None,
		}
	}

	/// Stores the record type in a differently named table.
	pub fn with_table(mut self, table: impl Into<String>) -> Self {
		self.table = table.into();
		self
	}

	/// Declares the parent class sharing this class's records.
	pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
		self.parent = Some(parent.into());
		self
	}

	/// Declares the columns owned by this class's table.
	pub fn with_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.fields = fields.into_iter().map(Into::into).collect();
		self
	}

	/// Opts into the versioning capability.
	pub fn versioned(mut self, versioning: Versioning) -> Self {
		self.versioning = Some(versioning);
		self
	}

	/// Opts into the file storage capability.
	pub fn with_file_storage(mut self, storage: Arc<dyn FileStorage>) -> Self {
		self.file_storage = Some(storage);
		self
	}

	/// Logical class name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Physical table name.
	pub fn table(&self) -> &str {
		&self.table
	}

	/// Parent class name.
	pub fn parent(&self) -> Option<&str> {
		self.parent.as_deref()
	}

	/// Columns owned by this class's table.
	pub fn fields(&self) -> &[String] {
		&self.fields
	}

	/// Returns true if the column is declared on this class's table.
	pub fn owns_field(&self, field: &str) -> bool {
		self.fields.iter().any(|f| f == field)
	}

	/// Versioning capability, if any.
	pub fn versioning(&self) -> Option<&Versioning> {
		self.versioning.as_ref()
	}

	/// File storage capability, if any.
	pub fn file_storage(&self) -> Option<&Arc<dyn FileStorage>> {
		self.file_storage.as_ref()
	}
}

/// Registry of record types keyed by logical class name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
	types: IndexMap<String, RecordType>,
}

impl Schema {
	/// Creates an empty schema.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a record type, replacing any previous type of the same name.
	pub fn register(&mut self, record_type: RecordType) {
		self.types
			.insert(record_type.name().to_string(), record_type);
	}

	/// Builder-style variant of [`register`](Self::register).
	pub fn with(mut self, record_type: RecordType) -> Self {
		self.register(record_type);
		self
	}

	/// Looks up a record type.
	pub fn get(&self, class: &str) -> Option<&RecordType> {
		self.types.get(class)
	}

	/// Returns true if the class is declared.
	pub fn contains(&self, class: &str) -> bool {
		self.types.contains_key(class)
	}

	/// Iterates over all record types in registration order.
	pub fn iter(&self) -> impl Iterator<Item = &RecordType> {
		self.types.values()
	}

	/// Resolves a logical class name to its physical table name.
	pub fn resolve_physical_name(&self, class: &str) -> Option<&str> {
		self.get(class).map(RecordType::table)
	}

	/// Returns the class's ancestors, root first, followed by the class itself.
	///
	/// # Errors
	///
	/// Fails if the class or one of its ancestors is not declared, or if the
	/// parent chain loops.
	pub fn hierarchy(&self, class: &str) -> PopulateResult<Vec<&RecordType>> {
		let mut chain = Vec::new();
		let mut seen = IndexSet::new();
		let mut current = Some(class);

		while let Some(name) = current {
			if !seen.insert(name) {
				return Err(PopulateError::ConfigError(format!(
					"Record type hierarchy of '{}' contains a cycle",
					class
				)));
			}
			let record_type = self
				.get(name)
				.ok_or_else(|| PopulateError::UnknownRecordType(name.to_string()))?;
			chain.push(record_type);
			current = record_type.parent();
		}

		chain.reverse();
		Ok(chain)
	}

	/// Returns the versioning capability of `class`, inherited from the nearest
	/// ancestor that declares one.
	pub fn versioning_of(&self, class: &str) -> Option<&Versioning> {
		let hierarchy = self.hierarchy(class).ok()?;
		hierarchy.iter().rev().find_map(|t| t.versioning())
	}

	/// Returns the file storage capability of `class`, inherited from the
	/// nearest ancestor that declares one.
	pub fn file_storage_of(&self, class: &str) -> Option<&Arc<dyn FileStorage>> {
		let hierarchy = self.hierarchy(class).ok()?;
		hierarchy.iter().rev().find_map(|t| t.file_storage())
	}

	/// Returns the table a record of `class` writes `field` to.
	///
	/// That is the table of the nearest class in the hierarchy declaring the
	/// field, or the class's own table when no class declares it.
	pub fn table_for_field(&self, class: &str, field: &str) -> Option<&str> {
		let hierarchy = self.hierarchy(class).ok()?;
		hierarchy
			.iter()
			.copied()
			.find(|t| t.owns_field(field))
			.or(hierarchy.last().copied())
			.map(RecordType::table)
	}

	/// Returns every class that inherits from `class`, directly or indirectly.
	pub fn descendants(&self, class: &str) -> Vec<&RecordType> {
		let mut found: IndexSet<&str> = IndexSet::new();
		let mut frontier = vec![class];

		while let Some(parent) = frontier.pop() {
			for record_type in self.types.values() {
				if record_type.parent() == Some(parent) && found.insert(record_type.name()) {
					frontier.push(record_type.name());
				}
			}
		}

		// Keep registration order regardless of traversal order
		self.types
			.values()
			.filter(|t| found.contains(t.name()))
			.collect()
	}

	/// Returns every class whose table backs records of `class`.
	///
	/// That is the class's ancestors (root first), the class, and all of its
	/// descendants. Unknown classes have no data classes.
	pub fn data_classes_for(&self, class: &str) -> Vec<&RecordType> {
		let mut classes = self.hierarchy(class).unwrap_or_default();
		if classes.is_empty() {
			return classes;
		}
		classes.extend(self.descendants(class));
		classes
	}

	/// Checks that every parent is declared and that no hierarchy loops.
	pub fn validate(&self) -> PopulateResult<()> {
		for record_type in self.types.values() {
			if let Some(parent) = record_type.parent()
				&& !self.contains(parent)
			{
				return Err(PopulateError::ConfigError(format!(
					"Record type '{}' declares unknown parent '{}'",
					record_type.name(),
					parent
				)));
			}
			self.hierarchy(record_type.name())?;
		}
		Ok(())
	}
}
