//! Fixture data structures.
//!
//! A fixture file declares records grouped by class:
//!
//! ```yaml
//! Page:
//!   one:
//!     Title: A
//!   two:
//!     Title: B
//!     ParentID: =>Page.three
//!   three:
//!     Title: C
//! ```
//!
//! String values starting with `=>` reference another fixture by class and
//! identifier.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value;

/// Marker prefix of a fixture reference.
pub const REFERENCE_PREFIX: &str = "=>";

/// Supported fixture file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixtureFormat {
	/// YAML format (default, requires `yaml` feature).
	#[default]
	Yaml,

	/// JSON format.
	Json,
}

impl FixtureFormat {
	/// Determines the fixture format from a file extension.
	///
	/// # Example
	///
	/// ```
	/// # use reinhardt_populate::fixtures::FixtureFormat;
	/// assert_eq!(FixtureFormat::from_extension("yml"), Some(FixtureFormat::Yaml));
	/// assert_eq!(FixtureFormat::from_extension("JSON"), Some(FixtureFormat::Json));
	/// assert_eq!(FixtureFormat::from_extension("xml"), None);
	/// ```
	pub fn from_extension(ext: &str) -> Option<Self> {
		match ext.to_lowercase().as_str() {
			"json" => Some(Self::Json),
			"yaml" | "yml" => Some(Self::Yaml),
			_ => None,
		}
	}

	/// Determines the fixture format from a file path.
	pub fn from_path(path: &Path) -> Option<Self> {
		path.extension()
			.and_then(|ext| ext.to_str())
			.and_then(Self::from_extension)
	}
}

impl std::fmt::Display for FixtureFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Json => write!(f, "JSON"),
			Self::Yaml => write!(f, "YAML"),
		}
	}
}

/// Reference to another fixture specification by class and identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FixtureRef {
	/// Target class name.
	pub class: String,
	/// Fixture identifier within that class.
	pub identifier: String,
}

impl FixtureRef {
	/// Creates a reference.
	pub fn new(class: impl Into<String>, identifier: impl Into<String>) -> Self {
		Self {
			class: class.into(),
			identifier: identifier.into(),
		}
	}

	/// Parses a `=>Class.identifier` token.
	///
	/// Returns `None` if the token does not carry the reference prefix or is
	/// missing either part.
	///
	/// # Example
	///
	/// ```
	/// # use reinhardt_populate::fixtures::FixtureRef;
	/// let reference = FixtureRef::parse("=>Page.three").unwrap();
	/// assert_eq!(reference.class, "Page");
	/// assert_eq!(reference.identifier, "three");
	/// assert!(FixtureRef::parse("Page.three").is_none());
	/// ```
	pub fn parse(token: &str) -> Option<Self> {
		let body = token.trim().strip_prefix(REFERENCE_PREFIX)?;
		let (class, identifier) = body.trim().split_once('.')?;
		if class.is_empty() || identifier.is_empty() {
			return None;
		}
		Some(Self::new(class, identifier))
	}

	/// Returns the key this reference resolves through.
	pub fn key(&self) -> FixtureKey {
		FixtureKey::new(&self.class, &self.identifier)
	}
}

impl std::fmt::Display for FixtureRef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}{}.{}", REFERENCE_PREFIX, self.class, self.identifier)
	}
}

/// Identity of a fixture specification: class plus file-local identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixtureKey {
	/// Target class name.
	pub class: String,
	/// Fixture identifier.
	pub identifier: String,
}

impl FixtureKey {
	/// Creates a key.
	pub fn new(class: impl Into<String>, identifier: impl Into<String>) -> Self {
		Self {
			class: class.into(),
			identifier: identifier.into(),
		}
	}
}

impl std::fmt::Display for FixtureKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{}", self.class, self.identifier)
	}
}

/// Value of a single fixture field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
	/// Literal value written as-is.
	Scalar(Value),
	/// Reference resolved to the generated identifier of another record.
	Reference(FixtureRef),
	/// References resolved to a list of generated identifiers.
	References(Vec<FixtureRef>),
}

impl FieldValue {
	/// Classifies a raw fixture value.
	///
	/// Strings holding one or more comma-separated `=>` tokens, and sequences
	/// made up entirely of such strings, become references.
	pub fn from_raw(value: Value) -> Self {
		match value {
			Value::String(s) if s.trim_start().starts_with(REFERENCE_PREFIX) => {
				let parsed: Option<Vec<_>> = s.split(',').map(FixtureRef::parse).collect();
				match parsed {
					Some(mut refs) if refs.len() == 1 => Self::Reference(refs.remove(0)),
					Some(refs) => Self::References(refs),
					None => Self::Scalar(Value::String(s)),
				}
			}
			Value::Array(items)
				if !items.is_empty()
					&& items.iter().all(|item| {
						item.as_str()
							.map(|s| s.trim_start().starts_with(REFERENCE_PREFIX))
							.unwrap_or(false)
					}) =>
			{
				let parsed: Option<Vec<_>> = items
					.iter()
					.filter_map(Value::as_str)
					.map(FixtureRef::parse)
					.collect();
				match parsed {
					Some(refs) => Self::References(refs),
					None => Self::Scalar(Value::Array(items)),
				}
			}
			other => Self::Scalar(other),
		}
	}

	/// Returns every reference held by this value.
	pub fn references(&self) -> Vec<&FixtureRef> {
		match self {
			Self::Scalar(_) => Vec::new(),
			Self::Reference(r) => vec![r],
			Self::References(refs) => refs.iter().collect(),
		}
	}
}

/// Declarative description of one record to create.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureSpec {
	/// Target class name.
	pub class: String,
	/// Identifier, unique per class within its defining file.
	pub identifier: String,
	/// Field values in declaration order.
	pub fields: IndexMap<String, FieldValue>,
	/// File the specification was declared in.
	pub source: Option<PathBuf>,
}

impl FixtureSpec {
	/// Creates a specification without fields.
	pub fn new(class: impl Into<String>, identifier: impl Into<String>) -> Self {
		Self {
			class: class.into(),
			identifier: identifier.into(),
			fields: IndexMap::new(),
			source: None,
		}
	}

	/// Adds a field, classifying the raw value.
	pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.fields
			.insert(name.into(), FieldValue::from_raw(value.into()));
		self
	}

	/// Records the defining file.
	pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
		self.source = Some(source.into());
		self
	}

	/// Returns the identity of this specification.
	pub fn key(&self) -> FixtureKey {
		FixtureKey::new(&self.class, &self.identifier)
	}

	/// Returns every reference held by the specification's fields.
	pub fn references(&self) -> Vec<&FixtureRef> {
		self.fields.values().flat_map(FieldValue::references).collect()
	}
}

/// Parsed fixture file: specifications in declaration order.
#[derive(Debug, Clone, Default)]
pub struct FixtureFile {
	/// Specifications grouped by class, in file order.
	pub specs: Vec<FixtureSpec>,
	/// Optional source file path.
	pub source: Option<PathBuf>,
}

impl FixtureFile {
	/// Creates fixture data from a vector of specifications.
	pub fn from_specs(specs: Vec<FixtureSpec>) -> Self {
		Self { specs, source: None }
	}

	/// Sets the source path on the file and every specification.
	pub fn with_source(mut self, source: &Path) -> Self {
		for spec in &mut self.specs {
			spec.source = Some(source.to_path_buf());
		}
		self.source = Some(source.to_path_buf());
		self
	}

	/// Returns the number of specifications.
	pub fn len(&self) -> usize {
		self.specs.len()
	}

	/// Returns true if the file declares nothing.
	pub fn is_empty(&self) -> bool {
		self.specs.is_empty()
	}

	/// Returns the distinct classes in declaration order.
	pub fn classes(&self) -> Vec<&str> {
		let mut classes: Vec<&str> = Vec::new();
		for spec in &self.specs {
			if !classes.contains(&spec.class.as_str()) {
				classes.push(&spec.class);
			}
		}
		classes
	}
}

impl IntoIterator for FixtureFile {
	type Item = FixtureSpec;
	type IntoIter = std::vec::IntoIter<FixtureSpec>;

	fn into_iter(self) -> Self::IntoIter {
		self.specs.into_iter()
	}
}
