//! Fixture parsing functionality.
//!
//! This module handles parsing of fixture files in YAML and JSON formats.

use std::path::Path;

use serde_json::Value;

use super::{FieldValue, FixtureFile, FixtureFormat, FixtureSpec};
use crate::error::{PopulateError, PopulateResult};

/// Parser for fixture files.
///
/// Both formats share one shape: a mapping from class name to a mapping from
/// identifier to fields. Declaration order is kept at every level.
#[derive(Debug, Default)]
pub struct FixtureParser;

impl FixtureParser {
	/// Creates a new fixture parser.
	pub fn new() -> Self {
		Self
	}

	/// Parses a fixture file from the given path.
	///
	/// The format is automatically detected from the file extension.
	///
	/// # Errors
	///
	/// Returns an error if:
	/// - The file extension is not recognized
	/// - The file cannot be read
	/// - The file content is invalid
	pub fn parse_file(&self, path: &Path) -> PopulateResult<FixtureFile> {
		let format = FixtureFormat::from_path(path).ok_or_else(|| {
			PopulateError::UnsupportedExtension(
				path.extension()
					.and_then(|e| e.to_str())
					.unwrap_or("(none)")
					.to_string(),
			)
		})?;

		let content = std::fs::read_to_string(path).map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				PopulateError::FileNotFound(path.display().to_string())
			} else {
				PopulateError::IoError(e)
			}
		})?;

		let file = self.parse_str(&content, format).map_err(|e| match e {
			PopulateError::ParseError(message) => {
				PopulateError::ParseError(format!("{}: {}", path.display(), message))
			}
			PopulateError::JsonError(e) => {
				PopulateError::ParseError(format!("{}: {}", path.display(), e))
			}
			#[cfg(feature = "yaml")]
			PopulateError::YamlError(e) => {
				PopulateError::ParseError(format!("{}: {}", path.display(), e))
			}
			other => other,
		})?;
		Ok(file.with_source(path))
	}

	/// Parses fixture data from a string.
	pub fn parse_str(&self, content: &str, format: FixtureFormat) -> PopulateResult<FixtureFile> {
		let value = match format {
			FixtureFormat::Json => serde_json::from_str::<Value>(content)?,
			FixtureFormat::Yaml => self.parse_yaml(content)?,
		};
		self.build(value)
	}

	#[cfg(feature = "yaml")]
	fn parse_yaml(&self, content: &str) -> PopulateResult<Value> {
		// serde_json's preserve_order keeps mapping order through the conversion
		let value: Value = serde_yaml::from_str(content)?;
		Ok(value)
	}

	/// Stub for YAML parsing when the feature is not enabled.
	#[cfg(not(feature = "yaml"))]
	fn parse_yaml(&self, _content: &str) -> PopulateResult<Value> {
		Err(PopulateError::UnsupportedExtension(
			"YAML support requires the 'yaml' feature".to_string(),
		))
	}

	fn build(&self, value: Value) -> PopulateResult<FixtureFile> {
		let classes = match value {
			// An empty document declares nothing
			Value::Null => return Ok(FixtureFile::default()),
			Value::Object(classes) => classes,
			_ => {
				return Err(PopulateError::ParseError(
					"Expected a mapping of class names".to_string(),
				));
			}
		};

		let mut specs = Vec::new();
		for (class, entries) in classes {
			let entries = match entries {
				Value::Null => continue,
				Value::Object(entries) => entries,
				_ => {
					return Err(PopulateError::ValidationError {
						field: class,
						message: "Expected a mapping of fixture identifiers".to_string(),
					});
				}
			};

			for (identifier, fields) in entries {
				let mut spec = FixtureSpec::new(&class, identifier);
				match fields {
					Value::Null => {}
					Value::Object(fields) => {
						for (name, raw) in fields {
							spec.fields.insert(name, FieldValue::from_raw(raw));
						}
					}
					_ => {
						return Err(PopulateError::ValidationError {
							field: spec.key().to_string(),
							message: "Fields must be a mapping".to_string(),
						});
					}
				}
				specs.push(spec);
			}
		}

		Ok(FixtureFile::from_specs(specs))
	}
}
