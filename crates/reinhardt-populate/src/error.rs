//! Error types for the populate module.
//!
//! Only a small subset of these errors ever escapes [`Populate::run`]:
//! environment refusal, configuration problems, truncation failures and hook
//! failures. Errors raised while materializing an individual fixture are
//! captured as deferral reasons and surface as [`FixtureFailure`] entries in
//! the run report instead.
//!
//! [`Populate::run`]: crate::populate::Populate::run

use std::path::PathBuf;

use thiserror::Error;

use crate::environment::Environment;
use crate::fixtures::FixtureRef;

/// Errors that can occur during populate operations.
#[derive(Debug, Error)]
pub enum PopulateError {
	/// The current environment is not a development or test environment.
	#[error("Populate can only be run in development or test environments (current: {0})")]
	EnvironmentError(Environment),

	/// A fixture references an identifier that has not been materialized yet.
	#[error("Unresolved reference: {0}")]
	UnresolvedReference(FixtureRef),

	/// Record type is not declared in the schema.
	#[error("Unknown record type: {0}")]
	UnknownRecordType(String),

	/// Persistent store operation failed.
	#[error("Store error: {0}")]
	StoreError(String),

	/// Binary payload storage operation failed.
	#[error("Storage error: {0}")]
	StorageError(String),

	/// Error parsing fixture data.
	#[error("Parse error: {0}")]
	ParseError(String),

	/// Validation failed for a specific field.
	#[error("Validation error: {field}: {message}")]
	ValidationError {
		/// Field that failed validation.
		field: String,
		/// Validation error message.
		message: String,
	},

	/// Fixture file not found.
	#[error("Fixture file not found: {0}")]
	FileNotFound(String),

	/// Unsupported file extension.
	#[error("Unsupported file extension: {0}")]
	UnsupportedExtension(String),

	/// Invalid configuration.
	#[error("Configuration error: {0}")]
	ConfigError(String),

	/// A lifecycle hook failed.
	#[error("Hook error: {0}")]
	HookError(String),

	/// I/O operation failed.
	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	JsonError(#[from] serde_json::Error),

	/// YAML deserialization error (when yaml feature is enabled).
	#[cfg(feature = "yaml")]
	#[error("YAML error: {0}")]
	YamlError(#[from] serde_yaml::Error),

	/// TOML configuration error.
	#[error("TOML error: {0}")]
	TomlError(#[from] toml::de::Error),

	/// SQLite driver error (when sqlite feature is enabled).
	#[cfg(feature = "sqlite")]
	#[error("Database error: {0}")]
	SqlxError(#[from] sqlx::Error),
}

/// Result type alias for populate operations.
pub type PopulateResult<T> = Result<T, PopulateError>;

/// A fixture specification that could not be materialized after the retry
/// resolver stalled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureFailure {
	/// Target class of the specification.
	pub class: String,
	/// File-local fixture identifier.
	pub identifier: String,
	/// File the specification was declared in, when known.
	pub source: Option<PathBuf>,
	/// Failure reason from the most recent attempt.
	pub reason: String,
}

impl std::fmt::Display for FixtureFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{}: {}", self.class, self.identifier, self.reason)?;
		if let Some(source) = &self.source {
			write!(f, " ({})", source.display())?;
		}
		Ok(())
	}
}
