//! Execution environment designation.
//!
//! Populating truncates tables, so it is refused everywhere except in
//! development and test environments. The designation is read from the
//! `REINHARDT_ENV` variable; an unset or unrecognized value counts as
//! production.

use std::str::FromStr;

use crate::error::{PopulateError, PopulateResult};

/// Environment variable holding the environment designation.
pub const ENVIRONMENT_VAR: &str = "REINHARDT_ENV";

/// Designation of the environment the process runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
	/// Local development.
	Development,
	/// Automated test runs.
	Test,
	/// Pre-production staging.
	Staging,
	/// Live production (default when undetermined).
	#[default]
	Production,
}

impl Environment {
	/// Detects the environment from [`ENVIRONMENT_VAR`].
	///
	/// Missing or unrecognized values resolve to [`Environment::Production`].
	pub fn detect() -> Self {
		std::env::var(ENVIRONMENT_VAR)
			.ok()
			.and_then(|value| value.parse().ok())
			.unwrap_or_default()
	}

	/// Returns true for development and test environments.
	pub fn allows_populate(&self) -> bool {
		matches!(self, Self::Development | Self::Test)
	}

	/// Fails with [`PopulateError::EnvironmentError`] unless populating is allowed.
	pub fn ensure_populate_allowed(&self) -> PopulateResult<()> {
		if self.allows_populate() {
			Ok(())
		} else {
			Err(PopulateError::EnvironmentError(*self))
		}
	}

	/// Returns the canonical lowercase name.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Development => "development",
			Self::Test => "test",
			Self::Staging => "staging",
			Self::Production => "production",
		}
	}
}

impl FromStr for Environment {
	type Err = PopulateError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"development" | "dev" => Ok(Self::Development),
			"test" | "testing" => Ok(Self::Test),
			"staging" => Ok(Self::Staging),
			"production" | "prod" | "live" => Ok(Self::Production),
			other => Err(PopulateError::ConfigError(format!(
				"Unknown environment designation '{}'",
				other
			))),
		}
	}
}

impl std::fmt::Display for Environment {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
