//! Convenience re-exports for common usage.
//!
//! This module provides a single import for the most commonly used items
//! from the reinhardt-populate crate.
//!
//! # Example
//!
//! ```ignore
//! use reinhardt_populate::prelude::*;
//! ```

// Error types
pub use crate::error::{FixtureFailure, PopulateError, PopulateResult};

// Configuration
pub use crate::config::{PopulateConfig, RecordTypeConfig};
pub use crate::environment::Environment;

// Schema and storage
pub use crate::schema::{RecordType, Schema, Versioning};
pub use crate::storage::{FileStorage, LocalFileStorage};
pub use crate::store::{InMemoryStore, RecordId, Row, Store, StoredRecord};
#[cfg(feature = "sqlite")]
pub use crate::store::SqliteStore;

// Fixture types
pub use crate::fixtures::{FieldValue, FixtureFile, FixtureFormat, FixtureParser, FixtureRef, FixtureSpec};

// Population
pub use crate::factory::{PendingKey, PendingSet, RecordFactory, Submission};
pub use crate::hooks::PopulateHook;
pub use crate::populate::{FileReport, Populate, PopulateReport, RunContext, RunOutcome};
pub use crate::resolver::{ResolutionReport, ResolverState, RetryResolver};
pub use crate::truncate::TableTruncator;

// Command types
pub use crate::commands::{PopulateCommand, PopulateOptions};
