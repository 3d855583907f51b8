//! Development database reset and fixture population for the Reinhardt framework.
//!
//! This crate clears a configured set of tables and repopulates them from
//! declarative fixture files:
//!
//! - **Truncation**: clears each configured class, its versioned stage and
//!   history tables, and every table shared through class inheritance
//! - **Fixtures**: YAML or JSON files mapping class → identifier → fields,
//!   where `=>Class.identifier` references another fixture
//! - **Deferred resolution**: fixtures referencing records that do not exist
//!   yet are retried until they succeed or stop making progress
//! - **Environment guard**: refuses to run outside development and test
//!
//! # Features
//!
//! - `yaml` - YAML fixture format support (enabled by default)
//! - `sqlite` - SQLite store backed by sqlx (enabled by default)
//! - `cli` - `populate` command line binary (enabled by default)
//! - `full` - All features enabled
//!
//! # Quick Start
//!
//! Create a fixture file (`fixtures/pages.yml`):
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
//! Run the populate sequence:
//!
//! ```ignore
//! use std::sync::Arc;
//! use reinhardt_populate::prelude::*;
//!
//! let config = PopulateConfig::new()
//!     .with_truncate("Page")
//!     .with_fixture("fixtures/pages.yml");
//! let populate = Populate::builder(config)
//!     .schema(Schema::new().with(RecordType::new("Page")))
//!     .store(Arc::new(SqliteStore::connect("sqlite://dev.db").await?))
//!     .build()?;
//!
//! let outcome = populate.run(&mut RunContext::new()).await?;
//! ```
//!
//! # Architecture
//!
//! - [`Populate`](populate::Populate) - Orchestrates a run
//! - [`TableTruncator`](truncate::TableTruncator) - Clears physical tables of a class
//! - [`FixtureParser`](fixtures::FixtureParser) - Parses fixture files
//! - [`RecordFactory`](factory::RecordFactory) - Writes fixtures, deferring failures
//! - [`RetryResolver`](resolver::RetryResolver) - Retries deferred fixtures
//! - [`Store`](store::Store) - Row-level access to the database
//! - [`PopulateHook`](hooks::PopulateHook) - Runs after population

#![warn(missing_docs)]

pub mod commands;
pub mod config;
pub mod environment;
pub mod error;
pub mod factory;
pub mod fixtures;
pub mod hooks;
pub mod populate;
pub mod prelude;
pub mod resolver;
pub mod schema;
pub mod storage;
pub mod store;
pub mod truncate;

pub use config::PopulateConfig;
pub use environment::Environment;
pub use error::{FixtureFailure, PopulateError, PopulateResult};
pub use populate::{Populate, PopulateReport, RunContext, RunOutcome};
