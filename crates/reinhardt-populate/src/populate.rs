//! Reset-and-repopulate orchestration.
//!
//! A run goes through these steps strictly in order:
//!
//! 1. Environment check, before any store access
//! 2. Truncation of every configured class, in configured order
//! 3. Loading of every configured fixture file, in configured order
//! 4. Retry passes over deferred fixtures until they converge or stall
//! 5. The after-populate lifecycle hook

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::PopulateConfig;
use crate::environment::Environment;
use crate::error::{PopulateError, PopulateResult};
use crate::factory::RecordFactory;
use crate::fixtures::FixtureParser;
use crate::hooks::{NoopHook, PopulateHook};
use crate::resolver::{ResolutionReport, RetryResolver};
use crate::schema::Schema;
use crate::store::Store;
use crate::truncate::TableTruncator;

/// Caller-owned record of whether a run already happened.
///
/// A completed context turns later runs into no-ops unless it is forced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunContext {
	force: bool,
	completed: bool,
}

impl RunContext {
	/// Creates a context that has not run yet.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a context whose runs always execute.
	pub fn forced() -> Self {
		Self::new().with_force(true)
	}

	/// Sets the force flag.
	pub fn with_force(mut self, force: bool) -> Self {
		self.force = force;
		self
	}

	/// Returns the force flag.
	pub fn force(&self) -> bool {
		self.force
	}

	/// Returns true once a run completed with this context.
	pub fn has_completed(&self) -> bool {
		self.completed
	}
}

/// Loading statistics of a single fixture file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
	/// Fixture file path.
	pub path: PathBuf,
	/// Number of specifications read from the file.
	pub submitted: usize,
	/// Number of specifications deferred on the first pass.
	pub deferred: usize,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateReport {
	/// Environment the run executed in.
	pub environment: Environment,
	/// Existing tables that were cleared, in clearing order.
	pub truncated_tables: Vec<String>,
	/// Per-file first-pass statistics, in load order.
	pub files: Vec<FileReport>,
	/// Outcome of the retry passes.
	pub resolution: ResolutionReport,
}

impl PopulateReport {
	/// Returns the number of records created across all passes.
	pub fn records_created(&self) -> usize {
		let first_pass: usize = self.files.iter().map(|f| f.submitted - f.deferred).sum();
		first_pass + self.resolution.resolved
	}

	/// Returns true if every fixture was materialized.
	pub fn is_complete(&self) -> bool {
		self.resolution.is_complete()
	}
}

/// Outcome of [`Populate::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
	/// The context had already completed a run and was not forced.
	AlreadyRan,
	/// The full sequence executed.
	Completed(PopulateReport),
}

impl RunOutcome {
	/// Returns the report of a completed run.
	pub fn report(&self) -> Option<&PopulateReport> {
		match self {
			Self::AlreadyRan => None,
			Self::Completed(report) => Some(report),
		}
	}
}

/// Builder for [`Populate`].
pub struct PopulateBuilder {
	config: PopulateConfig,
	schema: Option<Schema>,
	store: Option<Arc<dyn Store>>,
	environment: Option<Environment>,
	hook: Option<Arc<dyn PopulateHook>>,
}

impl PopulateBuilder {
	/// Uses an explicit schema instead of the configured record types.
	pub fn schema(mut self, schema: Schema) -> Self {
		self.schema = Some(schema);
		self
	}

	/// Sets the store to populate.
	pub fn store(mut self, store: Arc<dyn Store>) -> Self {
		self.store = Some(store);
		self
	}

	/// Fixes the environment instead of detecting it for each run.
	pub fn environment(mut self, environment: Environment) -> Self {
		self.environment = Some(environment);
		self
	}

	/// Sets the after-populate hook.
	pub fn hook(mut self, hook: Arc<dyn PopulateHook>) -> Self {
		self.hook = Some(hook);
		self
	}

	/// Builds the orchestrator.
	///
	/// # Errors
	///
	/// Fails if no store was given or if the configured record types are
	/// invalid.
	pub fn build(self) -> PopulateResult<Populate> {
		let store = self
			.store
			.ok_or_else(|| PopulateError::ConfigError("No store configured".to_string()))?;
		let schema = match self.schema {
			Some(schema) => {
				schema.validate()?;
				schema
			}
			None => self.config.schema()?,
		};

		Ok(Populate {
			config: self.config,
			schema: Arc::new(schema),
			store,
			environment: self.environment,
			hook: self.hook.unwrap_or_else(|| Arc::new(NoopHook)),
		})
	}
}

/// Resets a development database and repopulates it from fixtures.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use reinhardt_populate::prelude::*;
///
/// # async fn example() -> PopulateResult<()> {
/// let config = PopulateConfig::from_file("populate.toml")?;
/// let store = SqliteStore::connect("sqlite://dev.db").await?;
/// let populate = Populate::builder(config).store(Arc::new(store)).build()?;
///
/// let mut context = RunContext::new();
/// if let RunOutcome::Completed(report) = populate.run(&mut context).await? {
///     println!("Created {} records", report.records_created());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Populate {
	config: PopulateConfig,
	schema: Arc<Schema>,
	store: Arc<dyn Store>,
	environment: Option<Environment>,
	hook: Arc<dyn PopulateHook>,
}

impl Populate {
	/// Starts building an orchestrator for `config`.
	pub fn builder(config: PopulateConfig) -> PopulateBuilder {
		PopulateBuilder {
			config,
			schema: None,
			store: None,
			environment: None,
			hook: None,
		}
	}

	/// Returns the configuration.
	pub fn config(&self) -> &PopulateConfig {
		&self.config
	}

	/// Returns the schema.
	pub fn schema(&self) -> &Schema {
		&self.schema
	}

	/// Returns the environment a run would execute in.
	pub fn environment(&self) -> Environment {
		self.environment.unwrap_or_else(Environment::detect)
	}

	/// Runs the full reset-and-repopulate sequence.
	///
	/// # Errors
	///
	/// - [`PopulateError::EnvironmentError`] outside development and test,
	///   before anything is touched
	/// - [`PopulateError::FileNotFound`] if a fixture file is missing, before
	///   anything is truncated
	/// - store failures during truncation, fixture parse failures and hook
	///   failures
	///
	/// Fixtures that cannot be created are reported, not raised.
	pub async fn run(&self, context: &mut RunContext) -> PopulateResult<RunOutcome> {
		let environment = self.environment();
		environment.ensure_populate_allowed()?;

		if context.completed && !context.force {
			tracing::debug!("Populate already ran in this context, skipping");
			return Ok(RunOutcome::AlreadyRan);
		}

		for path in &self.config.include_yaml_fixtures {
			if !path.exists() {
				return Err(PopulateError::FileNotFound(path.display().to_string()));
			}
		}

		let truncated_tables = self.truncate_all().await?;

		let mut factory = RecordFactory::new(self.schema.clone(), self.store.clone());
		let files = self.load_all(&mut factory).await?;

		tracing::info!(pending = factory.pending().len(), "Processing failed fixtures");
		let resolution = RetryResolver::new().resolve(&mut factory).await;

		self.hook.on_after_populate_records().await?;
		context.completed = true;

		let report = PopulateReport {
			environment,
			truncated_tables,
			files,
			resolution,
		};
		tracing::info!(
			created = report.records_created(),
			failed = report.resolution.failures.len(),
			"Populate finished"
		);
		Ok(RunOutcome::Completed(report))
	}

	async fn truncate_all(&self) -> PopulateResult<Vec<String>> {
		let truncator = TableTruncator::new(self.schema.clone(), self.store.clone());
		let mut truncated = Vec::new();
		for class in &self.config.truncate_objects {
			truncated.extend(truncator.truncate(class).await?);
		}
		Ok(truncated)
	}

	async fn load_all(&self, factory: &mut RecordFactory) -> PopulateResult<Vec<FileReport>> {
		let parser = FixtureParser::new();
		let mut reports = Vec::with_capacity(self.config.include_yaml_fixtures.len());

		for path in &self.config.include_yaml_fixtures {
			let file = parser.parse_file(path)?;
			tracing::info!(
				path = %path.display(),
				classes = ?file.classes(),
				"Processing fixture file"
			);
			let submitted = file.len();
			let mut deferred = 0;
			for spec in file {
				if !factory.submit(spec).await.is_resolved() {
					deferred += 1;
				}
			}
			reports.push(FileReport {
				path: path.clone(),
				submitted,
				deferred,
			});
		}
		Ok(reports)
	}
}

impl std::fmt::Debug for Populate {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Populate")
			.field("config", &self.config)
			.field("schema", &self.schema)
			.field("environment", &self.environment)
			.finish_non_exhaustive()
	}
}
