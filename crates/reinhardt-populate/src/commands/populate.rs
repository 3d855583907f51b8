//! populate command implementation.
//!
//! This command resets the configured tables and reloads fixture data.

use crate::error::PopulateResult;
use crate::populate::{Populate, PopulateReport, RunContext, RunOutcome};

/// Options for the populate command.
#[derive(Debug, Clone, Default)]
pub struct PopulateOptions {
	/// Run again even if this command already completed a run.
	pub force: bool,

	/// Verbosity level.
	pub verbosity: u8,
}

impl PopulateOptions {
	/// Creates new default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the force flag.
	pub fn with_force(mut self, force: bool) -> Self {
		self.force = force;
		self
	}

	/// Sets verbosity level.
	pub fn with_verbosity(mut self, level: u8) -> Self {
		self.verbosity = level;
		self
	}
}

/// The populate command for resetting a development database.
///
/// The command owns the [`RunContext`] of its orchestrator, so executing it
/// twice only repopulates the second time when forced.
///
/// # Example
///
/// ```ignore
/// let mut command = PopulateCommand::new(populate);
/// let options = PopulateOptions::new().with_verbosity(1);
/// let outcome = command.execute(options).await?;
/// ```
#[derive(Debug)]
pub struct PopulateCommand {
	populate: Populate,
	context: RunContext,
}

impl PopulateCommand {
	/// Creates a new populate command.
	pub fn new(populate: Populate) -> Self {
		Self {
			populate,
			context: RunContext::new(),
		}
	}

	/// Returns the command name.
	pub fn name(&self) -> &str {
		"populate"
	}

	/// Returns the command description.
	pub fn description(&self) -> &str {
		"Truncates configured tables and reloads them from fixtures"
	}

	/// Returns the command help text.
	pub fn help(&self) -> &str {
		r#"
Usage: populate [options]

Truncates the configured tables and reloads them from the configured
fixture files. Refuses to run outside development and test environments.

Options:
  --config, -c PATH    Populate configuration file (default: populate.toml)
  --database URL       Database to populate
  --force              Run even if population already ran
  -v                   Increase verbosity (repeatable)
"#
	}

	/// Returns true once a run completed.
	pub fn has_completed(&self) -> bool {
		self.context.has_completed()
	}

	/// Executes the populate command.
	pub async fn execute(&mut self, options: PopulateOptions) -> PopulateResult<RunOutcome> {
		self.context = self.context.with_force(options.force);
		let outcome = self.populate.run(&mut self.context).await?;

		if options.verbosity > 0 {
			match &outcome {
				RunOutcome::AlreadyRan => println!("Populate already ran, use --force to run again"),
				RunOutcome::Completed(report) => self.print_result(report),
			}
		}

		Ok(outcome)
	}

	/// Prints the run summary.
	fn print_result(&self, report: &PopulateReport) {
		println!("Truncated {} table(s)", report.truncated_tables.len());
		for file in &report.files {
			println!(
				"Processed {}: {} fixture(s), {} deferred",
				file.path.display(),
				file.submitted,
				file.deferred
			);
		}
		println!(
			"Created {} record(s) after {} retry pass(es)",
			report.records_created(),
			report.resolution.passes
		);

		if !report.resolution.failures.is_empty() {
			eprintln!("Failed fixtures:");
			for failure in &report.resolution.failures {
				eprintln!("  - {}", failure);
			}
		}
	}
}
