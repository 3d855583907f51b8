//! Reinhardt Populate CLI
//!
//! Resets a development database and reloads it from fixtures.
//!
//! ## Usage
//!
//! ```bash
//! REINHARDT_ENV=development populate --config populate.toml --database sqlite://dev.db
//! populate --force -vv
//! ```

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use reinhardt_populate::commands::{PopulateCommand, PopulateOptions};
use reinhardt_populate::store::SqliteStore;
use reinhardt_populate::{Populate, PopulateConfig, PopulateError, PopulateResult};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "populate")]
#[command(about = "Reset a development database and reload it from fixtures", long_about = None)]
#[command(version)]
struct Cli {
	/// Populate configuration file
	#[arg(short, long, value_name = "PATH", default_value = "populate.toml")]
	config: PathBuf,

	/// Database URL, overrides `database_url` from the configuration
	#[arg(long, value_name = "URL")]
	database: Option<String>,

	/// Run even if population already ran
	#[arg(long)]
	force: bool,

	/// Verbosity level (can be repeated)
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbosity: u8,
}

fn init_tracing(verbosity: u8) {
	let default = match verbosity {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	};
	tracing_subscriber::registry()
		.with(tracing_subscriber::fmt::layer().with_target(false))
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
		.init();
}

async fn run(cli: Cli) -> PopulateResult<()> {
	let config = PopulateConfig::from_file(&cli.config)?;
	let database = cli
		.database
		.clone()
		.or_else(|| config.database_url.clone())
		.ok_or_else(|| {
			PopulateError::ConfigError(
				"No database given, pass --database or set database_url".to_string(),
			)
		})?;

	let store = SqliteStore::connect(&database).await?;
	let populate = Populate::builder(config).store(Arc::new(store)).build()?;
	let mut command = PopulateCommand::new(populate);

	let options = PopulateOptions::new()
		.with_force(cli.force)
		.with_verbosity(cli.verbosity.max(1));
	let outcome = command.execute(options).await?;

	if let Some(report) = outcome.report()
		&& !report.is_complete()
	{
		tracing::warn!(
			failed = report.resolution.failures.len(),
			"Some fixtures could not be created"
		);
	}
	Ok(())
}

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	init_tracing(cli.verbosity);

	if let Err(e) = run(cli).await {
		eprintln!("Error: {}", e);
		process::exit(1);
	}
}
