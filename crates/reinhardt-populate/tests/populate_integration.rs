//! End-to-end tests for the populate sequence.

mod helpers;

use std::fs;
use std::sync::Arc;

use helpers::test_data::{CountingHook, TestDataLoader};
use reinhardt_populate::environment::ENVIRONMENT_VAR;
use reinhardt_populate::prelude::*;
use rstest::{fixture, rstest};
use serde_json::json;
use serial_test::serial;
use tempfile::TempDir;

#[fixture]
fn data() -> TestDataLoader {
	TestDataLoader::new()
}

fn page_schema() -> Schema {
	Schema::new()
		.with(RecordType::new("Page"))
		.with(RecordType::new("Member"))
}

fn site_schema() -> Schema {
	Schema::new()
		.with(
			RecordType::new("SiteTree")
				.with_fields(["Title", "ParentID"])
				.versioned(Versioning::default()),
		)
		.with(RecordType::new("Page").with_parent("SiteTree"))
}

fn title_of<'a>(records: &'a [StoredRecord], title: &str) -> &'a StoredRecord {
	records
		.iter()
		.find(|r| r.get("Title") == Some(&json!(title)))
		.unwrap_or_else(|| panic!("No record titled {}", title))
}

#[rstest]
#[tokio::test]
async fn test_forward_reference_resolves_on_retry(data: TestDataLoader) {
	// Arrange
	let store = Arc::new(InMemoryStore::with_tables(["Page"]));
	store.insert("Page", &Row::new()).await.unwrap();
	let config = PopulateConfig::new()
		.with_truncate("Page")
		.with_fixture(data.path("pages.yml"));
	let populate = Populate::builder(config)
		.schema(page_schema())
		.store(store.clone())
		.environment(Environment::Test)
		.build()
		.unwrap();

	// Act
	let outcome = populate.run(&mut RunContext::new()).await.unwrap();

	// Assert
	let report = outcome.report().unwrap();
	assert_eq!(report.truncated_tables, vec!["Page"]);
	assert_eq!(report.files[0].submitted, 3);
	assert_eq!(report.files[0].deferred, 1);
	assert_eq!(report.resolution.passes, 1);
	assert_eq!(report.resolution.state, ResolverState::Converged);
	assert_eq!(report.records_created(), 3);

	let records = store.records("Page").await.unwrap();
	assert_eq!(records.len(), 3);
	let two = title_of(&records, "B");
	let three = title_of(&records, "C");
	assert_eq!(two.get("ParentID"), Some(&json!(three.id)));
	assert_eq!(title_of(&records, "A").get("ParentID"), None);
}

#[rstest]
#[tokio::test]
async fn test_forced_rerun_does_not_accumulate(data: TestDataLoader) {
	let store = Arc::new(InMemoryStore::with_tables(["Page"]));
	let config = PopulateConfig::new()
		.with_truncate("Page")
		.with_fixture(data.path("pages.yml"));
	let populate = Populate::builder(config)
		.schema(page_schema())
		.store(store.clone())
		.environment(Environment::Development)
		.build()
		.unwrap();
	let mut context = RunContext::forced();

	populate.run(&mut context).await.unwrap();
	populate.run(&mut context).await.unwrap();

	assert_eq!(store.count("Page").await.unwrap(), 3);
}

#[rstest]
#[tokio::test]
async fn test_unforced_rerun_is_skipped(data: TestDataLoader) {
	let store = Arc::new(InMemoryStore::with_tables(["Page"]));
	let hook = Arc::new(CountingHook::default());
	let config = PopulateConfig::new().with_fixture(data.path("pages.yml"));
	let populate = Populate::builder(config)
		.schema(page_schema())
		.store(store.clone())
		.hook(hook.clone())
		.environment(Environment::Test)
		.build()
		.unwrap();
	let mut context = RunContext::new();

	populate.run(&mut context).await.unwrap();
	let second = populate.run(&mut context).await.unwrap();

	assert_eq!(second, RunOutcome::AlreadyRan);
	assert_eq!(store.count("Page").await.unwrap(), 3);
	assert_eq!(hook.calls(), 1);
}

#[rstest]
#[tokio::test]
async fn test_production_refused_without_mutation(data: TestDataLoader) {
	let store = Arc::new(InMemoryStore::with_tables(["Page"]));
	store.insert("Page", &Row::new()).await.unwrap();
	let hook = Arc::new(CountingHook::default());
	let config = PopulateConfig::new()
		.with_truncate("Page")
		.with_fixture(data.path("pages.yml"));
	let populate = Populate::builder(config)
		.schema(page_schema())
		.store(store.clone())
		.hook(hook.clone())
		.environment(Environment::Production)
		.build()
		.unwrap();
	let mut context = RunContext::forced();

	let result = populate.run(&mut context).await;

	assert!(matches!(
		result,
		Err(PopulateError::EnvironmentError(Environment::Production))
	));
	assert_eq!(store.count("Page").await.unwrap(), 1);
	assert_eq!(hook.calls(), 0);
	assert!(!context.has_completed());
}

#[rstest]
#[case(None, false)]
#[case(Some("production"), false)]
#[case(Some("staging"), false)]
#[case(Some("gibberish"), false)]
#[case(Some("dev"), true)]
#[case(Some("test"), true)]
#[serial(populate_env)]
#[tokio::test]
async fn test_environment_detected_from_variable(
	#[case] value: Option<&str>,
	#[case] allowed: bool,
) {
	// SAFETY: serialized with every other test touching the variable
	unsafe {
		match value {
			Some(v) => std::env::set_var(ENVIRONMENT_VAR, v),
			None => std::env::remove_var(ENVIRONMENT_VAR),
		}
	}
	let store = Arc::new(InMemoryStore::with_tables(["Page"]));
	store.insert("Page", &Row::new()).await.unwrap();
	let populate = Populate::builder(PopulateConfig::new().with_truncate("Page"))
		.schema(page_schema())
		.store(store.clone())
		.build()
		.unwrap();

	let result = populate.run(&mut RunContext::new()).await;

	unsafe {
		std::env::remove_var(ENVIRONMENT_VAR);
	}
	assert_eq!(result.is_ok(), allowed);
	let expected_rows = if allowed { 0 } else { 1 };
	assert_eq!(store.count("Page").await.unwrap(), expected_rows);
}

#[rstest]
#[tokio::test]
async fn test_unresolvable_reference_is_reported(data: TestDataLoader) {
	let store = Arc::new(InMemoryStore::with_tables(["Page", "Member"]));
	let hook = Arc::new(CountingHook::default());
	let members = data.path("members.json");
	let config = PopulateConfig::new()
		.with_truncate("Page")
		.with_truncate("Member")
		.with_fixture(data.path("pages.yml"))
		.with_fixture(&members);
	let populate = Populate::builder(config)
		.schema(page_schema())
		.store(store.clone())
		.hook(hook.clone())
		.environment(Environment::Test)
		.build()
		.unwrap();

	let outcome = populate.run(&mut RunContext::new()).await.unwrap();

	let report = outcome.report().unwrap();
	assert_eq!(report.resolution.state, ResolverState::Stalled);
	assert_eq!(
		report.resolution.failures,
		vec![FixtureFailure {
			class: "Member".to_string(),
			identifier: "ghost".to_string(),
			source: Some(members),
			reason: "Unresolved reference: =>Page.missing".to_string(),
		}]
	);
	assert!(!report.is_complete());
	assert_eq!(store.count("Page").await.unwrap(), 3);

	// The cross-file reference still resolved
	let pages = store.records("Page").await.unwrap();
	let members = store.records("Member").await.unwrap();
	assert_eq!(members.len(), 1);
	assert_eq!(
		members[0].get("Favourite"),
		Some(&json!(title_of(&pages, "A").id))
	);
	assert_eq!(hook.calls(), 1);
}

#[rstest]
#[tokio::test]
async fn test_versioned_tables_reset_and_republished(data: TestDataLoader) {
	let tables = [
		"SiteTree",
		"SiteTree_Live",
		"SiteTree_Versions",
		"Page",
		"Page_Live",
		"Page_Versions",
	];
	let store = Arc::new(InMemoryStore::with_tables(tables));
	for table in &tables {
		for _ in 0..4 {
			store.insert(table, &Row::new()).await.unwrap();
		}
	}
	let config = PopulateConfig::new()
		.with_truncate("Page")
		.with_fixture(data.path("site.yml"));
	let populate = Populate::builder(config)
		.schema(site_schema())
		.store(store.clone())
		.environment(Environment::Test)
		.build()
		.unwrap();

	let outcome = populate.run(&mut RunContext::new()).await.unwrap();

	let report = outcome.report().unwrap();
	assert_eq!(report.truncated_tables.len(), tables.len());
	assert!(report.is_complete());

	// Three records in the base hierarchy, two of which are pages
	assert_eq!(store.count("SiteTree").await.unwrap(), 3);
	assert_eq!(store.count("SiteTree_Live").await.unwrap(), 3);
	assert_eq!(store.count("SiteTree_Versions").await.unwrap(), 3);
	assert_eq!(store.count("Page").await.unwrap(), 2);
	assert_eq!(store.count("Page_Live").await.unwrap(), 2);
	assert_eq!(store.count("Page_Versions").await.unwrap(), 2);

	let base = store.records("SiteTree").await.unwrap();
	let home = title_of(&base, "Home");
	let about = title_of(&base, "About");
	assert_eq!(about.get("ParentID"), Some(&json!(home.id)));
	assert_eq!(about.get("ClassName"), Some(&json!("Page")));

	let team = title_of(&base, "Team");
	let leaf = store.records("Page").await.unwrap();
	let team_leaf = leaf.iter().find(|r| r.id == team.id).unwrap();
	assert_eq!(team_leaf.get("Summary"), Some(&json!("Who we are")));
}

#[rstest]
#[tokio::test]
async fn test_file_payloads_removed_from_toml_config() {
	let dir = TempDir::new().unwrap();
	fs::create_dir_all(dir.path().join("assets/Uploads")).unwrap();
	fs::write(dir.path().join("assets/Uploads/a.pdf"), b"a").unwrap();
	fs::write(dir.path().join("assets/Uploads/b.pdf"), b"b").unwrap();
	fs::write(
		dir.path().join("files.yml"),
		"File:\n  logo:\n    Filename: Uploads/logo.png\n",
	)
	.unwrap();
	fs::write(
		dir.path().join("populate.toml"),
		r#"
include_yaml_fixtures = ["files.yml"]
truncate_objects = ["File"]

[record_types.File]
file_storage = "assets"
"#,
	)
	.unwrap();

	let store = Arc::new(InMemoryStore::with_tables(["File"]));
	for name in ["Uploads/a.pdf", "Uploads/b.pdf"] {
		let mut row = Row::new();
		row.insert("Filename".to_string(), json!(name));
		store.insert("File", &row).await.unwrap();
	}
	let config = PopulateConfig::from_file(dir.path().join("populate.toml")).unwrap();
	let populate = Populate::builder(config)
		.store(store.clone())
		.environment(Environment::Test)
		.build()
		.unwrap();

	populate.run(&mut RunContext::new()).await.unwrap();

	assert!(!dir.path().join("assets/Uploads/a.pdf").exists());
	assert!(!dir.path().join("assets/Uploads/b.pdf").exists());
	let files = store.records("File").await.unwrap();
	assert_eq!(files.len(), 1);
	assert_eq!(files[0].get("Filename"), Some(&json!("Uploads/logo.png")));
}

#[rstest]
#[tokio::test]
async fn test_parse_error_propagates() {
	let dir = TempDir::new().unwrap();
	let broken = dir.path().join("broken.yml");
	fs::write(&broken, "- just\n- a list\n").unwrap();
	let populate = Populate::builder(PopulateConfig::new().with_fixture(&broken))
		.schema(page_schema())
		.store(Arc::new(InMemoryStore::with_tables(["Page"])))
		.environment(Environment::Test)
		.build()
		.unwrap();
	let mut context = RunContext::new();

	let result = populate.run(&mut context).await;

	assert!(matches!(result, Err(PopulateError::ParseError(_))));
	assert!(!context.has_completed());
}

#[cfg(feature = "sqlite")]
#[rstest]
#[tokio::test]
async fn test_sqlite_end_to_end(data: TestDataLoader) {
	let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
	for ddl in [
		r#"CREATE TABLE "SiteTree" ("ID" INTEGER PRIMARY KEY AUTOINCREMENT, "ClassName" TEXT, "Title" TEXT, "ParentID" INTEGER)"#,
		r#"CREATE TABLE "SiteTree_Live" ("ID" INTEGER PRIMARY KEY, "ClassName" TEXT, "Title" TEXT, "ParentID" INTEGER)"#,
		r#"CREATE TABLE "SiteTree_Versions" ("ID" INTEGER PRIMARY KEY AUTOINCREMENT, "RecordID" INTEGER, "Version" INTEGER, "ClassName" TEXT, "Title" TEXT, "ParentID" INTEGER)"#,
		r#"CREATE TABLE "Page" ("ID" INTEGER PRIMARY KEY, "Summary" TEXT)"#,
		r#"INSERT INTO "SiteTree" ("Title") VALUES ('stale')"#,
	] {
		sqlx::query(ddl).execute(store.pool()).await.unwrap();
	}
	let store = Arc::new(store);
	let config = PopulateConfig::new()
		.with_truncate("Page")
		.with_fixture(data.path("site.yml"));
	let populate = Populate::builder(config)
		.schema(site_schema())
		.store(store.clone())
		.environment(Environment::Test)
		.build()
		.unwrap();

	let outcome = populate.run(&mut RunContext::new()).await.unwrap();

	assert!(outcome.report().unwrap().is_complete());
	let base = store.records("SiteTree").await.unwrap();
	assert_eq!(base.len(), 3);
	assert!(base.iter().all(|r| r.get("Title") != Some(&json!("stale"))));
	let home = title_of(&base, "Home");
	assert_eq!(title_of(&base, "About").get("ParentID"), Some(&json!(home.id)));
	assert_eq!(store.count("SiteTree_Live").await.unwrap(), 3);
	assert_eq!(store.count("SiteTree_Versions").await.unwrap(), 3);
	assert_eq!(store.count("Page").await.unwrap(), 2);
}
