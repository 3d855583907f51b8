//! Table truncation for configured record classes.

use std::sync::Arc;

use indexmap::IndexSet;

use crate::error::PopulateResult;
use crate::factory::CLASS_NAME_COLUMN;
use crate::schema::{Schema, VERSIONS_SUFFIX};
use crate::store::Store;

/// Clears every physical table backing a logical class.
///
/// For a class `Page` that is versioned with stages `Stage` and `Live` and
/// subclassed by `RedirectorPage`, truncation clears `Page`, `Page_Versions`,
/// `Page_Stage`, `Page_Live`, the same tables of every ancestor and
/// descendant class. File payloads of file-backed classes, declared or
/// inherited, are deleted before any table is cleared.
/// Tables that do not exist are skipped.
pub struct TableTruncator {
	schema: Arc<Schema>,
	store: Arc<dyn Store>,
}

impl TableTruncator {
	/// Creates a truncator.
	pub fn new(schema: Arc<Schema>, store: Arc<dyn Store>) -> Self {
		Self { schema, store }
	}

	/// Resolves a class token to a physical table name.
	///
	/// A token naming a declared class resolves to its table. Otherwise the
	/// token is split at the first `_` into a class and a suffix such as
	/// `Versions` or a stage name, and the suffix is re-appended to the
	/// class's table. Tokens that resolve to nothing are used verbatim.
	pub fn physical_table(&self, token: &str) -> String {
		if let Some(table) = self.schema.resolve_physical_name(token) {
			return table.to_string();
		}
		if let Some((base, suffix)) = token.split_once('_')
			&& let Some(table) = self.schema.resolve_physical_name(base)
		{
			return if suffix.is_empty() {
				table.to_string()
			} else {
				format!("{}_{}", table, suffix)
			};
		}
		token.to_string()
	}

	/// Truncates one configured class and returns the existing tables that
	/// were cleared, in clearing order.
	///
	/// # Errors
	///
	/// Fails only if the store or payload storage fails. Missing tables and
	/// undeclared classes are not errors.
	pub async fn truncate(&self, class: &str) -> PopulateResult<Vec<String>> {
		let mut cleared = IndexSet::new();

		self.delete_payloads(class).await?;

		let stages: Vec<String> = self
			.schema
			.versioning_of(class)
			.map(|v| v.list_stages().to_vec())
			.unwrap_or_default();

		if !stages.is_empty() {
			self.truncate_versions(class, &stages, &mut cleared).await?;
		}

		let data_classes: Vec<String> = self
			.schema
			.data_classes_for(class)
			.iter()
			.map(|t| t.name().to_string())
			.collect();
		for data_class in &data_classes {
			self.truncate_table(data_class, &mut cleared).await?;
			self.truncate_versions(data_class, &stages, &mut cleared)
				.await?;
		}

		self.truncate_table(class, &mut cleared).await?;
		Ok(cleared.into_iter().collect())
	}

	/// Deletes the binary payloads of every file-backed data class of
	/// `class`, including classes that inherit their storage.
	///
	/// A table shared by several classes is read once. Each record's payload
	/// is deleted through the storage of its concrete class, as recorded in
	/// the `ClassName` column.
	async fn delete_payloads(&self, class: &str) -> PopulateResult<()> {
		let mut visited = IndexSet::new();

		for record_type in self.schema.data_classes_for(class) {
			let Some(storage) = self.schema.file_storage_of(record_type.name()) else {
				continue;
			};
			let Some(table) = self
				.schema
				.table_for_field(record_type.name(), storage.payload_column())
			else {
				continue;
			};
			if !visited.insert(table.to_string()) || !self.store.table_exists(table).await? {
				continue;
			}

			let records = self.store.records(table).await?;
			tracing::info!(
				class = %record_type.name(),
				table = %table,
				count = records.len(),
				"Deleting file payloads"
			);
			for record in &records {
				let owner = record
					.get(CLASS_NAME_COLUMN)
					.and_then(|v| v.as_str())
					.unwrap_or(record_type.name());
				if let Some(storage) = self.schema.file_storage_of(owner) {
					storage.delete_payload(record).await?;
				}
			}
		}
		Ok(())
	}

	async fn truncate_versions(
		&self,
		class: &str,
		stages: &[String],
		cleared: &mut IndexSet<String>,
	) -> PopulateResult<()> {
		self.truncate_table(&format!("{}_{}", class, VERSIONS_SUFFIX), cleared)
			.await?;
		for stage in stages {
			self.truncate_table(&format!("{}_{}", class, stage), cleared)
				.await?;
		}
		Ok(())
	}

	async fn truncate_table(
		&self,
		token: &str,
		cleared: &mut IndexSet<String>,
	) -> PopulateResult<()> {
		let table = self.physical_table(token);
		if cleared.contains(&table) {
			return Ok(());
		}

		if self.store.table_exists(&table).await? {
			tracing::info!(table = %table, "Truncating table");
			self.store.clear_table(&table).await?;
			cleared.insert(table);
		} else {
			tracing::debug!(table = %table, "Skipping missing table");
		}
		Ok(())
	}
}

impl std::fmt::Debug for TableTruncator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TableTruncator")
			.field("schema", &self.schema)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::factory::RecordFactory;
	use crate::fixtures::FixtureSpec;
	use crate::schema::{RecordType, Versioning};
	use crate::storage::{FILENAME_COLUMN, LocalFileStorage};
	use crate::store::{InMemoryStore, Row};
	use rstest::{fixture, rstest};
	use serde_json::json;
	use tempfile::TempDir;

	#[fixture]
	fn schema() -> Schema {
		Schema::new()
			.with(RecordType::new("SiteTree").versioned(Versioning::default()))
			.with(RecordType::new("Page").with_parent("SiteTree"))
			.with(
				RecordType::new("BlogPost")
					.with_table("Blog_Post")
					.with_parent("Page"),
			)
			.with(RecordType::new("Member"))
	}

	async fn filled(tables: &[&str]) -> Arc<InMemoryStore> {
		let store = Arc::new(InMemoryStore::with_tables(tables.iter().copied()));
		for table in tables {
			store.insert(table, &Row::new()).await.unwrap();
		}
		store
	}

	#[rstest]
	#[case("Page", "Page")]
	#[case("BlogPost", "Blog_Post")]
	#[case("BlogPost_Live", "Blog_Post_Live")]
	#[case("BlogPost_Versions", "Blog_Post_Versions")]
	#[case("Unknown_Live", "Unknown_Live")]
	#[case("Unknown", "Unknown")]
	fn test_physical_table(schema: Schema, #[case] token: &str, #[case] expected: &str) {
		let truncator = TableTruncator::new(Arc::new(schema), Arc::new(InMemoryStore::new()));
		assert_eq!(truncator.physical_table(token), expected);
	}

	#[rstest]
	#[tokio::test]
	async fn test_truncate_versioned_hierarchy(schema: Schema) {
		let tables = [
			"SiteTree",
			"SiteTree_Live",
			"SiteTree_Versions",
			"Page",
			"Page_Live",
			"Page_Versions",
			"Blog_Post",
			"Blog_Post_Live",
			"Member",
		];
		let store = filled(&tables).await;
		let truncator = TableTruncator::new(Arc::new(schema), store.clone());

		let cleared = truncator.truncate("Page").await.unwrap();

		assert_eq!(
			cleared,
			vec![
				"Page_Versions",
				"Page_Live",
				"SiteTree",
				"SiteTree_Versions",
				"SiteTree_Live",
				"Page",
				"Blog_Post",
				"Blog_Post_Live",
			]
		);
		for table in &tables[..8] {
			assert_eq!(store.count(table).await.unwrap(), 0, "{} not cleared", table);
		}
		assert_eq!(store.count("Member").await.unwrap(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_truncate_unversioned_clears_versions_table(schema: Schema) {
		let store = filled(&["Member", "Member_Versions"]).await;
		let truncator = TableTruncator::new(Arc::new(schema), store.clone());

		let cleared = truncator.truncate("Member").await.unwrap();

		assert_eq!(cleared, vec!["Member", "Member_Versions"]);
		assert_eq!(store.count("Member_Versions").await.unwrap(), 0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_truncate_missing_tables_is_noop(schema: Schema) {
		let truncator = TableTruncator::new(Arc::new(schema), Arc::new(InMemoryStore::new()));

		assert!(truncator.truncate("Page").await.unwrap().is_empty());
		assert!(truncator.truncate("NotAClass").await.unwrap().is_empty());
	}

	#[rstest]
	#[tokio::test]
	async fn test_truncate_undeclared_class_uses_name_verbatim(schema: Schema) {
		let store = filled(&["LegacyLog"]).await;
		let truncator = TableTruncator::new(Arc::new(schema), store.clone());

		let cleared = truncator.truncate("LegacyLog").await.unwrap();

		assert_eq!(cleared, vec!["LegacyLog"]);
		assert_eq!(store.count("LegacyLog").await.unwrap(), 0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_truncate_deletes_payloads_first() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
		std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
		let schema = Schema::new().with(
			RecordType::new("File").with_file_storage(Arc::new(LocalFileStorage::new(dir.path()))),
		);
		let store = Arc::new(InMemoryStore::with_tables(["File"]));
		for name in ["a.txt", "b.txt"] {
			let mut row = Row::new();
			row.insert(FILENAME_COLUMN.to_string(), json!(name));
			store.insert("File", &row).await.unwrap();
		}
		let truncator = TableTruncator::new(Arc::new(schema), store.clone());

		truncator.truncate("File").await.unwrap();

		assert!(!dir.path().join("a.txt").exists());
		assert!(!dir.path().join("b.txt").exists());
		assert_eq!(store.count("File").await.unwrap(), 0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_truncate_subclass_deletes_inherited_payloads() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.path().join("logo.png"), b"png").unwrap();
		let schema = Arc::new(
			Schema::new()
				.with(
					RecordType::new("File")
						.with_fields([FILENAME_COLUMN])
						.with_file_storage(Arc::new(LocalFileStorage::new(dir.path()))),
				)
				.with(RecordType::new("Image").with_parent("File")),
		);
		let store = Arc::new(InMemoryStore::with_tables(["File", "Image"]));
		let mut factory = RecordFactory::new(schema.clone(), store.clone());
		let outcome = factory
			.submit(FixtureSpec::new("Image", "logo").with_field(FILENAME_COLUMN, "logo.png"))
			.await;
		assert!(outcome.is_resolved());
		let truncator = TableTruncator::new(schema, store.clone());

		truncator.truncate("Image").await.unwrap();

		assert!(!dir.path().join("logo.png").exists());
		assert_eq!(store.count("File").await.unwrap(), 0);
		assert_eq!(store.count("Image").await.unwrap(), 0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_truncate_skips_payloads_of_classes_without_storage() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.path().join("keep.txt"), b"k").unwrap();
		let schema = Schema::new()
			.with(RecordType::new("Asset").with_fields([FILENAME_COLUMN]))
			.with(
				RecordType::new("Document")
					.with_parent("Asset")
					.with_file_storage(Arc::new(LocalFileStorage::new(dir.path()))),
			);
		let store = Arc::new(InMemoryStore::with_tables(["Asset", "Document"]));
		let mut row = Row::new();
		row.insert(FILENAME_COLUMN.to_string(), json!("keep.txt"));
		row.insert(CLASS_NAME_COLUMN.to_string(), json!("Asset"));
		store.insert("Asset", &row).await.unwrap();
		let truncator = TableTruncator::new(Arc::new(schema), store.clone());

		truncator.truncate("Document").await.unwrap();

		assert!(dir.path().join("keep.txt").exists());
		assert_eq!(store.count("Asset").await.unwrap(), 0);
	}
}
