//! Persistent store adapters.
//!
//! The [`Store`] trait is the only way the populate machinery touches the
//! database. Every call is awaited before the next one is issued, so
//! adapters never see concurrent requests from a single run.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::PopulateResult;

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Generated primary key of a stored record.
pub type RecordId = i64;

/// Column name → value mapping for a single row, in column order.
pub type Row = IndexMap<String, Value>;

/// Name of the primary key column.
pub const ID_COLUMN: &str = "ID";

/// A row read back from a table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
	/// Primary key.
	pub id: RecordId,
	/// Remaining column values.
	pub fields: Row,
}

impl StoredRecord {
	/// Returns the value of a column, if present.
	pub fn get(&self, column: &str) -> Option<&Value> {
		self.fields.get(column)
	}
}

/// Row-level access to a pre-existing schema.
#[async_trait]
pub trait Store: Send + Sync {
	/// Returns true if the physical table exists.
	async fn table_exists(&self, table: &str) -> PopulateResult<bool>;

	/// Removes every row from the table.
	///
	/// Clearing an empty or missing table is a no-op.
	async fn clear_table(&self, table: &str) -> PopulateResult<()>;

	/// Inserts a row and returns its generated primary key.
	async fn insert(&self, table: &str, row: &Row) -> PopulateResult<RecordId>;

	/// Inserts a row under an explicit primary key.
	async fn insert_with_id(&self, table: &str, id: RecordId, row: &Row) -> PopulateResult<()>;

	/// Removes the row with the given primary key, if present.
	async fn delete(&self, table: &str, id: RecordId) -> PopulateResult<()>;

	/// Returns every row of the table in primary key order.
	async fn records(&self, table: &str) -> PopulateResult<Vec<StoredRecord>>;

	/// Returns the number of rows in the table.
	async fn count(&self, table: &str) -> PopulateResult<u64>;
}
