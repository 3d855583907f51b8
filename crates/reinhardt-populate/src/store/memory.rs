//! In-memory store implementation.
//!
//! [`InMemoryStore`] keeps tables in process memory. Tables have to be created
//! before rows can be written to them, matching the behaviour of a database
//! with a fixed schema.

use std::collections::BTreeMap;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;

use super::{RecordId, Row, Store, StoredRecord};
use crate::error::{PopulateError, PopulateResult};

#[derive(Debug, Default)]
struct Table {
	next_id: RecordId,
	rows: BTreeMap<RecordId, Row>,
}

/// Store backed by process memory.
///
/// # Example
///
/// ```
/// use reinhardt_populate::store::InMemoryStore;
///
/// let store = InMemoryStore::with_tables(["Page", "Page_Live"]);
/// assert!(store.has_table("Page"));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
	tables: RwLock<IndexMap<String, Table>>,
}

impl InMemoryStore {
	/// Creates an empty store without tables.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a store with the given empty tables.
	pub fn with_tables<I, S>(tables: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let store = Self::new();
		for table in tables {
			store.create_table(table);
		}
		store
	}

	/// Creates an empty table. Existing tables are left untouched.
	pub fn create_table(&self, table: impl Into<String>) {
		self.tables.write().entry(table.into()).or_default();
	}

	/// Returns true if the table exists.
	pub fn has_table(&self, table: &str) -> bool {
		self.tables.read().contains_key(table)
	}

	/// Returns the names of all tables in creation order.
	pub fn table_names(&self) -> Vec<String> {
		self.tables.read().keys().cloned().collect()
	}

	fn missing(table: &str) -> PopulateError {
		PopulateError::StoreError(format!("no such table: {}", table))
	}
}

#[async_trait]
impl Store for InMemoryStore {
	async fn table_exists(&self, table: &str) -> PopulateResult<bool> {
		Ok(self.has_table(table))
	}

	async fn clear_table(&self, table: &str) -> PopulateResult<()> {
		if let Some(existing) = self.tables.write().get_mut(table) {
			existing.rows.clear();
		}
		Ok(())
	}

	async fn insert(&self, table: &str, row: &Row) -> PopulateResult<RecordId> {
		let mut tables = self.tables.write();
		let existing = tables.get_mut(table).ok_or_else(|| Self::missing(table))?;
		existing.next_id += 1;
		let id = existing.next_id;
		existing.rows.insert(id, row.clone());
		Ok(id)
	}

	async fn insert_with_id(&self, table: &str, id: RecordId, row: &Row) -> PopulateResult<()> {
		let mut tables = self.tables.write();
		let existing = tables.get_mut(table).ok_or_else(|| Self::missing(table))?;
		if existing.rows.contains_key(&id) {
			return Err(PopulateError::StoreError(format!(
				"UNIQUE constraint failed: {}.ID = {}",
				table, id
			)));
		}
		existing.next_id = existing.next_id.max(id);
		existing.rows.insert(id, row.clone());
		Ok(())
	}

	async fn delete(&self, table: &str, id: RecordId) -> PopulateResult<()> {
		let mut tables = self.tables.write();
		let existing = tables.get_mut(table).ok_or_else(|| Self::missing(table))?;
		existing.rows.remove(&id);
		Ok(())
	}

	async fn records(&self, table: &str) -> PopulateResult<Vec<StoredRecord>> {
		let tables = self.tables.read();
		let existing = tables.get(table).ok_or_else(|| Self::missing(table))?;
		Ok(existing
			.rows
			.iter()
			.map(|(id, fields)| StoredRecord {
				id: *id,
				fields: fields.clone(),
			})
			.collect())
	}

	async fn count(&self, table: &str) -> PopulateResult<u64> {
		let tables = self.tables.read();
		let existing = tables.get(table).ok_or_else(|| Self::missing(table))?;
		Ok(existing.rows.len() as u64)
	}
}
