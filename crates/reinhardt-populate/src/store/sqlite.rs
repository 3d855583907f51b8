//! SQLite store implementation using sqlx.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, TypeInfo, ValueRef};

use super::{ID_COLUMN, RecordId, Row, Store, StoredRecord};
use crate::error::PopulateResult;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Store backed by a SQLite database.
///
/// The pool is limited to a single connection: a run holds the database
/// exclusively and `sqlite::memory:` databases are per-connection.
///
/// # Example
///
/// ```rust,no_run
/// use reinhardt_populate::store::{SqliteStore, Store};
///
/// # async fn example() {
/// let store = SqliteStore::connect("sqlite://dev.db").await.unwrap();
/// let exists = store.table_exists("SiteTree").await.unwrap();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteStore {
	pool: SqlitePool,
}

impl SqliteStore {
	/// Connects to the database at `database_url`.
	pub async fn connect(database_url: &str) -> PopulateResult<Self> {
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.idle_timeout(None)
			.max_lifetime(None)
			.connect(database_url)
			.await?;
		Ok(Self { pool })
	}

	/// Creates a store from an existing pool.
	pub fn from_pool(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Returns the underlying pool.
	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	async fn insert_row(&self, table: &str, id: Option<RecordId>, row: &Row) -> PopulateResult<i64> {
		let mut columns: Vec<String> = Vec::with_capacity(row.len() + 1);
		if id.is_some() {
			columns.push(quote_identifier(ID_COLUMN));
		}
		columns.extend(row.keys().map(|column| quote_identifier(column)));

		let sql = if columns.is_empty() {
			format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table))
		} else {
			let placeholders = vec!["?"; columns.len()].join(", ");
			format!(
				"INSERT INTO {} ({}) VALUES ({})",
				quote_identifier(table),
				columns.join(", "),
				placeholders
			)
		};

		let mut query: SqliteQuery<'_> = sqlx::query(&sql);
		if let Some(id) = id {
			query = query.bind(id);
		}
		for value in row.values() {
			query = bind_value(query, value);
		}

		let result = query.execute(&self.pool).await?;
		Ok(result.last_insert_rowid())
	}
}

/// Quotes an identifier for use in SQL text.
fn quote_identifier(name: &str) -> String {
	format!("\"{}\"", name.replace('"', "\"\""))
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
	match value {
		Value::Null => query.bind(None::<String>),
		Value::Bool(b) => query.bind(*b),
		Value::Number(n) => match n.as_i64() {
			Some(i) => query.bind(i),
			None => query.bind(n.as_f64()),
		},
		Value::String(s) => query.bind(s.clone()),
		// Lists of references and nested structures are stored as JSON text
		other => query.bind(other.to_string()),
	}
}

fn decode_row(row: &SqliteRow) -> PopulateResult<StoredRecord> {
	let mut id = 0;
	let mut fields = Row::new();

	for column in row.columns() {
		let ordinal = column.ordinal();
		let raw = row.try_get_raw(ordinal)?;
		let value = if raw.is_null() {
			Value::Null
		} else {
			let type_name = raw.type_info().name().to_string();
			match type_name.as_str() {
				"INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(ordinal)?),
				"REAL" => Value::from(row.try_get::<f64, _>(ordinal)?),
				"BLOB" => Value::from(row.try_get::<Vec<u8>, _>(ordinal)?),
				_ => Value::from(row.try_get::<String, _>(ordinal)?),
			}
		};

		if column.name() == ID_COLUMN {
			id = value.as_i64().unwrap_or_default();
		} else {
			fields.insert(column.name().to_string(), value);
		}
	}

	Ok(StoredRecord { id, fields })
}

#[async_trait]
impl Store for SqliteStore {
	async fn table_exists(&self, table: &str) -> PopulateResult<bool> {
		let count: i64 =
			sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
				.bind(table)
				.fetch_one(&self.pool)
				.await?;
		Ok(count > 0)
	}

	async fn clear_table(&self, table: &str) -> PopulateResult<()> {
		if !self.table_exists(table).await? {
			return Ok(());
		}
		// SQLite has no TRUNCATE; an unqualified DELETE uses the truncate optimization
		let sql = format!("DELETE FROM {}", quote_identifier(table));
		sqlx::query(&sql).execute(&self.pool).await?;
		Ok(())
	}

	async fn insert(&self, table: &str, row: &Row) -> PopulateResult<RecordId> {
		self.insert_row(table, None, row).await
	}

	async fn insert_with_id(&self, table: &str, id: RecordId, row: &Row) -> PopulateResult<()> {
		self.insert_row(table, Some(id), row).await?;
		Ok(())
	}

	async fn delete(&self, table: &str, id: RecordId) -> PopulateResult<()> {
		let sql = format!(
			"DELETE FROM {} WHERE {} = ?",
			quote_identifier(table),
			quote_identifier(ID_COLUMN)
		);
		sqlx::query(&sql).bind(id).execute(&self.pool).await?;
		Ok(())
	}

	async fn records(&self, table: &str) -> PopulateResult<Vec<StoredRecord>> {
		let sql = format!(
			"SELECT * FROM {} ORDER BY {}",
			quote_identifier(table),
			quote_identifier(ID_COLUMN)
		);
		let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
		rows.iter().map(decode_row).collect()
	}

	async fn count(&self, table: &str) -> PopulateResult<u64> {
		let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
		let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
		Ok(count as u64)
	}
}
