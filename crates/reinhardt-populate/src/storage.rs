//! Binary payload storage for file-backed record types.
//!
//! Record types whose rows describe stored files opt into the
//! [`FileStorage`] capability. The truncator uses it to delete every payload
//! before the rows pointing at them are cleared.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::error::{PopulateError, PopulateResult};
use crate::store::StoredRecord;

/// Default column holding the payload path relative to the storage root.
pub const FILENAME_COLUMN: &str = "Filename";

/// Capability of a record type whose rows own binary payloads.
#[async_trait]
pub trait FileStorage: Send + Sync + std::fmt::Debug {
	/// Column holding the payload path.
	fn payload_column(&self) -> &str {
		FILENAME_COLUMN
	}

	/// Deletes the payload owned by `record`.
	///
	/// Records without a payload, or whose payload is already gone, are a no-op.
	async fn delete_payload(&self, record: &StoredRecord) -> PopulateResult<()>;
}

/// Payloads stored as files below a local directory.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
	root: PathBuf,
	column: String,
}

impl LocalFileStorage {
	/// Creates a storage rooted at `root`, reading paths from [`FILENAME_COLUMN`].
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			column: FILENAME_COLUMN.to_string(),
		}
	}

	/// Reads payload paths from a different column.
	pub fn with_column(mut self, column: impl Into<String>) -> Self {
		self.column = column.into();
		self
	}

	/// Returns the storage root.
	pub fn root(&self) -> &Path {
		&self.root
	}

	fn payload_path(&self, record: &StoredRecord) -> PopulateResult<Option<PathBuf>> {
		let Some(name) = record.get(&self.column).and_then(|v| v.as_str()) else {
			return Ok(None);
		};
		if name.is_empty() {
			return Ok(None);
		}

		let relative = Path::new(name.trim_start_matches('/'));
		if relative
			.components()
			.any(|c| matches!(c, std::path::Component::ParentDir))
		{
			return Err(PopulateError::StorageError(format!(
				"Payload path escapes storage root: {}",
				name
			)));
		}
		Ok(Some(self.root.join(relative)))
	}
}

#[async_trait]
impl FileStorage for LocalFileStorage {
	fn payload_column(&self) -> &str {
		&self.column
	}

	async fn delete_payload(&self, record: &StoredRecord) -> PopulateResult<()> {
		let Some(path) = self.payload_path(record)? else {
			return Ok(());
		};

		match fs::remove_file(&path).await {
			Ok(()) => {
				tracing::debug!(path = %path.display(), record = record.id, "Deleted payload");
				Ok(())
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(PopulateError::StorageError(format!(
				"Failed to delete {}: {}",
				path.display(),
				e
			))),
		}
	}
}
