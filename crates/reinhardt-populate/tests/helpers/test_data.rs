//! Test data helpers.
//!
//! Provides convenient access to fixture data files and populate hooks
//! used across integration tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reinhardt_populate::error::PopulateResult;
use reinhardt_populate::hooks::PopulateHook;

/// Locates fixture files in the tests/fixtures/data directory.
pub struct TestDataLoader {
	base_path: PathBuf,
}

impl TestDataLoader {
	/// Create a loader for the default test data directory.
	pub fn new() -> Self {
		Self {
			base_path: Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/data"),
		}
	}

	/// Returns the absolute path of a test data file.
	///
	/// # Panics
	///
	/// Panics if the file does not exist.
	pub fn path(&self, name: &str) -> PathBuf {
		let path = self.base_path.join(name);
		assert!(path.exists(), "Missing test data: {:?}", path);
		path
	}
}

impl Default for TestDataLoader {
	fn default() -> Self {
		Self::new()
	}
}

/// Hook counting how often it fired.
#[derive(Debug, Default)]
pub struct CountingHook {
	calls: AtomicUsize,
}

impl CountingHook {
	/// Returns the number of invocations so far.
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl PopulateHook for CountingHook {
	async fn on_after_populate_records(&self) -> PopulateResult<()> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}
