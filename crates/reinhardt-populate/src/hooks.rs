//! Lifecycle hooks invoked by the orchestrator.

use async_trait::async_trait;

use crate::error::PopulateResult;

/// Extension point fired once per run, after the retry resolver finishes.
///
/// Implementations may post-process, validate or export the populated data.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use reinhardt_populate::error::PopulateResult;
/// use reinhardt_populate::hooks::PopulateHook;
///
/// struct ExportHook;
///
/// #[async_trait]
/// impl PopulateHook for ExportHook {
///     async fn on_after_populate_records(&self) -> PopulateResult<()> {
///         // dump the database, warm caches, ...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait PopulateHook: Send + Sync {
	/// Called after every fixture has been processed.
	async fn on_after_populate_records(&self) -> PopulateResult<()>;
}

/// Hook that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

#[async_trait]
impl PopulateHook for NoopHook {
	async fn on_after_populate_records(&self) -> PopulateResult<()> {
		Ok(())
	}
}
