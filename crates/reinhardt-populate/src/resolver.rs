//! Retry passes over deferred fixture specifications.
//!
//! The resolver is a worklist loop with a progress flag per pass:
//!
//! - `Pending`: specifications remain and the last pass resolved at least one
//! - `Converged`: nothing remains
//! - `Stalled`: a full pass resolved nothing, so no further pass can either
//!
//! A pass that makes no progress is never repeated, which bounds the loop
//! even for references that can never be satisfied.

use crate::error::FixtureFailure;
use crate::factory::RecordFactory;

/// State of the retry resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
	/// Deferred specifications remain and another pass is scheduled.
	Pending,
	/// Every deferred specification was materialized.
	Converged,
	/// A pass made zero progress; the remaining entries are permanent failures.
	Stalled,
}

impl std::fmt::Display for ResolverState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Pending => write!(f, "pending"),
			Self::Converged => write!(f, "converged"),
			Self::Stalled => write!(f, "stalled"),
		}
	}
}

/// Result of draining the pending set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionReport {
	/// Number of retry passes performed, including the final one.
	pub passes: usize,
	/// Number of specifications resolved across all passes.
	pub resolved: usize,
	/// Specifications abandoned after the resolver stalled.
	pub failures: Vec<FixtureFailure>,
	/// Terminal state, either `Converged` or `Stalled`.
	pub state: ResolverState,
}

impl ResolutionReport {
	/// Returns true if every deferred specification was materialized.
	pub fn is_complete(&self) -> bool {
		self.failures.is_empty()
	}
}

/// Drives retry passes until the pending set converges or stalls.
#[derive(Debug, Clone)]
pub struct RetryResolver {
	state: ResolverState,
	passes: usize,
	resolved: usize,
}

impl Default for RetryResolver {
	fn default() -> Self {
		Self::new()
	}
}

impl RetryResolver {
	/// Creates a resolver that has not run any pass yet.
	pub fn new() -> Self {
		Self {
			state: ResolverState::Pending,
			passes: 0,
			resolved: 0,
		}
	}

	/// Returns the current state.
	pub fn state(&self) -> ResolverState {
		self.state
	}

	/// Returns the number of passes performed so far.
	pub fn passes(&self) -> usize {
		self.passes
	}

	/// Runs one retry pass over every pending specification, in deferral
	/// order, and returns the resulting state.
	pub async fn pass(&mut self, factory: &mut RecordFactory) -> ResolverState {
		if factory.pending().is_empty() {
			self.state = ResolverState::Converged;
			return self.state;
		}
		if self.state != ResolverState::Pending {
			return self.state;
		}

		self.passes += 1;
		let batch = factory.pending().specs();
		let attempted = batch.len();
		let mut progress = 0;

		for spec in batch {
			if factory.submit(spec).await.is_resolved() {
				progress += 1;
			}
		}
		self.resolved += progress;

		tracing::debug!(
			pass = self.passes,
			attempted,
			resolved = progress,
			remaining = factory.pending().len(),
			"Retry pass finished"
		);

		self.state = if factory.pending().is_empty() {
			ResolverState::Converged
		} else if progress == 0 {
			ResolverState::Stalled
		} else {
			ResolverState::Pending
		};
		self.state
	}

	/// Runs passes until the resolver converges or stalls.
	///
	/// On stall every remaining entry is removed from the pending set,
	/// logged, and returned in the report. Nothing here fails the run.
	pub async fn resolve(mut self, factory: &mut RecordFactory) -> ResolutionReport {
		while self.pass(factory).await == ResolverState::Pending {}

		let failures = factory.pending_mut().drain_failures();
		for failure in &failures {
			tracing::warn!(
				class = %failure.class,
				identifier = %failure.identifier,
				source = ?failure.source,
				reason = %failure.reason,
				"Fixture could not be created"
			);
		}

		ResolutionReport {
			passes: self.passes,
			resolved: self.resolved,
			failures,
			state: self.state,
		}
	}
}
