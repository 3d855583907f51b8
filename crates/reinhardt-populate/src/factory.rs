//! Record materialization.
//!
//! [`RecordFactory`] turns fixture specifications into stored records one at
//! a time. A specification that cannot be written yet, typically because it
//! references a fixture that has not been materialized, is parked in the
//! [`PendingSet`] together with the failure reason instead of aborting the
//! run.

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde_json::Value;

use crate::error::{FixtureFailure, PopulateError, PopulateResult};
use crate::fixtures::{FieldValue, FixtureKey, FixtureRef, FixtureSpec};
use crate::schema::{RecordType, Schema, VERSIONS_SUFFIX};
use crate::store::{RecordId, Row, Store};

/// Column holding the concrete class of a record in its root table.
pub const CLASS_NAME_COLUMN: &str = "ClassName";

/// Column linking a history row to its record.
pub const RECORD_ID_COLUMN: &str = "RecordID";

/// Column holding the history version number.
pub const VERSION_COLUMN: &str = "Version";

/// Outcome of submitting a single specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
	/// The record was written under the given identifier.
	Resolved(RecordId),
	/// The record was parked in the pending set for the given reason.
	Deferred(String),
}

impl Submission {
	/// Returns true if the specification was materialized.
	pub fn is_resolved(&self) -> bool {
		matches!(self, Self::Resolved(_))
	}
}

/// A deferred specification with the reason of its most recent failure.
#[derive(Debug, Clone)]
pub struct PendingEntry {
	/// The specification to retry.
	pub spec: FixtureSpec,
	/// Failure reason from the latest attempt.
	pub reason: String,
}

impl PendingEntry {
	/// Converts the entry into a permanent failure record.
	pub fn into_failure(self) -> FixtureFailure {
		FixtureFailure {
			class: self.spec.class,
			identifier: self.spec.identifier,
			source: self.spec.source,
			reason: self.reason,
		}
	}
}

/// Identity of a pending specification.
///
/// Fixture identifiers are only unique within their defining file, so the
/// source file is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingKey {
	/// File the specification was declared in.
	pub source: Option<PathBuf>,
	/// Class and identifier.
	pub fixture: FixtureKey,
}

impl PendingKey {
	/// Returns the pending key of a specification.
	pub fn of(spec: &FixtureSpec) -> Self {
		Self {
			source: spec.source.clone(),
			fixture: spec.key(),
		}
	}
}

/// Specifications not yet persisted, keyed by source file and fixture
/// identity.
///
/// Entries keep the position of their first deferral, so retry passes visit
/// them in the order they were deferred.
#[derive(Debug, Clone, Default)]
pub struct PendingSet {
	entries: IndexMap<PendingKey, PendingEntry>,
}

impl PendingSet {
	/// Creates an empty pending set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parks a specification, updating the reason if it is already pending.
	pub fn defer(&mut self, spec: FixtureSpec, reason: impl Into<String>) {
		let reason = reason.into();
		match self.entries.entry(PendingKey::of(&spec)) {
			Entry::Occupied(mut existing) => {
				let entry = existing.get_mut();
				entry.spec = spec;
				entry.reason = reason;
			}
			Entry::Vacant(slot) => {
				slot.insert(PendingEntry { spec, reason });
			}
		}
	}

	/// Removes a specification, keeping the order of the remaining ones.
	pub fn remove(&mut self, key: &PendingKey) -> Option<PendingEntry> {
		self.entries.shift_remove(key)
	}

	/// Iterates over pending entries in deferral order.
	pub fn iter(&self) -> impl Iterator<Item = &PendingEntry> {
		self.entries.values()
	}

	/// Clones the pending specifications in deferral order.
	pub fn specs(&self) -> Vec<FixtureSpec> {
		self.entries.values().map(|e| e.spec.clone()).collect()
	}

	/// Returns the number of pending specifications.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true if nothing is pending.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Empties the set, returning every entry as a permanent failure.
	pub fn drain_failures(&mut self) -> Vec<FixtureFailure> {
		self.entries
			.drain(..)
			.map(|(_, entry)| entry.into_failure())
			.collect()
	}
}

/// Writes fixture specifications into a [`Store`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use reinhardt_populate::factory::{RecordFactory, Submission};
/// use reinhardt_populate::fixtures::FixtureSpec;
/// use reinhardt_populate::schema::{RecordType, Schema};
/// use reinhardt_populate::store::InMemoryStore;
///
/// # tokio_test_block(async {
/// let schema = Arc::new(Schema::new().with(RecordType::new("Page")));
/// let store = Arc::new(InMemoryStore::with_tables(["Page"]));
/// let mut factory = RecordFactory::new(schema, store);
///
/// let child = FixtureSpec::new("Page", "two").with_field("ParentID", "=>Page.three");
/// assert!(matches!(factory.submit(child).await, Submission::Deferred(_)));
/// assert!(factory.submit(FixtureSpec::new("Page", "three")).await.is_resolved());
/// assert_eq!(factory.pending().len(), 1);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
pub struct RecordFactory {
	schema: Arc<Schema>,
	store: Arc<dyn Store>,
	identifiers: IndexMap<FixtureKey, RecordId>,
	pending: PendingSet,
}

impl RecordFactory {
	/// Creates a factory writing through `store`.
	pub fn new(schema: Arc<Schema>, store: Arc<dyn Store>) -> Self {
		Self {
			schema,
			store,
			identifiers: IndexMap::new(),
			pending: PendingSet::new(),
		}
	}

	/// Attempts to materialize `spec`.
	///
	/// Never fails: any error is recorded as the deferral reason and the
	/// specification is parked in the pending set.
	pub async fn submit(&mut self, spec: FixtureSpec) -> Submission {
		let key = spec.key();
		match self.materialize(&spec).await {
			Ok(id) => {
				self.pending.remove(&PendingKey::of(&spec));
				if let Some(previous) = self.identifiers.insert(key.clone(), id) {
					tracing::warn!(
						fixture = %key,
						previous,
						id,
						"Fixture identifier declared more than once, using the latest record"
					);
				}
				tracing::debug!(fixture = %key, id, "Created record");
				Submission::Resolved(id)
			}
			Err(e) => {
				let reason = e.to_string();
				tracing::debug!(fixture = %key, reason = %reason, "Deferred fixture");
				self.pending.defer(spec, reason.clone());
				Submission::Deferred(reason)
			}
		}
	}

	/// Returns the generated identifier of a materialized fixture.
	pub fn identifier(&self, class: &str, identifier: &str) -> Option<RecordId> {
		self.identifiers
			.get(&FixtureKey::new(class, identifier))
			.copied()
	}

	/// Returns the number of materialized fixtures.
	pub fn resolved_count(&self) -> usize {
		self.identifiers.len()
	}

	/// Returns the pending set.
	pub fn pending(&self) -> &PendingSet {
		&self.pending
	}

	/// Returns the pending set for final-failure reporting.
	pub fn pending_mut(&mut self) -> &mut PendingSet {
		&mut self.pending
	}

	fn resolve_reference(&self, reference: &FixtureRef) -> PopulateResult<RecordId> {
		self.identifiers
			.get(&reference.key())
			.copied()
			.ok_or_else(|| PopulateError::UnresolvedReference(reference.clone()))
	}

	fn resolve_fields(&self, spec: &FixtureSpec) -> PopulateResult<Row> {
		let mut row = Row::with_capacity(spec.fields.len());
		for (name, value) in &spec.fields {
			let resolved = match value {
				FieldValue::Scalar(v) => v.clone(),
				FieldValue::Reference(r) => Value::from(self.resolve_reference(r)?),
				FieldValue::References(refs) => Value::Array(
					refs.iter()
						.map(|r| self.resolve_reference(r).map(Value::from))
						.collect::<PopulateResult<Vec<_>>>()?,
				),
			};
			row.insert(name.clone(), resolved);
		}
		Ok(row)
	}

	/// Splits resolved values into one row per table of the hierarchy.
	fn split_rows(&self, spec: &FixtureSpec, hierarchy: &[&RecordType], values: Row) -> Vec<Row> {
		let mut rows = vec![Row::new(); hierarchy.len()];
		if hierarchy.len() > 1 {
			rows[0].insert(CLASS_NAME_COLUMN.to_string(), Value::from(spec.class.as_str()));
		}

		let leaf = hierarchy.len() - 1;
		for (name, value) in values {
			let index = hierarchy
				.iter()
				.position(|t| t.owns_field(&name))
				.unwrap_or(leaf);
			rows[index].insert(name, value);
		}
		rows
	}

	/// Returns the first reference of `spec` that has not been materialized.
	fn first_missing_reference<'a>(&self, spec: &'a FixtureSpec) -> Option<&'a FixtureRef> {
		spec.references()
			.into_iter()
			.find(|r| !self.identifiers.contains_key(&r.key()))
	}

	async fn materialize(&self, spec: &FixtureSpec) -> PopulateResult<RecordId> {
		let hierarchy = self.schema.hierarchy(&spec.class)?;
		// Nothing is written until every reference and table is available
		if let Some(missing) = self.first_missing_reference(spec) {
			return Err(PopulateError::UnresolvedReference(missing.clone()));
		}
		for record_type in &hierarchy {
			if !self.store.table_exists(record_type.table()).await? {
				return Err(PopulateError::StoreError(format!(
					"no such table: {}",
					record_type.table()
				)));
			}
		}
		let values = self.resolve_fields(spec)?;
		let rows = self.split_rows(spec, &hierarchy, values);

		let id = self.store.insert(hierarchy[0].table(), &rows[0]).await?;
		for (index, (record_type, row)) in hierarchy.iter().zip(&rows).enumerate().skip(1) {
			if let Err(e) = self.store.insert_with_id(record_type.table(), id, row).await {
				self.roll_back(spec, &hierarchy[..index], id).await;
				return Err(e);
			}
		}

		if let Err(e) = self.publish(spec, &hierarchy, &rows, id).await {
			tracing::warn!(
				fixture = %spec.key(),
				id,
				error = %e,
				"Failed to publish record to versioned tables"
			);
		}
		Ok(id)
	}

	/// Removes the rows of a partially written record, most derived first.
	async fn roll_back(&self, spec: &FixtureSpec, written: &[&RecordType], id: RecordId) {
		for record_type in written.iter().rev() {
			if let Err(e) = self.store.delete(record_type.table(), id).await {
				tracing::warn!(
					fixture = %spec.key(),
					table = %record_type.table(),
					id,
					error = %e,
					"Failed to roll back partially written record"
				);
			}
		}
	}

	/// Copies a new record into the stage and history tables of its class.
	async fn publish(
		&self,
		spec: &FixtureSpec,
		hierarchy: &[&RecordType],
		rows: &[Row],
		id: RecordId,
	) -> PopulateResult<()> {
		let Some(versioning) = self.schema.versioning_of(&spec.class) else {
			return Ok(());
		};

		for (record_type, row) in hierarchy.iter().zip(rows) {
			for stage in versioning.published_stages() {
				let table = format!("{}_{}", record_type.table(), stage);
				if self.store.table_exists(&table).await? {
					self.store.insert_with_id(&table, id, row).await?;
				}
			}

			let history = format!("{}_{}", record_type.table(), VERSIONS_SUFFIX);
			if self.store.table_exists(&history).await? {
				let mut version_row = Row::with_capacity(row.len() + 2);
				version_row.insert(RECORD_ID_COLUMN.to_string(), Value::from(id));
				version_row.insert(VERSION_COLUMN.to_string(), Value::from(1));
				version_row.extend(row.iter().map(|(k, v)| (k.clone(), v.clone())));
				self.store.insert(&history, &version_row).await?;
			}
		}
		Ok(())
	}
}

impl std::fmt::Debug for RecordFactory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RecordFactory")
			.field("resolved", &self.identifiers.len())
			.field("pending", &self.pending.len())
			.finish()
	}
}
