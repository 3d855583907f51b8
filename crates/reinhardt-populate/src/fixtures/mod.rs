//! Fixture specifications and their parser.
//!
//! A fixture file lists records to create, grouped by class and keyed by an
//! identifier that later fixtures use to reference them.

mod format;
mod parser;

pub use format::{
	FieldValue, FixtureFile, FixtureFormat, FixtureKey, FixtureRef, FixtureSpec, REFERENCE_PREFIX,
};
pub use parser::FixtureParser;
