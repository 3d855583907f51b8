//! Management commands.

mod populate;

pub use populate::{PopulateCommand, PopulateOptions};
