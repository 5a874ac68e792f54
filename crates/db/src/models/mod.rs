//! Row structs for the orchestration tables.
//!
//! Each submodule contains a `FromRow` struct matching the database row and
//! the conversion into the corresponding `leadgraph-core` type.

pub mod job;
pub mod module_definition;
pub mod module_run;
pub mod status;
