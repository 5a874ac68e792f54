//! Orchestration core for lead enrichment modules.
//!
//! Owns the module registry, version resolution, scope validation, the run
//! ledger, and dispatch onto the job queue. Storage and the queue sit behind
//! traits so the same logic runs over Postgres (`leadgraph-db`) or the
//! in-memory backends in [`memory`].

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod modules;
pub mod orchestration;
pub mod registry;
pub mod resolution;
pub mod runs;
pub mod runtime;
pub mod scope;
pub mod seeding;
pub mod types;
