//! Worker side of module runs.
//!
//! Claims `EXECUTE_MODULE_RUN` jobs, drives each run through
//! RUNNING to COMPLETED or FAILED via the ledger, and optionally re-enqueues
//! runs whose dispatch was lost.

pub mod config;
pub mod consumer;
pub mod executor;
pub mod reconciler;
pub mod tasks;
