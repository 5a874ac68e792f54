//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod directory_repo;
pub mod job_repo;
pub mod module_definition_repo;
pub mod module_run_repo;

pub use directory_repo::DirectoryRepo;
pub use job_repo::JobRepo;
pub use module_definition_repo::ModuleDefinitionRepo;
pub use module_run_repo::ModuleRunRepo;
