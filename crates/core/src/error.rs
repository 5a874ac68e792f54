use crate::types::DbId;

/// Entity names carried by [`CoreError::NotFound`].
pub mod entity {
    pub const PROJECT: &str = "Project";
    pub const PERSON: &str = "Person";
    pub const USER: &str = "User";
    pub const MODULE_RUN: &str = "ModuleRun";
    pub const MODULE_DEFINITION: &str = "ModuleDefinition";
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// No enabled definition matches the key (and version, when given).
    ///
    /// A disabled version is reported exactly like a missing one.
    #[error("Module not found: '{module_key}'{}", describe_version(.version))]
    ModuleNotFound {
        module_key: String,
        version: Option<String>,
    },

    #[error("Module '{module_key}' version '{version}' is already registered")]
    DuplicateDefinition { module_key: String, version: String },

    /// The caller supplied a person/scope combination the module cannot accept.
    #[error("Scope mismatch: {0}")]
    ScopeMismatch(String),

    #[error("Invalid status transition for run {run_id}: {from} -> {to}")]
    InvalidTransition {
        run_id: DbId,
        from: &'static str,
        to: &'static str,
    },

    /// The run row is committed but no job reached the queue.
    #[error("Run {run_id} was created but could not be dispatched: {reason}")]
    DispatchFailure { run_id: DbId, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_version(version: &Option<String>) -> String {
    match version {
        Some(v) => format!(" version '{v}'"),
        None => " (no enabled version)".to_string(),
    }
}

impl CoreError {
    /// Shorthand for a missing entity.
    pub fn not_found(entity: &'static str, id: DbId) -> Self {
        Self::NotFound { entity, id }
    }
}
