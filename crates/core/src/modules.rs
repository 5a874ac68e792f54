//! Module definition types and registration rules.
//!
//! A module is a versioned unit of enrichment work identified by a stable
//! `module_key`. The pair `(module_key, version)` is unique.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// What kind of work a module performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleType {
    /// Brings raw data in.
    Connector,
    /// Derives structured facts.
    Enricher,
    /// Synthesizes higher-level signals.
    Composer,
}

impl ModuleType {
    pub const ALL: [ModuleType; 3] = [Self::Connector, Self::Enricher, Self::Composer];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connector => "CONNECTOR",
            Self::Enricher => "ENRICHER",
            Self::Composer => "COMPOSER",
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown module type '{s}'")))
    }
}

/// Whether a module runs against one person or a whole project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleScope {
    PersonLevel,
    ProjectLevel,
}

impl ModuleScope {
    pub const ALL: [ModuleScope; 2] = [Self::PersonLevel, Self::ProjectLevel];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PersonLevel => "PERSON_LEVEL",
            Self::ProjectLevel => "PROJECT_LEVEL",
        }
    }
}

impl fmt::Display for ModuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleScope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown module scope '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A registered, versioned module definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub id: DbId,
    pub module_key: String,
    pub module_type: ModuleType,
    pub scope: ModuleScope,
    pub version: String,
    /// Declarative schema for the module's input. Opaque to the core.
    pub config_schema: serde_json::Value,
    pub is_enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for registering a new module definition.
///
/// `is_enabled` has no default here: whoever registers decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewModuleDefinition {
    #[validate(
        length(min = 1, max = 100),
        custom(function = "validate_module_key")
    )]
    pub module_key: String,
    pub module_type: ModuleType,
    pub scope: ModuleScope,
    #[validate(
        length(min = 1, max = 32),
        custom(function = "validate_version_label")
    )]
    pub version: String,
    pub config_schema: serde_json::Value,
    pub is_enabled: bool,
}

impl NewModuleDefinition {
    /// Run field validation, flattening the errors into a [`CoreError`].
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))
    }
}

/// Partial update for an existing definition. Absent fields stay untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleUpdate {
    pub is_enabled: Option<bool>,
    pub config_schema: Option<serde_json::Value>,
}

impl ModuleUpdate {
    pub fn is_empty(&self) -> bool {
        self.is_enabled.is_none() && self.config_schema.is_none()
    }
}

/// Closed set of predicates for listing definitions. All present fields
/// must match; an absent field places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleFilter {
    pub module_key: Option<String>,
    pub module_type: Option<ModuleType>,
    pub is_enabled: Option<bool>,
}

impl ModuleFilter {
    pub fn matches(&self, def: &ModuleDefinition) -> bool {
        self.module_key
            .as_deref()
            .map_or(true, |key| key == def.module_key)
            && self.module_type.map_or(true, |t| t == def.module_type)
            && self.is_enabled.map_or(true, |e| e == def.is_enabled)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Module keys are lowercase kebab-case: `[a-z0-9]` segments joined by `-`.
fn validate_module_key(key: &str) -> Result<(), ValidationError> {
    let well_formed = !key.starts_with('-')
        && !key.ends_with('-')
        && !key.contains("--")
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if well_formed {
        Ok(())
    } else {
        let mut err = ValidationError::new("module_key_format");
        err.message = Some("must be lowercase kebab-case (a-z, 0-9, '-')".into());
        Err(err)
    }
}

fn validate_version_label(version: &str) -> Result<(), ValidationError> {
    if version.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("version_format");
        err.message = Some("must not contain whitespace".into());
        return Err(err);
    }
    Ok(())
}
