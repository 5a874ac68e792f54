//! Module run types, the run status state machine, and listing bounds.
//!
//! ```text
//! QUEUED --> RUNNING --> COMPLETED
//!                   \--> FAILED
//! ```
//!
//! QUEUED is the only initial state. COMPLETED and FAILED are terminal;
//! re-execution is a new run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub const ALL: [RunStatus; 4] = [Self::Queued, Self::Running, Self::Completed, Self::Failed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Statuses reachable from `self` in one step.
    pub fn valid_transitions(self) -> &'static [RunStatus] {
        match self {
            Self::Queued => &[Self::Running],
            Self::Running => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    pub fn can_transition_to(self, next: RunStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown run status '{s}'")))
    }
}

/// Validate a status transition for a given run.
pub fn validate_transition(run_id: DbId, from: RunStatus, to: RunStatus) -> Result<(), CoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            run_id,
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// One execution attempt of a module against a project or a person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRun {
    pub id: DbId,
    pub project_id: DbId,
    /// Present iff the bound module is PERSON_LEVEL.
    pub person_id: Option<DbId>,
    pub triggered_by_user_id: DbId,
    pub module_key: String,
    /// Version frozen at creation time; never re-resolved.
    pub module_version: String,
    pub status: RunStatus,
    pub input_config: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Row to persist for a freshly validated run. Always inserted as QUEUED.
#[derive(Debug, Clone, PartialEq)]
pub struct NewModuleRun {
    pub project_id: DbId,
    pub person_id: Option<DbId>,
    pub triggered_by_user_id: DbId,
    pub module_key: String,
    pub module_version: String,
    pub input_config: serde_json::Value,
}

/// What the worker reports alongside a status change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusReport {
    pub error_message: Option<String>,
    pub output: Option<serde_json::Value>,
}

impl StatusReport {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            output: None,
        }
    }

    pub fn completed(output: serde_json::Value) -> Self {
        Self {
            error_message: None,
            output: Some(output),
        }
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Caller-facing predicates for run listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFilter {
    pub status: Option<RunStatus>,
    pub module_key: Option<String>,
    pub limit: Option<i64>,
}

/// Fully resolved listing query handed to a [`RunStore`](crate::ledger::RunStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunQuery {
    pub project_id: DbId,
    pub person_id: Option<DbId>,
    pub status: Option<RunStatus>,
    pub module_key: Option<String>,
    /// Already clamped to `1..=max`.
    pub limit: i64,
}

impl RunQuery {
    pub fn matches(&self, run: &ModuleRun) -> bool {
        run.project_id == self.project_id
            && self.person_id.map_or(true, |p| run.person_id == Some(p))
            && self.status.map_or(true, |s| s == run.status)
            && self
                .module_key
                .as_deref()
                .map_or(true, |key| key == run.module_key)
    }
}

/// Page-size bounds for run listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunListLimits {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for RunListLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

impl RunListLimits {
    pub fn clamp(&self, limit: Option<i64>) -> i64 {
        clamp_limit(limit, self.default_limit, self.max_limit)
    }
}

/// Clamp a user-provided limit to valid bounds.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_can_only_start_running() {
        assert!(RunStatus::Queued.can_transition_to(RunStatus::Running));
        assert!(!RunStatus::Queued.can_transition_to(RunStatus::Completed));
        assert!(!RunStatus::Queued.can_transition_to(RunStatus::Failed));
    }

    #[test]
    fn running_reaches_both_terminals() {
        assert!(RunStatus::Running.can_transition_to(RunStatus::Completed));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Failed));
        assert!(!RunStatus::Running.can_transition_to(RunStatus::Queued));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [RunStatus::Completed, RunStatus::Failed] {
            assert!(terminal.is_terminal());
            for next in RunStatus::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn invalid_transition_error_names_states() {
        let err = validate_transition(9, RunStatus::Completed, RunStatus::Running).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status transition for run 9: COMPLETED -> RUNNING"
        );
    }

    #[test]
    fn status_parses_from_wire_name() {
        assert_eq!("FAILED".parse::<RunStatus>().unwrap(), RunStatus::Failed);
        assert!("failed".parse::<RunStatus>().is_err());
    }

    #[test]
    fn clamp_limit_uses_default_when_none() {
        assert_eq!(clamp_limit(None, 20, 100), 20);
    }

    #[test]
    fn clamp_limit_respects_max() {
        assert_eq!(clamp_limit(Some(500), 20, 100), 100);
    }

    #[test]
    fn clamp_limit_floors_at_one() {
        assert_eq!(clamp_limit(Some(0), 20, 100), 1);
        assert_eq!(clamp_limit(Some(-5), 20, 100), 1);
    }

    #[test]
    fn run_filter_rejects_unknown_fields() {
        let res: Result<RunFilter, _> =
            serde_json::from_value(serde_json::json!({ "stat": "QUEUED" }));
        assert!(res.is_err());
    }
}
