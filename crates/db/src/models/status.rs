//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data in the
//! corresponding `*_statuses` database table.

use leadgraph_core::error::CoreError;
use leadgraph_core::runs::RunStatus;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up the variant for a database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                $( if id == $val {
                    return Some(Self::$variant);
                } )+
                None
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Module run lifecycle status (`module_run_statuses`).
    ModuleRunStatus {
        Queued = 1,
        Running = 2,
        Completed = 3,
        Failed = 4,
    }
}

impl From<RunStatus> for ModuleRunStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Queued => Self::Queued,
            RunStatus::Running => Self::Running,
            RunStatus::Completed => Self::Completed,
            RunStatus::Failed => Self::Failed,
        }
    }
}

impl From<ModuleRunStatus> for RunStatus {
    fn from(status: ModuleRunStatus) -> Self {
        match status {
            ModuleRunStatus::Queued => Self::Queued,
            ModuleRunStatus::Running => Self::Running,
            ModuleRunStatus::Completed => Self::Completed,
            ModuleRunStatus::Failed => Self::Failed,
        }
    }
}

/// Database ID for a core run status.
pub fn run_status_id(status: RunStatus) -> StatusId {
    ModuleRunStatus::from(status).id()
}

/// Core run status for a database ID.
pub fn run_status_from_id(id: StatusId) -> Result<RunStatus, CoreError> {
    ModuleRunStatus::from_id(id)
        .map(RunStatus::from)
        .ok_or_else(|| CoreError::Internal(format!("Unknown module run status id {id}")))
}
