//! Error and warning types for the scheduling engine.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Fatal errors. Any of these aborts the run without producing a schedule.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    /// The dependency graph has a cycle. Carries the edges among the tasks
    /// that could not be ordered.
    #[error("circular dependency detected: {0:?}")]
    CycleDetected(Vec<(String, String)>),

    #[error("task '{task_id}' depends on unknown task '{missing_id}'")]
    UnknownDependency { task_id: String, missing_id: String },

    /// The forward pass ran out of events with tasks still unscheduled.
    #[error("failed to schedule tasks: {0:?}")]
    UnschedulableResidual(Vec<String>),

    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    #[error("unknown resource group '{0}'")]
    UnknownGroup(String),

    #[error("invalid configuration: {field}: {reason}")]
    BadConfig { field: &'static str, reason: String },
}

impl ScheduleError {
    pub(crate) fn bad_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::BadConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Non-fatal findings collected during a run and returned alongside the
/// schedule. The engine always produces a complete schedule when no fatal
/// error occurs; lateness is reported here, never as a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScheduleWarning {
    /// A task finishes after its (explicit or propagated) deadline.
    DeadlineMissed {
        task_id: String,
        computed_end: NaiveDate,
        required_end: NaiveDate,
    },
    /// A fixed-date task starts before a predecessor (plus lag) completes.
    FixedTaskPredecessorLate {
        task_id: String,
        pred_id: String,
        lateness_days: i64,
    },
    /// The task's resource spec produced no candidates; it ran on the shared
    /// unassigned resource.
    UnassignedTask { task_id: String },
}

impl std::fmt::Display for ScheduleWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeadlineMissed {
                task_id,
                computed_end,
                required_end,
            } => write!(
                f,
                "task '{}' finishes {} days after required date ({} vs {})",
                task_id,
                (*computed_end - *required_end).num_days(),
                computed_end,
                required_end
            ),
            Self::FixedTaskPredecessorLate {
                task_id,
                pred_id,
                lateness_days,
            } => write!(
                f,
                "fixed task '{}' starts {} days before predecessor '{}' completes",
                task_id, lateness_days, pred_id
            ),
            Self::UnassignedTask { task_id } => {
                write!(f, "task '{}' has no assignable resource", task_id)
            }
        }
    }
}
