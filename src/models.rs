//! Core data types for the scheduling engine.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::ScheduleWarning;
use crate::scheduler::RolloutDecision;

/// A dependency edge: the predecessor must finish, plus `lag_days`, before
/// the dependent task may start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub pred: String,
    #[serde(default)]
    pub lag_days: f64,
}

impl Dependency {
    pub fn new(pred: impl Into<String>) -> Self {
        Self {
            pred: pred.into(),
            lag_days: 0.0,
        }
    }

    pub fn with_lag(pred: impl Into<String>, lag_days: f64) -> Self {
        Self {
            pred: pred.into(),
            lag_days,
        }
    }
}

/// A unit of schedulable work.
///
/// Resource requirements come in two mutually exclusive forms: an explicit
/// list of `(resource, allocation)` pairs that are all claimed together, or a
/// textual `resource_spec` the resolver expands at scheduling time. A task
/// with neither runs on the shared unassigned resource.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Effort in working days. Zero marks a milestone.
    pub duration_days: f64,
    /// Explicit assignments as (resource id, allocation in (0, 1]).
    #[serde(default)]
    pub resources: Vec<(String, f64)>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Spec for auto-assignment, e.g. `"*"`, `"ann|ben"`, `"platform|!ann"`.
    #[serde(default)]
    pub resource_spec: Option<String>,
    /// Priority 0-100; falls back to the configured default.
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub start_after: Option<NaiveDate>,
    #[serde(default)]
    pub end_before: Option<NaiveDate>,
    /// Pins the start; the task bypasses the scheduler but still claims
    /// resources.
    #[serde(default)]
    pub start_on: Option<NaiveDate>,
    #[serde(default)]
    pub end_on: Option<NaiveDate>,
    /// Named planning window, e.g. `"2025q3"`. Fills `start_after` and
    /// `end_before` when those are not set explicitly.
    #[serde(default)]
    pub timeframe: Option<String>,
}

impl Task {
    pub fn is_milestone(&self) -> bool {
        self.duration_days == 0.0
    }

    pub fn is_fixed(&self) -> bool {
        self.start_on.is_some() || self.end_on.is_some()
    }

    /// Sum of explicit allocations, clamped to a usable positive value.
    pub fn total_allocation(&self) -> f64 {
        let total: f64 = self.resources.iter().map(|(_, a)| *a).sum();
        if total > 0.0 {
            total
        } else {
            1.0
        }
    }

    /// Calendar working days this task occupies its resources for.
    ///
    /// Partial allocations stretch the span: 5 days of effort at 0.5
    /// allocation takes 10 working days. Spec-assigned tasks always run at
    /// full allocation.
    pub fn effective_duration(&self) -> f64 {
        if self.resource_spec.is_some() || self.resources.is_empty() {
            self.duration_days
        } else {
            self.duration_days / self.total_allocation()
        }
    }
}

/// A scheduling capacity unit. Resource order in the bundle is significant:
/// it drives wildcard and group expansion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    /// Sorted, non-overlapping closed date intervals when the resource is
    /// unavailable.
    #[serde(default)]
    pub dns_periods: Vec<(NaiveDate, NaiveDate)>,
}

impl Resource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dns_periods: Vec::new(),
        }
    }
}

/// A named, ordered set of resources usable in resource specs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub name: String,
    pub members: Vec<String>,
}

/// A task with concrete dates and resources assigned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub task_id: String,
    pub start_date: NaiveDate,
    /// Completion date, exclusive: the first day the resources are free again.
    pub end_date: NaiveDate,
    /// Effective working days (allocation-adjusted).
    pub duration_days: f64,
    /// Concrete resource ids; empty for milestones.
    pub resources: Vec<String>,
}

/// Raw output of one scheduling algorithm.
#[derive(Clone, Debug, Default)]
pub struct AlgorithmResult {
    pub scheduled_tasks: Vec<ScheduledTask>,
    /// Opaque string metadata: algorithm name, strategy, decision counts.
    pub algorithm_metadata: BTreeMap<String, String>,
}

/// Everything a scheduling run consumes.
#[derive(Clone, Debug)]
pub struct ScheduleBundle {
    pub tasks: Vec<Task>,
    pub resources: Vec<Resource>,
    pub groups: Vec<ResourceGroup>,
    /// Unavailability applied to every resource.
    pub global_dns_periods: Vec<(NaiveDate, NaiveDate)>,
    /// Baseline date; nothing schedules before this.
    pub current_date: NaiveDate,
    /// Tasks treated as finished before the run starts.
    pub completed_task_ids: Vec<String>,
    pub config: EngineConfig,
}

impl ScheduleBundle {
    pub fn new(tasks: Vec<Task>, resources: Vec<Resource>, current_date: NaiveDate) -> Self {
        Self {
            tasks,
            resources,
            groups: Vec::new(),
            global_dns_periods: Vec::new(),
            current_date,
            completed_task_ids: Vec::new(),
            config: EngineConfig::default(),
        }
    }
}

/// Complete result of a run: the schedule, the preprocessor's derived values,
/// rollout decision records, and the warning channel.
#[derive(Clone, Debug)]
pub struct ScheduleOutcome {
    pub result: AlgorithmResult,
    pub computed_deadlines: BTreeMap<String, NaiveDate>,
    pub computed_priorities: BTreeMap<String, i32>,
    pub rollout_decisions: Vec<RolloutDecision>,
    pub warnings: Vec<ScheduleWarning>,
}

impl ScheduleOutcome {
    /// Look up a scheduled task by id.
    pub fn get(&self, task_id: &str) -> Option<&ScheduledTask> {
        self.result
            .scheduled_tasks
            .iter()
            .find(|t| t.task_id == task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_duration_divides_by_allocation() {
        let task = Task {
            id: "t".to_string(),
            duration_days: 5.0,
            resources: vec![("ann".to_string(), 0.5)],
            ..Task::default()
        };
        assert_eq!(task.effective_duration(), 10.0);

        let pair = Task {
            id: "t".to_string(),
            duration_days: 6.0,
            resources: vec![("ann".to_string(), 0.5), ("ben".to_string(), 1.0)],
            ..Task::default()
        };
        assert_eq!(pair.effective_duration(), 4.0);
    }

    #[test]
    fn spec_tasks_run_at_full_allocation() {
        let task = Task {
            id: "t".to_string(),
            duration_days: 5.0,
            resource_spec: Some("*".to_string()),
            ..Task::default()
        };
        assert_eq!(task.effective_duration(), 5.0);
    }

    #[test]
    fn milestone_detection() {
        let task = Task {
            id: "m".to_string(),
            duration_days: 0.0,
            ..Task::default()
        };
        assert!(task.is_milestone());
        assert!(!task.is_fixed());
    }
}
