//! Sort-key evaluation for the forward pass.
//!
//! Every strategy produces the same key shape: `(primary, secondary, id)`
//! with lower values scheduled first, so one total order covers all four
//! strategies and ties always break on the task id.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

use crate::config::{SchedulingConfig, Strategy};
use crate::error::ScheduleError;

/// The slice of task state the evaluator needs.
#[derive(Clone, Debug)]
pub struct TaskSortInfo {
    pub duration_days: f64,
    pub deadline: Option<NaiveDate>,
    pub priority: i32,
}

/// Per-tick parameters for the ATC strategy, derived from the unscheduled
/// set by the scheduler.
#[derive(Clone, Copy, Debug)]
pub struct AtcParams {
    pub avg_duration: f64,
    pub default_urgency: f64,
}

/// Uniform sort key: lower is more urgent. `secondary` is the strategy's
/// tie-break score and the id makes the order total.
#[derive(Clone, Debug, PartialEq)]
pub struct SortKey {
    pub primary: f64,
    pub secondary: f64,
    pub task_id: String,
}

impl Eq for SortKey {}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_f64(self.primary, other.primary)
            .then(cmp_f64(self.secondary, other.secondary))
            .then_with(|| self.task_id.cmp(&other.task_id))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Critical ratio: slack over remaining duration. Lower is more urgent.
/// Tasks without a deadline get the tick's `default_cr`.
pub fn critical_ratio(
    deadline: Option<NaiveDate>,
    duration_days: f64,
    now: NaiveDate,
    default_cr: f64,
) -> f64 {
    match deadline {
        Some(d) => {
            let slack = (d - now).num_days() as f64;
            slack / duration_days.max(1.0)
        }
        None => default_cr,
    }
}

/// Apparent Tardiness Cost: WSPT weighted by exponential deadline urgency.
/// Higher is more urgent.
pub fn atc_score(
    deadline: Option<NaiveDate>,
    duration_days: f64,
    priority: i32,
    now: NaiveDate,
    atc_k: f64,
    params: &AtcParams,
) -> f64 {
    let wspt = priority as f64 / duration_days.max(0.1);

    let urgency = match deadline {
        Some(d) => {
            let slack_days = (d - now).num_days() as f64 - duration_days;
            if slack_days <= 0.0 {
                1.0
            } else {
                (-slack_days / (atc_k * params.avg_duration)).exp()
            }
        }
        None => params.default_urgency,
    };

    wspt * urgency
}

/// Compute one task's sort key under the configured strategy.
pub fn compute_sort_key(
    task_id: &str,
    info: &TaskSortInfo,
    now: NaiveDate,
    default_cr: f64,
    config: &SchedulingConfig,
    atc_params: Option<&AtcParams>,
) -> Result<SortKey, ScheduleError> {
    let cr = critical_ratio(info.deadline, info.duration_days, now, default_cr);
    let priority = info.priority as f64;

    let (primary, secondary) = match config.strategy {
        Strategy::PriorityFirst => (-priority, cr),
        Strategy::CrFirst => (cr, -priority),
        Strategy::Weighted => (
            config.cr_weight * cr + config.priority_weight * (100.0 - priority),
            0.0,
        ),
        Strategy::Atc => {
            let params = atc_params.ok_or_else(|| {
                ScheduleError::bad_config("strategy", "atc requires per-tick average duration")
            })?;
            let score = atc_score(
                info.deadline,
                info.duration_days,
                info.priority,
                now,
                config.atc_k,
                params,
            );
            (-score, 0.0)
        }
    };

    Ok(SortKey {
        primary,
        secondary,
        task_id: task_id.to_string(),
    })
}

/// Sort task ids most-urgent-first under the configured strategy.
pub fn sort_tasks(
    task_ids: &[String],
    infos: &FxHashMap<String, TaskSortInfo>,
    now: NaiveDate,
    default_cr: f64,
    config: &SchedulingConfig,
    atc_params: Option<&AtcParams>,
) -> Result<Vec<String>, ScheduleError> {
    let mut keys: Vec<SortKey> = Vec::with_capacity(task_ids.len());

    for task_id in task_ids {
        let info = infos.get(task_id).ok_or_else(|| {
            ScheduleError::bad_config("tasks", format!("no sort info for task '{task_id}'"))
        })?;
        keys.push(compute_sort_key(
            task_id, info, now, default_cr, config, atc_params,
        )?);
    }

    keys.sort();

    Ok(keys.into_iter().map(|k| k.task_id).collect())
}
