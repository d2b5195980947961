//! Rollout support for the critical-path scheduler: contender detection and
//! schedule scoring.
//!
//! Before committing a task, the scheduler can ask whether a higher-scored
//! target has a critical-path task that (a) wants the same resource and
//! (b) unlocks before the current task would finish. If simulation says
//! waiting wins, the resource is reserved for the contender.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::models::{ScheduledTask, Task};

use super::types::Target;

/// A higher-scored target whose critical-path task wants the contested
/// resource soon.
#[derive(Clone, Debug)]
pub struct Contender {
    pub target_id: String,
    pub target_score: f64,
    /// The critical-path task that needs the resource.
    pub critical_task_id: String,
    pub eligible_date: NaiveDate,
    pub estimated_completion: NaiveDate,
}

/// A hold on a resource for a contender's task. Cleared once the task is
/// committed or the reservation date passes.
#[derive(Clone, Debug)]
pub struct Reservation {
    pub resource: String,
    pub target_id: String,
    pub task_id: String,
    pub target_score: f64,
    pub reserved_from: NaiveDate,
}

/// Find contenders for `resource`, best target first.
#[allow(clippy::too_many_arguments)]
pub fn find_contenders(
    current_target_score: f64,
    current_completion: NaiveDate,
    resource: &str,
    score_ratio_threshold: f64,
    ranked_targets: &[&Target],
    tasks: &FxHashMap<String, Task>,
    candidates: &FxHashMap<String, Vec<String>>,
    scheduled: &FxHashMap<String, (NaiveDate, NaiveDate)>,
    now: NaiveDate,
) -> Vec<Contender> {
    let score_threshold = current_target_score * score_ratio_threshold;
    let mut contenders = Vec::new();

    for target in ranked_targets {
        if target.score <= score_threshold {
            continue;
        }
        if let Some(contender) = eligible_critical_task_for_resource(
            target,
            resource,
            current_completion,
            tasks,
            candidates,
            scheduled,
            now,
        ) {
            contenders.push(contender);
        }
    }

    // ranked_targets is already best-first; keep that order stable.
    contenders
}

/// First critical-path task of `target` that wants `resource` and unlocks
/// before `deadline`. Walks the critical path in a sorted order so the
/// answer is deterministic.
fn eligible_critical_task_for_resource(
    target: &Target,
    resource: &str,
    deadline: NaiveDate,
    tasks: &FxHashMap<String, Task>,
    candidates: &FxHashMap<String, Vec<String>>,
    scheduled: &FxHashMap<String, (NaiveDate, NaiveDate)>,
    now: NaiveDate,
) -> Option<Contender> {
    let mut path: Vec<&String> = target.critical_path.iter().collect();
    path.sort();

    for task_id in path {
        if scheduled.contains_key(task_id) {
            continue;
        }
        let task = tasks.get(task_id)?;
        if task.is_milestone() {
            continue;
        }
        if !task_wants_resource(task, resource, candidates) {
            continue;
        }

        let eligible_date = eligibility_date(task, scheduled, now)?;
        if eligible_date >= deadline {
            continue;
        }

        // Rough completion estimate; the simulation does the exact math.
        let estimated_completion =
            eligible_date + chrono::Duration::days(task.effective_duration().ceil() as i64);

        return Some(Contender {
            target_id: target.id.clone(),
            target_score: target.score,
            critical_task_id: task_id.clone(),
            eligible_date,
            estimated_completion,
        });
    }

    None
}

fn task_wants_resource(
    task: &Task,
    resource: &str,
    candidates: &FxHashMap<String, Vec<String>>,
) -> bool {
    if task.resources.iter().any(|(r, _)| r == resource) {
        return true;
    }
    candidates
        .get(&task.id)
        .map(|c| c.iter().any(|r| r == resource))
        .unwrap_or(false)
}

/// When every dependency (plus lag) of `task` is satisfied; `None` if a
/// dependency is not scheduled yet.
fn eligibility_date(
    task: &Task,
    scheduled: &FxHashMap<String, (NaiveDate, NaiveDate)>,
    now: NaiveDate,
) -> Option<NaiveDate> {
    let mut eligible = now;

    for dep in &task.dependencies {
        let (_, end) = scheduled.get(&dep.pred)?;
        let unlocked = *end + chrono::Duration::days(1 + dep.lag_days.ceil() as i64);
        eligible = eligible.max(unlocked);
    }

    if let Some(start_after) = task.start_after {
        eligible = eligible.max(start_after);
    }

    Some(eligible)
}

/// Score a partial schedule for scenario comparison; lower is better.
///
/// Scheduled tasks pay priority-weighted completion time plus 10x priority
/// per day of tardiness. Eligible-but-unscheduled tasks pay for the idle
/// horizon scaled by deadline pressure, plus their expected tardiness.
#[allow(clippy::too_many_arguments)]
pub fn score_partial_schedule(
    scheduled_tasks: &[ScheduledTask],
    unscheduled: &FxHashSet<String>,
    tasks: &FxHashMap<String, Task>,
    deadlines: &FxHashMap<String, NaiveDate>,
    priorities: &FxHashMap<String, i32>,
    scheduled_dates: &FxHashMap<String, (NaiveDate, NaiveDate)>,
    start_date: NaiveDate,
    horizon: NaiveDate,
    default_priority: i32,
) -> f64 {
    let mut score = 0.0;

    for task in scheduled_tasks {
        let priority = priority_of(&task.task_id, tasks, priorities, default_priority) as f64;
        let days_to_complete = (task.end_date - start_date).num_days() as f64;
        score += days_to_complete * (priority / 100.0);

        if let Some(deadline) = deadlines.get(&task.task_id) {
            if task.end_date > *deadline {
                let tardiness = (task.end_date - *deadline).num_days() as f64;
                score += tardiness * priority * 10.0;
            }
        }
    }

    for task_id in unscheduled {
        let Some(task) = tasks.get(task_id) else {
            continue;
        };
        if !eligible_by(task, scheduled_dates, horizon) {
            continue;
        }

        let priority = priority_of(task_id, tasks, priorities, default_priority) as f64;
        let days_delayed = (horizon - start_date).num_days() as f64;

        let urgency_mult = match deadlines.get(task_id) {
            Some(deadline) => {
                let days_to_deadline = (*deadline - start_date).num_days() as f64;
                if days_to_deadline <= 0.0 {
                    10.0
                } else {
                    (10.0 / days_to_deadline.max(1.0)).min(10.0)
                }
            }
            None => 1.0,
        };
        score += urgency_mult * (priority / 100.0) * days_delayed;

        if let Some(deadline) = deadlines.get(task_id) {
            let expected_end =
                horizon + chrono::Duration::days(task.effective_duration().ceil() as i64);
            if expected_end > *deadline {
                let expected_tardiness = (expected_end - *deadline).num_days() as f64;
                score += expected_tardiness * priority * 10.0;
            }
        }
    }

    score
}

fn priority_of(
    task_id: &str,
    tasks: &FxHashMap<String, Task>,
    priorities: &FxHashMap<String, i32>,
    default_priority: i32,
) -> i32 {
    if let Some(&priority) = priorities.get(task_id) {
        return priority;
    }
    tasks
        .get(task_id)
        .and_then(|t| t.priority)
        .unwrap_or(default_priority)
}

fn eligible_by(
    task: &Task,
    scheduled_dates: &FxHashMap<String, (NaiveDate, NaiveDate)>,
    horizon: NaiveDate,
) -> bool {
    if let Some(start_after) = task.start_after {
        if start_after > horizon {
            return false;
        }
    }

    for dep in &task.dependencies {
        match scheduled_dates.get(&dep.pred) {
            Some((_, end)) => {
                let unlocked = *end + chrono::Duration::days(1 + dep.lag_days.ceil() as i64);
                if unlocked > horizon {
                    return false;
                }
            }
            None => return false,
        }
    }

    true
}
