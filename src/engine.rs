//! Engine orchestration: validation, algorithm dispatch, and warning
//! collection around one scheduling run.

use chrono::{Days, NaiveDate};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::AlgorithmKind;
use crate::critical_path::CpScheduler;
use crate::error::{ScheduleError, ScheduleWarning};
use crate::models::{ScheduleBundle, ScheduleOutcome, ScheduledTask, Task};
use crate::preprocess::{backward_pass, PreprocessResult};
use crate::resources::{ResourceCatalog, ResourceSpec, UNASSIGNED_RESOURCE};
use crate::scheduler::SgsScheduler;
use crate::timeframe::parse_timeframe;

/// Run one scheduling pass over the bundle.
///
/// The run is a pure function of the bundle: validation and spec expansion
/// happen up front, one algorithm runs to completion, and warnings are
/// collected from the finished schedule. Calling it twice with the same
/// bundle produces identical output.
pub fn schedule(bundle: &ScheduleBundle) -> Result<ScheduleOutcome, ScheduleError> {
    bundle.config.validate()?;

    let catalog = ResourceCatalog::new(
        &bundle.resources,
        &bundle.groups,
        &bundle.global_dns_periods,
    )?;
    let completed: FxHashSet<String> = bundle.completed_task_ids.iter().cloned().collect();

    let mut tasks = normalize_tasks(&bundle.tasks);
    validate_dependencies(&tasks, &completed)?;
    let candidates = resolve_specs(&mut tasks, &catalog)?;

    let default_priority = bundle.config.scheduling.default_priority;
    let preprocess = backward_pass(&tasks, &completed, default_priority)?;

    let live_tasks: Vec<Task> = tasks
        .iter()
        .filter(|t| !completed.contains(&t.id))
        .cloned()
        .collect();

    let (result, rollout_decisions) = match bundle.config.algorithm {
        AlgorithmKind::ParallelSgs | AlgorithmKind::BoundedRollout => {
            let rollout = (bundle.config.algorithm == AlgorithmKind::BoundedRollout)
                .then(|| bundle.config.rollout.clone());
            let mut scheduler = SgsScheduler::new(
                live_tasks,
                candidates,
                catalog,
                bundle.current_date,
                completed.clone(),
                bundle.config.scheduling.clone(),
                rollout,
                preprocess.clone(),
            );
            let result = scheduler.schedule()?;
            (result, scheduler.rollout_decisions().to_vec())
        }
        AlgorithmKind::CriticalPath => {
            let mut scheduler = CpScheduler::new(
                live_tasks,
                candidates,
                catalog,
                bundle.current_date,
                completed.clone(),
                default_priority,
                bundle.config.critical_path.clone(),
            );
            (scheduler.schedule()?, Vec::new())
        }
    };

    let warnings = collect_warnings(&tasks, &result.scheduled_tasks, &preprocess, &completed);

    Ok(ScheduleOutcome {
        result,
        computed_deadlines: preprocess.computed_deadlines.into_iter().collect(),
        computed_priorities: preprocess.computed_priorities.into_iter().collect(),
        rollout_decisions,
        warnings,
    })
}

/// Clone the input tasks and fill date constraints from timeframes.
fn normalize_tasks(tasks: &[Task]) -> Vec<Task> {
    let mut out = tasks.to_vec();
    for task in &mut out {
        if let Some(timeframe) = &task.timeframe {
            if let Some((start, end)) = parse_timeframe(timeframe) {
                task.start_after = task.start_after.or(Some(start));
                task.end_before = task.end_before.or(Some(end));
            }
        }
    }
    out
}

/// Every dependency must reference a known task or a completed id.
fn validate_dependencies(
    tasks: &[Task],
    completed: &FxHashSet<String>,
) -> Result<(), ScheduleError> {
    let known: FxHashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    for task in tasks {
        for dep in &task.dependencies {
            if !known.contains(dep.pred.as_str()) && !completed.contains(&dep.pred) {
                return Err(ScheduleError::UnknownDependency {
                    task_id: task.id.clone(),
                    missing_id: dep.pred.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Parse and expand every resource spec once. Tasks whose spec expands to
/// nothing, and tasks with no resource information at all, fall back to the
/// shared unassigned resource.
fn resolve_specs(
    tasks: &mut [Task],
    catalog: &ResourceCatalog,
) -> Result<FxHashMap<String, Vec<String>>, ScheduleError> {
    let mut candidates: FxHashMap<String, Vec<String>> = FxHashMap::default();

    for task in tasks.iter_mut() {
        if let Some(spec) = &task.resource_spec {
            let parsed = ResourceSpec::parse(spec, catalog)?;
            let mut expanded = catalog.expand(&parsed)?;
            if expanded.is_empty() {
                expanded = vec![UNASSIGNED_RESOURCE.to_string()];
            }
            candidates.insert(task.id.clone(), expanded);
        } else if task.resources.is_empty() && !task.is_milestone() {
            task.resources = vec![(UNASSIGNED_RESOURCE.to_string(), 1.0)];
        }
    }

    Ok(candidates)
}

/// Collect the non-fatal findings: missed deadlines, tasks serialized on the
/// unassigned resource, and fixed tasks whose predecessors land too late.
fn collect_warnings(
    tasks: &[Task],
    scheduled: &[ScheduledTask],
    preprocess: &PreprocessResult,
    completed: &FxHashSet<String>,
) -> Vec<ScheduleWarning> {
    let mut warnings = Vec::new();

    for entry in scheduled {
        if let Some(&deadline) = preprocess.computed_deadlines.get(&entry.task_id) {
            if entry.end_date > deadline {
                warnings.push(ScheduleWarning::DeadlineMissed {
                    task_id: entry.task_id.clone(),
                    computed_end: entry.end_date,
                    required_end: deadline,
                });
            }
        }
        if entry.resources.iter().any(|r| r == UNASSIGNED_RESOURCE) {
            warnings.push(ScheduleWarning::UnassignedTask {
                task_id: entry.task_id.clone(),
            });
        }
    }

    let spans: FxHashMap<&str, (NaiveDate, NaiveDate)> = scheduled
        .iter()
        .map(|t| (t.task_id.as_str(), (t.start_date, t.end_date)))
        .collect();

    let mut fixed: Vec<&Task> = tasks.iter().filter(|t| t.is_fixed()).collect();
    fixed.sort_by(|a, b| a.id.cmp(&b.id));

    for task in fixed {
        let Some(&(fixed_start, _)) = spans.get(task.id.as_str()) else {
            continue;
        };
        for dep in &task.dependencies {
            if completed.contains(&dep.pred) {
                continue;
            }
            let Some(&(_, pred_end)) = spans.get(dep.pred.as_str()) else {
                continue;
            };
            let unlocked = pred_end
                .checked_add_days(Days::new(1 + dep.lag_days.ceil() as u64))
                .unwrap_or(pred_end);
            if unlocked > fixed_start {
                warnings.push(ScheduleWarning::FixedTaskPredecessorLate {
                    task_id: task.id.clone(),
                    pred_id: dep.pred.clone(),
                    lateness_days: (unlocked - fixed_start).num_days(),
                });
            }
        }
    }

    warnings
}
