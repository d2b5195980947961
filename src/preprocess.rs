//! Backward pass: deadline and priority propagation over the task DAG.
//!
//! Deadlines flow backward: if task B needs task A finished (plus lag)
//! before it can start, A must be done by B's deadline minus B's duration
//! minus the lag. Priorities flow the other way: a task inherits the highest
//! priority among its dependents, so upstream work feels downstream pressure.

use chrono::{Duration, NaiveDate};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

use crate::error::ScheduleError;
use crate::models::Task;

/// Derived per-task values produced by the backward pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreprocessResult {
    /// Latest acceptable finish date per task. Absent for tasks with no
    /// deadline anywhere downstream.
    pub computed_deadlines: FxHashMap<String, NaiveDate>,
    /// Effective priority per task after propagation.
    pub computed_priorities: FxHashMap<String, i32>,
}

/// Deadline a predecessor must meet for its dependent to meet its own.
fn dependency_deadline(
    dependent_deadline: NaiveDate,
    dependent_duration_days: f64,
    lag_days: f64,
) -> NaiveDate {
    // Fractional days round up to whole scheduling days.
    let total_days = (dependent_duration_days + lag_days).ceil() as i64;
    dependent_deadline - Duration::days(total_days)
}

/// Kahn's algorithm over the dependents relation: tasks come out before
/// their dependencies, which is the order deadline propagation wants.
fn topological_order(tasks: &FxHashMap<&str, &Task>) -> Result<Vec<String>, ScheduleError> {
    let mut in_degree: FxHashMap<&str, usize> = tasks.keys().map(|&id| (id, 0)).collect();

    for task in tasks.values() {
        for dep in &task.dependencies {
            if let Some(degree) = in_degree.get_mut(dep.pred.as_str()) {
                *degree += 1;
            }
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut order: Vec<String> = Vec::with_capacity(tasks.len());

    while let Some(task_id) = queue.pop_front() {
        order.push(task_id.to_string());

        if let Some(task) = tasks.get(task_id) {
            for dep in &task.dependencies {
                if let Some(degree) = in_degree.get_mut(dep.pred.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dep.pred.as_str());
                    }
                }
            }
        }
    }

    if order.len() != tasks.len() {
        return Err(ScheduleError::CycleDetected(residual_edges(tasks, &order)));
    }

    Ok(order)
}

/// Edges among the tasks Kahn's algorithm could not place, sorted for
/// deterministic error output.
fn residual_edges(tasks: &FxHashMap<&str, &Task>, placed: &[String]) -> Vec<(String, String)> {
    let placed: FxHashSet<&str> = placed.iter().map(|s| s.as_str()).collect();
    let mut edges: Vec<(String, String)> = Vec::new();
    for (&task_id, task) in tasks {
        if placed.contains(task_id) {
            continue;
        }
        for dep in &task.dependencies {
            if tasks.contains_key(dep.pred.as_str()) && !placed.contains(dep.pred.as_str()) {
                edges.push((dep.pred.clone(), task_id.to_string()));
            }
        }
    }
    edges.sort();
    edges
}

/// Run the backward pass over all non-completed tasks.
///
/// Deadline initialization takes `end_on` over `end_before` (a pinned end is
/// the stronger statement of when the task must be done). Completed tasks
/// are skipped entirely: they neither receive propagated values nor pass
/// pressure upstream.
pub fn backward_pass(
    tasks: &[Task],
    completed_task_ids: &FxHashSet<String>,
    default_priority: i32,
) -> Result<PreprocessResult, ScheduleError> {
    let task_map: FxHashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let order = topological_order(&task_map)?;

    let mut deadlines: FxHashMap<String, NaiveDate> = FxHashMap::default();
    let mut priorities: FxHashMap<String, i32> = FxHashMap::default();

    for (&task_id, task) in &task_map {
        if let Some(deadline) = task.end_on.or(task.end_before) {
            deadlines.insert(task_id.to_string(), deadline);
        }
        priorities.insert(task_id.to_string(), task.priority.unwrap_or(default_priority));
    }

    for task_id in &order {
        let Some(task) = task_map.get(task_id.as_str()) else {
            continue;
        };

        let task_deadline = deadlines.get(task_id).copied();
        let task_priority = priorities
            .get(task_id)
            .copied()
            .unwrap_or(default_priority);

        for dep in &task.dependencies {
            let pred_id = &dep.pred;

            if !task_map.contains_key(pred_id.as_str()) || completed_task_ids.contains(pred_id) {
                continue;
            }

            priorities
                .entry(pred_id.clone())
                .and_modify(|p| *p = (*p).max(task_priority))
                .or_insert(task_priority);

            if let Some(deadline) = task_deadline {
                let pred_deadline =
                    dependency_deadline(deadline, task.duration_days, dep.lag_days);
                deadlines
                    .entry(pred_id.clone())
                    .and_modify(|d| *d = (*d).min(pred_deadline))
                    .or_insert(pred_deadline);
            }
        }
    }

    Ok(PreprocessResult {
        computed_deadlines: deadlines,
        computed_priorities: priorities,
    })
}
