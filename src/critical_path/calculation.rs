//! Critical-path analysis over the dependency graph.
//!
//! All per-target work runs on integer task ids with direct array indexing;
//! strings appear only at the boundaries. The `TaskTable` is built once per
//! scheduling pass and shared across every target analysis.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

use crate::error::ScheduleError;
use crate::index::{NameId, NameIndex};
use crate::models::Task;

use super::types::{ResourceNeed, TaskTiming};

/// Interned, array-indexed view of the task set.
pub struct TaskTable {
    pub index: NameIndex,
    /// Effective (allocation-adjusted) durations.
    pub durations: Vec<f64>,
    pub priorities: Vec<i32>,
    pub start_afters: Vec<Option<NaiveDate>>,
    /// Dependencies as (predecessor id, lag) per task.
    pub deps: Vec<Vec<(NameId, f64)>>,
    /// Reverse edges: (dependent id, lag) per task.
    pub dependents: Vec<Vec<(NameId, f64)>>,
    /// Resource demand per task; `None` for milestones and resource-less tasks.
    pub needs: Vec<Option<ResourceNeed>>,
}

impl TaskTable {
    /// Build the table. Ids are assigned over the sorted union of task ids
    /// and dependency targets, so identical inputs produce identical ids.
    pub fn new(tasks: &FxHashMap<String, Task>, default_priority: i32) -> Self {
        let mut all_ids: FxHashSet<String> = tasks.keys().cloned().collect();
        for task in tasks.values() {
            for dep in &task.dependencies {
                all_ids.insert(dep.pred.clone());
            }
        }
        let mut sorted_ids: Vec<String> = all_ids.into_iter().collect();
        sorted_ids.sort();
        let index = NameIndex::new(sorted_ids.into_iter());

        let n = index.len();
        let mut durations = vec![0.0; n];
        let mut priorities = vec![default_priority; n];
        let mut start_afters = vec![None; n];
        let mut deps: Vec<Vec<(NameId, f64)>> = vec![Vec::new(); n];
        let mut dependents: Vec<Vec<(NameId, f64)>> = vec![Vec::new(); n];

        for (task_id, task) in tasks {
            let Some(id) = index.get_id(task_id) else {
                continue;
            };
            let idx = id as usize;
            durations[idx] = task.effective_duration();
            priorities[idx] = task.priority.unwrap_or(default_priority);
            start_afters[idx] = task.start_after;

            for dep in &task.dependencies {
                if let Some(dep_id) = index.get_id(&dep.pred) {
                    deps[idx].push((dep_id, dep.lag_days));
                    dependents[dep_id as usize].push((id, dep.lag_days));
                }
            }
        }

        Self {
            index,
            durations,
            priorities,
            start_afters,
            deps,
            dependents,
            needs: vec![None; n],
        }
    }

    pub fn set_needs(&mut self, needs: Vec<Option<ResourceNeed>>) {
        self.needs = needs;
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Boolean membership vector for a set of names.
    pub fn membership_vec(&self, names: &FxHashSet<String>) -> Vec<bool> {
        let mut out = vec![false; self.len()];
        for name in names {
            if let Some(id) = self.index.get_id(name) {
                out[id as usize] = true;
            }
        }
        out
    }

    /// Scheduled end offsets in days from `reference`; `f64::MAX` marks
    /// unscheduled tasks.
    pub fn scheduled_end_vec(
        &self,
        scheduled: &FxHashMap<String, (NaiveDate, NaiveDate)>,
        reference: NaiveDate,
    ) -> Vec<f64> {
        let mut out = vec![f64::MAX; self.len()];
        for (id, (_, end)) in scheduled {
            if let Some(int_id) = self.index.get_id(id) {
                let days = (*end - reference).num_days() as f64;
                out[int_id as usize] = days.max(0.0);
            }
        }
        out
    }
}

/// Result of one target's critical-path analysis.
#[derive(Clone, Debug)]
pub struct PathAnalysis {
    /// Timing for every task in the subgraph (target included).
    pub timings: FxHashMap<NameId, TaskTiming>,
    /// Zero-slack tasks, sorted by id for deterministic iteration.
    pub critical_tasks: Vec<NameId>,
    pub critical_path_length: f64,
    pub total_work: f64,
}

/// Compute the critical path to `target`: which of its unscheduled
/// transitive predecessors have zero slack, and how long the longest chain
/// is. Scheduled and completed tasks are treated as done (their real end
/// feeds the forward pass).
pub fn critical_path_for_target(
    target: NameId,
    table: &TaskTable,
    scheduled_vec: &[f64],
    completed_vec: &[bool],
) -> Result<PathAnalysis, ScheduleError> {
    let n = table.len();
    let target_idx = target as usize;

    let (subgraph, subgraph_ids) = dependency_subgraph(target, table, completed_vec, scheduled_vec);

    if subgraph_ids.is_empty() {
        // No pending dependencies: the target is its own critical path.
        let duration = table.durations[target_idx];
        let mut timings = FxHashMap::default();
        timings.insert(
            target,
            TaskTiming {
                earliest_start: 0.0,
                earliest_finish: duration,
                latest_start: 0.0,
                latest_finish: duration,
                slack: 0.0,
            },
        );
        return Ok(PathAnalysis {
            timings,
            critical_tasks: vec![target],
            critical_path_length: duration,
            total_work: duration,
        });
    }

    let order = topological_order(&subgraph, &subgraph_ids, target, table)?;

    // Forward pass: earliest start is the latest dependency finish plus lag.
    let mut timings: Vec<Option<TaskTiming>> = vec![None; n];
    let mut total_work = 0.0;

    for &task in &order {
        let idx = task as usize;
        let duration = table.durations[idx];
        total_work += duration;

        let mut earliest_start: f64 = 0.0;
        for &(dep, lag) in &table.deps[idx] {
            let dep_idx = dep as usize;
            if completed_vec[dep_idx] {
                continue;
            }
            let finish = if scheduled_vec[dep_idx] < f64::MAX {
                scheduled_vec[dep_idx] + lag
            } else if let Some(timing) = timings[dep_idx] {
                timing.earliest_finish + lag
            } else {
                continue;
            };
            earliest_start = earliest_start.max(finish);
        }

        timings[idx] = Some(TaskTiming {
            earliest_start,
            earliest_finish: earliest_start + duration,
            latest_start: 0.0,
            latest_finish: 0.0,
            slack: 0.0,
        });
    }

    let critical_path_length = timings[target_idx]
        .map(|t| t.earliest_finish)
        .unwrap_or(0.0);

    // Backward pass: latest finish is the tightest dependent requirement.
    if let Some(timing) = timings[target_idx].as_mut() {
        timing.latest_finish = critical_path_length;
        timing.latest_start = critical_path_length - table.durations[target_idx];
    }

    for &task in order.iter().rev().skip(1) {
        let idx = task as usize;
        let mut latest_finish = f64::MAX;

        for &(dependent, lag) in &table.dependents[idx] {
            let dep_idx = dependent as usize;
            if !subgraph[dep_idx] && dependent != target {
                continue;
            }
            if let Some(timing) = timings[dep_idx] {
                latest_finish = latest_finish.min(timing.latest_start - lag);
            }
        }

        if latest_finish == f64::MAX {
            latest_finish = critical_path_length;
        }

        if let Some(timing) = timings[idx].as_mut() {
            timing.latest_finish = latest_finish;
            timing.latest_start = latest_finish - table.durations[idx];
            timing.slack = timing.latest_start - timing.earliest_start;
        }
    }

    if let Some(timing) = timings[target_idx].as_mut() {
        timing.slack = timing.latest_start - timing.earliest_start;
    }

    let mut out_timings: FxHashMap<NameId, TaskTiming> =
        FxHashMap::with_capacity_and_hasher(order.len(), Default::default());
    let mut critical_tasks: Vec<NameId> = Vec::new();
    for &task in &order {
        if let Some(timing) = timings[task as usize] {
            if timing.is_critical() {
                critical_tasks.push(task);
            }
            out_timings.insert(task, timing);
        }
    }
    critical_tasks.sort_unstable();

    Ok(PathAnalysis {
        timings: out_timings,
        critical_tasks,
        critical_path_length,
        total_work,
    })
}

/// Breadth-first walk over unscheduled, non-completed transitive
/// predecessors of the target. Returns a membership vector plus the id list.
fn dependency_subgraph(
    target: NameId,
    table: &TaskTable,
    completed_vec: &[bool],
    scheduled_vec: &[f64],
) -> (Vec<bool>, Vec<NameId>) {
    let n = table.len();
    let mut member = vec![false; n];
    let mut ids: Vec<NameId> = Vec::new();
    let mut queue: VecDeque<NameId> = VecDeque::new();

    let pending =
        |idx: usize| -> bool { !completed_vec[idx] && scheduled_vec[idx] == f64::MAX };

    for &(dep, _) in &table.deps[target as usize] {
        if pending(dep as usize) {
            queue.push_back(dep);
        }
    }

    while let Some(task) = queue.pop_front() {
        let idx = task as usize;
        if member[idx] {
            continue;
        }
        member[idx] = true;
        ids.push(task);

        for &(dep, _) in &table.deps[idx] {
            let dep_idx = dep as usize;
            if pending(dep_idx) && !member[dep_idx] {
                queue.push_back(dep);
            }
        }
    }

    (member, ids)
}

/// Kahn's algorithm over the subgraph plus the target.
fn topological_order(
    subgraph: &[bool],
    subgraph_ids: &[NameId],
    target: NameId,
    table: &TaskTable,
) -> Result<Vec<NameId>, ScheduleError> {
    let n = table.len();
    let node_count = subgraph_ids.len() + 1;

    let mut in_node = subgraph.to_vec();
    in_node[target as usize] = true;

    let mut in_degree = vec![0usize; n];
    let count_degree = |task: NameId, in_degree: &mut Vec<usize>| {
        let idx = task as usize;
        for &(dep, _) in &table.deps[idx] {
            if in_node[dep as usize] {
                in_degree[idx] += 1;
            }
        }
    };
    for &task in subgraph_ids {
        count_degree(task, &mut in_degree);
    }
    count_degree(target, &mut in_degree);

    let mut queue: VecDeque<NameId> = VecDeque::new();
    for &task in subgraph_ids {
        if in_degree[task as usize] == 0 {
            queue.push_back(task);
        }
    }
    if in_degree[target as usize] == 0 {
        queue.push_back(target);
    }

    let mut order: Vec<NameId> = Vec::with_capacity(node_count);
    while let Some(task) = queue.pop_front() {
        order.push(task);
        for &(dependent, _) in &table.dependents[task as usize] {
            let dep_idx = dependent as usize;
            if in_node[dep_idx] {
                in_degree[dep_idx] -= 1;
                if in_degree[dep_idx] == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    if order.len() != node_count {
        let mut edges: Vec<(String, String)> = Vec::new();
        let placed: FxHashSet<NameId> = order.iter().copied().collect();
        for &task in subgraph_ids {
            if placed.contains(&task) {
                continue;
            }
            for &(dep, _) in &table.deps[task as usize] {
                if in_node[dep as usize] && !placed.contains(&dep) {
                    if let (Some(pred), Some(succ)) =
                        (table.index.name(dep), table.index.name(task))
                    {
                        edges.push((pred.to_string(), succ.to_string()));
                    }
                }
            }
        }
        edges.sort();
        return Err(ScheduleError::CycleDetected(edges));
    }

    Ok(order)
}
