//! Incremental cache of per-target critical paths.
//!
//! Recomputing every target's critical path each tick is quadratic in
//! practice. Committing one task only disturbs the targets whose dependency
//! subgraph contained it, so the cache keeps a reverse membership index and
//! recomputes exactly those.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::CriticalPathConfig;
use crate::error::ScheduleError;
use crate::index::NameId;
use crate::models::Task;

use super::calculation::{critical_path_for_target, TaskTable};
use super::scoring::{deadline_urgency, no_deadline_urgency, transform_work};
use super::types::Target;

pub struct TargetCache {
    targets: FxHashMap<String, Target>,
    /// task name -> targets with that task on their critical path.
    task_to_targets: FxHashMap<String, FxHashSet<String>>,
    /// task id -> targets whose dependency subgraph contains it. Drives
    /// invalidation when the task is committed.
    subgraph_members: Vec<Vec<NameId>>,
    avg_work: f64,
}

impl TargetCache {
    /// Analyze every unscheduled task as a target.
    pub fn new(
        unscheduled: &FxHashSet<String>,
        tasks: &FxHashMap<String, Task>,
        table: &TaskTable,
        scheduled_vec: &[f64],
        completed_vec: &[bool],
        default_priority: i32,
    ) -> Result<Self, ScheduleError> {
        let mut cache = Self {
            targets: FxHashMap::with_capacity_and_hasher(unscheduled.len(), Default::default()),
            task_to_targets: FxHashMap::default(),
            subgraph_members: vec![Vec::new(); table.len()],
            avg_work: 1.0,
        };

        for task_id in unscheduled {
            cache.analyze_target(
                task_id,
                tasks,
                table,
                scheduled_vec,
                completed_vec,
                default_priority,
            )?;
        }

        Ok(cache)
    }

    fn analyze_target(
        &mut self,
        target_id: &str,
        tasks: &FxHashMap<String, Task>,
        table: &TaskTable,
        scheduled_vec: &[f64],
        completed_vec: &[bool],
        default_priority: i32,
    ) -> Result<(), ScheduleError> {
        let Some(task) = tasks.get(target_id) else {
            return Ok(());
        };
        let Some(target_int) = table.index.get_id(target_id) else {
            return Ok(());
        };

        let analysis =
            critical_path_for_target(target_int, table, scheduled_vec, completed_vec)?;

        let mut target = Target::new(
            target_id.to_string(),
            target_int,
            task.priority.unwrap_or(default_priority),
            task.end_before,
        );
        target.total_work = analysis.total_work;
        target.critical_path_length = analysis.critical_path_length;
        target.critical_path_ints = analysis.critical_tasks.clone();
        target.critical_path = analysis
            .critical_tasks
            .iter()
            .filter_map(|&id| table.index.name(id).map(String::from))
            .collect();

        for name in &target.critical_path {
            self.task_to_targets
                .entry(name.clone())
                .or_default()
                .insert(target_id.to_string());
        }
        for &member in analysis.timings.keys() {
            self.subgraph_members[member as usize].push(target_int);
        }

        self.targets.insert(target_id.to_string(), target);
        Ok(())
    }

    /// Drop the committed task as a target and recompute the targets whose
    /// subgraph contained it. Returns how many targets were recomputed.
    pub fn on_task_scheduled(
        &mut self,
        scheduled_id: &str,
        tasks: &FxHashMap<String, Task>,
        table: &TaskTable,
        scheduled_vec: &[f64],
        completed_vec: &[bool],
        default_priority: i32,
    ) -> Result<usize, ScheduleError> {
        self.targets.remove(scheduled_id);
        self.task_to_targets.remove(scheduled_id);
        for targets in self.task_to_targets.values_mut() {
            targets.remove(scheduled_id);
        }

        let scheduled_int = table.index.get_id(scheduled_id);
        let mut affected: Vec<NameId> = scheduled_int
            .map(|id| std::mem::take(&mut self.subgraph_members[id as usize]))
            .unwrap_or_default();
        affected.sort_unstable();
        affected.dedup();

        // Purge stale membership entries pointing at the affected targets.
        for members in &mut self.subgraph_members {
            members.retain(|t| !affected.contains(t));
        }

        let mut recomputed = 0;
        for target_int in affected {
            if scheduled_int == Some(target_int) {
                continue;
            }
            let Some(target_id) = table.index.name(target_int).map(String::from) else {
                continue;
            };
            if !self.targets.contains_key(&target_id) {
                continue;
            }

            // Remove the old reverse-index entries before re-analyzing.
            for targets in self.task_to_targets.values_mut() {
                targets.remove(&target_id);
            }
            self.targets.remove(&target_id);

            self.analyze_target(
                &target_id,
                tasks,
                table,
                scheduled_vec,
                completed_vec,
                default_priority,
            )?;
            recomputed += 1;
        }

        Ok(recomputed)
    }

    /// Score and rank all targets, best first. Ties break on target id so
    /// the ranking is deterministic.
    pub fn ranked_targets(
        &mut self,
        config: &CriticalPathConfig,
        now: NaiveDate,
    ) -> Vec<&Target> {
        if self.targets.is_empty() {
            return Vec::new();
        }

        let avg_work =
            self.targets.values().map(|t| t.total_work).sum::<f64>() / self.targets.len() as f64;
        self.avg_work = avg_work;

        let min_deadline_urgency = self
            .targets
            .values()
            .filter_map(|t| {
                t.deadline.map(|deadline| {
                    deadline_urgency(deadline, t.critical_path_length, now, config, avg_work)
                })
            })
            .reduce(f64::min);

        for target in self.targets.values_mut() {
            target.urgency = match target.deadline {
                Some(deadline) => deadline_urgency(
                    deadline,
                    target.critical_path_length,
                    now,
                    config,
                    avg_work,
                ),
                None => no_deadline_urgency(min_deadline_urgency, config),
            };
            target.score = (target.priority as f64 / transform_work(target.total_work, config))
                * target.urgency;
        }

        let mut ranked: Vec<&Target> = self.targets.values().collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked
    }

    /// Average total work across the live targets, as of the last ranking.
    pub fn avg_work(&self) -> f64 {
        self.avg_work
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[cfg(test)]
    pub(crate) fn target_mut(&mut self, id: &str) -> Option<&mut Target> {
        self.targets.get_mut(id)
    }
}
