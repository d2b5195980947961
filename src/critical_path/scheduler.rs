//! Target-driven critical-path scheduler.
//!
//! Instead of ranking individual tasks, this variant ranks *targets* (every
//! unscheduled task, scored by priority per unit of remaining work times
//! deadline urgency) and only schedules tasks lying on the best reachable
//! target's critical path. Upstream tasks are touched exactly when a target
//! worth reaching needs them, which avoids the priority contamination the
//! plain forward pass suffers from.

use chrono::{Days, NaiveDate};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::CriticalPathConfig;
use crate::error::ScheduleError;
use crate::index::{NameId, NameIndex};
use crate::models::{AlgorithmResult, ScheduledTask, Task};
use crate::resources::ResourceCatalog;
use crate::scheduler::ResourceCalendar;
use crate::{log_changes, log_checks, log_debug};

use super::cache::TargetCache;
use super::calculation::TaskTable;
use super::rollout::{find_contenders, score_partial_schedule, Reservation};
use super::scoring::wspt;
use super::state::CpState;
use super::types::{ResourceNeed, ResourceSet, Target};

pub struct CpScheduler {
    tasks: FxHashMap<String, Task>,
    /// Pre-expanded candidate resources per spec-assigned task.
    candidates: FxHashMap<String, Vec<String>>,
    catalog: ResourceCatalog,
    current_date: NaiveDate,
    completed: FxHashSet<String>,
    default_priority: i32,
    config: CriticalPathConfig,
    /// Explicit deadlines/priorities for rollout scoring.
    deadlines: FxHashMap<String, NaiveDate>,
    priorities: FxHashMap<String, i32>,
    /// Built during scheduling, once the resource universe is known.
    resource_index: NameIndex,
    needs: FxHashMap<String, ResourceNeed>,
}

impl CpScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Vec<Task>,
        candidates: FxHashMap<String, Vec<String>>,
        catalog: ResourceCatalog,
        current_date: NaiveDate,
        completed: FxHashSet<String>,
        default_priority: i32,
        config: CriticalPathConfig,
    ) -> Self {
        let tasks: FxHashMap<String, Task> =
            tasks.into_iter().map(|t| (t.id.clone(), t)).collect();

        let deadlines = tasks
            .iter()
            .filter_map(|(id, t)| t.end_before.map(|d| (id.clone(), d)))
            .collect();
        let priorities = tasks
            .iter()
            .filter_map(|(id, t)| t.priority.map(|p| (id.clone(), p)))
            .collect();

        Self {
            tasks,
            candidates,
            catalog,
            current_date,
            completed,
            default_priority,
            config,
            deadlines,
            priorities,
            resource_index: NameIndex::default(),
            needs: FxHashMap::default(),
        }
    }

    pub fn schedule(&mut self) -> Result<AlgorithmResult, ScheduleError> {
        let fixed_tasks =
            crate::scheduler::fixed::extract_fixed_tasks(&mut self.tasks, &self.catalog);
        let scheduled_tasks = self.schedule_critical_path(&fixed_tasks)?;

        let target_count = scheduled_tasks.len();
        let mut all_tasks = fixed_tasks;
        all_tasks.extend(scheduled_tasks);

        let mut metadata = std::collections::BTreeMap::new();
        metadata.insert("algorithm".to_string(), "critical_path".to_string());
        metadata.insert("targets_considered".to_string(), target_count.to_string());

        Ok(AlgorithmResult {
            scheduled_tasks: all_tasks,
            algorithm_metadata: metadata,
        })
    }

    fn schedule_critical_path(
        &mut self,
        fixed_tasks: &[ScheduledTask],
    ) -> Result<Vec<ScheduledTask>, ScheduleError> {
        let mut scheduled: FxHashMap<String, (NaiveDate, NaiveDate)> = FxHashMap::default();
        let unscheduled: FxHashSet<String> = self
            .tasks
            .keys()
            .filter(|id| !self.completed.contains(*id))
            .cloned()
            .collect();

        for fixed in fixed_tasks {
            scheduled.insert(fixed.task_id.clone(), (fixed.start_date, fixed.end_date));
        }

        self.resource_index = self.build_resource_index(fixed_tasks);
        debug_assert!(self.resource_index.len() <= ResourceSet::CAPACITY);

        let mut calendars: Vec<ResourceCalendar> =
            Vec::with_capacity(self.resource_index.len());
        for (id, name) in self.resource_index.iter() {
            debug_assert_eq!(calendars.len(), id as usize);
            calendars.push(ResourceCalendar::new(name, self.catalog.dns_for(name)));
        }

        for fixed in fixed_tasks {
            for resource in &fixed.resources {
                if let Some(id) = self.resource_index.get_id(resource) {
                    calendars[id as usize].insert(fixed.start_date, fixed.end_date);
                }
            }
        }

        self.needs = self.build_needs();

        let state = CpState::new(scheduled, unscheduled, calendars, self.current_date);
        let final_state = self.run_pass(state, None, true, None)?;
        Ok(final_state.result)
    }

    /// Catalog resources first (in config order), then any ad-hoc names from
    /// explicit assignments or fixed tasks, sorted.
    fn build_resource_index(&self, fixed_tasks: &[ScheduledTask]) -> NameIndex {
        let mut known: FxHashSet<String> =
            self.catalog.resource_order().iter().cloned().collect();
        let mut extras: Vec<String> = Vec::new();
        let note = |name: &String, known: &mut FxHashSet<String>, extras: &mut Vec<String>| {
            if known.insert(name.clone()) {
                extras.push(name.clone());
            }
        };

        for task in self.tasks.values() {
            for (resource, _) in &task.resources {
                note(resource, &mut known, &mut extras);
            }
        }
        for candidates in self.candidates.values() {
            for resource in candidates {
                note(resource, &mut known, &mut extras);
            }
        }
        for fixed in fixed_tasks {
            for resource in &fixed.resources {
                note(resource, &mut known, &mut extras);
            }
        }
        extras.sort();

        let order = self
            .catalog
            .resource_order()
            .iter()
            .cloned()
            .chain(extras.into_iter());
        NameIndex::new(order)
    }

    /// Precompute each task's resource demand bitmask.
    fn build_needs(&self) -> FxHashMap<String, ResourceNeed> {
        let mut needs = FxHashMap::default();

        for (task_id, task) in &self.tasks {
            if task.is_milestone() {
                continue;
            }

            let mut set = ResourceSet::new();
            let requires_all;

            if !task.resources.is_empty() {
                requires_all = true;
                for (resource, _) in &task.resources {
                    if let Some(id) = self.resource_index.get_id(resource) {
                        set.set(id);
                    }
                }
            } else if let Some(candidates) = self.candidates.get(task_id) {
                requires_all = false;
                for resource in candidates {
                    if let Some(id) = self.resource_index.get_id(resource) {
                        set.set(id);
                    }
                }
            } else {
                continue;
            }

            if !set.is_empty() {
                needs.insert(task_id.clone(), ResourceNeed { set, requires_all });
            }
        }

        needs
    }

    /// The scheduling loop, shared between the real pass and rollout
    /// simulations (which run it on a cloned state with rollout disabled and
    /// optionally one task suppressed at the initial tick).
    fn run_pass(
        &self,
        mut state: CpState,
        horizon: Option<NaiveDate>,
        enable_rollout: bool,
        skip_at_initial: Option<&str>,
    ) -> Result<CpState, ScheduleError> {
        let initial_time = state.now;
        let max_iterations = self.tasks.len() * 100;
        let verbosity = if enable_rollout { self.config.verbosity } else { 0 };

        let mut table = TaskTable::new(&self.tasks, self.default_priority);
        let completed_vec = table.membership_vec(&self.completed);

        // Offsets are absolute from initial_time so advancing the clock
        // never rewrites them.
        let mut scheduled_vec = table.scheduled_end_vec(&state.scheduled, initial_time);
        let mut unscheduled_vec = table.membership_vec(&state.unscheduled);

        let mut needs_vec: Vec<Option<ResourceNeed>> = vec![None; table.len()];
        for (task_id, need) in &self.needs {
            if let Some(id) = table.index.get_id(task_id) {
                needs_vec[id as usize] = Some(*need);
            }
        }
        table.set_needs(needs_vec);

        let mut cache = TargetCache::new(
            &state.unscheduled,
            &self.tasks,
            &table,
            &scheduled_vec,
            &completed_vec,
            self.default_priority,
        )?;

        for _iteration in 0..max_iterations {
            if cache.is_empty() {
                break;
            }
            if let Some(h) = horizon {
                if state.now > h {
                    break;
                }
            }

            log_changes!(verbosity, "time: {}", state.now);

            let available = state.available_set();
            let mut scheduled_any = false;

            // With calendars present but all busy, nothing can start; only
            // a resource-less problem (milestones) proceeds regardless.
            let has_resources = !state.calendars.is_empty();
            if !has_resources || !available.is_empty() {
                // The ranked borrow must end before the cache is updated, so
                // the commit itself happens in this block and the cache
                // learns about it just after.
                let committed: Option<String> = {
                    let ranked = cache.ranked_targets(&self.config, state.now);

                    log_debug!(
                        verbosity,
                        "  top targets: {}",
                        ranked
                            .iter()
                            .take(3)
                            .map(|t| format!("{}({:.2})", t.id, t.score))
                            .collect::<Vec<_>>()
                            .join(", ")
                    );

                    let mut committed = None;
                    'targets: for target in &ranked {
                        let eligible = self.eligible_path_tasks(
                            target,
                            &table,
                            &scheduled_vec,
                            &unscheduled_vec,
                            &completed_vec,
                            initial_time,
                            state.now,
                        );
                        if eligible.is_empty() {
                            continue;
                        }

                        let best_int = pick_by_wspt(&eligible, &table);
                        let Some(best_id) = table.index.name(best_int).map(String::from) else {
                            continue;
                        };

                        if state.now == initial_time {
                            if let Some(skip_id) = skip_at_initial {
                                if best_id == skip_id {
                                    continue;
                                }
                            }
                        }

                        log_checks!(
                            verbosity,
                            "  considering {} (priority={}, target={}, score={:.2})",
                            best_id,
                            table.priorities[best_int as usize],
                            target.id,
                            target.score
                        );

                        if !self.has_available_resource(best_int, &table, available) {
                            log_checks!(verbosity, "    skipping {}: resources busy", best_id);
                            continue;
                        }

                        if enable_rollout && self.config.rollout_enabled {
                            if let Some((reason, reservation)) = self.check_rollout_skip(
                                &best_id,
                                target,
                                &ranked,
                                &state,
                                available,
                            ) {
                                log_checks!(
                                    verbosity,
                                    "    holding {} back: {}",
                                    best_id,
                                    reason
                                );
                                if let Some(res_id) =
                                    self.resource_index.get_id(&reservation.resource)
                                {
                                    state.reservations.insert(res_id, reservation);
                                }
                                continue;
                            }
                        }

                        let Some(scheduled_task) = self.try_schedule_task(
                            &best_id,
                            state.now,
                            &mut state.calendars,
                            &state.reservations,
                            available,
                        ) else {
                            log_checks!(verbosity, "    skipping {}: resources busy", best_id);
                            continue;
                        };

                        let idx = best_int as usize;
                        scheduled_vec[idx] =
                            (scheduled_task.end_date - initial_time).num_days() as f64;
                        unscheduled_vec[idx] = false;
                        state.scheduled.insert(
                            best_id.clone(),
                            (scheduled_task.start_date, scheduled_task.end_date),
                        );
                        state.unscheduled.remove(&best_id);

                        log_changes!(
                            verbosity,
                            "  scheduled {} on {} from {} to {}",
                            best_id,
                            scheduled_task.resources.join(", "),
                            scheduled_task.start_date,
                            scheduled_task.end_date
                        );

                        state.reservations.retain(|_, r| r.task_id != best_id);
                        state.result.push(scheduled_task);
                        committed = Some(best_id);
                        break 'targets;
                    }
                    committed
                };

                if let Some(best_id) = committed {
                    cache.on_task_scheduled(
                        &best_id,
                        &self.tasks,
                        &table,
                        &scheduled_vec,
                        &completed_vec,
                        self.default_priority,
                    )?;
                    scheduled_any = true;
                }
            } else {
                log_debug!(verbosity, "  all resources busy, advancing");
            }

            if !scheduled_any {
                match self.next_event_time(
                    &table,
                    &scheduled_vec,
                    &unscheduled_vec,
                    &state.calendars,
                    initial_time,
                    state.now,
                ) {
                    Some(next_time) => {
                        if let Some(h) = horizon {
                            if next_time > h {
                                break;
                            }
                        }
                        log_debug!(verbosity, "  advancing from {} to {}", state.now, next_time);
                        state.now = next_time;
                    }
                    None => break,
                }

                // Reservations are one tick deep; the next tick re-derives
                // them from a fresh rollout check.
                state.reservations.retain(|_, r| r.reserved_from >= state.now);
            }
        }

        if horizon.is_none() {
            let mut residual: Vec<String> = unscheduled_vec
                .iter()
                .enumerate()
                .filter(|(_, &pending)| pending)
                .filter_map(|(idx, _)| table.index.name(idx as NameId).map(String::from))
                .collect();
            if !residual.is_empty() {
                residual.sort();
                return Err(ScheduleError::UnschedulableResidual(residual));
            }
        }

        Ok(state)
    }

    /// Unscheduled critical-path tasks of `target` whose dependencies (plus
    /// lag) are done and whose start window is open.
    #[allow(clippy::too_many_arguments)]
    fn eligible_path_tasks(
        &self,
        target: &Target,
        table: &TaskTable,
        scheduled_vec: &[f64],
        unscheduled_vec: &[bool],
        completed_vec: &[bool],
        initial_time: NaiveDate,
        now: NaiveDate,
    ) -> Vec<NameId> {
        let current_offset = (now - initial_time).num_days() as f64;
        let mut eligible = Vec::new();

        for &task_int in &target.critical_path_ints {
            let idx = task_int as usize;
            if !unscheduled_vec[idx] {
                continue;
            }

            let deps_ready = table.deps[idx].iter().all(|&(dep, lag)| {
                let dep_idx = dep as usize;
                if completed_vec[dep_idx] {
                    return true;
                }
                let dep_end = scheduled_vec[dep_idx];
                dep_end < f64::MAX && dep_end + lag < current_offset
            });
            if !deps_ready {
                continue;
            }

            if let Some(start_after) = table.start_afters[idx] {
                if start_after > now {
                    continue;
                }
            }

            eligible.push(task_int);
        }

        eligible
    }

    #[inline]
    fn has_available_resource(
        &self,
        task_int: NameId,
        table: &TaskTable,
        available: ResourceSet,
    ) -> bool {
        let idx = task_int as usize;
        if table.durations[idx] == 0.0 {
            return true;
        }
        match table.needs[idx] {
            Some(ref need) => need.satisfiable(available),
            None => true,
        }
    }

    /// Earliest future change: a dependency unlocking, a start window
    /// opening, or a busy interval ending.
    fn next_event_time(
        &self,
        table: &TaskTable,
        scheduled_vec: &[f64],
        unscheduled_vec: &[bool],
        calendars: &[ResourceCalendar],
        initial_time: NaiveDate,
        now: NaiveDate,
    ) -> Option<NaiveDate> {
        let mut next: Option<NaiveDate> = None;
        let mut consider = |date: NaiveDate| {
            if date > now {
                next = Some(match next {
                    Some(n) => n.min(date),
                    None => date,
                });
            }
        };

        for (idx, &pending) in unscheduled_vec.iter().enumerate() {
            if !pending {
                continue;
            }

            for &(dep, lag) in &table.deps[idx] {
                let dep_end = scheduled_vec[dep as usize];
                if dep_end < f64::MAX {
                    let unlocked_offset = dep_end + lag.ceil() + 1.0;
                    consider(initial_time + chrono::Duration::days(unlocked_offset as i64));
                }
            }

            if let Some(start_after) = table.start_afters[idx] {
                consider(start_after);
            }
        }

        for calendar in calendars {
            for &(_, busy_end) in &calendar.busy {
                if busy_end >= now {
                    if let Some(free) = busy_end.checked_add_days(Days::new(1)) {
                        consider(free);
                    }
                }
            }
        }

        next
    }

    /// Commit `task_id` at `now` if its resources are free and not reserved
    /// for someone else.
    fn try_schedule_task(
        &self,
        task_id: &str,
        now: NaiveDate,
        calendars: &mut [ResourceCalendar],
        reservations: &FxHashMap<NameId, Reservation>,
        available: ResourceSet,
    ) -> Option<ScheduledTask> {
        let task = self.tasks.get(task_id)?;

        if task.is_milestone() {
            return Some(ScheduledTask {
                task_id: task_id.to_string(),
                start_date: now,
                end_date: now,
                duration_days: 0.0,
                resources: vec![],
            });
        }

        let span = task.effective_duration();

        if let Some(candidates) = self.candidates.get(task_id) {
            let mut best: Option<(NameId, String, NaiveDate)> = None;
            for resource in candidates {
                let Some(resource_id) = self.resource_index.get_id(resource) else {
                    continue;
                };
                if !available.is_set(resource_id) {
                    continue;
                }
                if let Some(reservation) = reservations.get(&resource_id) {
                    if reservation.task_id != task_id {
                        continue;
                    }
                }

                let completion =
                    calendars[resource_id as usize].completion_time(now, span);
                if best.as_ref().is_none_or(|(_, _, b)| completion < *b) {
                    best = Some((resource_id, resource.clone(), completion));
                }
            }

            let (resource_id, resource, completion) = best?;
            calendars[resource_id as usize].insert(now, completion);

            return Some(ScheduledTask {
                task_id: task_id.to_string(),
                start_date: now,
                end_date: completion,
                duration_days: span,
                resources: vec![resource],
            });
        }

        if task.resources.is_empty() {
            return None;
        }

        for (resource, _) in &task.resources {
            let resource_id = self.resource_index.get_id(resource)?;
            if !available.is_set(resource_id) {
                return None;
            }
            if let Some(reservation) = reservations.get(&resource_id) {
                if reservation.task_id != task_id {
                    return None;
                }
            }
        }

        let mut max_completion = now;
        for (resource, _) in &task.resources {
            if let Some(resource_id) = self.resource_index.get_id(resource) {
                max_completion =
                    max_completion.max(calendars[resource_id as usize].completion_time(now, span));
            }
        }
        for (resource, _) in &task.resources {
            if let Some(resource_id) = self.resource_index.get_id(resource) {
                calendars[resource_id as usize].insert(now, max_completion);
            }
        }

        Some(ScheduledTask {
            task_id: task_id.to_string(),
            start_date: now,
            end_date: max_completion,
            duration_days: span,
            resources: task.resources.iter().map(|(r, _)| r.clone()).collect(),
        })
    }

    /// Simulate commit-now against hold-for-contender. Returns the skip
    /// reason and a reservation when waiting wins.
    fn check_rollout_skip(
        &self,
        task_id: &str,
        current_target: &Target,
        ranked: &[&Target],
        state: &CpState,
        available: ResourceSet,
    ) -> Option<(String, Reservation)> {
        let task = self.tasks.get(task_id)?;
        if task.is_milestone() {
            return None;
        }

        let resource = self.likely_resource(task, available)?;
        let completion =
            state.now + chrono::Duration::days(task.effective_duration().ceil() as i64);

        let contenders = find_contenders(
            current_target.score,
            completion,
            &resource,
            self.config.rollout_score_ratio_threshold,
            ranked,
            &self.tasks,
            &self.candidates,
            &state.scheduled,
            state.now,
        );
        if contenders.is_empty() {
            return None;
        }

        let mut horizon = contenders
            .iter()
            .map(|c| c.estimated_completion)
            .max()
            .unwrap_or(completion);
        if let Some(max_days) = self.config.rollout_max_horizon_days {
            horizon = horizon.min(state.now + chrono::Duration::days(max_days as i64));
        }

        // Scenario A: commit now, then run the pass to the horizon.
        let mut state_a = state.clone_for_rollout();
        state_a
            .scheduled
            .insert(task_id.to_string(), (state.now, completion));
        state_a.unscheduled.remove(task_id);
        if let Some(resource_id) = self.resource_index.get_id(&resource) {
            state_a.calendars[resource_id as usize].insert(state.now, completion);
        }
        state_a.result.push(ScheduledTask {
            task_id: task_id.to_string(),
            start_date: state.now,
            end_date: completion,
            duration_days: task.effective_duration(),
            resources: vec![resource.clone()],
        });
        let score_a = match self.run_pass(state_a, Some(horizon), false, None) {
            Ok(final_state) => self.score_state(&final_state, state.now, horizon),
            Err(_) => return None,
        };

        // Scenario B: leave the resource idle for the contender.
        let state_b = state.clone_for_rollout();
        let score_b = match self.run_pass(state_b, Some(horizon), false, Some(task_id)) {
            Ok(final_state) => self.score_state(&final_state, state.now, horizon),
            Err(_) => return None,
        };

        if score_b < score_a {
            let best = &contenders[0];
            let reason = format!(
                "waiting for {} (target score {:.2} vs {:.2})",
                best.critical_task_id, best.target_score, current_target.score
            );
            Some((
                reason,
                Reservation {
                    resource,
                    target_id: best.target_id.clone(),
                    task_id: best.critical_task_id.clone(),
                    target_score: best.target_score,
                    reserved_from: state.now,
                },
            ))
        } else {
            None
        }
    }

    /// The resource this task would most likely take right now.
    fn likely_resource(&self, task: &Task, available: ResourceSet) -> Option<String> {
        if let Some((resource, _)) = task.resources.first() {
            return Some(resource.clone());
        }
        if let Some(candidates) = self.candidates.get(&task.id) {
            for resource in candidates {
                if let Some(id) = self.resource_index.get_id(resource) {
                    if available.is_set(id) {
                        return Some(resource.clone());
                    }
                }
            }
        }
        None
    }

    fn score_state(&self, state: &CpState, start: NaiveDate, horizon: NaiveDate) -> f64 {
        score_partial_schedule(
            &state.result,
            &state.unscheduled,
            &self.tasks,
            &self.deadlines,
            &self.priorities,
            &state.scheduled,
            start,
            horizon,
            self.default_priority,
        )
    }
}

/// WSPT argmax; the first of equals wins, and `eligible` comes in sorted
/// id order, so the pick is deterministic.
fn pick_by_wspt(eligible: &[NameId], table: &TaskTable) -> NameId {
    let mut best = eligible[0];
    let mut best_score = f64::NEG_INFINITY;

    for &task_int in eligible {
        let idx = task_int as usize;
        let score = wspt(table.priorities[idx], table.durations[idx]);
        if score > best_score {
            best_score = score;
            best = task_int;
        }
    }

    best
}
