//! Chronological forward pass (Parallel SGS), optionally with a bounded
//! lookahead.
//!
//! The pass is organized as a small pipeline over interned, array-indexed
//! data rather than name-keyed maps:
//!
//! - build once: a [`TaskRow`] per task (effective span, computed priority
//!   and deadline, dependency edges, and a [`Requirement`] describing what
//!   it needs from the resource pool);
//! - each tick: rank the released rows by sort key, then for each one
//!   `plan` a [`Placement`] (pure), optionally `consult` the lookahead, and
//!   `apply` the placement to the [`Frame`];
//! - when a tick places nothing, jump the clock to the next wakeup: the
//!   earliest pending release date or the first day a busy calendar frees
//!   up.
//!
//! One `run` loop serves the real pass and both lookahead scenarios; a
//! scenario is just a cloned frame with a horizon and possibly one vetoed
//! task.

use chrono::{Duration, NaiveDate};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::{RolloutConfig, SchedulingConfig, Strategy};
use crate::error::ScheduleError;
use crate::index::{NameId, NameIndex};
use crate::models::{AlgorithmResult, ScheduledTask, Task};
use crate::preprocess::PreprocessResult;
use crate::resources::ResourceCatalog;
use crate::sorting::{compute_sort_key, AtcParams, SortKey, TaskSortInfo};
use crate::{log_changes, log_checks, log_debug};

use super::calendar::ResourceCalendar;
use super::rollout::{RolloutChoice, RolloutDecision};
use super::state::{Frame, Placement};

/// What a task needs before it can occupy calendar time.
enum Requirement {
    /// Milestone: completes the instant it is released.
    Instant,
    /// Explicit assignment: every member must be free together.
    Team(Vec<NameId>),
    /// Auto-assignment: exactly one candidate will be picked.
    Pool(Vec<NameId>),
}

/// Static per-task facts, interned once before the pass starts.
struct TaskRow {
    deps: Vec<(NameId, f64)>,
    need: Requirement,
    /// Allocation-adjusted calendar working days.
    span_days: f64,
    priority: i32,
    deadline: Option<NaiveDate>,
    not_before: Option<NaiveDate>,
    /// Finished before the run started; satisfies dependencies for free.
    done: bool,
    /// A real task this pass must place (not a placeholder for a completed
    /// or fixed id).
    floating: bool,
}

impl TaskRow {
    fn placeholder(done: bool) -> Self {
        Self {
            deps: Vec::new(),
            need: Requirement::Instant,
            span_days: 0.0,
            priority: 0,
            deadline: None,
            not_before: None,
            done,
            floating: false,
        }
    }
}

/// A more urgent task that will soon want a resource the current candidate
/// is about to take.
struct Challenger {
    task: NameId,
    priority: i32,
    cr: f64,
    release: NaiveDate,
}

/// Chronological greedy scheduler, optionally wrapped with bounded rollout.
pub struct SgsScheduler {
    tasks: FxHashMap<String, Task>,
    candidates: FxHashMap<String, Vec<String>>,
    catalog: ResourceCatalog,
    start_date: NaiveDate,
    completed: FxHashSet<String>,
    config: SchedulingConfig,
    lookahead: Option<RolloutConfig>,
    computed_deadlines: FxHashMap<String, NaiveDate>,
    computed_priorities: FxHashMap<String, i32>,
    task_index: NameIndex,
    resource_index: NameIndex,
    rows: Vec<TaskRow>,
    decisions: Vec<RolloutDecision>,
}

impl SgsScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Vec<Task>,
        candidates: FxHashMap<String, Vec<String>>,
        catalog: ResourceCatalog,
        current_date: NaiveDate,
        completed: FxHashSet<String>,
        config: SchedulingConfig,
        rollout_config: Option<RolloutConfig>,
        preprocess: PreprocessResult,
    ) -> Self {
        Self {
            tasks: tasks.into_iter().map(|t| (t.id.clone(), t)).collect(),
            candidates,
            catalog,
            start_date: current_date,
            completed,
            config,
            lookahead: rollout_config,
            computed_deadlines: preprocess.computed_deadlines,
            computed_priorities: preprocess.computed_priorities,
            task_index: NameIndex::default(),
            resource_index: NameIndex::default(),
            rows: Vec::new(),
            decisions: Vec::new(),
        }
    }

    /// Run the full pass: fixed-date layer, interning, then the clock loop.
    pub fn schedule(&mut self) -> Result<AlgorithmResult, ScheduleError> {
        let fixed = super::fixed::extract_fixed_tasks(&mut self.tasks, &self.catalog);
        self.build_tables(&fixed);

        let frame = self.opening_frame(&fixed);
        let mut decisions = Vec::new();
        let frame = self.run(frame, None, None, Some(&mut decisions))?;
        self.decisions = decisions;

        Ok(self.emit(frame, fixed))
    }

    pub fn rollout_decisions(&self) -> &[RolloutDecision] {
        &self.decisions
    }

    fn name_of(&self, t: NameId) -> &str {
        self.task_index.name(t).unwrap_or("")
    }

    /// Intern task and resource names and flatten every task into a
    /// [`TaskRow`]. Ids follow sorted name order for tasks and catalog
    /// order (then sorted extras) for resources, so identical bundles
    /// produce identical ids.
    fn build_tables(&mut self, fixed: &[ScheduledTask]) {
        let mut task_names: FxHashSet<String> = self.tasks.keys().cloned().collect();
        for task in self.tasks.values() {
            for dep in &task.dependencies {
                task_names.insert(dep.pred.clone());
            }
        }
        for entry in fixed {
            task_names.insert(entry.task_id.clone());
        }
        let mut task_names: Vec<String> = task_names.into_iter().collect();
        task_names.sort();
        self.task_index = NameIndex::new(task_names.into_iter());

        let mut known: FxHashSet<String> =
            self.catalog.resource_order().iter().cloned().collect();
        let mut extras: Vec<String> = Vec::new();
        let mut note = |name: &String| {
            if known.insert(name.clone()) {
                extras.push(name.clone());
            }
        };
        for task in self.tasks.values() {
            for (resource, _) in &task.resources {
                note(resource);
            }
        }
        for pool in self.candidates.values() {
            for resource in pool {
                note(resource);
            }
        }
        for entry in fixed {
            for resource in &entry.resources {
                note(resource);
            }
        }
        extras.sort();
        self.resource_index = NameIndex::new(
            self.catalog
                .resource_order()
                .iter()
                .cloned()
                .chain(extras),
        );

        let mut rows: Vec<TaskRow> = (0..self.task_index.len())
            .map(|idx| {
                let done = self
                    .task_index
                    .name(idx as NameId)
                    .is_some_and(|name| self.completed.contains(name));
                TaskRow::placeholder(done)
            })
            .collect();

        for (name, task) in &self.tasks {
            let Some(id) = self.task_index.get_id(name) else {
                continue;
            };
            let need = if task.is_milestone() {
                Requirement::Instant
            } else if let Some(pool) = self.candidates.get(name) {
                Requirement::Pool(
                    pool.iter()
                        .filter_map(|r| self.resource_index.get_id(r))
                        .collect(),
                )
            } else {
                Requirement::Team(
                    task.resources
                        .iter()
                        .filter_map(|(r, _)| self.resource_index.get_id(r))
                        .collect(),
                )
            };
            let done = self.completed.contains(name);
            rows[id as usize] = TaskRow {
                deps: task
                    .dependencies
                    .iter()
                    .filter_map(|d| self.task_index.get_id(&d.pred).map(|p| (p, d.lag_days)))
                    .collect(),
                need,
                span_days: task.effective_duration(),
                priority: self
                    .computed_priorities
                    .get(name)
                    .copied()
                    .unwrap_or(self.config.default_priority),
                deadline: self.computed_deadlines.get(name).copied(),
                not_before: task.start_after,
                done,
                floating: !done,
            };
        }

        self.rows = rows;
    }

    /// Seed the frame: DNS-loaded calendars with fixed windows blocked out,
    /// and fixed spans pre-filled so dependents can release off them.
    fn opening_frame(&self, fixed: &[ScheduledTask]) -> Frame {
        let mut calendars: Vec<ResourceCalendar> = self
            .resource_index
            .iter()
            .map(|(_, name)| ResourceCalendar::new(name, self.catalog.dns_for(name)))
            .collect();
        for entry in fixed {
            for resource in &entry.resources {
                if let Some(id) = self.resource_index.get_id(resource) {
                    calendars[id as usize].insert(entry.start_date, entry.end_date);
                }
            }
        }

        let mut spans: Vec<Option<(NaiveDate, NaiveDate)>> = vec![None; self.rows.len()];
        for entry in fixed {
            if let Some(id) = self.task_index.get_id(&entry.task_id) {
                spans[id as usize] = Some((entry.start_date, entry.end_date));
            }
        }

        let remaining = self
            .rows
            .iter()
            .zip(&spans)
            .filter(|(row, span)| row.floating && span.is_none())
            .count();

        Frame {
            now: self.start_date,
            spans,
            calendars,
            placed: Vec::new(),
            remaining,
        }
    }

    /// The clock loop. `horizon` caps simulated passes; `veto` suppresses
    /// one task at the opening tick (the hold scenario); `sink` collects
    /// lookahead decisions and doubles as the real-pass switch (scenarios
    /// pass `None` and therefore never recurse).
    fn run(
        &self,
        mut frame: Frame,
        horizon: Option<NaiveDate>,
        veto: Option<NameId>,
        mut sink: Option<&mut Vec<RolloutDecision>>,
    ) -> Result<Frame, ScheduleError> {
        let opening = frame.now;
        let verbosity = if sink.is_some() { self.config.verbosity } else { 0 };

        for _ in 0..self.rows.len().max(1) * 100 {
            if frame.remaining == 0 {
                break;
            }
            if horizon.is_some_and(|h| frame.now > h) {
                break;
            }

            log_changes!(verbosity, "tick {}", frame.now);

            let mut progressed = false;
            for t in self.ranked_released(&frame)? {
                if veto == Some(t) && frame.now == opening {
                    continue;
                }

                let row = &self.rows[t as usize];
                log_checks!(
                    verbosity,
                    "  weighing {} (priority {}, cr {:.2})",
                    self.name_of(t),
                    row.priority,
                    self.cr_of(t, frame.now)
                );

                let Some(placement) = self.plan(t, &frame) else {
                    log_checks!(verbosity, "    {} waits: nothing free", self.name_of(t));
                    continue;
                };

                if let (Some(cfg), Some(sink)) = (self.lookahead.as_ref(), sink.as_mut()) {
                    if let Some(decision) = self.consult(t, &placement, &frame, cfg) {
                        let hold = decision.choice == RolloutChoice::Skip;
                        if hold {
                            log_changes!(
                                verbosity,
                                "  holding {} for {}",
                                self.name_of(t),
                                decision.competing_task_id
                            );
                        }
                        sink.push(decision);
                        if hold {
                            continue;
                        }
                    }
                }

                log_changes!(
                    verbosity,
                    "  placed {} {}..{}",
                    self.name_of(t),
                    placement.start,
                    placement.end
                );
                self.apply(&mut frame, t, placement);
                progressed = true;
            }

            if !progressed {
                match self.next_wakeup(&frame) {
                    Some(wake) if horizon.map_or(true, |h| wake <= h) => {
                        log_debug!(verbosity, "  idle at {}, waking {}", frame.now, wake);
                        frame.now = wake;
                    }
                    _ => break,
                }
            }
        }

        if horizon.is_none() && frame.remaining > 0 {
            let mut residual: Vec<String> = self
                .rows
                .iter()
                .enumerate()
                .filter(|(idx, row)| row.floating && frame.spans[*idx].is_none())
                .filter_map(|(idx, _)| self.task_index.name(idx as NameId).map(String::from))
                .collect();
            residual.sort();
            return Err(ScheduleError::UnschedulableResidual(residual));
        }

        Ok(frame)
    }

    /// When every dependency (plus lag, plus the one-day gap after the
    /// inclusive end day) and the start window allow this task to begin.
    /// `None` while some dependency has no span yet.
    fn release_date(&self, t: NameId, frame: &Frame) -> Option<NaiveDate> {
        let row = &self.rows[t as usize];
        let mut release = self.start_date;

        for &(dep, lag) in &row.deps {
            if self.rows[dep as usize].done {
                continue;
            }
            let (_, end) = frame.spans[dep as usize]?;
            release = release.max(end + Duration::days(1 + lag.ceil() as i64));
        }
        if let Some(floor) = row.not_before {
            release = release.max(floor);
        }

        Some(release)
    }

    /// Released-and-unplaced tasks, most urgent first. Sort keys come from
    /// the configured strategy; ties end on the task name.
    fn ranked_released(&self, frame: &Frame) -> Result<Vec<NameId>, ScheduleError> {
        let (default_cr, atc) = self.urgency_inputs(frame);

        let mut keys: Vec<(SortKey, NameId)> = Vec::new();
        for (idx, row) in self.rows.iter().enumerate() {
            if !row.floating || frame.spans[idx].is_some() {
                continue;
            }
            let t = idx as NameId;
            match self.release_date(t, frame) {
                Some(release) if release <= frame.now => {}
                _ => continue,
            }

            let info = TaskSortInfo {
                duration_days: row.span_days,
                deadline: row.deadline,
                priority: row.priority,
            };
            let key = compute_sort_key(
                self.name_of(t),
                &info,
                frame.now,
                default_cr,
                &self.config,
                atc.as_ref(),
            )?;
            keys.push((key, t));
        }

        keys.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(keys.into_iter().map(|(_, t)| t).collect())
    }

    /// Per-tick urgency context in one sweep over the live rows: the
    /// default CR for undated tasks, and (under ATC) the average span plus
    /// the default urgency. The least urgent dated task is the one with the
    /// widest positive `slack - span`, so its urgency falls out in closed
    /// form instead of a per-task minimum.
    fn urgency_inputs(&self, frame: &Frame) -> (f64, Option<AtcParams>) {
        let mut max_cr: f64 = 0.0;
        let mut total_span = 0.0;
        let mut live = 0usize;
        let mut widest_slack = f64::NEG_INFINITY;
        let mut dated = false;

        for (idx, row) in self.rows.iter().enumerate() {
            if !row.floating || frame.spans[idx].is_some() {
                continue;
            }
            live += 1;
            total_span += row.span_days;
            if let Some(deadline) = row.deadline {
                dated = true;
                let slack = (deadline - frame.now).num_days() as f64;
                max_cr = max_cr.max(slack / row.span_days.max(1.0));
                widest_slack = widest_slack.max(slack - row.span_days);
            }
        }

        let default_cr =
            (max_cr * self.config.default_cr_multiplier).max(self.config.default_cr_floor);

        if self.config.strategy != Strategy::Atc {
            return (default_cr, None);
        }

        let avg_duration = if live == 0 { 1.0 } else { total_span / live as f64 };
        let default_urgency = if !dated {
            self.config.atc_default_urgency_floor
        } else {
            let min_urgency = if widest_slack <= 0.0 {
                1.0
            } else {
                (-widest_slack / (self.config.atc_k * avg_duration)).exp()
            };
            (min_urgency * self.config.atc_default_urgency_multiplier)
                .max(self.config.atc_default_urgency_floor)
        };

        (default_cr, Some(AtcParams { avg_duration, default_urgency }))
    }

    fn cr_of(&self, t: NameId, at: NaiveDate) -> f64 {
        let row = &self.rows[t as usize];
        match row.deadline {
            Some(deadline) => {
                (deadline - at).num_days() as f64 / row.span_days.max(1.0)
            }
            None => self.config.default_cr_floor,
        }
    }

    /// Work out where this task would run if committed right now. Pure; the
    /// frame is only read.
    ///
    /// A pool pick goes to the candidate finishing earliest over the whole
    /// pool, busy or not; if that winner is not free today the task waits
    /// for it rather than burning a slower resource (greedy with
    /// foresight). Teams start only when every member is free together and
    /// end at the slowest member's completion.
    fn plan(&self, t: NameId, frame: &Frame) -> Option<Placement> {
        let row = &self.rows[t as usize];
        let now = frame.now;

        match &row.need {
            Requirement::Instant => Some(Placement {
                start: now,
                end: now,
                claims: Vec::new(),
            }),
            Requirement::Pool(pool) => {
                let mut pick: Option<(NameId, NaiveDate, NaiveDate)> = None;
                for &r in pool {
                    let calendar = &frame.calendars[r as usize];
                    let free = calendar.next_free_at(now);
                    let finish = calendar.completion_time(free, row.span_days);
                    // Strict comparison keeps the earlier pool entry on ties.
                    if pick.as_ref().is_none_or(|&(_, _, best)| finish < best) {
                        pick = Some((r, free, finish));
                    }
                }
                let (winner, free, finish) = pick?;
                (free == now).then(|| Placement {
                    start: now,
                    end: finish,
                    claims: vec![winner],
                })
            }
            Requirement::Team(members) => {
                if members.is_empty() {
                    return None;
                }
                if members
                    .iter()
                    .any(|&r| frame.calendars[r as usize].next_free_at(now) != now)
                {
                    return None;
                }
                let end = members
                    .iter()
                    .map(|&r| frame.calendars[r as usize].completion_time(now, row.span_days))
                    .max()
                    .unwrap_or(now);
                Some(Placement {
                    start: now,
                    end,
                    claims: members.clone(),
                })
            }
        }
    }

    fn apply(&self, frame: &mut Frame, t: NameId, placement: Placement) {
        for &r in &placement.claims {
            frame.calendars[r as usize].insert(placement.start, placement.end);
        }
        frame.spans[t as usize] = Some((placement.start, placement.end));
        frame.placed.push((t, placement));
        frame.remaining -= 1;
    }

    /// The earliest future moment anything can change: a pending release
    /// date, or the first free day of a currently busy calendar. Calendars
    /// free today contribute nothing; if no placement happened today, only
    /// those two kinds of events can unblock one.
    fn next_wakeup(&self, frame: &Frame) -> Option<NaiveDate> {
        let mut wake: Option<NaiveDate> = None;
        let mut note = |date: NaiveDate| {
            if date > frame.now {
                wake = Some(wake.map_or(date, |w| w.min(date)));
            }
        };

        for (idx, row) in self.rows.iter().enumerate() {
            if !row.floating || frame.spans[idx].is_some() {
                continue;
            }
            if let Some(release) = self.release_date(idx as NameId, frame) {
                note(release);
            }
        }
        for calendar in &frame.calendars {
            note(calendar.next_free_at(frame.now));
        }

        wake
    }

    /// Lookahead: given a planned placement for a relaxed task, ask whether
    /// holding the resource for an imminent, strictly more urgent rival
    /// scores better. Returns the decision record when a rival forced a
    /// simulation; `None` means nothing competed and the placement stands.
    fn consult(
        &self,
        t: NameId,
        placement: &Placement,
        frame: &Frame,
        cfg: &RolloutConfig,
    ) -> Option<RolloutDecision> {
        let row = &self.rows[t as usize];
        if row.span_days == 0.0 {
            return None;
        }

        let cr = self.cr_of(t, frame.now);
        let pressing =
            row.priority >= cfg.priority_threshold && cr <= cfg.cr_relaxed_threshold;
        if pressing {
            // Urgent work is never second-guessed.
            return None;
        }

        let rival = self.find_challenger(t, placement.end, frame, cfg)?;

        let mut horizon = placement.end;
        if let Some(max_days) = cfg.max_horizon_days {
            horizon = horizon.min(frame.now + Duration::days(max_days as i64));
        }

        log_checks!(
            self.config.verbosity,
            "    lookahead: {} (priority {}, cr {:.2}) vs {} (priority {}, cr {:.2}, released {})",
            self.name_of(t),
            row.priority,
            cr,
            self.name_of(rival.task),
            rival.priority,
            rival.cr,
            rival.release
        );

        // Commit scenario: place it and let the pass continue to the horizon.
        let mut ahead = frame.clone();
        self.apply(&mut ahead, t, placement.clone());
        let ahead = self.run(ahead, Some(horizon), None, None).ok()?;
        let commit_score = self.appraise(&ahead, horizon);

        // Hold scenario: same pass with this task vetoed at the opening tick.
        let held = self.run(frame.clone(), Some(horizon), Some(t), None).ok()?;
        let hold_score = self.appraise(&held, horizon);

        log_checks!(
            self.config.verbosity,
            "    lookahead scores: commit {:.2}, hold {:.2}",
            commit_score,
            hold_score
        );

        let choice = if hold_score < commit_score {
            RolloutChoice::Skip
        } else {
            RolloutChoice::Schedule
        };

        Some(RolloutDecision {
            task_id: self.name_of(t).to_string(),
            task_priority: row.priority,
            task_cr: cr,
            competing_task_id: self.name_of(rival.task).to_string(),
            competing_priority: rival.priority,
            competing_cr: rival.cr,
            competing_eligible_date: rival.release,
            schedule_score: commit_score,
            skip_score: hold_score,
            choice,
        })
    }

    /// The most imminent strictly-more-urgent rival releasing before
    /// `completion`. Urgency means a priority gap of at least
    /// `min_priority_gap`, or a CR gap of at least `min_cr_urgency_gap`
    /// without being badly outranked.
    fn find_challenger(
        &self,
        t: NameId,
        completion: NaiveDate,
        frame: &Frame,
        cfg: &RolloutConfig,
    ) -> Option<Challenger> {
        let row = &self.rows[t as usize];
        let cr_t = self.cr_of(t, frame.now);

        let mut rival: Option<Challenger> = None;
        for (idx, other) in self.rows.iter().enumerate() {
            let u = idx as NameId;
            if u == t || !other.floating || frame.spans[idx].is_some() {
                continue;
            }

            let outranks = other.priority - row.priority >= cfg.min_priority_gap;
            let cr_u = self.cr_of(u, frame.now);
            let presses = cr_t - cr_u >= cfg.min_cr_urgency_gap
                && other.priority + cfg.min_priority_gap >= row.priority;
            if !outranks && !presses {
                continue;
            }

            // A rival with unplaced dependencies has no estimable release
            // yet and cannot claim the resource.
            let Some(release) = self.release_date(u, frame) else {
                continue;
            };
            let release = release.max(frame.now);
            if release >= completion {
                continue;
            }

            let sooner = rival
                .as_ref()
                .is_none_or(|r| (release, u) < (r.release, r.task));
            if sooner {
                rival = Some(Challenger {
                    task: u,
                    priority: other.priority,
                    cr: cr_u,
                    release,
                });
            }
        }

        rival
    }

    /// Score a (possibly partial) world; lower is better. Placed work pays
    /// priority-weighted start delay plus 10x priority per day past its
    /// deadline. Released-but-waiting work pays for the idle horizon scaled
    /// by deadline pressure, plus its projected tardiness.
    fn appraise(&self, frame: &Frame, horizon: NaiveDate) -> f64 {
        let mut score = 0.0;

        for (t, placement) in &frame.placed {
            let row = &self.rows[*t as usize];
            let priority = row.priority as f64;
            score += (placement.start - self.start_date).num_days() as f64 * priority / 100.0;
            if let Some(deadline) = row.deadline {
                if placement.end > deadline {
                    score += (placement.end - deadline).num_days() as f64 * priority * 10.0;
                }
            }
        }

        for (idx, row) in self.rows.iter().enumerate() {
            if !row.floating || frame.spans[idx].is_some() {
                continue;
            }
            let ready = row
                .deps
                .iter()
                .all(|&(dep, _)| {
                    self.rows[dep as usize].done || frame.spans[dep as usize].is_some()
                });
            if !ready || row.not_before.is_some_and(|floor| floor > horizon) {
                continue;
            }

            let priority = row.priority as f64;
            let pressure = (10.0 / self.cr_of(idx as NameId, self.start_date).max(0.1)).min(100.0);
            score += (horizon - self.start_date).num_days() as f64 * (priority / 100.0) * pressure;

            if let Some(deadline) = row.deadline {
                let projected = horizon + Duration::days(row.span_days.ceil() as i64);
                if projected > deadline {
                    score += (projected - deadline).num_days() as f64 * priority * 10.0;
                }
            }
        }

        score
    }

    /// Read the commit log back out as the algorithm result.
    fn emit(&self, frame: Frame, fixed: Vec<ScheduledTask>) -> AlgorithmResult {
        let mut scheduled_tasks = fixed;
        for (t, placement) in &frame.placed {
            let Some(name) = self.task_index.name(*t) else {
                continue;
            };
            scheduled_tasks.push(ScheduledTask {
                task_id: name.to_string(),
                start_date: placement.start,
                end_date: placement.end,
                duration_days: self.rows[*t as usize].span_days,
                resources: placement
                    .claims
                    .iter()
                    .filter_map(|&r| self.resource_index.name(r).map(String::from))
                    .collect(),
            });
        }

        let mut metadata = std::collections::BTreeMap::new();
        metadata.insert(
            "algorithm".to_string(),
            if self.lookahead.is_some() {
                "bounded_rollout".to_string()
            } else {
                "parallel_sgs".to_string()
            },
        );
        metadata.insert("strategy".to_string(), self.config.strategy.to_string());
        if self.lookahead.is_some() {
            metadata.insert(
                "rollout_decisions".to_string(),
                self.decisions.len().to_string(),
            );
        }

        AlgorithmResult {
            scheduled_tasks,
            algorithm_metadata: metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dependency;
    use crate::preprocess::backward_pass;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn on(resource: &str) -> Vec<(String, f64)> {
        vec![(resource.to_string(), 1.0)]
    }

    fn scheduler_with_pools(
        tasks: Vec<Task>,
        candidates: FxHashMap<String, Vec<String>>,
        rollout: Option<RolloutConfig>,
    ) -> SgsScheduler {
        let config = SchedulingConfig::default();
        let preprocess =
            backward_pass(&tasks, &FxHashSet::default(), config.default_priority).unwrap();
        SgsScheduler::new(
            tasks,
            candidates,
            ResourceCatalog::default(),
            d(2025, 1, 1),
            FxHashSet::default(),
            config,
            rollout,
            preprocess,
        )
    }

    fn scheduler(tasks: Vec<Task>, rollout: Option<RolloutConfig>) -> SgsScheduler {
        scheduler_with_pools(tasks, FxHashMap::default(), rollout)
    }

    #[test]
    fn sequential_tasks_share_a_resource() {
        let tasks = vec![
            Task {
                id: "a".to_string(),
                duration_days: 5.0,
                resources: on("r1"),
                ..Task::default()
            },
            Task {
                id: "b".to_string(),
                duration_days: 3.0,
                resources: on("r1"),
                dependencies: vec![Dependency::new("a")],
                ..Task::default()
            },
        ];

        let result = scheduler(tasks, None).schedule().unwrap();
        assert_eq!(result.scheduled_tasks.len(), 2);

        let a = result.scheduled_tasks.iter().find(|t| t.task_id == "a").unwrap();
        let b = result.scheduled_tasks.iter().find(|t| t.task_id == "b").unwrap();

        assert_eq!(a.start_date, d(2025, 1, 1));
        assert_eq!(a.end_date, d(2025, 1, 6));
        // Dependency end day is inclusive: b starts the day after.
        assert_eq!(b.start_date, d(2025, 1, 7));
    }

    #[test]
    fn independent_tasks_run_in_parallel() {
        let tasks = vec![
            Task {
                id: "a".to_string(),
                duration_days: 5.0,
                resources: on("r1"),
                ..Task::default()
            },
            Task {
                id: "b".to_string(),
                duration_days: 3.0,
                resources: on("r2"),
                ..Task::default()
            },
        ];

        let result = scheduler(tasks, None).schedule().unwrap();
        for task in &result.scheduled_tasks {
            assert_eq!(task.start_date, d(2025, 1, 1));
        }
    }

    #[test]
    fn milestones_take_no_resources() {
        let tasks = vec![Task {
            id: "launch".to_string(),
            duration_days: 0.0,
            ..Task::default()
        }];

        let result = scheduler(tasks, None).schedule().unwrap();
        let milestone = &result.scheduled_tasks[0];
        assert_eq!(milestone.start_date, d(2025, 1, 1));
        assert_eq!(milestone.end_date, d(2025, 1, 1));
        assert!(milestone.resources.is_empty());
    }

    #[test]
    fn fixed_start_bypasses_the_queue() {
        let tasks = vec![Task {
            id: "offsite".to_string(),
            duration_days: 5.0,
            resources: on("r1"),
            start_on: Some(d(2025, 2, 1)),
            ..Task::default()
        }];

        let result = scheduler(tasks, None).schedule().unwrap();
        assert_eq!(result.scheduled_tasks[0].start_date, d(2025, 2, 1));
    }

    #[test]
    fn fixed_end_derives_its_start() {
        let tasks = vec![Task {
            id: "audit".to_string(),
            duration_days: 4.0,
            resources: on("r1"),
            end_on: Some(d(2025, 2, 10)),
            ..Task::default()
        }];

        let result = scheduler(tasks, None).schedule().unwrap();
        assert_eq!(result.scheduled_tasks[0].start_date, d(2025, 2, 6));
        assert_eq!(result.scheduled_tasks[0].end_date, d(2025, 2, 10));
    }

    #[test]
    fn partial_allocation_stretches_the_span() {
        let tasks = vec![Task {
            id: "slow".to_string(),
            duration_days: 5.0,
            resources: vec![("r1".to_string(), 0.5)],
            ..Task::default()
        }];

        let result = scheduler(tasks, None).schedule().unwrap();
        let slow = &result.scheduled_tasks[0];
        assert_eq!(slow.end_date, d(2025, 1, 11));
        assert_eq!(slow.duration_days, 10.0);
    }

    #[test]
    fn start_after_delays_release() {
        let tasks = vec![Task {
            id: "later".to_string(),
            duration_days: 2.0,
            resources: on("r1"),
            start_after: Some(d(2025, 1, 10)),
            ..Task::default()
        }];

        let result = scheduler(tasks, None).schedule().unwrap();
        assert_eq!(result.scheduled_tasks[0].start_date, d(2025, 1, 10));
    }

    #[test]
    fn pool_ties_go_to_the_earlier_candidate() {
        let mut candidates = FxHashMap::default();
        candidates.insert(
            "pick".to_string(),
            vec!["zed".to_string(), "amy".to_string()],
        );
        let tasks = vec![Task {
            id: "pick".to_string(),
            duration_days: 3.0,
            resource_spec: Some("zed|amy".to_string()),
            ..Task::default()
        }];

        let result = scheduler_with_pools(tasks, candidates, None).schedule().unwrap();
        // Both candidates finish on the same day; expansion order decides.
        assert_eq!(result.scheduled_tasks[0].resources, vec!["zed"]);
    }

    #[test]
    fn pool_waits_for_its_fastest_finisher() {
        // amy is tied up for a while; zed is free but would still finish
        // later than amy because of a long personal DNS block.
        let mut candidates = FxHashMap::default();
        candidates.insert(
            "job".to_string(),
            vec!["amy".to_string(), "zed".to_string()],
        );
        let tasks = vec![
            Task {
                id: "agenda".to_string(),
                duration_days: 2.0,
                resources: on("amy"),
                ..Task::default()
            },
            Task {
                id: "job".to_string(),
                duration_days: 3.0,
                resource_spec: Some("amy|zed".to_string()),
                ..Task::default()
            },
        ];
        let config = SchedulingConfig::default();
        let preprocess =
            backward_pass(&tasks, &FxHashSet::default(), config.default_priority).unwrap();
        let catalog = ResourceCatalog::new(
            &[
                crate::models::Resource::new("amy"),
                crate::models::Resource {
                    id: "zed".to_string(),
                    dns_periods: vec![(d(2025, 1, 2), d(2025, 1, 20))],
                },
            ],
            &[],
            &[],
        )
        .unwrap();
        let mut s = SgsScheduler::new(
            tasks,
            candidates,
            catalog,
            d(2025, 1, 1),
            FxHashSet::default(),
            config,
            None,
            preprocess,
        );

        let result = s.schedule().unwrap();
        let job = result
            .scheduled_tasks
            .iter()
            .find(|t| t.task_id == "job")
            .unwrap();
        // Deferred until amy frees up instead of starting on zed at once.
        assert_eq!(job.resources, vec!["amy"]);
        assert_eq!(job.start_date, d(2025, 1, 4));
    }

    #[test]
    fn metadata_names_the_algorithm() {
        let result = scheduler(vec![], None).schedule().unwrap();
        assert_eq!(
            result.algorithm_metadata.get("algorithm").map(String::as_str),
            Some("parallel_sgs")
        );

        let result = scheduler(vec![], Some(RolloutConfig::default()))
            .schedule()
            .unwrap();
        assert_eq!(
            result.algorithm_metadata.get("algorithm").map(String::as_str),
            Some("bounded_rollout")
        );
    }
}
