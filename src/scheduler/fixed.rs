//! Fixed-date layer shared by both schedulers.
//!
//! Tasks with `start_on`/`end_on` bypass the scheduling queue: their span is
//! resolved up front, they claim resource calendar time like any other task,
//! and the forward pass sees them as ordinary busy intervals.

use chrono::{Days, NaiveDate};
use rustc_hash::FxHashMap;

use crate::models::{ScheduledTask, Task};
use crate::resources::ResourceCatalog;

use super::calendar::ResourceCalendar;

/// Resolve every fixed task's span, remove them from the task map, and
/// return them in id order.
///
/// A missing endpoint is filled from the effective duration. A fixed start
/// wins over DNS on that day, but DNS inside the span still pushes the end
/// out. A fixed end is taken as given.
pub(crate) fn extract_fixed_tasks(
    tasks: &mut FxHashMap<String, Task>,
    catalog: &ResourceCatalog,
) -> Vec<ScheduledTask> {
    let mut fixed_ids: Vec<String> = tasks
        .values()
        .filter(|t| t.is_fixed())
        .map(|t| t.id.clone())
        .collect();
    fixed_ids.sort();

    let mut fixed: Vec<ScheduledTask> = Vec::with_capacity(fixed_ids.len());

    for task_id in fixed_ids {
        let Some(task) = tasks.remove(&task_id) else {
            continue;
        };

        let span = task.effective_duration();
        let (start, end) = match (task.start_on, task.end_on) {
            (Some(start), Some(end)) => (start, end),
            (Some(start), None) => (start, dns_aware_end(&task, start, catalog)),
            (None, Some(end)) => {
                let start = end
                    .checked_sub_days(Days::new(span.ceil() as u64))
                    .unwrap_or(end);
                (start, end)
            }
            (None, None) => unreachable!("is_fixed checked"),
        };

        let resources = if task.is_milestone() {
            vec![]
        } else {
            task.resources.iter().map(|(r, _)| r.clone()).collect()
        };

        fixed.push(ScheduledTask {
            task_id,
            start_date: start,
            end_date: end,
            duration_days: span,
            resources,
        });
    }

    fixed
}

/// End date for a fixed start, walking over the assigned resources' DNS.
fn dns_aware_end(task: &Task, start: NaiveDate, catalog: &ResourceCatalog) -> NaiveDate {
    let span = task.effective_duration();
    if task.resources.is_empty() {
        return start
            .checked_add_days(Days::new(span.ceil() as u64))
            .unwrap_or(start);
    }

    let mut max_end = start;
    for (resource, _) in &task.resources {
        let calendar = ResourceCalendar::new(resource.clone(), catalog.dns_for(resource));
        max_end = max_end.max(calendar.completion_time(start, span));
    }
    max_end
}
