//! Per-resource busy calendar.
//!
//! One sorted list of closed date intervals holds everything that blocks a
//! resource: DNS periods, fixed-task windows, and committed spans. The list
//! keeps a stronger invariant than mere non-overlap: stored intervals never
//! touch, so there is at least one free day between any two of them. That
//! invariant is what makes the queries below closed-form: the day after any
//! stored interval is known to be free, and a single binary search answers
//! "what blocks me next".
//!
//! Queries are pure; only [`ResourceCalendar::insert`] mutates.

use chrono::{Duration, NaiveDate};

/// Busy time for one resource as sorted, pairwise non-touching closed
/// intervals.
#[derive(Clone, Debug)]
pub struct ResourceCalendar {
    pub name: String,
    /// Closed `(first_day, last_day)` blocks. Invariant: sorted, and
    /// consecutive blocks are separated by at least one free day.
    pub busy: Vec<(NaiveDate, NaiveDate)>,
}

fn day_after(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

fn day_before(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}

/// `date` plus a (possibly fractional) number of working days, rounded up
/// to whole days.
fn advance(date: NaiveDate, days: f64) -> NaiveDate {
    date + Duration::days(days.ceil() as i64)
}

impl ResourceCalendar {
    /// A calendar seeded with unavailable periods. The periods may arrive
    /// unsorted or overlapping; they are folded in one by one.
    pub fn new(name: impl Into<String>, dns_periods: Vec<(NaiveDate, NaiveDate)>) -> Self {
        let mut calendar = Self {
            name: name.into(),
            busy: Vec::with_capacity(dns_periods.len()),
        };
        for (start, end) in dns_periods {
            calendar.insert(start, end);
        }
        calendar
    }

    /// Block out `[start, end]`, coalescing with anything it overlaps or
    /// touches.
    ///
    /// Appending past the final block, the common case when committing work
    /// chronologically, is O(1). Otherwise two binary searches bound the
    /// touched range and a single splice replaces it with the merged block.
    pub fn insert(&mut self, start: NaiveDate, end: NaiveDate) {
        debug_assert!(start <= end);

        match self.busy.last() {
            None => {
                self.busy.push((start, end));
                return;
            }
            Some(&(_, last_end)) if start > day_after(last_end) => {
                self.busy.push((start, end));
                return;
            }
            _ => {}
        }

        // Blocks touched by the new one: last_day >= start-1 and
        // first_day <= end+1.
        let lo = self.busy.partition_point(|&(_, e)| e < day_before(start));
        let hi = self.busy.partition_point(|&(s, _)| s <= day_after(end));

        if lo == hi {
            self.busy.insert(lo, (start, end));
        } else {
            let merged = (start.min(self.busy[lo].0), end.max(self.busy[hi - 1].1));
            self.busy.splice(lo..hi, std::iter::once(merged));
        }
    }

    /// First date at or after `from` outside every busy block.
    ///
    /// Non-touching blocks mean at most one block can cover `from`, and the
    /// day after it is free by construction.
    pub fn next_free_at(&self, from: NaiveDate) -> NaiveDate {
        let idx = self.busy.partition_point(|&(_, end)| end < from);
        match self.busy.get(idx) {
            Some(&(start, end)) if start <= from => day_after(end),
            _ => from,
        }
    }

    /// Whether `[start, start + duration]` misses every busy block.
    pub fn is_free(&self, start: NaiveDate, duration_days: f64) -> bool {
        let end = advance(start, duration_days);
        let idx = self.busy.partition_point(|&(_, e)| e < start);
        self.busy.get(idx).map_or(true, |&(s, _)| s > end)
    }

    /// Date the work would finish if started at `start`: slide out of any
    /// block covering the start, then consume the free gaps between blocks
    /// until `effort_days` of working time is covered. Busy days in between
    /// pause the work rather than failing it.
    pub fn completion_time(&self, start: NaiveDate, effort_days: f64) -> NaiveDate {
        if effort_days <= 0.0 {
            return start;
        }

        let mut cursor = self.next_free_at(start);
        let mut left = effort_days;

        let upcoming = self.busy.partition_point(|&(_, end)| end < cursor);
        for &(block_start, block_end) in &self.busy[upcoming..] {
            let gap = (block_start - cursor).num_days() as f64;
            if gap >= left {
                return advance(cursor, left);
            }
            left -= gap;
            cursor = day_after(block_end);
        }

        advance(cursor, left)
    }
}
