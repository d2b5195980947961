//! Cloneable state for the critical-path scheduler and its rollout
//! simulations.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::index::NameId;
use crate::models::ScheduledTask;
use crate::scheduler::ResourceCalendar;

use super::rollout::Reservation;
use super::types::ResourceSet;

/// Snapshot of the critical-path pass. Calendars live in a `Vec` indexed by
/// resource id so cloning for a rollout scenario is one linear copy.
#[derive(Clone)]
pub struct CpState {
    pub scheduled: FxHashMap<String, (NaiveDate, NaiveDate)>,
    pub unscheduled: FxHashSet<String>,
    pub calendars: Vec<ResourceCalendar>,
    pub now: NaiveDate,
    pub result: Vec<ScheduledTask>,
    /// Resources held for a competing target's task, keyed by resource id.
    pub reservations: FxHashMap<NameId, Reservation>,
}

impl CpState {
    pub fn new(
        scheduled: FxHashMap<String, (NaiveDate, NaiveDate)>,
        unscheduled: FxHashSet<String>,
        calendars: Vec<ResourceCalendar>,
        now: NaiveDate,
    ) -> Self {
        Self {
            scheduled,
            unscheduled,
            calendars,
            now,
            result: Vec::new(),
            reservations: FxHashMap::default(),
        }
    }

    pub fn clone_for_rollout(&self) -> Self {
        self.clone()
    }

    /// Bitmask of resources free right now.
    pub fn available_set(&self) -> ResourceSet {
        let mut set = ResourceSet::new();
        for (id, calendar) in self.calendars.iter().enumerate() {
            if calendar.next_free_at(self.now) == self.now {
                set.set(id as NameId);
            }
        }
        set
    }
}
