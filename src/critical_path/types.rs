//! Types for the critical-path scheduler.

use chrono::NaiveDate;
use rustc_hash::FxHashSet;

use crate::index::NameId;

/// Bitmask over resource ids. Supports up to 128 resources, which covers
/// every roadmap this engine has been pointed at; the limit is asserted at
/// index-build time.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct ResourceSet(u128);

impl ResourceSet {
    pub const CAPACITY: usize = 128;

    pub fn new() -> Self {
        Self(0)
    }

    #[inline]
    pub fn set(&mut self, id: NameId) {
        debug_assert!((id as usize) < Self::CAPACITY);
        self.0 |= 1u128 << id;
    }

    #[inline]
    pub fn is_set(&self, id: NameId) -> bool {
        debug_assert!((id as usize) < Self::CAPACITY);
        (self.0 & (1u128 << id)) != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Any bit shared with `other`.
    #[inline]
    pub fn intersects(&self, other: ResourceSet) -> bool {
        (self.0 & other.0) != 0
    }

    /// Every bit of `other` present in `self`.
    #[inline]
    pub fn contains_all(&self, other: ResourceSet) -> bool {
        (self.0 & other.0) == other.0
    }
}

/// A task's resource demand, precomputed for O(1) availability checks.
#[derive(Clone, Copy, Debug)]
pub struct ResourceNeed {
    pub set: ResourceSet,
    /// Explicit assignments need every resource in the set; auto-assignment
    /// needs any one of them.
    pub requires_all: bool,
}

impl ResourceNeed {
    #[inline]
    pub fn satisfiable(&self, available: ResourceSet) -> bool {
        if self.requires_all {
            available.contains_all(self.set)
        } else {
            available.intersects(self.set)
        }
    }
}

/// CPM timing for one task within a target's dependency subgraph. Times are
/// working days relative to the analysis start.
#[derive(Clone, Copy, Debug, Default)]
pub struct TaskTiming {
    pub earliest_start: f64,
    pub earliest_finish: f64,
    pub latest_start: f64,
    pub latest_finish: f64,
    /// `latest_start - earliest_start`; zero means critical.
    pub slack: f64,
}

impl TaskTiming {
    pub fn is_critical(&self) -> bool {
        self.slack.abs() < 1e-9
    }
}

/// An unscheduled task considered as a scheduling goal, with its critical
/// path and attractiveness score.
#[derive(Clone, Debug)]
pub struct Target {
    pub id: String,
    pub id_int: NameId,
    /// Tasks on the critical path, as names (for contender detection and
    /// reservations) and as sorted integer ids (for the hot loop).
    pub critical_path: FxHashSet<String>,
    pub critical_path_ints: Vec<NameId>,
    /// Total unscheduled work in the dependency subgraph, target included.
    pub total_work: f64,
    pub critical_path_length: f64,
    pub priority: i32,
    pub deadline: Option<NaiveDate>,
    /// Filled in by the ranking pass.
    pub urgency: f64,
    pub score: f64,
}

impl Target {
    pub fn new(id: String, id_int: NameId, priority: i32, deadline: Option<NaiveDate>) -> Self {
        Self {
            id,
            id_int,
            critical_path: FxHashSet::default(),
            critical_path_ints: Vec::new(),
            total_work: 0.0,
            critical_path_length: 0.0,
            priority,
            deadline,
            urgency: 0.0,
            score: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_set_operations() {
        let mut a = ResourceSet::new();
        a.set(0);
        a.set(3);
        let mut b = ResourceSet::new();
        b.set(3);

        assert!(a.is_set(0));
        assert!(!a.is_set(1));
        assert!(a.intersects(b));
        assert!(a.contains_all(b));
        assert!(!b.contains_all(a));
        assert!(ResourceSet::new().is_empty());
    }

    #[test]
    fn need_any_vs_all() {
        let mut set = ResourceSet::new();
        set.set(1);
        set.set(2);

        let any = ResourceNeed {
            set,
            requires_all: false,
        };
        let all = ResourceNeed {
            set,
            requires_all: true,
        };

        let mut only_one = ResourceSet::new();
        only_one.set(2);

        assert!(any.satisfiable(only_one));
        assert!(!all.satisfiable(only_one));

        let mut both = only_one;
        both.set(1);
        assert!(all.satisfiable(both));
    }

    #[test]
    fn zero_slack_is_critical() {
        let timing = TaskTiming {
            earliest_start: 0.0,
            earliest_finish: 5.0,
            latest_start: 0.0,
            latest_finish: 5.0,
            slack: 0.0,
        };
        assert!(timing.is_critical());

        let slacked = TaskTiming {
            slack: 2.0,
            ..timing
        };
        assert!(!slacked.is_critical());
    }
}
