//! Forward-pass working state.
//!
//! Everything the pass mutates lives in one plain-data `Frame`: task spans
//! and resource calendars in flat vectors indexed by interned id, plus the
//! clock and the commit log. Lookahead scenarios fork the world with a
//! single derived `Clone`; there are no maps to rebuild and nothing to
//! invalidate.

use chrono::NaiveDate;

use crate::index::NameId;

use super::calendar::ResourceCalendar;

/// A resolved commitment for one task: when it runs and which calendars it
/// blocks. Milestones claim nothing; a pool assignment claims its one
/// winner; a team assignment claims every member.
#[derive(Clone, Debug)]
pub(crate) struct Placement {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub claims: Vec<NameId>,
}

/// Mutable world of one scheduling pass (real or simulated).
#[derive(Clone)]
pub(crate) struct Frame {
    pub now: NaiveDate,
    /// Committed `(start, end)` per task id; `None` while unplaced. Fixed
    /// tasks are seeded here before the pass starts.
    pub spans: Vec<Option<(NaiveDate, NaiveDate)>>,
    /// One calendar per resource id.
    pub calendars: Vec<ResourceCalendar>,
    /// Commit log in decision order; the result is read back from here.
    pub placed: Vec<(NameId, Placement)>,
    /// Floating tasks still waiting for a span.
    pub remaining: usize,
}
