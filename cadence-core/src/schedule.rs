//! Mutable progress record for one recurring obligation.
//!
//! `ScheduleState` is mutated only through the operations here; each one
//! reports whether anything changed so callers can decide on persistence
//! writes. Skipped dates are a typed set, serialized only at the storage
//! boundary.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::recurrence::{self, RecurrenceDefinition};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    /// Date of the most recently materialized occurrence.
    pub last_generated: Option<NaiveDate>,
    /// Occurrences materialized so far.
    pub occurrence_count: u32,
    /// Cached engine output; `None` means no more occurrences.
    pub next_due: Option<NaiveDate>,
    /// Dates explicitly excluded from generation.
    #[serde(default)]
    pub skipped_dates: BTreeSet<NaiveDate>,
}

impl ScheduleState {
    /// Fresh state for a definition, with the first due date cached.
    pub fn new(def: &RecurrenceDefinition) -> Self {
        let mut state = Self::default();
        state.next_due = recurrence::next_occurrence(def, &state);
        state
    }

    /// Record a materialized occurrence and cache the following due date,
    /// which is also returned.
    pub fn mark_generated(
        &mut self,
        def: &RecurrenceDefinition,
        date: NaiveDate,
    ) -> Option<NaiveDate> {
        self.last_generated = Some(date);
        self.occurrence_count += 1;
        self.next_due = recurrence::next_occurrence(def, self);
        self.next_due
    }

    /// Exclude a date from generation. Idempotent; recomputes the cached due
    /// date only when the skipped date was it. Returns true when anything
    /// changed.
    pub fn skip(&mut self, def: &RecurrenceDefinition, date: NaiveDate) -> bool {
        if !self.skipped_dates.insert(date) {
            return false;
        }
        if self.next_due == Some(date) {
            self.next_due = recurrence::next_occurrence(def, self);
        }
        true
    }

    /// Remove a date from the skip set. Returns true when it was present.
    /// Call [`refresh_next_due`](Self::refresh_next_due) afterwards if the
    /// unskipped date should become eligible again.
    pub fn unskip(&mut self, date: NaiveDate) -> bool {
        self.skipped_dates.remove(&date)
    }

    /// Recompute the cached due date from scratch. For hosts that edited the
    /// definition or unskipped a date.
    pub fn refresh_next_due(&mut self, def: &RecurrenceDefinition) -> Option<NaiveDate> {
        self.next_due = recurrence::next_occurrence(def, self);
        self.next_due
    }

    /// True once the recurrence can produce no further occurrences.
    pub fn is_exhausted(&self) -> bool {
        self.next_due.is_none()
    }
}
