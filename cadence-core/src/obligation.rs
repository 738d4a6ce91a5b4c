//! Recurring obligation aggregate: identity, recurrence rule, scheduling
//! mode, reminder preference, and schedule progress in one record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;
use crate::materialize::SchedulingMode;
use crate::recurrence::RecurrenceDefinition;
use crate::schedule::ScheduleState;

/// How far ahead of the due date a reminder should fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderTiming {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "same-day")]
    SameDay,
    #[serde(rename = "one-day-before")]
    OneDayBefore,
    #[serde(rename = "three-days-before")]
    ThreeDaysBefore,
    #[serde(rename = "one-week-before")]
    OneWeekBefore,
    #[serde(rename = "two-weeks-before")]
    TwoWeeksBefore,
    #[serde(rename = "one-month-before")]
    OneMonthBefore,
}

impl ReminderTiming {
    /// Date the reminder fires for a given due date; `None` when reminders
    /// are turned off. The month offset is a calendar month, clamped, not a
    /// flat 30 days.
    pub fn reminder_date(&self, due: NaiveDate) -> Option<NaiveDate> {
        use chrono::Duration;
        match self {
            ReminderTiming::None => None,
            ReminderTiming::SameDay => Some(due),
            ReminderTiming::OneDayBefore => Some(due - Duration::days(1)),
            ReminderTiming::ThreeDaysBefore => Some(due - Duration::days(3)),
            ReminderTiming::OneWeekBefore => Some(due - Duration::days(7)),
            ReminderTiming::TwoWeeksBefore => Some(due - Duration::days(14)),
            ReminderTiming::OneMonthBefore => Some(crate::calendar::add_months_clamped(due, -1)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReminderTiming::None => "none",
            ReminderTiming::SameDay => "same-day",
            ReminderTiming::OneDayBefore => "one-day-before",
            ReminderTiming::ThreeDaysBefore => "three-days-before",
            ReminderTiming::OneWeekBefore => "one-week-before",
            ReminderTiming::TwoWeeksBefore => "two-weeks-before",
            ReminderTiming::OneMonthBefore => "one-month-before",
        }
    }
}

/// A scheduled transaction that repeats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    pub id: String,
    pub title: String,
    /// Positive = income, negative = expense.
    pub amount: f64,
    /// Account the transaction posts against.
    pub account: String,
    pub definition: RecurrenceDefinition,
    pub mode: SchedulingMode,
    pub reminder: ReminderTiming,
    pub schedule: ScheduleState,
    /// Cancelled obligations stay stored but produce nothing further.
    pub active: bool,
}

impl Obligation {
    /// Build an obligation around a validated definition, with the first due
    /// date already cached. Defaults: manual approval, reminder three days
    /// ahead.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        amount: f64,
        account: impl Into<String>,
        definition: RecurrenceDefinition,
    ) -> Result<Self, DefinitionError> {
        definition.validate()?;
        let schedule = ScheduleState::new(&definition);
        Ok(Self {
            id: id.into(),
            title: title.into(),
            amount,
            account: account.into(),
            definition,
            mode: SchedulingMode::ManualApproval,
            reminder: ReminderTiming::ThreeDaysBefore,
            schedule,
            active: true,
        })
    }

    pub fn with_mode(mut self, mode: SchedulingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_reminder(mut self, reminder: ReminderTiming) -> Self {
        self.reminder = reminder;
        self
    }

    /// Next cached due date, if any remain.
    pub fn next_due(&self) -> Option<NaiveDate> {
        self.schedule.next_due
    }

    /// Active and still producing occurrences.
    pub fn is_live(&self) -> bool {
        self.active && !self.schedule.is_exhausted()
    }

    /// Record a materialized occurrence; returns the new next due date.
    pub fn mark_generated(&mut self, date: NaiveDate) -> Option<NaiveDate> {
        self.schedule.mark_generated(&self.definition, date)
    }

    /// Exclude one occurrence date. Returns true when anything changed.
    pub fn skip(&mut self, date: NaiveDate) -> bool {
        self.schedule.skip(&self.definition, date)
    }

    /// Re-admit a previously skipped date and refresh the cached due date so
    /// it becomes eligible again. Returns true when the date was skipped.
    pub fn unskip(&mut self, date: NaiveDate) -> bool {
        if !self.schedule.unskip(date) {
            return false;
        }
        self.schedule.refresh_next_due(&self.definition);
        true
    }

    /// Deactivate. Returns true on the first call.
    pub fn cancel(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        true
    }

    pub fn is_expense(&self) -> bool {
        self.amount < 0.0
    }
}
