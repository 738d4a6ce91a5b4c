//! cadence-core: recurrence calculation and notification lifecycle for
//! recurring financial obligations.

pub mod calendar;
pub mod error;
pub mod materialize;
pub mod notification;
pub mod obligation;
pub mod planner;
pub mod recurrence;
pub mod schedule;

pub use calendar::{
    WeekdayMask, add_months_clamped, add_years_clamped, adjust_for_weekend, clamp_day_of_month,
    day_from_month_end, days_in_month, fire_instant_utc,
};
pub use error::{DefinitionError, TransitionError};
pub use materialize::{MaterializeAction, SchedulingMode, resolve_action};
pub use notification::{
    DEFAULT_MAX_RETRIES, DEFAULT_MAX_SNOOZES, NotificationInstance, NotificationState, Priority,
};
pub use obligation::{Obligation, ReminderTiming};
pub use planner::{ReminderPolicy, plan_approval_request, plan_reminder, priority_for_days_until};
pub use recurrence::{EndPolicy, RecurrenceDefinition, RecurrenceKind, next_occurrence};
pub use schedule::ScheduleState;
