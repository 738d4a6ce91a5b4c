//! Domain error types.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::notification::NotificationState;

/// Rejections raised when validating a recurrence definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("interval must be at least 1")]
    ZeroInterval,

    #[error("weekly recurrence requires at least one weekday")]
    EmptyWeekdayMask,

    #[error("weekday mask {0:#010b} sets bits outside Monday..Sunday")]
    InvalidWeekdayMask(u8),

    #[error("day of month must be nonzero and within -31..=31, got {0}")]
    DayOfMonthOutOfRange(i8),

    #[error("end date {end} is not after start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error("occurrence cap must be at least 1")]
    ZeroOccurrenceCap,
}

/// Rejections raised by the notification state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} a notification in the {state:?} state")]
    InvalidState {
        action: &'static str,
        state: NotificationState,
    },

    #[error("new scheduled time {requested} is not after {now}")]
    RescheduleInPast {
        requested: DateTime<Utc>,
        now: DateTime<Utc>,
    },
}

impl TransitionError {
    pub(crate) fn invalid(action: &'static str, state: NotificationState) -> Self {
        TransitionError::InvalidState { action, state }
    }
}
