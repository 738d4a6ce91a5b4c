//! Notification instances and their lifecycle state machine.
//!
//! States: Pending -> Sent -> {Read, Dismissed, Snoozed}, with Failed as the
//! retryable delivery-error state and Dismissed as the only terminal state
//! (Read may still be dismissed). Every transition sets its timestamp fields
//! in the same call, so no instance is ever observable with a state ahead of
//! its bookkeeping.
//!
//! Expected business conditions (retry budget spent, snooze budget spent)
//! are boolean results; `TransitionError` is reserved for caller bugs.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransitionError;
use crate::planner;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MAX_SNOOZES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationState {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "sent")]
    Sent,
    #[serde(rename = "read")]
    Read,
    #[serde(rename = "dismissed")]
    Dismissed,
    #[serde(rename = "snoozed")]
    Snoozed,
    #[serde(rename = "failed")]
    Failed,
}

/// Urgency tier, ordered so that comparisons read naturally:
/// `Critical > High > Normal > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "critical")]
    Critical,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

/// One reminder/alert tied to a specific occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationInstance {
    pub id: String,
    /// The recurring item this notification belongs to.
    pub subject_id: String,
    pub title: String,
    pub message: String,
    /// Stable key preventing duplicate planning across sweep ticks.
    pub dedupe_key: String,

    /// Instant the notification should fire.
    pub scheduled_at: DateTime<Utc>,
    /// Occurrence the notification is about.
    pub due_date: NaiveDate,

    pub state: NotificationState,
    pub priority: Priority,

    pub sent_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub dismissed_at: Option<DateTime<Utc>>,

    pub retry_count: u32,
    pub max_retries: u32,
    pub error_message: Option<String>,

    pub snooze_count: u32,
    pub snooze_until: Option<DateTime<Utc>>,
    pub max_snooze_count: u32,
}

impl NotificationInstance {
    pub fn new(
        id: impl Into<String>,
        subject_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        due_date: NaiveDate,
    ) -> Self {
        let id = id.into();
        Self {
            dedupe_key: id.clone(),
            id,
            subject_id: subject_id.into(),
            title: title.into(),
            message: message.into(),
            scheduled_at,
            due_date,
            state: NotificationState::Pending,
            priority: Priority::Normal,
            sent_at: None,
            read_at: None,
            dismissed_at: None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            error_message: None,
            snooze_count: 0,
            snooze_until: None,
            max_snooze_count: DEFAULT_MAX_SNOOZES,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dedupe_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = key.into();
        self
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_max_snoozes(mut self, max: u32) -> Self {
        self.max_snooze_count = max;
        self
    }

    /// Dismissed is the only state with no way out.
    pub fn is_terminal(&self) -> bool {
        self.state == NotificationState::Dismissed
    }

    /// Pending and at or past its scheduled instant.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == NotificationState::Pending && self.scheduled_at <= now
    }

    /// Failed with retry budget left.
    pub fn is_retryable(&self) -> bool {
        self.state == NotificationState::Failed && self.retry_count < self.max_retries
    }

    /// Mark the instance sent. Valid only from Pending; delivery itself is
    /// the caller's job, and a delivery error comes back through [`fail`](Self::fail).
    pub fn send(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.state != NotificationState::Pending {
            return Err(TransitionError::invalid("send", self.state));
        }
        self.state = NotificationState::Sent;
        self.sent_at = Some(now);
        self.error_message = None;
        Ok(())
    }

    /// Record a delivery error. Valid from Pending, Sent, or an already
    /// Failed instance (repeated errors keep counting against the budget).
    /// Returns true when the retry budget is now exhausted; that is a flag
    /// for the caller to escalate or give up, not an error.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<bool, TransitionError> {
        match self.state {
            NotificationState::Pending | NotificationState::Sent | NotificationState::Failed => {}
            other => return Err(TransitionError::invalid("fail", other)),
        }
        self.state = NotificationState::Failed;
        self.retry_count = (self.retry_count + 1).min(self.max_retries);
        self.error_message = Some(error.into());
        Ok(self.retry_count >= self.max_retries)
    }

    /// Re-arm a Failed instance for another delivery attempt. No-op (false)
    /// unless Failed with budget remaining.
    pub fn retry(&mut self) -> bool {
        if !self.is_retryable() {
            return false;
        }
        self.state = NotificationState::Pending;
        self.sent_at = None;
        self.error_message = None;
        true
    }

    /// Valid only from Sent.
    pub fn mark_read(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.state != NotificationState::Sent {
            return Err(TransitionError::invalid("mark_read", self.state));
        }
        self.state = NotificationState::Read;
        self.read_at = Some(now);
        Ok(())
    }

    /// Valid from any non-terminal state, Read included. Dismissal does not
    /// imply read: `read_at` stays as it was.
    pub fn dismiss(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::invalid("dismiss", self.state));
        }
        self.state = NotificationState::Dismissed;
        self.dismissed_at = Some(now);
        Ok(())
    }

    /// Defer a sent notification. Valid only from Sent; `Ok(false)` when the
    /// snooze budget is spent.
    pub fn snooze(
        &mut self,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, TransitionError> {
        if self.state != NotificationState::Sent {
            return Err(TransitionError::invalid("snooze", self.state));
        }
        if self.snooze_count >= self.max_snooze_count {
            return Ok(false);
        }
        self.state = NotificationState::Snoozed;
        self.snooze_count += 1;
        self.snooze_until = Some(now + duration);
        Ok(true)
    }

    /// Reinject an elapsed snooze as newly due. Poll-driven: returns true
    /// when the deferral had elapsed and the instance is Pending again.
    pub fn release_snooze(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != NotificationState::Snoozed {
            return false;
        }
        let Some(until) = self.snooze_until else {
            return false;
        };
        if until > now {
            return false;
        }
        self.state = NotificationState::Pending;
        self.snooze_until = None;
        self.sent_at = None;
        true
    }

    /// Move the fire instant, e.g. after the underlying due date changed.
    /// Requires a future instant and a non-terminal state; resets delivery
    /// bookkeeping so the instance fires fresh.
    pub fn reschedule(
        &mut self,
        new_scheduled_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::invalid("reschedule", self.state));
        }
        if new_scheduled_at <= now {
            return Err(TransitionError::RescheduleInPast {
                requested: new_scheduled_at,
                now,
            });
        }
        self.scheduled_at = new_scheduled_at;
        self.state = NotificationState::Pending;
        self.sent_at = None;
        self.error_message = None;
        self.retry_count = 0;
        self.snooze_until = None;
        Ok(())
    }

    /// Re-derive priority from the days remaining until the due date,
    /// raising it when the horizon has shrunk. Never lowers. Returns true
    /// when the priority changed.
    pub fn escalate_priority(&mut self, now: DateTime<Utc>) -> bool {
        let days_until = (self.due_date - now.date_naive()).num_days();
        let target = planner::priority_for_days_until(days_until);
        if target > self.priority {
            self.priority = target;
            true
        } else {
            false
        }
    }
}
