//! Reminder planning: when a notification fires and at what priority.
//!
//! Planning is deterministic over its inputs. The same obligation, due date,
//! and timing always produce the same id and dedupe key, which is what keeps
//! repeated sweeps from double-planning a reminder.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::calendar;
use crate::notification::{
    DEFAULT_MAX_RETRIES, DEFAULT_MAX_SNOOZES, NotificationInstance, Priority,
};
use crate::obligation::Obligation;

/// Knobs for reminder planning: where and when the local fire time lands,
/// and the retry/snooze budgets seeded into each planned instance.
#[derive(Debug, Clone, Copy)]
pub struct ReminderPolicy {
    pub timezone: Tz,
    pub fire_hour: u32,
    pub fire_minute: u32,
    pub max_retries: u32,
    pub max_snoozes: u32,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::Chicago,
            fire_hour: 9,
            fire_minute: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            max_snoozes: DEFAULT_MAX_SNOOZES,
        }
    }
}

/// Priority tier for a horizon in days: due or overdue is Critical,
/// tomorrow High, within three days Normal, further out Low.
pub fn priority_for_days_until(days_until_due: i64) -> Priority {
    if days_until_due <= 0 {
        Priority::Critical
    } else if days_until_due == 1 {
        Priority::High
    } else if days_until_due <= 3 {
        Priority::Normal
    } else {
        Priority::Low
    }
}

/// Plan the reminder for one due occurrence, or `None` when the obligation
/// has reminders turned off. A reminder date already in the past still
/// plans; the instance simply fires on the next sweep.
pub fn plan_reminder(
    obligation: &Obligation,
    due_date: NaiveDate,
    now: DateTime<Utc>,
    policy: &ReminderPolicy,
) -> Option<NotificationInstance> {
    let fire_date = obligation.reminder.reminder_date(due_date)?;
    let scheduled_at = calendar::fire_instant_utc(
        fire_date,
        policy.timezone,
        policy.fire_hour,
        policy.fire_minute,
    );
    let timing = obligation.reminder.label();
    let days_until = (due_date - now.date_naive()).num_days();

    let message = format!(
        "{} (${:.2} on {}) is due on {}.",
        obligation.title,
        obligation.amount.abs(),
        obligation.account,
        due_date
    );

    Some(
        NotificationInstance::new(
            format!("ntf-{}-{}-{}", obligation.id, due_date, timing),
            obligation.id.clone(),
            format!("Upcoming: {}", obligation.title),
            message,
            scheduled_at,
            due_date,
        )
        .with_dedupe_key(format!("{}:{}:{}", obligation.id, due_date, timing))
        .with_priority(priority_for_days_until(days_until))
        .with_max_retries(policy.max_retries)
        .with_max_snoozes(policy.max_snoozes),
    )
}

/// Notification asking for explicit approval of a held occurrence
/// (manual-approval mode). Fires immediately, independent of the reminder
/// timing preference.
pub fn plan_approval_request(
    obligation: &Obligation,
    due_date: NaiveDate,
    now: DateTime<Utc>,
    policy: &ReminderPolicy,
) -> NotificationInstance {
    let days_until = (due_date - now.date_naive()).num_days();
    let message = format!(
        "{} (${:.2} on {}) needs approval before it posts for {}.",
        obligation.title,
        obligation.amount.abs(),
        obligation.account,
        due_date
    );
    NotificationInstance::new(
        format!("ntf-{}-{}-approval", obligation.id, due_date),
        obligation.id.clone(),
        format!("Approval needed: {}", obligation.title),
        message,
        now,
        due_date,
    )
    .with_dedupe_key(format!("{}:{}:approval", obligation.id, due_date))
    .with_priority(priority_for_days_until(days_until))
    .with_max_retries(policy.max_retries)
    .with_max_snoozes(policy.max_snoozes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obligation::ReminderTiming;
    use crate::recurrence::{RecurrenceDefinition, RecurrenceKind};
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obligation(reminder: ReminderTiming) -> Obligation {
        let def = RecurrenceDefinition::new(RecurrenceKind::Monthly, date(2024, 1, 12));
        Obligation::new("bill-rent", "Rent", -1450.0, "Chase", def)
            .unwrap()
            .with_reminder(reminder)
    }

    #[test]
    fn timing_none_plans_nothing() {
        let ob = obligation(ReminderTiming::None);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert!(plan_reminder(&ob, date(2024, 3, 12), now, &ReminderPolicy::default()).is_none());
    }

    #[test]
    fn same_day_due_now_is_critical() {
        let ob = obligation(ReminderTiming::SameDay);
        let now = Utc.with_ymd_and_hms(2024, 3, 12, 12, 0, 0).unwrap();
        let n = plan_reminder(&ob, date(2024, 3, 12), now, &ReminderPolicy::default()).unwrap();
        assert_eq!(n.priority, Priority::Critical);
        assert_eq!(n.due_date, date(2024, 3, 12));
    }

    #[test]
    fn fire_instant_uses_policy_timezone() {
        let ob = obligation(ReminderTiming::SameDay);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let n = plan_reminder(&ob, date(2024, 3, 12), now, &ReminderPolicy::default()).unwrap();
        // 09:00 in Chicago on 2024-03-12 is CDT, five hours behind UTC.
        assert_eq!(
            n.scheduled_at,
            Utc.with_ymd_and_hms(2024, 3, 12, 14, 0, 0).unwrap()
        );
    }

    #[test]
    fn week_ahead_reminder_fires_a_week_early_at_low_priority() {
        let ob = obligation(ReminderTiming::OneWeekBefore);
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap();
        let n = plan_reminder(&ob, date(2024, 3, 20), now, &ReminderPolicy::default()).unwrap();
        assert_eq!(
            n.scheduled_at,
            Utc.with_ymd_and_hms(2024, 3, 13, 14, 0, 0).unwrap()
        );
        assert_eq!(n.priority, Priority::Low);
    }

    #[test]
    fn priority_tiers_cover_the_horizon() {
        assert_eq!(priority_for_days_until(-2), Priority::Critical);
        assert_eq!(priority_for_days_until(0), Priority::Critical);
        assert_eq!(priority_for_days_until(1), Priority::High);
        assert_eq!(priority_for_days_until(2), Priority::Normal);
        assert_eq!(priority_for_days_until(3), Priority::Normal);
        assert_eq!(priority_for_days_until(4), Priority::Low);
        assert_eq!(priority_for_days_until(30), Priority::Low);
    }

    #[test]
    fn planning_is_deterministic_across_sweeps() {
        let ob = obligation(ReminderTiming::ThreeDaysBefore);
        let due = date(2024, 3, 12);
        let first_tick = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        let second_tick = Utc.with_ymd_and_hms(2024, 3, 2, 6, 0, 0).unwrap();
        let a = plan_reminder(&ob, due, first_tick, &ReminderPolicy::default()).unwrap();
        let b = plan_reminder(&ob, due, second_tick, &ReminderPolicy::default()).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.dedupe_key, b.dedupe_key);
        assert_eq!(a.dedupe_key, "bill-rent:2024-03-12:three-days-before");
    }

    #[test]
    fn policy_budgets_seed_the_instance() {
        let ob = obligation(ReminderTiming::SameDay);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let policy = ReminderPolicy {
            max_retries: 5,
            max_snoozes: 1,
            ..ReminderPolicy::default()
        };
        let n = plan_reminder(&ob, date(2024, 3, 12), now, &policy).unwrap();
        assert_eq!(n.max_retries, 5);
        assert_eq!(n.max_snooze_count, 1);
    }

    #[test]
    fn approval_request_is_immediate_and_distinct() {
        let ob = obligation(ReminderTiming::SameDay);
        let now = Utc.with_ymd_and_hms(2024, 3, 12, 6, 0, 0).unwrap();
        let n = plan_approval_request(&ob, date(2024, 3, 12), now, &ReminderPolicy::default());
        assert_eq!(n.scheduled_at, now);
        assert!(n.title.starts_with("Approval needed"));
        assert_eq!(n.dedupe_key, "bill-rent:2024-03-12:approval");
        assert_eq!(n.priority, Priority::Critical);
        assert!(n.is_due(now));
    }
}
