use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use cadence_core::{
    NotificationInstance, NotificationState, Obligation, Priority, RecurrenceDefinition,
    RecurrenceKind, ReminderTiming, SchedulingMode,
};
use cadence_sweep::{
    Clock, Delivery, DeliveryOutcome, FixedClock, MemoryLedger, MemoryStore, NotificationStore,
    ObligationStore, SweepConfig, SweepError, Sweeper, TransactionStatus,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

/// Delivery double: plays back a queue of outcomes, then succeeds forever.
/// Records which notification ids were attempted, in order.
struct ScriptedDelivery {
    script: Mutex<VecDeque<DeliveryOutcome>>,
    attempts: Mutex<Vec<String>>,
}

impl ScriptedDelivery {
    fn always_ok() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    fn failing(reason: &str, times: usize) -> Self {
        let script = (0..times)
            .map(|_| DeliveryOutcome::failure(reason))
            .collect();
        Self {
            script: Mutex::new(script),
            attempts: Mutex::new(Vec::new()),
        }
    }

    fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Delivery for ScriptedDelivery {
    async fn deliver(&self, instance: &NotificationInstance) -> DeliveryOutcome {
        self.attempts.lock().unwrap().push(instance.id.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(DeliveryOutcome::success)
    }

    fn channel_name(&self) -> &str {
        "scripted"
    }
}

/// Delivery double that never answers in time.
struct StalledDelivery;

#[async_trait]
impl Delivery for StalledDelivery {
    async fn deliver(&self, _instance: &NotificationInstance) -> DeliveryOutcome {
        tokio::time::sleep(StdDuration::from_secs(30)).await;
        DeliveryOutcome::success()
    }

    fn channel_name(&self) -> &str {
        "stalled"
    }
}

struct Harness {
    clock: Arc<FixedClock>,
    delivery: Arc<ScriptedDelivery>,
    ledger: Arc<MemoryLedger>,
    store: Arc<MemoryStore>,
    sweeper: Sweeper,
}

fn harness_at(
    now: DateTime<Utc>,
    delivery: ScriptedDelivery,
    obligations: Vec<Obligation>,
) -> Harness {
    let clock = Arc::new(FixedClock::at(now));
    let delivery = Arc::new(delivery);
    let ledger = Arc::new(MemoryLedger::new());
    let store = Arc::new(MemoryStore::with_obligations(obligations));
    let sweeper = Sweeper::new(
        clock.clone(),
        delivery.clone(),
        ledger.clone(),
        store.clone(),
        store.clone(),
    );
    Harness {
        clock,
        delivery,
        ledger,
        store,
        sweeper,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn instant(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn monthly_rent() -> Obligation {
    let def = RecurrenceDefinition::new(RecurrenceKind::Monthly, date(2024, 3, 1));
    Obligation::new("bill-rent", "Rent", -1450.0, "Chase", def)
        .unwrap()
        .with_mode(SchedulingMode::AutoPost)
        .with_reminder(ReminderTiming::ThreeDaysBefore)
}

async fn load_obligation(h: &Harness, id: &str) -> Obligation {
    ObligationStore::load(h.store.as_ref(), id)
        .await
        .unwrap()
        .unwrap()
}

async fn list_notifications(h: &Harness) -> Vec<NotificationInstance> {
    NotificationStore::list(h.store.as_ref()).await.unwrap()
}

/// Auto-post flow across two ticks: the due occurrence posts and advances
/// the schedule on the first tick, the planned reminder escalates and
/// delivers once its instant arrives on a later tick.
#[tokio::test]
async fn test_autopost_then_reminder_delivery() {
    let h = harness_at(
        instant(2024, 3, 1, 16),
        ScriptedDelivery::always_ok(),
        vec![monthly_rent()],
    );

    let stats = h.sweeper.run_tick().await.unwrap();
    assert_eq!(stats.scanned, 1);
    assert_eq!(stats.due_occurrences, 1);
    assert_eq!(stats.materialized, 1);
    assert_eq!(stats.reminders_planned, 1);
    assert_eq!(stats.sent, 0, "reminder fires three days before April due");

    let txns = h.ledger.transactions();
    assert_eq!(txns.len(), 1);
    assert_eq!(txns[0].id, "txn-bill-rent-2024-03-01");
    assert_eq!(txns[0].status, TransactionStatus::Posted);
    assert_eq!(
        load_obligation(&h, "bill-rent").await.next_due(),
        Some(date(2024, 4, 1))
    );

    // Reminder planned a month out carries the lowest priority; by the
    // 29th it is three days from due and escalates before sending.
    let pending = &list_notifications(&h).await[0];
    assert_eq!(pending.state, NotificationState::Pending);
    assert_eq!(pending.priority, Priority::Low);
    assert_eq!(pending.scheduled_at, instant(2024, 3, 29, 14));

    h.clock.set(instant(2024, 3, 29, 15));
    let stats = h.sweeper.run_tick().await.unwrap();
    assert_eq!(stats.reminders_planned, 0, "dedupe key suppresses replanning");
    assert_eq!(stats.escalated, 1);
    assert_eq!(stats.sent, 1);

    let sent = &list_notifications(&h).await[0];
    assert_eq!(sent.state, NotificationState::Sent);
    assert_eq!(sent.priority, Priority::Normal);
    assert_eq!(h.delivery.attempts(), vec![sent.id.clone()]);
}

/// Manual-approval flow: the due occurrence holds with an approval request
/// until `approve_occurrence` posts it and dismisses the request.
#[tokio::test]
async fn test_approval_holds_until_approved() {
    let def = RecurrenceDefinition::new(RecurrenceKind::Monthly, date(2024, 3, 5));
    let tuition = Obligation::new("bill-tuition", "Tuition", -2200.0, "Chase", def)
        .unwrap()
        .with_reminder(ReminderTiming::None);
    let h = harness_at(
        instant(2024, 3, 5, 12),
        ScriptedDelivery::always_ok(),
        vec![tuition],
    );

    let stats = h.sweeper.run_tick().await.unwrap();
    assert_eq!(stats.approvals_requested, 1);
    assert_eq!(stats.materialized, 0);
    assert_eq!(stats.sent, 1, "approval request fires immediately");
    assert!(h.ledger.transactions().is_empty());
    assert_eq!(
        load_obligation(&h, "bill-tuition").await.next_due(),
        Some(date(2024, 3, 5)),
        "held occurrence does not advance"
    );

    // Further ticks re-encounter the held date without duplicating anything.
    h.clock.advance(Duration::hours(1));
    let stats = h.sweeper.run_tick().await.unwrap();
    assert_eq!(stats.due_occurrences, 1);
    assert_eq!(stats.approvals_requested, 0);
    assert_eq!(list_notifications(&h).await.len(), 1);

    let err = h
        .sweeper
        .approve_occurrence("bill-tuition", date(2024, 4, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, SweepError::NotHeld { .. }));

    let txn = h
        .sweeper
        .approve_occurrence("bill-tuition", date(2024, 3, 5))
        .await
        .unwrap();
    assert_eq!(txn.status, TransactionStatus::Posted);
    assert_eq!(
        load_obligation(&h, "bill-tuition").await.next_due(),
        Some(date(2024, 4, 5))
    );
    assert_eq!(
        list_notifications(&h).await[0].state,
        NotificationState::Dismissed
    );
}

/// Delivery failures consume the retry budget one tick at a time; once the
/// budget is spent the instance stays Failed and is never re-attempted.
#[tokio::test]
async fn test_retry_budget_across_ticks() {
    let h = harness_at(
        instant(2024, 3, 11, 9),
        ScriptedDelivery::failing("gateway unreachable", 5),
        vec![],
    );
    let n = NotificationInstance::new(
        "ntf-manual",
        "bill-water",
        "Water bill",
        "Water bill is due on 2024-03-12.",
        instant(2024, 3, 11, 8),
        date(2024, 3, 12),
    )
    .with_max_retries(2);
    NotificationStore::save(h.store.as_ref(), &n).await.unwrap();

    let stats = h.sweeper.run_tick().await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.retries_exhausted, 0);

    h.clock.advance(Duration::hours(1));
    let stats = h.sweeper.run_tick().await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.retries_exhausted, 1);

    // Budget spent: the third tick leaves the instance alone.
    h.clock.advance(Duration::hours(1));
    let stats = h.sweeper.run_tick().await.unwrap();
    assert_eq!(stats.failed, 0);
    assert_eq!(h.delivery.attempts().len(), 2);

    let failed = &list_notifications(&h).await[0];
    assert_eq!(failed.state, NotificationState::Failed);
    assert_eq!(failed.retry_count, 2);
    assert_eq!(failed.error_message.as_deref(), Some("gateway unreachable"));
}

/// A snoozed notification reappears once its deferral elapses and is
/// delivered again on the next tick.
#[tokio::test]
async fn test_snooze_release_redelivers() {
    let h = harness_at(
        instant(2024, 3, 11, 9),
        ScriptedDelivery::always_ok(),
        vec![],
    );
    let n = NotificationInstance::new(
        "ntf-electric",
        "bill-electric",
        "Electric bill",
        "Electric bill is due on 2024-03-12.",
        instant(2024, 3, 11, 8),
        date(2024, 3, 12),
    );
    NotificationStore::save(h.store.as_ref(), &n).await.unwrap();

    let stats = h.sweeper.run_tick().await.unwrap();
    assert_eq!(stats.sent, 1);

    // User snoozes for two hours.
    let mut sent = NotificationStore::load(h.store.as_ref(), "ntf-electric")
        .await
        .unwrap()
        .unwrap();
    assert!(sent.snooze(Duration::hours(2), h.clock.now_utc()).unwrap());
    NotificationStore::save(h.store.as_ref(), &sent)
        .await
        .unwrap();

    // Too early: still snoozed.
    h.clock.advance(Duration::hours(1));
    let stats = h.sweeper.run_tick().await.unwrap();
    assert_eq!(stats.snoozes_released, 0);
    assert_eq!(stats.sent, 0);

    h.clock.advance(Duration::hours(2));
    let stats = h.sweeper.run_tick().await.unwrap();
    assert_eq!(stats.snoozes_released, 1);
    assert_eq!(stats.sent, 1);
    assert_eq!(h.delivery.attempts().len(), 2);
    assert_eq!(
        list_notifications(&h).await[0].state,
        NotificationState::Sent
    );
}

/// Cancelling dismisses open (Pending/Snoozed) notifications, leaves
/// already-sent ones alone, and stops the obligation from being swept.
#[tokio::test]
async fn test_cancel_dismisses_open_notifications() {
    let def = RecurrenceDefinition::new(RecurrenceKind::Monthly, date(2024, 3, 10));
    let gym = Obligation::new("bill-gym", "Gym", -45.0, "Chase", def)
        .unwrap()
        .with_reminder(ReminderTiming::SameDay);
    let h = harness_at(
        instant(2024, 3, 10, 13),
        ScriptedDelivery::always_ok(),
        vec![gym],
    );

    // Approval request sends immediately; the same-day reminder fires at
    // 09:00 Chicago (14:00 UTC) and is still pending at 13:00 UTC.
    let stats = h.sweeper.run_tick().await.unwrap();
    assert_eq!(stats.approvals_requested, 1);
    assert_eq!(stats.reminders_planned, 1);
    assert_eq!(stats.sent, 1);

    let dismissed = h.sweeper.cancel_obligation("bill-gym").await.unwrap();
    assert_eq!(dismissed, 1, "only the pending reminder is dismissed");

    let by_state: Vec<NotificationState> = list_notifications(&h)
        .await
        .iter()
        .map(|n| n.state)
        .collect();
    assert!(by_state.contains(&NotificationState::Sent));
    assert!(by_state.contains(&NotificationState::Dismissed));

    let stats = h.sweeper.run_tick().await.unwrap();
    assert_eq!(stats.scanned, 0, "cancelled obligations are not swept");
    assert!(!load_obligation(&h, "bill-gym").await.active);
}

/// A long-dormant schedule catches up a bounded number of occurrences per
/// tick instead of flooding one tick.
#[tokio::test]
async fn test_catch_up_is_bounded_per_tick() {
    let def = RecurrenceDefinition::new(RecurrenceKind::Daily, date(2024, 1, 1));
    let coffee = Obligation::new("bill-coffee", "Coffee subscription", -4.5, "Chase", def)
        .unwrap()
        .with_mode(SchedulingMode::AutoPost)
        .with_reminder(ReminderTiming::None);
    let h = harness_at(
        instant(2024, 3, 1, 12),
        ScriptedDelivery::always_ok(),
        vec![coffee],
    );
    let sweeper = Sweeper::new(
        h.clock.clone(),
        h.delivery.clone(),
        h.ledger.clone(),
        h.store.clone(),
        h.store.clone(),
    )
    .with_config(SweepConfig {
        catch_up_limit: 5,
        ..SweepConfig::default()
    });

    let stats = sweeper.run_tick().await.unwrap();
    assert_eq!(stats.due_occurrences, 5);
    assert_eq!(stats.materialized, 5);
    assert_eq!(
        load_obligation(&h, "bill-coffee").await.next_due(),
        Some(date(2024, 1, 6))
    );

    let stats = sweeper.run_tick().await.unwrap();
    assert_eq!(stats.materialized, 5);
    assert_eq!(h.ledger.transactions().len(), 10);
    assert_eq!(
        load_obligation(&h, "bill-coffee").await.next_due(),
        Some(date(2024, 1, 11))
    );
}

/// A delivery attempt that outlives the configured timeout counts as a
/// failure with a timeout message.
#[tokio::test]
async fn test_delivery_timeout_counts_as_failure() {
    let clock = Arc::new(FixedClock::at(instant(2024, 3, 11, 9)));
    let store = Arc::new(MemoryStore::new());
    let sweeper = Sweeper::new(
        clock.clone(),
        Arc::new(StalledDelivery),
        Arc::new(MemoryLedger::new()),
        store.clone(),
        store.clone(),
    )
    .with_config(SweepConfig {
        delivery_timeout: StdDuration::from_millis(50),
        ..SweepConfig::default()
    });

    let n = NotificationInstance::new(
        "ntf-slow",
        "bill-internet",
        "Internet bill",
        "Internet bill is due on 2024-03-12.",
        instant(2024, 3, 11, 8),
        date(2024, 3, 12),
    )
    .with_max_retries(1);
    NotificationStore::save(store.as_ref(), &n).await.unwrap();

    let stats = sweeper.run_tick().await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.retries_exhausted, 1);

    let failed = NotificationStore::load(store.as_ref(), "ntf-slow")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.state, NotificationState::Failed);
    assert!(
        failed
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("timed out")
    );
}
