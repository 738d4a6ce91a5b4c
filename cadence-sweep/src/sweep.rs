//! The periodic sweep: one tick catches up due occurrences, plans
//! reminders, and drives pending notifications through delivery.
//!
//! Ticks are re-entrant: planning is deduplicated by dedupe key, catch-up is
//! capped per obligation, and a failed materialization leaves the schedule
//! untouched for the next tick. Ticks over the same stores must not run
//! concurrently; hosts run one sweep at a time.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use cadence_core::{
    MaterializeAction, NotificationInstance, NotificationState, ReminderPolicy,
    plan_approval_request, plan_reminder, resolve_action,
};
use chrono::NaiveDate;

use crate::clock::Clock;
use crate::delivery::{Delivery, DeliveryOutcome};
use crate::error::SweepError;
use crate::materializer::{Materializer, TransactionRef};
use crate::store::{NotificationStore, ObligationStore};

/// Tunables for one sweep runtime.
#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    pub reminder_policy: ReminderPolicy,
    /// Upper bound on a single delivery attempt; expiry counts as a failure.
    pub delivery_timeout: StdDuration,
    /// Most occurrences materialized per obligation per tick, so one long
    /// dormant schedule cannot monopolize a tick.
    pub catch_up_limit: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            reminder_policy: ReminderPolicy::default(),
            delivery_timeout: StdDuration::from_secs(10),
            catch_up_limit: 30,
        }
    }
}

/// Counters for one tick. `summary()` is the log/CLI one-liner.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: u32,
    pub due_occurrences: u32,
    pub materialized: u32,
    pub approvals_requested: u32,
    pub reminders_planned: u32,
    pub snoozes_released: u32,
    pub escalated: u32,
    pub sent: u32,
    pub failed: u32,
    pub retries_exhausted: u32,
    pub errors: u32,
}

impl SweepStats {
    pub fn summary(&self) -> String {
        format!(
            "scanned {}: {} due, {} materialized, {} approvals, {} reminders, {} unsnoozed, {} escalated, {} sent, {} failed ({} exhausted), {} errors",
            self.scanned,
            self.due_occurrences,
            self.materialized,
            self.approvals_requested,
            self.reminders_planned,
            self.snoozes_released,
            self.escalated,
            self.sent,
            self.failed,
            self.retries_exhausted,
            self.errors
        )
    }
}

/// Drives obligations and notifications over injected collaborators.
pub struct Sweeper {
    clock: Arc<dyn Clock>,
    delivery: Arc<dyn Delivery>,
    materializer: Arc<dyn Materializer>,
    obligations: Arc<dyn ObligationStore>,
    notifications: Arc<dyn NotificationStore>,
    config: SweepConfig,
}

impl Sweeper {
    pub fn new(
        clock: Arc<dyn Clock>,
        delivery: Arc<dyn Delivery>,
        materializer: Arc<dyn Materializer>,
        obligations: Arc<dyn ObligationStore>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            clock,
            delivery,
            materializer,
            obligations,
            notifications,
            config: SweepConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SweepConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// One pass over every active obligation, then every stored
    /// notification. Items are independent, so a failure on one is counted
    /// and the pass moves on; only store failures abort the tick.
    pub async fn run_tick(&self) -> Result<SweepStats, SweepError> {
        let now = self.clock.now_utc();
        let today = now.date_naive();
        let mut stats = SweepStats::default();

        // Dedupe keys of everything ever planned, terminal included: a
        // dismissed reminder must not come back on the next tick.
        let mut planned_keys: HashSet<String> = self
            .notifications
            .list()
            .await?
            .into_iter()
            .map(|n| n.dedupe_key)
            .collect();

        for mut ob in self.obligations.list().await? {
            if !ob.active {
                continue;
            }
            stats.scanned += 1;
            let mut dirty = false;

            let mut caught_up = 0u32;
            while let Some(due) = ob.next_due() {
                if due > today {
                    break;
                }
                if caught_up >= self.config.catch_up_limit {
                    tracing::warn!(
                        subject = %ob.id,
                        limit = self.config.catch_up_limit,
                        "catch-up limit reached, deferring remainder to next tick"
                    );
                    break;
                }
                caught_up += 1;
                stats.due_occurrences += 1;

                let action = resolve_action(ob.mode);
                match action {
                    MaterializeAction::RequestApproval => {
                        let request =
                            plan_approval_request(&ob, due, now, &self.config.reminder_policy);
                        if planned_keys.insert(request.dedupe_key.clone()) {
                            self.notifications.save(&request).await?;
                            stats.approvals_requested += 1;
                            tracing::info!(subject = %ob.id, date = %due, "approval requested");
                        }
                        // Held until approve_occurrence; nothing advances.
                        break;
                    }
                    MaterializeAction::AutoPost | MaterializeAction::CreateDraft => {
                        match self.materializer.materialize(&ob.id, due, action).await {
                            Ok(txn) => {
                                ob.mark_generated(due);
                                dirty = true;
                                stats.materialized += 1;
                                tracing::info!(
                                    subject = %ob.id,
                                    date = %due,
                                    txn = %txn.id,
                                    "occurrence materialized"
                                );
                            }
                            Err(e) => {
                                // Schedule untouched; the next tick retries.
                                stats.errors += 1;
                                tracing::warn!(
                                    subject = %ob.id,
                                    date = %due,
                                    error = %e,
                                    "materialization failed"
                                );
                                break;
                            }
                        }
                    }
                }
            }

            if let Some(next) = ob.next_due() {
                if let Some(reminder) =
                    plan_reminder(&ob, next, now, &self.config.reminder_policy)
                {
                    if planned_keys.insert(reminder.dedupe_key.clone()) {
                        self.notifications.save(&reminder).await?;
                        stats.reminders_planned += 1;
                        tracing::debug!(
                            subject = %ob.id,
                            date = %next,
                            notification = %reminder.id,
                            "reminder planned"
                        );
                    }
                }
            }

            if dirty {
                self.obligations.save(&ob).await?;
            }
        }

        // Notification phase: re-arm retryable failures, release elapsed
        // snoozes, escalate what is still pending, then send what is due.
        for mut n in self.notifications.list().await? {
            let mut dirty = false;

            if n.is_retryable() && n.retry() {
                dirty = true;
                tracing::debug!(
                    notification = %n.id,
                    attempt = n.retry_count + 1,
                    "re-armed failed notification"
                );
            }
            if n.release_snooze(now) {
                stats.snoozes_released += 1;
                dirty = true;
            }
            if n.state == NotificationState::Pending && n.escalate_priority(now) {
                stats.escalated += 1;
                dirty = true;
            }

            if n.is_due(now) {
                let outcome = self.attempt_delivery(&n).await;
                if outcome.delivered {
                    match n.send(now) {
                        Ok(()) => stats.sent += 1,
                        Err(e) => {
                            stats.errors += 1;
                            tracing::error!(notification = %n.id, error = %e, "send transition rejected");
                        }
                    }
                } else {
                    let reason = outcome
                        .error
                        .unwrap_or_else(|| "delivery failed".to_string());
                    match n.fail(reason.clone()) {
                        Ok(exhausted) => {
                            stats.failed += 1;
                            if exhausted {
                                stats.retries_exhausted += 1;
                                tracing::warn!(
                                    notification = %n.id,
                                    error = %reason,
                                    "retry budget exhausted"
                                );
                            } else {
                                tracing::warn!(notification = %n.id, error = %reason, "delivery failed");
                            }
                        }
                        Err(e) => {
                            stats.errors += 1;
                            tracing::error!(notification = %n.id, error = %e, "fail transition rejected");
                        }
                    }
                }
                dirty = true;
            }

            if dirty {
                self.notifications.save(&n).await?;
            }
        }

        tracing::info!("sweep tick: {}", stats.summary());
        Ok(stats)
    }

    /// External approval signal for a held occurrence: materialize it, mark
    /// the schedule, and dismiss the matching approval request.
    pub async fn approve_occurrence(
        &self,
        subject_id: &str,
        date: NaiveDate,
    ) -> Result<TransactionRef, SweepError> {
        let mut ob = self
            .obligations
            .load(subject_id)
            .await?
            .ok_or_else(|| SweepError::UnknownObligation(subject_id.to_string()))?;

        let held = resolve_action(ob.mode) == MaterializeAction::RequestApproval
            && ob.active
            && ob.next_due() == Some(date);
        if !held {
            return Err(SweepError::NotHeld {
                subject: subject_id.to_string(),
                date,
            });
        }

        let txn = self
            .materializer
            .materialize(subject_id, date, MaterializeAction::RequestApproval)
            .await?;
        ob.mark_generated(date);
        self.obligations.save(&ob).await?;

        let now = self.clock.now_utc();
        let approval_key = format!("{subject_id}:{date}:approval");
        for mut n in self.notifications.list().await? {
            if n.dedupe_key == approval_key && !n.is_terminal() && n.dismiss(now).is_ok() {
                self.notifications.save(&n).await?;
            }
        }

        tracing::info!(subject = %subject_id, date = %date, txn = %txn.id, "held occurrence approved");
        Ok(txn)
    }

    /// Cancel a recurring item: deactivate it and dismiss its Pending and
    /// Snoozed notifications. Returns how many were dismissed.
    pub async fn cancel_obligation(&self, subject_id: &str) -> Result<u32, SweepError> {
        let mut ob = self
            .obligations
            .load(subject_id)
            .await?
            .ok_or_else(|| SweepError::UnknownObligation(subject_id.to_string()))?;
        ob.cancel();
        self.obligations.save(&ob).await?;

        let now = self.clock.now_utc();
        let mut dismissed = 0u32;
        for mut n in self.notifications.list().await? {
            if n.subject_id != subject_id {
                continue;
            }
            let open = matches!(
                n.state,
                NotificationState::Pending | NotificationState::Snoozed
            );
            if open && n.dismiss(now).is_ok() {
                self.notifications.save(&n).await?;
                dismissed += 1;
            }
        }

        tracing::info!(subject = %subject_id, dismissed, "obligation cancelled");
        Ok(dismissed)
    }

    /// Host loop: a tick every `period` until the task is dropped or a
    /// store error surfaces. Ticks never overlap.
    pub async fn run_every(&self, period: StdDuration) -> Result<(), SweepError> {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_tick().await?;
        }
    }

    async fn attempt_delivery(&self, instance: &NotificationInstance) -> DeliveryOutcome {
        match tokio::time::timeout(
            self.config.delivery_timeout,
            self.delivery.deliver(instance),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => DeliveryOutcome::failure(format!(
                "delivery timed out after {:?}",
                self.config.delivery_timeout
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_summary_is_one_line() {
        let stats = SweepStats {
            scanned: 3,
            due_occurrences: 2,
            materialized: 1,
            approvals_requested: 1,
            reminders_planned: 2,
            sent: 1,
            ..SweepStats::default()
        };
        let line = stats.summary();
        assert!(line.contains("scanned 3"));
        assert!(line.contains("1 materialized"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn default_config_bounds_catch_up() {
        let config = SweepConfig::default();
        assert!(config.catch_up_limit > 0);
        assert!(config.delivery_timeout > StdDuration::from_secs(0));
    }
}
