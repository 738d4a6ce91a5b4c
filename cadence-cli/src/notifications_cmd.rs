//! The `cadence notifications` subcommands: inspect and drive individual
//! notification lifecycles.

use anyhow::{Result, bail};
use cadence_core::{NotificationInstance, NotificationState};
use cadence_sweep::NotificationStore;
use chrono::{Duration, Utc};
use clap::Subcommand;

use crate::config::Config;
use crate::instant::parse_instant;

#[derive(Subcommand, Debug)]
pub enum NotificationsCommand {
    /// List notifications, soonest scheduled first
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Include dismissed notifications
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Mark a sent notification as read
    Read { id: String },

    /// Dismiss a notification (terminal)
    Dismiss { id: String },

    /// Defer a sent notification
    Snooze {
        id: String,

        /// Hours to defer by
        #[arg(long, default_value_t = 4)]
        hours: i64,
    },

    /// Move a notification's fire instant (RFC 3339 or "YYYY-MM-DD HH:MM")
    Reschedule { id: String, at: String },
}

pub async fn run(
    cmd: NotificationsCommand,
    store: &dyn NotificationStore,
    cfg: &Config,
) -> Result<()> {
    match cmd {
        NotificationsCommand::List { limit, all } => list(store, limit, all).await,
        NotificationsCommand::Read { id } => mark_read(store, &id).await,
        NotificationsCommand::Dismiss { id } => dismiss(store, &id).await,
        NotificationsCommand::Snooze { id, hours } => snooze(store, &id, hours).await,
        NotificationsCommand::Reschedule { id, at } => reschedule(store, cfg, &id, &at).await,
    }
}

async fn load(store: &dyn NotificationStore, id: &str) -> Result<NotificationInstance> {
    match store.load(id).await? {
        Some(n) => Ok(n),
        None => bail!("no notification with id {id:?}"),
    }
}

async fn list(store: &dyn NotificationStore, limit: usize, all: bool) -> Result<()> {
    let mut rows = store.list().await?;
    if !all {
        rows.retain(|n| n.state != NotificationState::Dismissed);
    }
    if rows.is_empty() {
        println!("No notifications.");
        return Ok(());
    }
    rows.sort_by_key(|n| n.scheduled_at);

    for (i, n) in rows.iter().take(limit).enumerate() {
        let mut extra = String::new();
        if n.state == NotificationState::Failed {
            extra = format!(
                " ({}/{} retries: {})",
                n.retry_count,
                n.max_retries,
                n.error_message.as_deref().unwrap_or("unknown error")
            );
        } else if let Some(until) = n.snooze_until {
            extra = format!(" (until {})", until.to_rfc3339());
        }
        println!(
            "{}. [{}] {:?} {} at {} | {}{}",
            i + 1,
            n.priority.label(),
            n.state,
            n.title,
            n.scheduled_at.to_rfc3339(),
            n.id,
            extra
        );
    }
    Ok(())
}

async fn mark_read(store: &dyn NotificationStore, id: &str) -> Result<()> {
    let mut n = load(store, id).await?;
    n.mark_read(Utc::now())?;
    store.save(&n).await?;
    println!("Marked {id} read.");
    Ok(())
}

async fn dismiss(store: &dyn NotificationStore, id: &str) -> Result<()> {
    let mut n = load(store, id).await?;
    n.dismiss(Utc::now())?;
    store.save(&n).await?;
    println!("Dismissed {id}.");
    Ok(())
}

async fn snooze(store: &dyn NotificationStore, id: &str, hours: i64) -> Result<()> {
    if hours <= 0 {
        bail!("snooze hours must be positive");
    }
    let mut n = load(store, id).await?;
    let now = Utc::now();
    if n.snooze(Duration::hours(hours), now)? {
        store.save(&n).await?;
        let until = n.snooze_until.unwrap_or(now);
        println!(
            "Snoozed {id} until {} ({} of {} snoozes used).",
            until.to_rfc3339(),
            n.snooze_count,
            n.max_snooze_count
        );
    } else {
        println!("Snooze budget exhausted for {id}; it stays sent.");
    }
    Ok(())
}

async fn reschedule(
    store: &dyn NotificationStore,
    cfg: &Config,
    id: &str,
    at: &str,
) -> Result<()> {
    let instant = parse_instant(at, cfg.timezone()?)?;
    let mut n = load(store, id).await?;
    n.reschedule(instant, Utc::now())?;
    store.save(&n).await?;
    println!("Rescheduled {id} to {}.", instant.to_rfc3339());
    Ok(())
}
