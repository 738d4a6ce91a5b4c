//! The `cadence sweep` command and the sweeper wiring shared with the
//! approve/cancel commands.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use cadence_core::NotificationInstance;
use cadence_sweep::{
    Clock, ConsoleDelivery, Delivery, DeliveryOutcome, FixedClock, MemoryLedger, MemoryStore,
    NotificationStore, ObligationStore, Sweeper, SystemClock, WebhookDelivery,
};

use crate::config::Config;
use crate::instant::parse_instant;
use crate::state::{JsonlLedger, JsonlStore, ensure_cadence_home};

/// Prints what a real sweep would send. Used with in-memory copies of the
/// stores so a dry run leaves no trace on disk.
struct DryRunDelivery;

#[async_trait]
impl Delivery for DryRunDelivery {
    async fn deliver(&self, instance: &NotificationInstance) -> DeliveryOutcome {
        println!(
            "[DRY RUN] would send [{}] {}",
            instance.priority.label(),
            instance.title
        );
        DeliveryOutcome::success()
    }

    fn channel_name(&self) -> &str {
        "dry-run"
    }
}

pub fn build_delivery(cfg: &Config) -> Result<Arc<dyn Delivery>> {
    match cfg.sweep.channel.as_str() {
        "console" => Ok(Arc::new(ConsoleDelivery)),
        "webhook" => {
            let url = cfg
                .sweep
                .webhook_url
                .as_deref()
                .context("sweep.channel is \"webhook\" but sweep.webhook_url is not set")?;
            Ok(Arc::new(WebhookDelivery::new(url)))
        }
        other => bail!("unsupported delivery channel {other:?} (want console or webhook)"),
    }
}

/// Sweeper over the on-disk stores with the wall clock. Approve and cancel
/// go through this too.
pub fn build_sweeper(cfg: &Config) -> Result<(Sweeper, Arc<JsonlStore>)> {
    let home = ensure_cadence_home()?;
    let store = Arc::new(JsonlStore::open(&home)?);
    let sweeper = Sweeper::new(
        Arc::new(SystemClock),
        build_delivery(cfg)?,
        Arc::new(JsonlLedger::open(&home)),
        store.clone(),
        store.clone(),
    )
    .with_config(cfg.sweep_config()?);
    Ok((sweeper, store))
}

pub async fn run(cfg: &Config, at: Option<String>, dry_run: bool, watch: bool) -> Result<()> {
    if watch && at.is_some() {
        bail!("--watch and --at are mutually exclusive");
    }

    let tz = cfg.timezone()?;
    let clock: Arc<dyn Clock> = match &at {
        Some(s) => Arc::new(FixedClock::at(parse_instant(s, tz)?)),
        None => Arc::new(SystemClock),
    };

    let home = ensure_cadence_home()?;
    let store = Arc::new(JsonlStore::open(&home)?);

    if dry_run {
        // Copy state into memory so nothing persists.
        let memory = Arc::new(MemoryStore::with_obligations(
            ObligationStore::list(store.as_ref()).await?,
        ));
        for n in NotificationStore::list(store.as_ref()).await? {
            NotificationStore::save(memory.as_ref(), &n).await?;
        }
        let sweeper = Sweeper::new(
            clock,
            Arc::new(DryRunDelivery),
            Arc::new(MemoryLedger::new()),
            memory.clone(),
            memory.clone(),
        )
        .with_config(cfg.sweep_config()?);
        let stats = sweeper.run_tick().await?;
        println!("[DRY RUN] {}", stats.summary());
        return Ok(());
    }

    let sweeper = Sweeper::new(
        clock,
        build_delivery(cfg)?,
        Arc::new(JsonlLedger::open(&home)),
        store.clone(),
        store.clone(),
    )
    .with_config(cfg.sweep_config()?);

    if watch {
        let period = StdDuration::from_secs(cfg.sweep.interval_minutes.max(1) * 60);
        println!(
            "Sweeping every {} minutes. Ctrl-C to stop.",
            cfg.sweep.interval_minutes.max(1)
        );
        sweeper.run_every(period).await?;
        return Ok(());
    }

    let stats = sweeper.run_tick().await?;
    println!("Sweep complete. {}", stats.summary());
    Ok(())
}
