use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use cadence_core::{
    EndPolicy, NotificationState, Obligation, RecurrenceDefinition, RecurrenceKind,
};
use cadence_ingest::{
    import_obligations_csv, parse_frequency, parse_mode, parse_reminder, parse_weekdays,
};
use cadence_sweep::{NotificationStore, ObligationStore};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

mod config;
mod instant;
mod notifications_cmd;
mod state;
mod sweep_cmd;

use notifications_cmd::NotificationsCommand;
use state::JsonlStore;

#[derive(Parser, Debug)]
#[command(
    name = "cadence",
    version,
    about = "Recurring obligation scheduler and reminder engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default ~/.cadence/config.toml
    Init,

    /// Add a recurring obligation
    Add {
        /// Stable identifier, e.g. bill-rent
        id: String,

        #[arg(long)]
        title: String,

        /// Negative for expenses, positive for income
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,

        /// Account the transaction posts against
        #[arg(long)]
        account: String,

        /// Frequency phrase, e.g. "monthly" or "every 2 weeks"
        #[arg(long)]
        every: String,

        /// First possible occurrence (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Day of month for monthly rules; negative counts from month end
        #[arg(long, allow_negative_numbers = true)]
        day_of_month: Option<i8>,

        /// Weekday list for weekly rules, e.g. "mon,thu"
        #[arg(long)]
        weekdays: Option<String>,

        /// Last allowed occurrence date
        #[arg(long, conflicts_with = "max_occurrences")]
        until: Option<NaiveDate>,

        /// Stop after this many occurrences
        #[arg(long)]
        max_occurrences: Option<u32>,

        /// Shift Saturday occurrences to Friday and Sunday to Monday
        #[arg(long, default_value_t = false)]
        weekend_adjust: bool,

        /// auto-post, manual-approval, or create-as-draft
        #[arg(long, default_value = "manual-approval")]
        mode: String,

        /// none, same-day, one-day-before, three-days-before,
        /// one-week-before, two-weeks-before, or one-month-before
        #[arg(long, default_value = "three-days-before")]
        reminder: String,
    },

    /// Import obligations from a CSV worksheet
    Import { csv: PathBuf },

    /// List obligations and their next due dates
    List,

    /// Exclude one occurrence date from a schedule
    Skip { id: String, date: NaiveDate },

    /// Re-admit a previously skipped date
    Unskip { id: String, date: NaiveDate },

    /// Cancel an obligation and dismiss its open notifications
    Cancel { id: String },

    /// Approve a held occurrence so it posts
    Approve { id: String, date: NaiveDate },

    /// Run one sweep tick over all obligations and notifications
    Sweep {
        /// Sweep as if it were this instant (RFC 3339 or "YYYY-MM-DD HH:MM")
        #[arg(long)]
        at: Option<String>,

        /// Report what would happen without persisting anything
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Keep sweeping on the configured interval
        #[arg(long, default_value_t = false)]
        watch: bool,
    },

    /// Counts for obligations, notifications, and recorded transactions
    Status,

    /// Inspect and drive notifications
    Notifications {
        #[command(subcommand)]
        command: NotificationsCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config()?;

    match cli.command {
        Command::Init => {
            config::init_config()?;
        }

        Command::Add {
            id,
            title,
            amount,
            account,
            every,
            start,
            day_of_month,
            weekdays,
            until,
            max_occurrences,
            weekend_adjust,
            mode,
            reminder,
        } => {
            let store = open_store()?;
            let (kind, interval) = parse_frequency(&every)?;
            let mut def = RecurrenceDefinition::new(kind, start).with_interval(interval);

            if let Some(day) = day_of_month {
                if kind != RecurrenceKind::Monthly {
                    bail!("--day-of-month only applies to monthly frequencies");
                }
                def = def.with_day_of_month(day);
            }
            match &weekdays {
                Some(days) => {
                    if kind != RecurrenceKind::Weekly {
                        bail!("--weekdays only applies to weekly frequencies");
                    }
                    def = def.with_weekdays(parse_weekdays(days)?);
                }
                None => {
                    if kind == RecurrenceKind::Weekly {
                        bail!("weekly obligations need --weekdays (e.g. \"mon,thu\")");
                    }
                }
            }
            if let Some(end) = until {
                def = def.with_end(EndPolicy::OnDate(end));
            }
            if let Some(max) = max_occurrences {
                def = def.with_end(EndPolicy::AfterOccurrences(max));
            }
            if weekend_adjust {
                def = def.with_weekend_adjustment();
            }

            if ObligationStore::load(store.as_ref(), &id).await?.is_some() {
                bail!("obligation {id:?} already exists");
            }
            let ob = Obligation::new(id, title, amount, account, def)?
                .with_mode(parse_mode(&mode)?)
                .with_reminder(parse_reminder(&reminder)?);
            ObligationStore::save(store.as_ref(), &ob).await?;
            match ob.next_due() {
                Some(due) => println!("Added {}. First due {due}.", ob.id),
                None => println!("Added {} (no upcoming occurrences).", ob.id),
            }
        }

        Command::Import { csv } => {
            let store = open_store()?;
            let obs = import_obligations_csv(&csv)
                .with_context(|| format!("importing {}", csv.display()))?;
            let mut added = 0usize;
            let mut skipped = 0usize;
            for ob in obs {
                if ObligationStore::load(store.as_ref(), &ob.id)
                    .await?
                    .is_some()
                {
                    skipped += 1;
                    continue;
                }
                ObligationStore::save(store.as_ref(), &ob).await?;
                added += 1;
            }
            println!(
                "Imported {added} obligations from {} ({skipped} already present).",
                csv.display()
            );
        }

        Command::List => {
            let store = open_store()?;
            let obs = ObligationStore::list(store.as_ref()).await?;
            if obs.is_empty() {
                println!("No obligations yet. Try: cadence add --help");
                return Ok(());
            }
            for ob in &obs {
                let due = match ob.next_due() {
                    Some(d) => format!("next due {d}"),
                    None => "exhausted".to_string(),
                };
                let flag = if ob.active { "" } else { " [cancelled]" };
                println!(
                    "{} | {} | {} | {} | {} | {}{}",
                    ob.id,
                    ob.title,
                    format_amount(ob.amount),
                    ob.account,
                    ob.mode.label(),
                    due,
                    flag
                );
            }
        }

        Command::Skip { id, date } => {
            let store = open_store()?;
            let mut ob = load_obligation(store.as_ref(), &id).await?;
            if !ob.skip(date) {
                println!("{date} is already skipped for {id}.");
                return Ok(());
            }
            ObligationStore::save(store.as_ref(), &ob).await?;
            match ob.next_due() {
                Some(due) => println!("Skipped {date} for {id}. Next due {due}."),
                None => println!("Skipped {date} for {id}. No further occurrences."),
            }
        }

        Command::Unskip { id, date } => {
            let store = open_store()?;
            let mut ob = load_obligation(store.as_ref(), &id).await?;
            if !ob.unskip(date) {
                println!("{date} was not skipped for {id}.");
                return Ok(());
            }
            ObligationStore::save(store.as_ref(), &ob).await?;
            match ob.next_due() {
                Some(due) => println!("Unskipped {date} for {id}. Next due {due}."),
                None => println!("Unskipped {date} for {id}. No further occurrences."),
            }
        }

        Command::Cancel { id } => {
            let (sweeper, _store) = sweep_cmd::build_sweeper(&cfg)?;
            let dismissed = sweeper.cancel_obligation(&id).await?;
            println!("Cancelled {id}. Dismissed {dismissed} open notifications.");
        }

        Command::Approve { id, date } => {
            let (sweeper, _store) = sweep_cmd::build_sweeper(&cfg)?;
            let txn = sweeper.approve_occurrence(&id, date).await?;
            println!(
                "Approved {id} for {date}: recorded {} ({:?}).",
                txn.id, txn.status
            );
        }

        Command::Sweep { at, dry_run, watch } => {
            sweep_cmd::run(&cfg, at, dry_run, watch).await?;
        }

        Command::Status => {
            let store = open_store()?;
            let obs = ObligationStore::list(store.as_ref()).await?;
            let active = obs.iter().filter(|o| o.active).count();
            println!("Obligations: {} total, {} active", obs.len(), active);

            let ns = NotificationStore::list(store.as_ref()).await?;
            let count = |s: NotificationState| ns.iter().filter(|n| n.state == s).count();
            println!(
                "Notifications: {} total, {} pending, {} sent, {} read, {} snoozed, {} failed, {} dismissed",
                ns.len(),
                count(NotificationState::Pending),
                count(NotificationState::Sent),
                count(NotificationState::Read),
                count(NotificationState::Snoozed),
                count(NotificationState::Failed),
                count(NotificationState::Dismissed)
            );

            let txns = state::read_transactions(&state::ensure_cadence_home()?)?;
            println!("Transactions recorded: {}", txns.len());

            let mut upcoming: Vec<(NaiveDate, String)> = obs
                .iter()
                .filter(|o| o.is_live())
                .filter_map(|o| o.next_due().map(|d| (d, o.id.clone())))
                .collect();
            upcoming.sort();
            if !upcoming.is_empty() {
                let line = upcoming
                    .iter()
                    .take(5)
                    .map(|(d, id)| format!("{id} on {d}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("Upcoming: {line}");
            }
        }

        Command::Notifications { command } => {
            let store = open_store()?;
            notifications_cmd::run(command, store.as_ref(), &cfg).await?;
        }
    }

    Ok(())
}

fn open_store() -> Result<Arc<JsonlStore>> {
    Ok(Arc::new(JsonlStore::open(&state::ensure_cadence_home()?)?))
}

async fn load_obligation(store: &JsonlStore, id: &str) -> Result<Obligation> {
    ObligationStore::load(store, id)
        .await?
        .ok_or_else(|| anyhow!("no obligation with id {id:?}"))
}

fn format_amount(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", amount.abs())
    } else {
        format!("+${:.2}", amount)
    }
}
