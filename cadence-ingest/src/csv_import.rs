//! Import obligations from a CSV worksheet.
//!
//! Expected layout, header row first:
//! id,title,amount,account,frequency,start_date,day_of_month,weekdays,
//! end_date,max_occurrences,weekend_adjust,mode,reminder
//!
//! Dates are YYYY-MM-DD. `weekdays` is required for weekly rows and invalid
//! elsewhere; `day_of_month` is only valid for monthly rows. This is
//! authored input, not a bank export, so a malformed row fails the import
//! with its row number instead of being skipped.

use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::Path;

use anyhow::{Context, Result, bail};
use cadence_core::{
    EndPolicy, Obligation, RecurrenceDefinition, RecurrenceKind, ReminderTiming, SchedulingMode,
};
use chrono::NaiveDate;
use csv::StringRecord;

use crate::frequency::{parse_frequency, parse_weekdays};

const COL_ID: usize = 0;
const COL_TITLE: usize = 1;
const COL_AMOUNT: usize = 2;
const COL_ACCOUNT: usize = 3;
const COL_FREQUENCY: usize = 4;
const COL_START_DATE: usize = 5;
const COL_DAY_OF_MONTH: usize = 6;
const COL_WEEKDAYS: usize = 7;
const COL_END_DATE: usize = 8;
const COL_MAX_OCCURRENCES: usize = 9;
const COL_WEEKEND_ADJUST: usize = 10;
const COL_MODE: usize = 11;
const COL_REMINDER: usize = 12;

/// Import a CSV file of recurring obligations.
pub fn import_obligations_csv(path: impl AsRef<Path>) -> Result<Vec<Obligation>> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("opening {}", path.as_ref().display()))?;
    parse_obligations(file)
}

/// Parse obligations from any CSV reader. Rows are numbered from 1 at the
/// header for error messages.
pub fn parse_obligations(reader: impl io::Read) -> Result<Vec<Obligation>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(reader);

    let mut out = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut header_checked = false;
    let mut row = 0usize;

    for result in rdr.records() {
        let record = result?;
        row += 1;

        if !header_checked {
            if field(&record, COL_ID) != "id" {
                bail!("row {row}: expected a header row starting with \"id\"");
            }
            header_checked = true;
            continue;
        }

        let ob = parse_row(&record, row)?;
        if !seen_ids.insert(ob.id.clone()) {
            bail!("row {row}: duplicate id {:?}", ob.id);
        }
        out.push(ob);
    }

    Ok(out)
}

fn field<'a>(record: &'a StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or("").trim()
}

fn parse_row(record: &StringRecord, row: usize) -> Result<Obligation> {
    let id = field(record, COL_ID);
    if id.is_empty() {
        bail!("row {row}: missing id");
    }
    let title = field(record, COL_TITLE);
    if title.is_empty() {
        bail!("row {row}: missing title");
    }
    let account = field(record, COL_ACCOUNT);
    if account.is_empty() {
        bail!("row {row}: missing account");
    }
    let amount: f64 = field(record, COL_AMOUNT)
        .parse()
        .with_context(|| format!("row {row}: invalid amount {:?}", field(record, COL_AMOUNT)))?;

    let (kind, interval) = parse_frequency(field(record, COL_FREQUENCY))
        .with_context(|| format!("row {row}: frequency"))?;
    let start_date = parse_date(field(record, COL_START_DATE))
        .with_context(|| format!("row {row}: start_date"))?;

    let mut def = RecurrenceDefinition::new(kind, start_date).with_interval(interval);

    let day_of_month = field(record, COL_DAY_OF_MONTH);
    if !day_of_month.is_empty() {
        if kind != RecurrenceKind::Monthly {
            bail!("row {row}: day_of_month only applies to monthly frequencies");
        }
        let day: i8 = day_of_month
            .parse()
            .with_context(|| format!("row {row}: invalid day_of_month {day_of_month:?}"))?;
        def = def.with_day_of_month(day);
    }

    let weekdays = field(record, COL_WEEKDAYS);
    if kind == RecurrenceKind::Weekly {
        if weekdays.is_empty() {
            bail!("row {row}: weekly rows need a weekdays list");
        }
        let mask = parse_weekdays(weekdays).with_context(|| format!("row {row}: weekdays"))?;
        def = def.with_weekdays(mask);
    } else if !weekdays.is_empty() {
        bail!("row {row}: weekdays only apply to weekly frequencies");
    }

    let end_date = field(record, COL_END_DATE);
    let max_occurrences = field(record, COL_MAX_OCCURRENCES);
    match (end_date.is_empty(), max_occurrences.is_empty()) {
        (false, false) => {
            bail!("row {row}: end_date and max_occurrences are mutually exclusive")
        }
        (false, true) => {
            let end = parse_date(end_date).with_context(|| format!("row {row}: end_date"))?;
            def = def.with_end(EndPolicy::OnDate(end));
        }
        (true, false) => {
            let max: u32 = max_occurrences.parse().with_context(|| {
                format!("row {row}: invalid max_occurrences {max_occurrences:?}")
            })?;
            def = def.with_end(EndPolicy::AfterOccurrences(max));
        }
        (true, true) => {}
    }

    if parse_flag(field(record, COL_WEEKEND_ADJUST))
        .with_context(|| format!("row {row}: weekend_adjust"))?
    {
        def = def.with_weekend_adjustment();
    }

    let mode = parse_mode(field(record, COL_MODE)).with_context(|| format!("row {row}: mode"))?;
    let reminder = parse_reminder(field(record, COL_REMINDER))
        .with_context(|| format!("row {row}: reminder"))?;

    let ob = Obligation::new(id, title, amount, account, def)
        .with_context(|| format!("row {row}"))?
        .with_mode(mode)
        .with_reminder(reminder);
    Ok(ob)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date {s:?}"))
}

fn parse_flag(s: &str) -> Result<bool> {
    match s.to_lowercase().as_str() {
        "" | "false" | "no" | "0" => Ok(false),
        "true" | "yes" | "1" => Ok(true),
        other => bail!("invalid flag {other:?}"),
    }
}

/// Parse a scheduling-mode label; empty input means manual approval.
pub fn parse_mode(s: &str) -> Result<SchedulingMode> {
    match s.to_lowercase().as_str() {
        "" | "manual-approval" => Ok(SchedulingMode::ManualApproval),
        "auto-post" => Ok(SchedulingMode::AutoPost),
        "create-as-draft" => Ok(SchedulingMode::CreateAsDraft),
        other => bail!("unrecognized mode {other:?}"),
    }
}

/// Parse a reminder-timing label; empty input means three days before.
pub fn parse_reminder(s: &str) -> Result<ReminderTiming> {
    match s.to_lowercase().as_str() {
        "" | "three-days-before" => Ok(ReminderTiming::ThreeDaysBefore),
        "none" => Ok(ReminderTiming::None),
        "same-day" => Ok(ReminderTiming::SameDay),
        "one-day-before" => Ok(ReminderTiming::OneDayBefore),
        "one-week-before" => Ok(ReminderTiming::OneWeekBefore),
        "two-weeks-before" => Ok(ReminderTiming::TwoWeeksBefore),
        "one-month-before" => Ok(ReminderTiming::OneMonthBefore),
        other => bail!("unrecognized reminder {other:?}"),
    }
}
