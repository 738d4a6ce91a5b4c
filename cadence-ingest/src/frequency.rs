//! Parse human frequency phrases and weekday lists.
//!
//! Accepted phrases: `daily`, `weekly`, `biweekly` (or `fortnightly`),
//! `monthly`, `quarterly`, `semiannually`, `annually` (or `yearly`), and the
//! multiplier form `every N days|weeks|months|quarters|years`. `every 2
//! weeks` is normalized to biweekly, which anchors to the start date and
//! needs no weekday list; any other week multiple stays weekly and requires
//! one.

use anyhow::{Result, bail};
use cadence_core::{RecurrenceKind, WeekdayMask};
use chrono::Weekday;
use regex::Regex;

/// Parse a frequency phrase into a recurrence kind and interval.
pub fn parse_frequency(input: &str) -> Result<(RecurrenceKind, u32)> {
    let phrase = input.trim().to_lowercase();

    match phrase.as_str() {
        "daily" | "every day" => return Ok((RecurrenceKind::Daily, 1)),
        "weekly" | "every week" => return Ok((RecurrenceKind::Weekly, 1)),
        "biweekly" | "bi-weekly" | "fortnightly" => return Ok((RecurrenceKind::BiWeekly, 1)),
        "monthly" | "every month" => return Ok((RecurrenceKind::Monthly, 1)),
        "quarterly" | "every quarter" => return Ok((RecurrenceKind::Quarterly, 1)),
        "semiannually" | "semi-annually" => return Ok((RecurrenceKind::SemiAnnually, 1)),
        "annually" | "yearly" | "every year" => return Ok((RecurrenceKind::Annually, 1)),
        _ => {}
    }

    let every_re = Regex::new(r"^every\s+(?P<n>\d+)\s+(?P<unit>day|week|month|quarter|year)s?$")?;
    let Some(caps) = every_re.captures(&phrase) else {
        bail!("unrecognized frequency: {input:?}");
    };
    let n: u32 = caps["n"].parse()?;
    if n == 0 {
        bail!("frequency multiplier must be at least 1: {input:?}");
    }

    let parsed = match &caps["unit"] {
        "day" => (RecurrenceKind::Daily, n),
        "week" if n == 2 => (RecurrenceKind::BiWeekly, 1),
        "week" => (RecurrenceKind::Weekly, n),
        "month" => (RecurrenceKind::Monthly, n),
        "quarter" => (RecurrenceKind::Quarterly, n),
        "year" => (RecurrenceKind::Annually, n),
        other => bail!("unrecognized frequency unit: {other:?}"),
    };
    Ok(parsed)
}

/// Parse a comma-separated weekday list (`mon,thu` or full names) into a
/// mask. Three-letter prefixes are enough.
pub fn parse_weekdays(input: &str) -> Result<WeekdayMask> {
    let mut mask = WeekdayMask::EMPTY;
    for part in input.split(',') {
        let name = part.trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        let day = match name.get(..3) {
            Some("mon") => Weekday::Mon,
            Some("tue") => Weekday::Tue,
            Some("wed") => Weekday::Wed,
            Some("thu") => Weekday::Thu,
            Some("fri") => Weekday::Fri,
            Some("sat") => Weekday::Sat,
            Some("sun") => Weekday::Sun,
            _ => bail!("unrecognized weekday: {part:?}"),
        };
        mask = mask.with(day);
    }
    if mask.is_empty() {
        bail!("weekday list is empty: {input:?}");
    }
    Ok(mask)
}
