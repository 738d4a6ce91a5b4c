//! Parse user-supplied instants: RFC 3339, or a local date-time in the
//! configured timezone.

use anyhow::{Result, bail};
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Accepts `2024-03-12T09:00:00Z` / `2024-03-12T09:00:00-05:00`,
/// `2024-03-12 09:00` (local to `tz`), or a bare `2024-03-12` (local
/// midnight).
pub fn parse_instant(input: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let s = input.trim();

    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }

    let local = if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        t
    } else if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        match d.and_hms_opt(0, 0, 0) {
            Some(t) => t,
            None => bail!("invalid instant: {input:?}"),
        }
    } else {
        bail!("invalid instant {input:?} (want RFC 3339, \"YYYY-MM-DD HH:MM\", or YYYY-MM-DD)");
    };

    match tz.from_local_datetime(&local) {
        LocalResult::Single(t) => Ok(t.with_timezone(&Utc)),
        // DST fold: take the earlier reading.
        LocalResult::Ambiguous(earlier, _) => Ok(earlier.with_timezone(&Utc)),
        LocalResult::None => bail!("{input:?} does not exist in {tz} (DST gap)"),
    }
}
