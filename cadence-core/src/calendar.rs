//! Calendar arithmetic for occurrence dates.
//!
//! Everything in here is pure date math on `NaiveDate`. Timezone handling is
//! confined to [`fire_instant_utc`], which pins a local wall-clock time to a
//! UTC instant for notification scheduling.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveTime, TimeZone, Utc,
    Weekday,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Number of days in the given month, accounting for leap years.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        _ => 28,
    }
}

/// Gregorian leap-year rule.
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Clamp a nominal day-of-month into the month's real range.
///
/// A definition anchored on the 31st lands on Feb 28 (or 29 in a leap year)
/// rather than overflowing into March.
pub fn clamp_day_of_month(year: i32, month: u32, day: u32) -> u32 {
    day.min(days_in_month(year, month))
}

/// Resolve a day counted backwards from the end of the month.
///
/// `offset` is negative: `-1` is the last day, `-2` the second-to-last, and
/// so on. Offsets that underflow the month clamp to the 1st.
pub fn day_from_month_end(year: i32, month: u32, offset: i32) -> u32 {
    let dim = days_in_month(year, month) as i32;
    (dim + offset + 1).clamp(1, dim) as u32
}

/// Shift a weekend date onto the nearest business day.
///
/// Saturday moves back to Friday, Sunday forward to Monday, weekdays are
/// untouched. Idempotent.
pub fn adjust_for_weekend(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// Add a (possibly negative) number of months, clamping the day to the
/// target month's length.
pub fn add_months_clamped(date: NaiveDate, months: i32) -> NaiveDate {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}

/// Add years with the same clamping rule (Feb 29 anchors land on Feb 28 in
/// common years).
pub fn add_years_clamped(date: NaiveDate, years: i32) -> NaiveDate {
    add_months_clamped(date, years.saturating_mul(12))
}

/// Pin a local wall-clock time on `date` to a UTC instant.
///
/// DST transitions make some local times ambiguous or nonexistent: for
/// ambiguous times the earlier instant wins, and times inside a
/// spring-forward gap fall back to reading the wall time as UTC.
pub fn fire_instant_utc(date: NaiveDate, tz: Tz, hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0).unwrap_or(NaiveTime::MIN);
    let local = date.and_time(time);
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        LocalResult::None => DateTime::from_naive_utc_and_offset(local, Utc),
    }
}

/// Bitmask over the seven weekdays, Monday in bit 0 through Sunday in bit 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekdayMask(pub u8);

impl WeekdayMask {
    pub const EMPTY: WeekdayMask = WeekdayMask(0);
    /// Monday through Friday.
    pub const BUSINESS_DAYS: WeekdayMask = WeekdayMask(0b0001_1111);

    const ALL_BITS: u8 = 0b0111_1111;

    pub fn from_weekdays(days: &[Weekday]) -> Self {
        days.iter().copied().fold(Self::EMPTY, Self::with)
    }

    /// Returns a copy with `day` set.
    pub fn with(self, day: Weekday) -> Self {
        WeekdayMask(self.0 | 1 << day.num_days_from_monday())
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    /// True when `date` falls on one of the selected weekdays.
    pub fn matches(&self, date: NaiveDate) -> bool {
        self.contains(date.weekday())
    }

    pub fn is_empty(&self) -> bool {
        self.0 & Self::ALL_BITS == 0
    }

    /// True when no bits outside the seven weekday positions are set.
    pub fn is_valid(&self) -> bool {
        self.0 & !Self::ALL_BITS == 0
    }

    pub fn weekdays(&self) -> Vec<Weekday> {
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .filter(|d| self.contains(*d))
        .collect()
    }
}
