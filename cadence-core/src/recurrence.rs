//! Recurrence definitions and next-occurrence calculation.
//!
//! The engine is a pure function over (definition, schedule state): it never
//! materializes a series, it only answers "what date comes next". All kinds
//! dispatch through one exhaustive match so a new variant cannot be added
//! without deciding its stepping rule.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::{self, WeekdayMask};
use crate::error::DefinitionError;
use crate::schedule::ScheduleState;

/// Bound on consecutive re-advances (skip hops and weekend collisions). A
/// year of daily skips fits; anything past this returns exhaustion.
const MAX_ADVANCE_STEPS: u32 = 366;

/// How often an obligation repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrenceKind {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "biweekly")]
    BiWeekly,
    #[serde(rename = "monthly")]
    Monthly,
    #[serde(rename = "quarterly")]
    Quarterly,
    #[serde(rename = "semiannually")]
    SemiAnnually,
    #[serde(rename = "annually")]
    Annually,
    #[serde(rename = "custom")]
    Custom,
}

impl RecurrenceKind {
    /// Stable lowercase name for display and import grammars.
    pub fn label(&self) -> &'static str {
        match self {
            RecurrenceKind::None => "none",
            RecurrenceKind::Daily => "daily",
            RecurrenceKind::Weekly => "weekly",
            RecurrenceKind::BiWeekly => "biweekly",
            RecurrenceKind::Monthly => "monthly",
            RecurrenceKind::Quarterly => "quarterly",
            RecurrenceKind::SemiAnnually => "semiannually",
            RecurrenceKind::Annually => "annually",
            RecurrenceKind::Custom => "custom",
        }
    }
}

/// When a recurrence stops producing occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndPolicy {
    #[serde(rename = "never")]
    Never,
    #[serde(rename = "on-date")]
    OnDate(NaiveDate),
    #[serde(rename = "after-occurrences")]
    AfterOccurrences(u32),
}

/// The immutable rule describing how occurrences repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceDefinition {
    pub kind: RecurrenceKind,
    /// Multiplier on the base unit (every 2 weeks, every 3 months).
    pub interval: u32,
    /// Active weekdays, read only when kind is Weekly.
    pub days_of_week: WeekdayMask,
    /// Positive = fixed day clamped to the month's length, negative = offset
    /// from month end (-1 is the last day). Read only when kind is Monthly.
    pub day_of_month: i8,
    /// First possible occurrence date.
    pub start_date: NaiveDate,
    pub end: EndPolicy,
    /// Shift Saturday occurrences to Friday and Sunday occurrences to Monday.
    pub adjust_for_weekends: bool,
}

impl RecurrenceDefinition {
    /// New definition with interval 1, no end, no weekend adjustment.
    ///
    /// Monthly definitions anchor `day_of_month` to the start date's day;
    /// override with [`with_day_of_month`](Self::with_day_of_month).
    pub fn new(kind: RecurrenceKind, start_date: NaiveDate) -> Self {
        let day_of_month = if kind == RecurrenceKind::Monthly {
            start_date.day() as i8
        } else {
            0
        };
        Self {
            kind,
            interval: 1,
            days_of_week: WeekdayMask::EMPTY,
            day_of_month,
            start_date,
            end: EndPolicy::Never,
            adjust_for_weekends: false,
        }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_weekdays(mut self, mask: WeekdayMask) -> Self {
        self.days_of_week = mask;
        self
    }

    pub fn with_day_of_month(mut self, day: i8) -> Self {
        self.day_of_month = day;
        self
    }

    pub fn with_end(mut self, end: EndPolicy) -> Self {
        self.end = end;
        self
    }

    pub fn with_weekend_adjustment(mut self) -> Self {
        self.adjust_for_weekends = true;
        self
    }

    /// Reject definitions that cannot produce a valid schedule. Computation
    /// assumes a validated definition; hosts must call this before storing
    /// one.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.interval == 0 {
            return Err(DefinitionError::ZeroInterval);
        }
        if !self.days_of_week.is_valid() {
            return Err(DefinitionError::InvalidWeekdayMask(self.days_of_week.0));
        }
        if self.kind == RecurrenceKind::Weekly && self.days_of_week.is_empty() {
            return Err(DefinitionError::EmptyWeekdayMask);
        }
        if self.kind == RecurrenceKind::Monthly
            && (self.day_of_month == 0 || !(-31..=31).contains(&self.day_of_month))
        {
            return Err(DefinitionError::DayOfMonthOutOfRange(self.day_of_month));
        }
        match self.end {
            EndPolicy::OnDate(end) if end <= self.start_date => {
                return Err(DefinitionError::EndBeforeStart {
                    start: self.start_date,
                    end,
                });
            }
            EndPolicy::AfterOccurrences(0) => return Err(DefinitionError::ZeroOccurrenceCap),
            _ => {}
        }
        Ok(())
    }
}

/// Next occurrence date given the schedule's progress, or `None` once the
/// end policy forecloses further occurrences.
///
/// Skipped dates are hopped over with the same stepping rule, weekend
/// adjustment is applied last, and no returned date ever lands after an
/// on-date end, on a skipped date, or at/before the previous occurrence.
pub fn next_occurrence(def: &RecurrenceDefinition, state: &ScheduleState) -> Option<NaiveDate> {
    if let EndPolicy::AfterOccurrences(max) = def.end {
        if state.occurrence_count >= max {
            return None;
        }
    }

    let mut candidate = match state.last_generated {
        Some(base) => step(def, base)?,
        None => first_occurrence(def)?,
    };

    for _ in 0..MAX_ADVANCE_STEPS {
        if state.skipped_dates.contains(&candidate) {
            candidate = step(def, candidate)?;
            continue;
        }
        if let EndPolicy::OnDate(end) = def.end {
            if candidate > end {
                return None;
            }
        }

        let resolved = if def.adjust_for_weekends {
            calendar::adjust_for_weekend(candidate)
        } else {
            candidate
        };

        // The Saturday->Friday shift can collide with the previous
        // occurrence or land back on a skipped date; advance and retry.
        let regressed = match state.last_generated {
            Some(base) => resolved <= base,
            None => resolved < def.start_date,
        };
        if regressed || state.skipped_dates.contains(&resolved) {
            candidate = step(def, candidate)?;
            continue;
        }
        // A Sunday->Monday shift must not escape an on-date end either.
        if let EndPolicy::OnDate(end) = def.end {
            if resolved > end {
                return None;
            }
        }
        return Some(resolved);
    }
    None
}

/// One raw step of the recurrence rule from `base`, before any
/// post-processing. `None` for kinds the generic engine does not step
/// (`None`, and `Custom` patterns arrive pre-resolved from the host).
fn step(def: &RecurrenceDefinition, base: NaiveDate) -> Option<NaiveDate> {
    let interval = def.interval.max(1) as i64;
    match def.kind {
        RecurrenceKind::None | RecurrenceKind::Custom => None,
        RecurrenceKind::Daily => Some(base + Duration::days(interval)),
        RecurrenceKind::Weekly => Some(next_weekly(def, base, interval)),
        RecurrenceKind::BiWeekly => Some(base + Duration::days(14 * interval)),
        RecurrenceKind::Monthly => Some(next_monthly(def, base, interval as i32)),
        RecurrenceKind::Quarterly => Some(calendar::add_months_clamped(base, 3 * interval as i32)),
        RecurrenceKind::SemiAnnually => {
            Some(calendar::add_months_clamped(base, 6 * interval as i32))
        }
        RecurrenceKind::Annually => Some(calendar::add_years_clamped(base, interval as i32)),
    }
}

/// The first occurrence of a fresh schedule is the start date itself;
/// weekly rules take the first active weekday on or after it.
fn first_occurrence(def: &RecurrenceDefinition) -> Option<NaiveDate> {
    match def.kind {
        RecurrenceKind::None | RecurrenceKind::Custom => None,
        RecurrenceKind::Weekly => Some(
            (0..=6)
                .map(|offset| def.start_date + Duration::days(offset))
                .find(|d| def.days_of_week.matches(*d))
                // Unmatched within a full week only happens for masks that
                // bypassed validation; fall back to the start date.
                .unwrap_or(def.start_date),
        ),
        _ => Some(def.start_date),
    }
}

fn next_weekly(def: &RecurrenceDefinition, base: NaiveDate, interval: i64) -> NaiveDate {
    for offset in 1..=7 {
        let candidate = base + Duration::days(offset);
        if def.days_of_week.matches(candidate) {
            return candidate;
        }
    }
    // No weekday matched in a full week (mask bypassed validation). Bounded
    // fallback instead of scanning forever.
    base + Duration::days(7 * interval)
}

fn next_monthly(def: &RecurrenceDefinition, base: NaiveDate, interval: i32) -> NaiveDate {
    let shifted = calendar::add_months_clamped(base, interval);
    let (year, month) = (shifted.year(), shifted.month());
    let day = if def.day_of_month > 0 {
        calendar::clamp_day_of_month(year, month, def.day_of_month as u32)
    } else if def.day_of_month < 0 {
        calendar::day_from_month_end(year, month, def.day_of_month as i32)
    } else {
        // Unanchored monthly (bypassed validation): keep the clamped shift.
        return shifted;
    };
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(shifted)
}
