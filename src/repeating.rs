//! Infinite periodic patterns such as "every Tuesday" or "every January".
//!
//! A [`Repeating`] names a `unit` and the `range` that contains it, plus an
//! optional index of the unit within the range. Each occurrence is exactly
//! one `unit` wide. Without an index every `unit` is an occurrence.
//!
//! Index conventions per containment:
//! * second of minute, minute of hour: 0..=59
//! * hour of day: 0..=23
//! * day of week: 0..=6, Monday is 0
//! * day of month: 1..=31, months without the day have no occurrence
//! * day of year: 1..=366, non-leap years have no day 366
//! * month of quarter: 1..=3, month of year: 1..=12, quarter of year: 1..=4
//! * year of decade: 0..=9, year of century: 0..=99, decade of century: 0..=9

use chrono::{Month, NaiveDateTime, Weekday};
use serde::Serialize;

use std::fmt;

use crate::calendar::Granularity;
use crate::error::{Result, TemporaError};
use crate::interval::Interval;

// sparse patterns (day 366 of the year) may skip several range periods
const MAX_SCAN: i64 = 16;

fn index_bounds(unit: Granularity, range: Granularity) -> Option<(i64, i64)> {
    use Granularity::*;
    match (unit, range) {
        (Second, Minute) | (Minute, Hour) => Some((0, 59)),
        (Hour, Day) => Some((0, 23)),
        (Day, Week) => Some((0, 6)),
        (Day, Month) => Some((1, 31)),
        (Day, Year) => Some((1, 366)),
        (Month, Quarter) => Some((1, 3)),
        (Month, Year) => Some((1, 12)),
        (Quarter, Year) => Some((1, 4)),
        (Year, Decade) | (Decade, Century) => Some((0, 9)),
        (Year, Century) => Some((0, 99)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Repeating {
    unit: Granularity,
    range: Granularity,
    value: Option<i64>,
}

impl Repeating {
    pub fn new(unit: Granularity, range: Granularity, value: Option<i64>) -> Result<Repeating> {
        if !range.contains(unit) {
            return Err(TemporaError::invalid_operator(
                "Repeating",
                format!("a {range} does not contain {unit}s"),
            ));
        }
        if let Some(v) = value {
            let (lo, hi) = index_bounds(unit, range).ok_or_else(|| {
                TemporaError::invalid_operator("Repeating", format!("{unit}s cannot be indexed within a {range}"))
            })?;
            if v < lo || v > hi {
                return Err(TemporaError::InvalidDate(format!("{v} is not a valid {unit} of the {range}")));
            }
        }
        Ok(Repeating { unit, range, value })
    }
    /// Every `unit`, e.g. "every day", ranging over the next coarser unit.
    /// Centuries have no coarser unit to range over.
    pub fn every(unit: Granularity) -> Result<Repeating> {
        let range = unit
            .parent()
            .ok_or_else(|| TemporaError::invalid_operator("Repeating", format!("nothing contains {unit}s")))?;
        Repeating::new(unit, range, None)
    }
    pub fn weekday(day: Weekday) -> Repeating {
        Repeating {
            unit: Granularity::Day,
            range: Granularity::Week,
            value: Some(i64::from(day.num_days_from_monday())),
        }
    }
    pub fn month_of_year(month: u32) -> Result<Repeating> {
        Repeating::new(Granularity::Month, Granularity::Year, Some(i64::from(month)))
    }
    pub fn day_of_month(day: u32) -> Result<Repeating> {
        Repeating::new(Granularity::Day, Granularity::Month, Some(i64::from(day)))
    }
    pub fn hour_of_day(hour: u32) -> Result<Repeating> {
        Repeating::new(Granularity::Hour, Granularity::Day, Some(i64::from(hour)))
    }
    pub fn minute_of_hour(minute: u32) -> Result<Repeating> {
        Repeating::new(Granularity::Minute, Granularity::Hour, Some(i64::from(minute)))
    }
    pub fn unit(&self) -> Granularity {
        self.unit
    }
    pub fn range(&self) -> Granularity {
        self.range
    }
    pub fn value(&self) -> Option<i64> {
        self.value
    }

    // The occurrence inside the range period starting at `period`, if the
    // period has one (February has no day 30).
    fn candidate(&self, period: NaiveDateTime, value: i64) -> Result<Option<Interval>> {
        let (lo, _) = index_bounds(self.unit, self.range)
            .ok_or_else(|| TemporaError::invalid_operator("Repeating", format!("{self} has no index table")))?;
        let start = self.unit.add_to(period, value - lo)?;
        if start >= self.range.add_to(period, 1)? {
            return Ok(None);
        }
        Interval::unit_at(start, self.unit).map(Some)
    }

    /// The earliest occurrence starting at or after `anchor`.
    pub fn next_occurrence(&self, anchor: NaiveDateTime) -> Result<Interval> {
        let Some(value) = self.value else {
            let floor = self.unit.truncate(anchor)?;
            let start = if floor == anchor { floor } else { self.unit.add_to(floor, 1)? };
            return Interval::unit_at(start, self.unit);
        };
        let first = self.range.truncate(anchor)?;
        for k in 0..MAX_SCAN {
            let period = self.range.add_to(first, k)?;
            if let Some(occurrence) = self.candidate(period, value)? {
                if occurrence.start() >= anchor {
                    return Ok(occurrence);
                }
            }
        }
        Err(TemporaError::InvalidDate(format!("no occurrence of {self} follows {anchor}")))
    }

    /// The latest occurrence ending at or before `anchor`.
    pub fn previous_occurrence(&self, anchor: NaiveDateTime) -> Result<Interval> {
        let Some(value) = self.value else {
            let end = self.unit.truncate(anchor)?;
            return Interval::new(self.unit.add_to(end, -1)?, end);
        };
        let first = self.range.truncate(anchor)?;
        for k in 0..MAX_SCAN {
            let period = self.range.add_to(first, -k)?;
            if let Some(occurrence) = self.candidate(period, value)? {
                if occurrence.end() <= anchor {
                    return Ok(occurrence);
                }
            }
        }
        Err(TemporaError::InvalidDate(format!("no occurrence of {self} precedes {anchor}")))
    }

    /// The occurrence covering the instant `t`, if `t` falls inside one.
    pub fn occurrence_containing(&self, t: NaiveDateTime) -> Result<Option<Interval>> {
        match self.value {
            None => Interval::unit_at(self.unit.truncate(t)?, self.unit).map(Some),
            Some(value) => {
                let occurrence = self.candidate(self.range.truncate(t)?, value)?;
                Ok(occurrence.filter(|o| o.start() <= t && t < o.end()))
            }
        }
    }
}

impl fmt::Display for Repeating {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.unit, self.range, self.value) {
            (unit, _, None) => write!(f, "every {}", unit),
            (Granularity::Day, Granularity::Week, Some(v)) => {
                let day = (0..v).fold(Weekday::Mon, |d, _| d.succ());
                write!(f, "every {}", day)
            }
            (Granularity::Month, Granularity::Year, Some(v)) => {
                let month = (1..v).fold(Month::January, |m, _| m.succ());
                write!(f, "every {}", month.name())
            }
            (unit, range, Some(v)) => write!(f, "{} {} of every {}", unit, v, range),
        }
    }
}

/// The earliest occurrence of `repeating` starting at or after `anchor`.
pub fn next_occurrence(repeating: &Repeating, anchor: NaiveDateTime) -> Result<Interval> {
    repeating.next_occurrence(anchor)
}

/// The latest occurrence of `repeating` ending at or before `anchor`.
pub fn previous_occurrence(repeating: &Repeating, anchor: NaiveDateTime) -> Result<Interval> {
    repeating.previous_occurrence(anchor)
}
