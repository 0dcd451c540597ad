// used for all points in time
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
// used to parse moment literals such as '2024-11-19'
use regex::Regex;
// so regular expressions don't have to be recompiled
use lazy_static::lazy_static;
use serde::Serialize;

// used when parsing a string to a Moment
use std::str::FromStr;
// used to print out readable forms
use std::fmt;

use crate::error::{Result, TemporaError};

// ------------- Granularity -------------
/// Calendar units, ordered from finest to coarsest. Weeks start on Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Granularity {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
    Decade,
    Century,
}

impl Granularity {
    pub const ALL: [Granularity; 10] = [
        Granularity::Second,
        Granularity::Minute,
        Granularity::Hour,
        Granularity::Day,
        Granularity::Week,
        Granularity::Month,
        Granularity::Quarter,
        Granularity::Year,
        Granularity::Decade,
        Granularity::Century,
    ];

    /// Length in seconds for the units that have a fixed length.
    pub fn fixed_seconds(self) -> Option<i64> {
        match self {
            Granularity::Second => Some(1),
            Granularity::Minute => Some(60),
            Granularity::Hour => Some(3_600),
            Granularity::Day => Some(86_400),
            Granularity::Week => Some(604_800),
            _ => None,
        }
    }

    /// Length in months for the month-based units.
    pub fn months(self) -> Option<i64> {
        match self {
            Granularity::Month => Some(1),
            Granularity::Quarter => Some(3),
            Granularity::Year => Some(12),
            Granularity::Decade => Some(120),
            Granularity::Century => Some(1_200),
            _ => None,
        }
    }

    /// Whether a period of `self` strictly contains periods of `other`.
    pub fn contains(self, other: Granularity) -> bool {
        other < self
    }

    /// The next coarser unit, if any.
    pub fn parent(self) -> Option<Granularity> {
        Self::ALL.iter().copied().find(|g| *g > self)
    }

    /// Shifts `t` by `amount` units. Month-based units clamp the day to the
    /// length of the target month, so Jan 31 + 1 month is the last of February.
    pub fn add_to(self, t: NaiveDateTime, amount: i64) -> Result<NaiveDateTime> {
        let overflow = || TemporaError::InvalidDate(format!("{t} shifted by {amount} {self}(s) is out of range"));
        if let Some(seconds) = self.fixed_seconds() {
            let delta = amount
                .checked_mul(seconds)
                .and_then(Duration::try_seconds)
                .ok_or_else(overflow)?;
            return t.checked_add_signed(delta).ok_or_else(overflow);
        }
        let months = self
            .months()
            .and_then(|m| m.checked_mul(amount))
            .ok_or_else(overflow)?;
        let count = u32::try_from(months.unsigned_abs()).map_err(|_| overflow())?;
        let shifted = if months >= 0 {
            t.checked_add_months(Months::new(count))
        } else {
            t.checked_sub_months(Months::new(count))
        };
        shifted.ok_or_else(overflow)
    }

    /// The start of the unit containing `t`.
    pub fn truncate(self, t: NaiveDateTime) -> Result<NaiveDateTime> {
        let date = t.date();
        let midnight = |d: NaiveDate| d.and_time(NaiveTime::MIN);
        let first_of = |year: i32, month: u32| {
            NaiveDate::from_ymd_opt(year, month, 1)
                .map(midnight)
                .ok_or_else(|| TemporaError::InvalidDate(format!("no {self} contains {t}")))
        };
        match self {
            Granularity::Second => Ok(t.with_nanosecond(0).unwrap_or(t)),
            Granularity::Minute => Ok(midnight(date) + Duration::minutes(i64::from(t.hour() * 60 + t.minute()))),
            Granularity::Hour => Ok(midnight(date) + Duration::hours(i64::from(t.hour()))),
            Granularity::Day => Ok(midnight(date)),
            Granularity::Week => {
                let back = i64::from(date.weekday().num_days_from_monday());
                date.checked_sub_signed(Duration::days(back))
                    .map(midnight)
                    .ok_or_else(|| TemporaError::InvalidDate(format!("no week contains {t}")))
            }
            Granularity::Month => first_of(date.year(), date.month()),
            Granularity::Quarter => first_of(date.year(), (date.month() - 1) / 3 * 3 + 1),
            Granularity::Year => first_of(date.year(), 1),
            Granularity::Decade => first_of(date.year() - date.year().rem_euclid(10), 1),
            Granularity::Century => first_of(date.year() - date.year().rem_euclid(100), 1),
        }
    }

    /// Plural name used when printing periods.
    pub fn plural(self) -> &'static str {
        match self {
            Granularity::Second => "seconds",
            Granularity::Minute => "minutes",
            Granularity::Hour => "hours",
            Granularity::Day => "days",
            Granularity::Week => "weeks",
            Granularity::Month => "months",
            Granularity::Quarter => "quarters",
            Granularity::Year => "years",
            Granularity::Decade => "decades",
            Granularity::Century => "centuries",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Granularity::Second => "second",
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Quarter => "quarter",
            Granularity::Year => "year",
            Granularity::Decade => "decade",
            Granularity::Century => "century",
        };
        write!(f, "{}", name)
    }
}

/// Accepts singular and plural names in any case, as well as the
/// hyphenated annotation spelling "Quarter-Years".
impl FromStr for Granularity {
    type Err = TemporaError;
    fn from_str(s: &str) -> Result<Self> {
        let unit = match s.trim().to_lowercase().as_str() {
            "second" | "seconds" => Granularity::Second,
            "minute" | "minutes" => Granularity::Minute,
            "hour" | "hours" => Granularity::Hour,
            "day" | "days" => Granularity::Day,
            "week" | "weeks" => Granularity::Week,
            "month" | "months" => Granularity::Month,
            "quarter" | "quarters" | "quarter-year" | "quarter-years" => Granularity::Quarter,
            "year" | "years" => Granularity::Year,
            "decade" | "decades" => Granularity::Decade,
            "century" | "centuries" => Granularity::Century,
            other => return Err(TemporaError::Parse(format!("unknown granularity '{other}'"))),
        };
        Ok(unit)
    }
}

// ------------- Moment -------------
/// A calendar point specified down to some precision: a year, a month,
/// a date, or a full date and time. Only `Year`, `Month`, `Day` and
/// `Second` precisions are produced.
#[derive(Eq, PartialEq, PartialOrd, Ord, Debug, Hash, Clone, Copy)]
pub struct Moment {
    start: NaiveDateTime,
    precision: Granularity,
}

impl Moment {
    pub fn year(year: i32) -> Result<Moment> {
        Self::year_month(year, 1).map(|m| Moment { precision: Granularity::Year, ..m })
    }
    pub fn year_month(year: i32, month: u32) -> Result<Moment> {
        if !(1..=12).contains(&month) {
            return Err(TemporaError::InvalidDate(format!("month {month} of year {year}")));
        }
        Self::date(year, month, 1).map(|m| Moment { precision: Granularity::Month, ..m })
    }
    pub fn date(year: i32, month: u32, day: u32) -> Result<Moment> {
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| TemporaError::InvalidDate(format!("{year}-{month:02}-{day:02}")))?;
        Ok(Moment { start: date.and_time(NaiveTime::MIN), precision: Granularity::Day })
    }
    pub fn datetime(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Result<Moment> {
        let date = Self::date(year, month, day)?.start.date();
        let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| {
            TemporaError::InvalidDate(format!("{hour:02}:{minute:02}:{second:02} is not a time of day"))
        })?;
        Ok(Moment { start: date.and_time(time), precision: Granularity::Second })
    }
    /// Rebuilds a moment of the given precision from an aligned point.
    pub(crate) fn aligned(start: NaiveDateTime, precision: Granularity) -> Moment {
        Moment { start, precision }
    }
    /// The first instant covered by this moment.
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }
    /// The first instant after this moment.
    pub fn end(&self) -> Result<NaiveDateTime> {
        self.precision.add_to(self.start, 1)
    }
    pub fn precision(&self) -> Granularity {
        self.precision
    }
}

impl From<NaiveDateTime> for Moment {
    fn from(t: NaiveDateTime) -> Self {
        Moment { start: t.with_nanosecond(0).unwrap_or(t), precision: Granularity::Second }
    }
}
impl From<NaiveDate> for Moment {
    fn from(d: NaiveDate) -> Self {
        Moment { start: d.and_time(NaiveTime::MIN), precision: Granularity::Day }
    }
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.precision {
            Granularity::Year => write!(f, "{}", self.start.format("%Y")),
            Granularity::Month => write!(f, "{}", self.start.format("%Y-%m")),
            Granularity::Day => write!(f, "{}", self.start.format("%Y-%m-%d")),
            _ => write!(f, "{}", self.start.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

lazy_static! {
    static ref MOMENT: Regex = Regex::new(
        r"^(?P<y>-?\d{4,6})(?:-(?P<m>\d{1,2})(?:-(?P<d>\d{1,2})(?:[T ](?P<h>\d{1,2}):(?P<mi>\d{2})(?::(?P<s>\d{2}))?)?)?)?$"
    ).unwrap();
}

/// Parses `YYYY`, `YYYY-MM`, `YYYY-MM-DD` and `YYYY-MM-DDTHH:MM[:SS]`.
impl FromStr for Moment {
    type Err = TemporaError;
    fn from_str(s: &str) -> Result<Self> {
        let caps = MOMENT
            .captures(s.trim())
            .ok_or_else(|| TemporaError::Parse(format!("'{s}' is not a moment literal")))?;
        let number = |name: &str| -> Result<Option<u32>> {
            caps.name(name)
                .map(|m| m.as_str().parse::<u32>().map_err(|e| TemporaError::Parse(e.to_string())))
                .transpose()
        };
        let year = caps["y"]
            .parse::<i32>()
            .map_err(|e| TemporaError::Parse(e.to_string()))?;
        match (number("m")?, number("d")?, number("h")?) {
            (None, _, _) => Moment::year(year),
            (Some(m), None, _) => Moment::year_month(year, m),
            (Some(m), Some(d), None) => Moment::date(year, m, d),
            (Some(m), Some(d), Some(h)) => {
                Moment::datetime(year, m, d, h, number("mi")?.unwrap_or(0), number("s")?.unwrap_or(0))
            }
        }
    }
}
