use chrono::{Datelike, Duration, NaiveDateTime};
use serde::Serialize;

// used to print out readable forms
use std::fmt;
// used to overload arithmetic between intervals, moments and periods
use std::ops;

use crate::calendar::{Granularity, Moment};
use crate::error::{Result, TemporaError};

// ------------- Interval -------------
/// A half-open span of time `[start, end)`. Intervals order by start, then end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Interval {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl Interval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Interval> {
        if end < start {
            return Err(TemporaError::InvalidDate(format!("interval end {end} precedes its start {start}")));
        }
        Ok(Interval { start, end })
    }
    /// The maximal interval covered by a (possibly partial) moment.
    pub fn of(moment: &Moment) -> Result<Interval> {
        Interval::new(moment.start(), moment.end()?)
    }
    pub fn year(year: i32) -> Result<Interval> {
        Interval::of(&Moment::year(year)?)
    }
    pub fn month(year: i32, month: u32) -> Result<Interval> {
        Interval::of(&Moment::year_month(year, month)?)
    }
    pub fn day(year: i32, month: u32, day: u32) -> Result<Interval> {
        Interval::of(&Moment::date(year, month, day)?)
    }
    /// One `unit` starting at `start`.
    pub fn unit_at(start: NaiveDateTime, unit: Granularity) -> Result<Interval> {
        Interval::new(start, unit.add_to(start, 1)?)
    }
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }
    pub fn end(&self) -> NaiveDateTime {
        self.end
    }
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
    pub fn midpoint(&self) -> NaiveDateTime {
        self.start + self.duration() / 2
    }
    /// Whether `other` lies entirely within this interval.
    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
    /// Moves the interval by `amount` periods. Only the start is shifted; the
    /// end is rebuilt from it, in whole months when the interval spans whole
    /// calendar months and as the same fixed duration otherwise.
    pub fn shift(&self, period: &Period, amount: i64) -> Result<Interval> {
        let start = period.scaled(amount)?.add_to(self.start)?;
        let end = match self.whole_months()? {
            Some(months) => Granularity::Month.add_to(start, months)?,
            None => start
                .checked_add_signed(self.duration())
                .ok_or_else(|| TemporaError::InvalidDate(format!("{self} moved to {start} overflows")))?,
        };
        Interval::new(start, end)
    }

    // months from start to end, when end is exactly that many months on
    fn whole_months(&self) -> Result<Option<i64>> {
        let months = i64::from(self.end.year() - self.start.year()) * 12 + i64::from(self.end.month())
            - i64::from(self.start.month());
        if months <= 0 {
            return Ok(None);
        }
        Ok((Granularity::Month.add_to(self.start, months)? == self.end).then_some(months))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%dT%H:%M:%S"),
            self.end.format("%Y-%m-%dT%H:%M:%S")
        )
    }
}

// ------------- Period -------------
/// A signed amount of a calendar unit, e.g. "3 months".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Period {
    unit: Granularity,
    amount: i64,
}

impl Period {
    pub fn new(unit: Granularity, amount: i64) -> Self {
        Self { unit, amount }
    }
    pub fn unit(&self) -> Granularity {
        self.unit
    }
    pub fn amount(&self) -> i64 {
        self.amount
    }
    pub fn scaled(&self, factor: i64) -> Result<Period> {
        self.amount
            .checked_mul(factor)
            .map(|amount| Period::new(self.unit, amount))
            .ok_or_else(|| TemporaError::InvalidDate(format!("{self} times {factor} overflows")))
    }
    pub fn add_to(&self, t: NaiveDateTime) -> Result<NaiveDateTime> {
        self.unit.add_to(t, self.amount)
    }
    pub fn subtract_from(&self, t: NaiveDateTime) -> Result<NaiveDateTime> {
        let amount = self
            .amount
            .checked_neg()
            .ok_or_else(|| TemporaError::InvalidDate(format!("cannot negate {self}")))?;
        self.unit.add_to(t, amount)
    }
    /// The interval `[t, t + self)`, or `[t + self, t)` for negative amounts.
    pub fn after(&self, t: NaiveDateTime) -> Result<Interval> {
        let other = self.add_to(t)?;
        Interval::new(t.min(other), t.max(other))
    }
    /// The interval `[t - self, t)`, or `[t, t - self)` for negative amounts.
    pub fn before(&self, t: NaiveDateTime) -> Result<Interval> {
        let other = self.subtract_from(t)?;
        Interval::new(t.min(other), t.max(other))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.amount.abs() == 1 {
            write!(f, "{} {}", self.amount, self.unit)
        } else {
            write!(f, "{} {}", self.amount, self.unit.plural())
        }
    }
}

impl ops::Add<Period> for Interval {
    type Output = Result<Interval>;
    fn add(self, period: Period) -> Result<Interval> {
        self.shift(&period, 1)
    }
}
impl ops::Sub<Period> for Interval {
    type Output = Result<Interval>;
    fn sub(self, period: Period) -> Result<Interval> {
        self.shift(&period, -1)
    }
}

// Shifting keeps the moment's precision unless the period is finer.
fn precision_for(unit: Granularity) -> Granularity {
    match unit {
        Granularity::Second | Granularity::Minute | Granularity::Hour => Granularity::Second,
        Granularity::Day | Granularity::Week => Granularity::Day,
        Granularity::Month | Granularity::Quarter => Granularity::Month,
        _ => Granularity::Year,
    }
}

impl ops::Add<Period> for Moment {
    type Output = Result<Moment>;
    fn add(self, period: Period) -> Result<Moment> {
        let start = period.add_to(self.start())?;
        Ok(Moment::aligned(start, self.precision().min(precision_for(period.unit()))))
    }
}
impl ops::Sub<Period> for Moment {
    type Output = Result<Moment>;
    fn sub(self, period: Period) -> Result<Moment> {
        let start = period.subtract_from(self.start())?;
        Ok(Moment::aligned(start, self.precision().min(precision_for(period.unit()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn day_intervals_span_midnight_to_midnight() {
        let mut date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let last = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        while date <= last {
            let interval = Interval::day(date.year(), date.month(), date.day()).unwrap();
            assert_eq!(interval.start(), date.and_hms_opt(0, 0, 0).unwrap());
            assert_eq!(interval.end(), date.succ_opt().unwrap().and_hms_opt(0, 0, 0).unwrap());
            date = date.succ_opt().unwrap();
        }
        assert_eq!(Interval::day(2024, 2, 29).unwrap().end(), at(2024, 3, 1));
        assert_eq!(Interval::day(2024, 12, 31).unwrap().end(), at(2025, 1, 1));
        assert!(matches!(Interval::day(2023, 2, 29), Err(TemporaError::InvalidDate(_))));
    }

    #[test]
    fn partial_specifications() {
        let year = Interval::year(2024).unwrap();
        assert_eq!((year.start(), year.end()), (at(2024, 1, 1), at(2025, 1, 1)));
        let month = Interval::month(2024, 2).unwrap();
        assert_eq!((month.start(), month.end()), (at(2024, 2, 1), at(2024, 3, 1)));
        let december = Interval::month(2024, 12).unwrap();
        assert_eq!(december.end(), at(2025, 1, 1));
        assert!(matches!(Interval::month(2024, 13), Err(TemporaError::InvalidDate(_))));
        assert!(matches!(Interval::month(2024, 0), Err(TemporaError::InvalidDate(_))));
    }

    #[test]
    fn reversed_interval_is_rejected() {
        assert!(Interval::new(at(2024, 1, 2), at(2024, 1, 1)).is_err());
        assert!(Interval::new(at(2024, 1, 1), at(2024, 1, 1)).unwrap().is_empty());
    }

    #[test]
    fn fixed_period_round_trip() {
        let interval = Interval::day(2024, 11, 19).unwrap();
        for period in [
            Period::new(Granularity::Day, 45),
            Period::new(Granularity::Week, -3),
            Period::new(Granularity::Hour, 1_000),
            Period::new(Granularity::Second, 7),
        ] {
            let shifted = (interval + period).unwrap();
            assert_eq!((shifted - period).unwrap(), interval);
        }
    }

    #[test]
    fn month_period_clamps_instead_of_round_tripping() {
        // Jan 31 + 1 month lands on the last day of February, and going back
        // from there gives Jan 29, not Jan 31.
        let jan31 = Interval::day(2024, 1, 31).unwrap();
        let month = Period::new(Granularity::Month, 1);
        let shifted = (jan31 + month).unwrap();
        assert_eq!(shifted.start(), at(2024, 2, 29));
        assert_eq!(shifted.end(), at(2024, 3, 1));
        assert_eq!((shifted - month).unwrap().start(), at(2024, 1, 29));
    }

    #[test]
    fn calendar_shifts_keep_the_interval_length() {
        for (y, m, d) in [(2024, 1, 30), (2024, 1, 31), (2024, 3, 30), (2024, 3, 31), (2023, 1, 31)] {
            let anchor = Interval::day(y, m, d).unwrap();
            for unit in [Granularity::Month, Granularity::Quarter, Granularity::Year] {
                for amount in [1, -1] {
                    let shifted = anchor.shift(&Period::new(unit, amount), 1).unwrap();
                    assert!(!shifted.is_empty(), "{anchor} moved by {amount} {unit}");
                    assert_eq!(shifted.duration(), Duration::days(1), "{anchor} moved by {amount} {unit}");
                }
            }
        }
        let jan30 = Interval::day(2024, 1, 30).unwrap();
        assert_eq!((jan30 + Period::new(Granularity::Month, 1)).unwrap(), Interval::day(2024, 2, 29).unwrap());
        let mar30 = Interval::day(2024, 3, 30).unwrap();
        assert_eq!((mar30 - Period::new(Granularity::Month, 1)).unwrap(), Interval::day(2024, 2, 29).unwrap());
        assert_eq!((mar30 + Period::new(Granularity::Quarter, 1)).unwrap(), Interval::day(2024, 6, 30).unwrap());
    }

    #[test]
    fn whole_month_intervals_shift_by_months() {
        let january = Interval::month(2024, 1).unwrap();
        assert_eq!((january + Period::new(Granularity::Month, 1)).unwrap(), Interval::month(2024, 2).unwrap());
        let year = Interval::year(2024).unwrap();
        let moved = (year + Period::new(Granularity::Month, 1)).unwrap();
        assert_eq!((moved.start(), moved.end()), (at(2024, 2, 1), at(2025, 2, 1)));
        let february = Interval::month(2024, 2).unwrap();
        assert_eq!((february - Period::new(Granularity::Day, 1)).unwrap().end(), at(2024, 2, 29));
    }

    #[test]
    fn interval_order() {
        let a = Interval::new(at(2024, 1, 1), at(2024, 1, 3)).unwrap();
        let b = Interval::new(at(2024, 1, 1), at(2024, 1, 5)).unwrap();
        let c = Interval::new(at(2024, 1, 2), at(2024, 1, 3)).unwrap();
        let mut sorted = vec![c, b, a];
        sorted.sort();
        assert_eq!(sorted, vec![a, b, c]);
    }

    #[test]
    fn period_relative_to_a_point() {
        let three_months = Period::new(Granularity::Month, 3);
        let after = three_months.after(at(2024, 1, 1)).unwrap();
        assert_eq!((after.start(), after.end()), (at(2024, 1, 1), at(2024, 4, 1)));
        let week = Period::new(Granularity::Week, 1);
        let before = week.before(at(2024, 3, 15)).unwrap();
        assert_eq!((before.start(), before.end()), (at(2024, 3, 8), at(2024, 3, 15)));
        assert_eq!(three_months.to_string(), "3 months");
        assert_eq!(week.to_string(), "1 week");
    }

    #[test]
    fn moment_arithmetic_keeps_precision() {
        let year = Moment::year(2024).unwrap();
        assert_eq!((year + Period::new(Granularity::Year, 1)).unwrap(), Moment::year(2025).unwrap());
        assert_eq!(
            (year + Period::new(Granularity::Month, 3)).unwrap(),
            Moment::year_month(2024, 4).unwrap()
        );
        let month = Moment::year_month(2024, 11).unwrap();
        assert_eq!(
            (month + Period::new(Granularity::Month, 2)).unwrap(),
            Moment::year_month(2025, 1).unwrap()
        );
        let date = Moment::date(2024, 1, 31).unwrap();
        assert_eq!(
            (date + Period::new(Granularity::Month, 1)).unwrap(),
            Moment::date(2024, 2, 29).unwrap()
        );
        assert_eq!(
            (date - Period::new(Granularity::Day, 31)).unwrap(),
            Moment::date(2023, 12, 31).unwrap()
        );
        let shifted = (date + Period::new(Granularity::Hour, 5)).unwrap();
        assert_eq!(shifted.precision(), Granularity::Second);
        assert_eq!(shifted.to_string(), "2024-01-31T05:00:00");
    }
}
