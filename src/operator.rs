//! Operators combining an anchor interval with a period or a repeating
//! pattern into a new interval. All of them are pure: the anchor is always
//! passed in, nothing looks up the current time.

use chrono::NaiveDateTime;
use serde::Serialize;

use std::cmp::Reverse;
use std::fmt;

use crate::error::{Result, TemporaError};
use crate::interval::{Interval, Period};
use crate::repeating::Repeating;

/// The quantity an operator moves by: a fixed period or a repeating pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Shift {
    Period(Period),
    Repeating(Repeating),
}

impl From<Period> for Shift {
    fn from(p: Period) -> Self {
        Shift::Period(p)
    }
}
impl From<Repeating> for Shift {
    fn from(r: Repeating) -> Self {
        Shift::Repeating(r)
    }
}
impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Shift::Period(p) => write!(f, "{}", p),
            Shift::Repeating(r) => write!(f, "{}", r),
        }
    }
}

/// `included` flips which end of the anchor an operator measures from:
/// Last and Before use `anchor.end` instead of `anchor.start`, Next and
/// After use `anchor.start` instead of `anchor.end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operator {
    Last { anchor: Interval, shift: Shift, included: bool },
    Next { anchor: Interval, shift: Shift, included: bool },
    This { anchor: Interval, shift: Shift },
    Between { start: Interval, end: Interval, start_included: bool, end_included: bool },
    Nth { anchor: Interval, index: i64, shift: Shift },
    Before { anchor: Interval, shift: Shift, count: i64, included: bool },
    After { anchor: Interval, shift: Shift, count: i64, included: bool },
}

impl Operator {
    pub fn last(anchor: Interval, shift: impl Into<Shift>) -> Self {
        Operator::Last { anchor, shift: shift.into(), included: false }
    }
    pub fn next(anchor: Interval, shift: impl Into<Shift>) -> Self {
        Operator::Next { anchor, shift: shift.into(), included: false }
    }
    pub fn this(anchor: Interval, shift: impl Into<Shift>) -> Self {
        Operator::This { anchor, shift: shift.into() }
    }
    pub fn between(start: Interval, end: Interval, start_included: bool, end_included: bool) -> Self {
        Operator::Between { start, end, start_included, end_included }
    }
    pub fn nth(anchor: Interval, index: i64, shift: impl Into<Shift>) -> Self {
        Operator::Nth { anchor, index, shift: shift.into() }
    }
    pub fn before(anchor: Interval, shift: impl Into<Shift>) -> Self {
        Operator::Before { anchor, shift: shift.into(), count: 1, included: false }
    }
    pub fn after(anchor: Interval, shift: impl Into<Shift>) -> Self {
        Operator::After { anchor, shift: shift.into(), count: 1, included: false }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operator::Last { .. } => "Last",
            Operator::Next { .. } => "Next",
            Operator::This { .. } => "This",
            Operator::Between { .. } => "Between",
            Operator::Nth { .. } => "Nth",
            Operator::Before { .. } => "Before",
            Operator::After { .. } => "After",
        }
    }

    pub fn evaluate(&self) -> Result<Interval> {
        match *self {
            Operator::Last { anchor, shift, included } => {
                let reference = if included { anchor.end() } else { anchor.start() };
                match shift {
                    Shift::Period(p) => p.before(reference),
                    Shift::Repeating(r) => r.previous_occurrence(reference),
                }
            }
            Operator::Next { anchor, shift, included } => {
                let reference = if included { anchor.start() } else { anchor.end() };
                match shift {
                    Shift::Period(p) => p.after(reference),
                    Shift::Repeating(r) => r.next_occurrence(reference),
                }
            }
            Operator::This { anchor, shift } => match shift {
                Shift::Period(p) => centred(&anchor, &p),
                Shift::Repeating(r) => nearest_occurrence(&anchor, &r),
            },
            Operator::Between { start, end, start_included, end_included } => {
                let from = if start_included { start.start() } else { start.end() };
                let to = if end_included { end.end() } else { end.start() };
                if to < from {
                    return Err(TemporaError::invalid_operator(
                        self.name(),
                        format!("end {to} precedes start {from}"),
                    ));
                }
                Interval::new(from, to)
            }
            Operator::Nth { anchor, index, shift } => {
                if index == 0 {
                    return Err(TemporaError::invalid_operator(self.name(), "occurrences are counted from 1"));
                }
                let back = index
                    .checked_neg()
                    .ok_or_else(|| TemporaError::invalid_operator(self.name(), format!("index {index} is out of range")))?;
                match shift {
                    Shift::Period(p) if index > 0 => {
                        let from = p.scaled(index - 1)?.add_to(anchor.start())?;
                        Interval::new(from, p.add_to(from)?)
                    }
                    Shift::Period(p) => {
                        let to = p.scaled(back - 1)?.subtract_from(anchor.end())?;
                        Interval::new(p.subtract_from(to)?, to)
                    }
                    Shift::Repeating(r) if index > 0 => walk_forward(&r, anchor.start(), index),
                    Shift::Repeating(r) => walk_backward(&r, anchor.end(), back),
                }
            }
            Operator::Before { anchor, shift, count, included } => {
                self.check_count(count)?;
                match shift {
                    Shift::Period(p) => anchor.shift(&p, -count),
                    Shift::Repeating(r) => {
                        walk_backward(&r, if included { anchor.end() } else { anchor.start() }, count)
                    }
                }
            }
            Operator::After { anchor, shift, count, included } => {
                self.check_count(count)?;
                match shift {
                    Shift::Period(p) => anchor.shift(&p, count),
                    Shift::Repeating(r) => {
                        walk_forward(&r, if included { anchor.start() } else { anchor.end() }, count)
                    }
                }
            }
        }
    }

    fn check_count(&self, count: i64) -> Result<()> {
        if count < 1 {
            return Err(TemporaError::invalid_operator(self.name(), format!("count {count} must be positive")));
        }
        Ok(())
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operator::Last { anchor, shift, .. }
            | Operator::Next { anchor, shift, .. }
            | Operator::This { anchor, shift }
            | Operator::Before { anchor, shift, .. }
            | Operator::After { anchor, shift, .. } => write!(f, "{}({}, {})", self.name(), anchor, shift),
            Operator::Between { start, end, .. } => write!(f, "Between({}, {})", start, end),
            Operator::Nth { anchor, index, shift } => write!(f, "Nth({}, {}, {})", anchor, index, shift),
        }
    }
}

// n-th occurrence starting at or after `from`, each one after the previous
fn walk_forward(r: &Repeating, from: NaiveDateTime, n: i64) -> Result<Interval> {
    let mut occurrence = r.next_occurrence(from)?;
    for _ in 1..n {
        occurrence = r.next_occurrence(occurrence.end())?;
    }
    Ok(occurrence)
}

fn walk_backward(r: &Repeating, from: NaiveDateTime, n: i64) -> Result<Interval> {
    let mut occurrence = r.previous_occurrence(from)?;
    for _ in 1..n {
        occurrence = r.previous_occurrence(occurrence.start())?;
    }
    Ok(occurrence)
}

// A period-long interval sharing its midpoint with the anchor.
fn centred(anchor: &Interval, period: &Period) -> Result<Interval> {
    let mid = anchor.midpoint();
    let length = (period.add_to(mid)? - mid).abs();
    let start = mid - length / 2;
    Interval::new(start, start + length)
}

/// The occurrence holding the whole anchor, otherwise the occurrence whose
/// midpoint is closest to the anchor's midpoint. Equal distances resolve to
/// the later occurrence.
fn nearest_occurrence(anchor: &Interval, r: &Repeating) -> Result<Interval> {
    if let Some(occurrence) = r.occurrence_containing(anchor.start())? {
        if occurrence.contains(anchor) {
            return Ok(occurrence);
        }
    }
    let mid = anchor.midpoint();
    let mut candidates = vec![r.previous_occurrence(mid)?, r.next_occurrence(mid)?];
    candidates.extend(r.occurrence_containing(mid)?);
    candidates
        .into_iter()
        .min_by_key(|o| ((o.midpoint() - mid).abs(), Reverse(o.start())))
        .ok_or_else(|| TemporaError::invalid_operator("This", format!("no occurrence of {r} near {anchor}")))
}
