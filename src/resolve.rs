//! Resolution of an [`AnnotationGraph`] into intervals, periods and
//! repeating patterns.
//!
//! Each entity type is decoded through a schema table naming the builder,
//! the required properties and whether each known property must be a
//! literal or a reference. Resolution is depth first with memoization; an
//! in-progress set turns reference cycles into [`TemporaError::CyclicReference`].

use chrono::{Datelike, Month, Weekday};
use lazy_static::lazy_static;
use serde::Serialize;
use tracing::{debug, warn};

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::calendar::{Granularity, Moment};
use crate::error::{Result, TemporaError};
use crate::graph::{AnnotationGraph, Entity, EntityHasher, KnownIntervals, KnownKey, PropertyValue, Span};
use crate::interval::{Interval, Period};
use crate::operator::{Operator, Shift};
use crate::repeating::Repeating;

// ------------- Value -------------
/// What an entity resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Value {
    Interval(Interval),
    Period(Period),
    Repeating(Repeating),
    Number(i64),
}

impl Value {
    pub fn as_interval(&self) -> Option<Interval> {
        match self {
            Value::Interval(i) => Some(*i),
            _ => None,
        }
    }
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Interval(_) => "Interval",
            Value::Period(_) => "Period",
            Value::Repeating(_) => "Repeating",
            Value::Number(_) => "Number",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Interval(i) => write!(f, "{}", i),
            Value::Period(p) => write!(f, "{}", p),
            Value::Repeating(r) => write!(f, "{}", r),
            Value::Number(n) => write!(f, "{}", n),
        }
    }
}

// ------------- Schemas -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Literal,
    Reference,
    Either,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builder {
    Interval,
    Period,
    Number,
    Repeating,
    CalendarInterval,
    Year,
    MonthOfYear,
    DayOfWeek,
    DayOfMonth,
    HourOfDay,
    MinuteOfHour,
    Event,
    Last,
    Next,
    This,
    Before,
    After,
    Nth,
    Between,
}

struct Schema {
    builder: Builder,
    required: &'static [&'static str],
    properties: &'static [(&'static str, Expect)],
}

// anchored operators share these
const ANCHORED: &[(&str, Expect)] = &[
    ("Interval-Type", Expect::Literal),
    ("Interval", Expect::Reference),
    ("Period", Expect::Reference),
    ("Repeating-Interval", Expect::Reference),
    ("Semantics", Expect::Literal),
    ("Number", Expect::Either),
];

lazy_static! {
    static ref SCHEMAS: HashMap<&'static str, Schema> = {
        use Expect::*;
        let table = [
            ("Interval", Schema { builder: Builder::Interval, required: &[], properties: &[("Value", Literal), ("Start", Literal), ("End", Literal)] }),
            ("Period", Schema { builder: Builder::Period, required: &["Type"], properties: &[("Type", Literal), ("Number", Either)] }),
            ("Number", Schema { builder: Builder::Number, required: &["Value"], properties: &[("Value", Literal)] }),
            ("Repeating", Schema { builder: Builder::Repeating, required: &["Unit"], properties: &[("Unit", Literal), ("Range", Literal), ("Value", Literal)] }),
            ("Calendar-Interval", Schema { builder: Builder::CalendarInterval, required: &["Type"], properties: &[("Type", Literal)] }),
            ("Year", Schema { builder: Builder::Year, required: &["Value"], properties: &[("Value", Literal), ("Sub-Interval", Reference)] }),
            ("Month-Of-Year", Schema { builder: Builder::MonthOfYear, required: &["Type"], properties: &[("Type", Literal)] }),
            ("Day-Of-Week", Schema { builder: Builder::DayOfWeek, required: &["Type"], properties: &[("Type", Literal)] }),
            ("Day-Of-Month", Schema { builder: Builder::DayOfMonth, required: &["Value"], properties: &[("Value", Literal)] }),
            ("Hour-Of-Day", Schema { builder: Builder::HourOfDay, required: &["Value"], properties: &[("Value", Literal)] }),
            ("Minute-Of-Hour", Schema { builder: Builder::MinuteOfHour, required: &["Value"], properties: &[("Value", Literal)] }),
            ("Event", Schema { builder: Builder::Event, required: &[], properties: &[] }),
            ("Last", Schema { builder: Builder::Last, required: &[], properties: ANCHORED }),
            ("Next", Schema { builder: Builder::Next, required: &[], properties: ANCHORED }),
            ("This", Schema { builder: Builder::This, required: &[], properties: ANCHORED }),
            ("Before", Schema { builder: Builder::Before, required: &[], properties: ANCHORED }),
            ("After", Schema { builder: Builder::After, required: &[], properties: ANCHORED }),
            ("Nth", Schema { builder: Builder::Nth, required: &["Value"], properties: &[
                ("Interval-Type", Literal), ("Interval", Reference), ("Value", Literal),
                ("Period", Reference), ("Repeating-Interval", Reference),
            ] }),
            ("Between", Schema { builder: Builder::Between, required: &[], properties: &[
                ("Start-Interval-Type", Literal), ("Start-Interval", Reference), ("Start-Included", Literal),
                ("End-Interval-Type", Literal), ("End-Interval", Reference), ("End-Included", Literal),
            ] }),
        ];
        table.into_iter().collect()
    };
}

impl Schema {
    fn check(&self, entity: &Entity) -> Result<()> {
        for name in self.required {
            if entity.property(name).is_none() {
                return Err(missing(entity, name));
            }
        }
        for (name, expect) in self.properties {
            let Some(value) = entity.property(name) else { continue };
            match (expect, value.as_reference()) {
                (Expect::Literal, Some(_)) => {
                    return Err(TemporaError::invalid_operator(&entity.type_name, format!("{name} must be a literal")));
                }
                (Expect::Reference, None) => {
                    return Err(TemporaError::invalid_operator(&entity.type_name, format!("{name} must be a reference")));
                }
                _ => (),
            }
        }
        Ok(())
    }
}

fn missing(entity: &Entity, property: &str) -> TemporaError {
    TemporaError::MissingProperty {
        id: entity.id.clone(),
        type_name: entity.type_name.clone(),
        property: property.to_owned(),
    }
}

fn literal<'e>(entity: &'e Entity, name: &str) -> Result<Cow<'e, str>> {
    match entity.property(name) {
        None => Err(missing(entity, name)),
        Some(PropertyValue::Text(s)) => Ok(Cow::Borrowed(s.trim())),
        Some(PropertyValue::Integer(i)) => Ok(Cow::Owned(i.to_string())),
        Some(PropertyValue::Reference { .. }) => {
            Err(TemporaError::invalid_operator(&entity.type_name, format!("{name} must be a literal")))
        }
    }
}

fn integer(entity: &Entity, name: &str) -> Result<i64> {
    let text = literal(entity, name)?;
    text.parse::<i64>().map_err(|_| {
        TemporaError::invalid_operator(&entity.type_name, format!("{name} '{text}' is not an integer"))
    })
}

fn index(entity: &Entity, name: &str) -> Result<u32> {
    let value = integer(entity, name)?;
    u32::try_from(value).map_err(|_| TemporaError::InvalidDate(format!("{name} {value} is out of range")))
}

// "Interval-Included" semantics measure from the far end of the anchor
fn included(entity: &Entity, name: &str) -> bool {
    match entity.property(name) {
        Some(PropertyValue::Text(s)) => matches!(s.trim(), "Interval-Included" | "Included" | "true"),
        _ => false,
    }
}

// ------------- Resolver -------------
/// Longest chain of references followed while resolving one entity.
pub const MAX_DEPTH: usize = 64;

/// Resolves the entities of one graph. Results are memoized for the
/// lifetime of the resolver, so resolving an id twice yields the same value.
pub struct Resolver<'g> {
    graph: &'g AnnotationGraph,
    known: &'g KnownIntervals,
    cache: HashMap<String, Value, EntityHasher>,
    in_progress: HashSet<String, EntityHasher>,
}

impl<'g> Resolver<'g> {
    pub fn new(graph: &'g AnnotationGraph, known: &'g KnownIntervals) -> Self {
        Self {
            graph,
            known,
            cache: HashMap::default(),
            in_progress: HashSet::default(),
        }
    }

    /// Resolves one entity. Failures carry the id and span of the entity
    /// where they arose.
    pub fn resolve(&mut self, id: &str) -> Result<Value> {
        if let Some(value) = self.cache.get(id) {
            return Ok(*value);
        }
        if self.in_progress.contains(id) {
            return Err(TemporaError::CyclicReference { id: id.to_owned() });
        }
        // every entity in progress is one level of recursion
        if self.in_progress.len() >= MAX_DEPTH {
            return Err(TemporaError::TooDeep { id: id.to_owned(), limit: MAX_DEPTH });
        }
        let graph = self.graph;
        let entity = graph.get(id).ok_or_else(|| TemporaError::unresolved(id))?;
        self.in_progress.insert(id.to_owned());
        let built = self.build(entity);
        self.in_progress.remove(id);
        match built {
            Ok(value) => {
                debug!(id = %id, kind = %entity.type_name, %value, "resolved entity");
                self.cache.insert(id.to_owned(), value);
                Ok(value)
            }
            Err(e @ TemporaError::Entity { .. }) => Err(e),
            Err(e) => Err(TemporaError::Entity { id: id.to_owned(), span: entity.span, source: Box::new(e) }),
        }
    }

    /// Resolves an entity that must produce an interval.
    pub fn resolve_interval(&mut self, id: &str) -> Result<Interval> {
        match self.resolve(id)? {
            Value::Interval(interval) => Ok(interval),
            other => Err(TemporaError::invalid_operator(
                "Interval",
                format!("{id} resolves to a {} where an interval is needed", other.kind()),
            )),
        }
    }

    /// Resolves the given ids in order, stopping at the first failure.
    pub fn resolve_ids<I, S>(&mut self, ids: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter().map(|id| self.resolve(id.as_ref())).collect()
    }

    /// Resolves the given ids in order, keeping each failure to its own slot.
    pub fn resolve_each<I, S>(&mut self, ids: I) -> Vec<Result<Value>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter()
            .map(|id| {
                let result = self.resolve(id.as_ref());
                if let Err(e) = &result {
                    warn!(id = %id.as_ref(), error = %e, "entity failed to resolve");
                }
                result
            })
            .collect()
    }

    /// Resolves every entity that no other entity refers to, in span order.
    pub fn resolve_top_level(&mut self) -> Result<Vec<Value>> {
        let graph = self.graph;
        graph.top_level().into_iter().map(|e| self.resolve(&e.id)).collect()
    }

    /// Groups the top-level results by the caller's spans: one vector per
    /// span holding the values of the top-level entities inside it.
    pub fn resolve_spans(&mut self, spans: &[Span]) -> Result<Vec<Vec<Value>>> {
        let graph = self.graph;
        let top = graph.top_level();
        spans
            .iter()
            .map(|span| {
                top.iter()
                    .filter(|e| e.span.is_some_and(|s| span.covers(&s)))
                    .map(|e| self.resolve(&e.id))
                    .collect()
            })
            .collect()
    }

    fn build(&mut self, entity: &'g Entity) -> Result<Value> {
        let schema = SCHEMAS.get(entity.type_name.as_str()).ok_or_else(|| TemporaError::UnknownEntityType {
            id: entity.id.clone(),
            type_name: entity.type_name.clone(),
        })?;
        schema.check(entity)?;
        let value = match schema.builder {
            Builder::Number => Value::Number(integer(entity, "Value")?),
            Builder::Period => {
                let unit = literal(entity, "Type")?.parse::<Granularity>()?;
                let amount = self.number(entity, "Number")?.unwrap_or(1);
                Value::Period(Period::new(unit, amount))
            }
            Builder::Interval => Value::Interval(self.interval_literal(entity)?),
            Builder::Repeating => {
                let unit = literal(entity, "Unit")?.parse::<Granularity>()?;
                let range = match entity.property("Range") {
                    Some(_) => literal(entity, "Range")?.parse::<Granularity>()?,
                    None => unit.parent().unwrap_or(unit),
                };
                let value = match entity.property("Value") {
                    Some(_) => Some(integer(entity, "Value")?),
                    None => None,
                };
                Value::Repeating(Repeating::new(unit, range, value)?)
            }
            Builder::CalendarInterval => {
                Value::Repeating(Repeating::every(literal(entity, "Type")?.parse::<Granularity>()?)?)
            }
            Builder::Year => {
                let year = i32::try_from(integer(entity, "Value")?)
                    .map_err(|_| TemporaError::InvalidDate(format!("year of entity {} is out of range", entity.id)))?;
                let interval = Interval::year(year)?;
                match self.linked(entity, "Sub-Interval")? {
                    None => Value::Interval(interval),
                    Some(Value::Repeating(r)) => {
                        let narrowed = Operator::nth(interval, 1, r).evaluate()?;
                        if !interval.contains(&narrowed) {
                            return Err(TemporaError::InvalidDate(format!("{r} does not occur in {year}")));
                        }
                        Value::Interval(narrowed)
                    }
                    Some(other) => {
                        return Err(TemporaError::invalid_operator(
                            "Year",
                            format!("Sub-Interval must be a repeating pattern, not a {}", other.kind()),
                        ));
                    }
                }
            }
            Builder::MonthOfYear => {
                let name = literal(entity, "Type")?;
                let month = name
                    .parse::<Month>()
                    .map_err(|_| TemporaError::InvalidDate(format!("'{name}' is not a month")))?;
                Value::Repeating(Repeating::month_of_year(month.number_from_month())?)
            }
            Builder::DayOfWeek => {
                let name = literal(entity, "Type")?;
                let day = name
                    .parse::<Weekday>()
                    .map_err(|_| TemporaError::InvalidDate(format!("'{name}' is not a day of the week")))?;
                Value::Repeating(Repeating::weekday(day))
            }
            Builder::DayOfMonth => Value::Repeating(Repeating::day_of_month(index(entity, "Value")?)?),
            Builder::HourOfDay => Value::Repeating(Repeating::hour_of_day(index(entity, "Value")?)?),
            Builder::MinuteOfHour => Value::Repeating(Repeating::minute_of_hour(index(entity, "Value")?)?),
            Builder::Event => {
                let span = entity.span.ok_or_else(|| missing(entity, "span"))?;
                let key = KnownKey::event(span);
                Value::Interval(self.known.get(&key).ok_or_else(|| TemporaError::unresolved(key.to_string()))?)
            }
            Builder::Last => {
                let (anchor, shift, included) = self.anchored(entity)?;
                Value::Interval(Operator::Last { anchor, shift, included }.evaluate()?)
            }
            Builder::Next => {
                let (anchor, shift, included) = self.anchored(entity)?;
                Value::Interval(Operator::Next { anchor, shift, included }.evaluate()?)
            }
            Builder::This => {
                let (anchor, shift, _) = self.anchored(entity)?;
                Value::Interval(Operator::This { anchor, shift }.evaluate()?)
            }
            Builder::Before => {
                let (anchor, shift, included) = self.anchored(entity)?;
                let count = self.number(entity, "Number")?.unwrap_or(1);
                Value::Interval(Operator::Before { anchor, shift, count, included }.evaluate()?)
            }
            Builder::After => {
                let (anchor, shift, included) = self.anchored(entity)?;
                let count = self.number(entity, "Number")?.unwrap_or(1);
                Value::Interval(Operator::After { anchor, shift, count, included }.evaluate()?)
            }
            Builder::Nth => {
                let index = integer(entity, "Value")?;
                let anchor = self.anchor(entity, "")?;
                let shift = self.shift(entity)?;
                Value::Interval(Operator::Nth { anchor, index, shift }.evaluate()?)
            }
            Builder::Between => {
                let start = self.anchor(entity, "Start-")?;
                let end = self.anchor(entity, "End-")?;
                Value::Interval(
                    Operator::Between {
                        start,
                        end,
                        start_included: included(entity, "Start-Included"),
                        end_included: included(entity, "End-Included"),
                    }
                    .evaluate()?,
                )
            }
        };
        Ok(value)
    }

    fn anchored(&mut self, entity: &Entity) -> Result<(Interval, Shift, bool)> {
        let anchor = self.anchor(entity, "")?;
        let shift = self.shift(entity)?;
        Ok((anchor, shift, included(entity, "Semantics")))
    }

    fn linked(&mut self, entity: &Entity, name: &str) -> Result<Option<Value>> {
        match entity.property(name).and_then(PropertyValue::as_reference) {
            Some(id) => self.resolve(id).map(Some),
            None => Ok(None),
        }
    }

    // literal integer, or a reference to a Number entity
    fn number(&mut self, entity: &Entity, name: &str) -> Result<Option<i64>> {
        match entity.property(name) {
            None => Ok(None),
            Some(PropertyValue::Reference { id }) => match self.resolve(id)? {
                Value::Number(n) => Ok(Some(n)),
                other => Err(TemporaError::invalid_operator(
                    &entity.type_name,
                    format!("{name} must be a number, not a {}", other.kind()),
                )),
            },
            Some(_) => integer(entity, name).map(Some),
        }
    }

    fn interval_literal(&self, entity: &Entity) -> Result<Interval> {
        if entity.property("Value").is_some() {
            return Interval::of(&literal(entity, "Value")?.parse::<Moment>()?);
        }
        if entity.property("Start").is_none() {
            return Err(missing(entity, "Value"));
        }
        let start = literal(entity, "Start")?.parse::<Moment>()?;
        let end = literal(entity, "End")?.parse::<Moment>()?;
        Interval::new(start.start(), end.start())
    }

    // The anchor named by `<prefix>Interval-Type`, linking through
    // `<prefix>Interval` when the type is "Link".
    fn anchor(&mut self, entity: &Entity, prefix: &str) -> Result<Interval> {
        let type_property = format!("{prefix}Interval-Type");
        let link_property = format!("{prefix}Interval");
        let interval_type = match entity.property(&type_property) {
            Some(_) => literal(entity, &type_property)?.into_owned(),
            None if entity.property(&link_property).is_some() => "Link".to_owned(),
            None => return Err(missing(entity, &type_property)),
        };
        match interval_type.as_str() {
            "DocTime" => self.known.doc_time().ok_or_else(|| TemporaError::unresolved(KnownKey::doc_time().to_string())),
            "DocTime-Year" => {
                let doc_time = self
                    .known
                    .doc_time()
                    .ok_or_else(|| TemporaError::unresolved(KnownKey::doc_time().to_string()))?;
                Interval::year(doc_time.start().year())
            }
            "Link" => {
                let id = entity
                    .property(&link_property)
                    .and_then(PropertyValue::as_reference)
                    .ok_or_else(|| missing(entity, &link_property))?;
                match self.resolve(id)? {
                    Value::Interval(interval) => Ok(interval),
                    other => Err(TemporaError::invalid_operator(
                        &entity.type_name,
                        format!("{link_property} must be an interval, not a {}", other.kind()),
                    )),
                }
            }
            "Unknown" => Err(TemporaError::unresolved(format!("{link_property} of unknown type"))),
            other => Err(TemporaError::invalid_operator(
                &entity.type_name,
                format!("unsupported {type_property} '{other}'"),
            )),
        }
    }

    fn shift(&mut self, entity: &Entity) -> Result<Shift> {
        let (name, value) = if let Some(value) = self.linked(entity, "Period")? {
            ("Period", value)
        } else if let Some(value) = self.linked(entity, "Repeating-Interval")? {
            ("Repeating-Interval", value)
        } else {
            return Err(missing(entity, "Period"));
        };
        match value {
            Value::Period(p) => Ok(Shift::Period(p)),
            Value::Repeating(r) => Ok(Shift::Repeating(r)),
            other => Err(TemporaError::invalid_operator(
                &entity.type_name,
                format!("{name} must be a period or repeating pattern, not a {}", other.kind()),
            )),
        }
    }
}

/// Resolves every top-level entity of `graph` against `known`.
pub fn resolve_graph(graph: &AnnotationGraph, known: &KnownIntervals) -> Result<Vec<Value>> {
    Resolver::new(graph, known).resolve_top_level()
}
