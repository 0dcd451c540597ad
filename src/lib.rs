//! Tempora – an algebra of temporal expressions and a resolver that turns
//! annotated temporal expressions into concrete calendar intervals.
//!
//! The algebra is built from a few value types:
//! * A [`calendar::Granularity`] is a calendar unit (second up to century).
//! * An [`interval::Interval`] is a half-open span `[start, end)` on the timeline.
//! * An [`interval::Period`] is an amount of a unit ("3 months") with no position.
//! * A [`repeating::Repeating`] is a recurring unit inside a larger range
//!   ("every Tuesday", "every January", "day 31 of each month").
//! * An [`operator::Operator`] (Last, Next, This, Between, Nth, Before, After)
//!   combines an anchor interval with a period or repeating interval and
//!   evaluates to a new interval.
//!
//! Month and year arithmetic is calendar aware: adding a month to January 31st
//! clamps to the last day of February. Everything below a week is fixed length.
//!
//! ## Annotation graphs
//! Text annotators produce graphs of typed entities (`Year`, `Day-Of-Week`,
//! `Last`, `Between`, ...) whose properties are literals or references to other
//! entities. A [`graph::AnnotationGraph`] holds such a graph, and a
//! [`resolve::Resolver`] evaluates it bottom-up against a table of
//! [`graph::KnownIntervals`] (document time, known events), memoizing results
//! and rejecting reference cycles.
//!
//! ## Modules
//! * [`calendar`] – Granularities, truncation, calendar arithmetic and moment literals.
//! * [`interval`] – Intervals, periods and their arithmetic.
//! * [`repeating`] – Repeating intervals and occurrence search.
//! * [`operator`] – The closed set of temporal operators.
//! * [`graph`] – Annotation graph model and known-interval table.
//! * [`resolve`] – Memoized graph resolution.
//! * [`interface`] – Threaded batch resolution with cancellation.
//! * [`settings`] / [`logging`] – Configuration and tracing setup.
//!
//! ## Quick Start
//! ```
//! use tempora::{interval::{Interval, Period}, calendar::Granularity, operator::Operator};
//! let anchor = Interval::day(2024, 11, 19).unwrap();
//! let last = Operator::last(anchor, Period::new(Granularity::Week, 2)).evaluate().unwrap();
//! assert_eq!(last, Interval::new(
//!     Interval::day(2024, 11, 5).unwrap().start(),
//!     Interval::day(2024, 11, 19).unwrap().start(),
//! ).unwrap());
//! ```

pub mod calendar;
pub mod error;
pub mod graph;
pub mod interface;
pub mod interval;
pub mod logging;
pub mod operator;
pub mod repeating;
pub mod resolve;
pub mod settings;

pub use error::{Result, TemporaError};
pub use graph::{AnnotationGraph, Entity, KnownIntervals, KnownKey, PropertyValue, Span};
pub use interval::{Interval, Period};
pub use operator::{Operator, Shift};
pub use resolve::{Resolver, Value, resolve_graph};
