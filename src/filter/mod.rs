//! Observation filtering
//!
//! Answers "which observations satisfy these constraints" independently of
//! the variable catalog: constraints accumulate in a predicate tree that is
//! rendered to SQL when the filter runs.

mod builder;
mod predicate;
mod temporal;

pub use builder::{FilterPhase, ObservationFilterBuilder, ObservationMode, ResultInterval};
pub use predicate::{CompareOp, Predicate};
pub use temporal::{IntervalColumns, TemporalOperand};
